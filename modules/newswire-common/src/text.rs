//! Text normalization and content fingerprinting.
//!
//! Normalization is defined over code points, not bytes, so the fingerprint
//! stays stable across sources that encode the same characters differently.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Digest algorithm for the content fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintAlgo {
    Sha256,
    Md5,
    Sha1,
}

impl std::str::FromStr for FingerprintAlgo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(FingerprintAlgo::Sha256),
            "md5" => Ok(FingerprintAlgo::Md5),
            "sha1" => Ok(FingerprintAlgo::Sha1),
            other => Err(format!("unknown fingerprint algorithm: {other}")),
        }
    }
}

impl std::fmt::Display for FingerprintAlgo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FingerprintAlgo::Sha256 => write!(f, "sha256"),
            FingerprintAlgo::Md5 => write!(f, "md5"),
            FingerprintAlgo::Sha1 => write!(f, "sha1"),
        }
    }
}

/// Normalize text for fingerprinting: lowercase, strip non-alphanumeric
/// code points, collapse whitespace. Idempotent: `normalize(normalize(x))
/// == normalize(x)`.
pub fn normalize_for_hash(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            for lc in ch.to_lowercase() {
                out.push(lc);
            }
        } else {
            pending_space = true;
        }
    }
    out
}

/// Normalize a title for similarity comparison: lowercase and trim.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Hex digest of `normalize(title ⧺ " " ⧺ content)` under the configured
/// algorithm. Inputs differing only in punctuation, case, or whitespace
/// produce the same hash.
pub fn content_fingerprint(title: &str, content: &str, algo: FingerprintAlgo) -> String {
    let normalized = normalize_for_hash(&format!("{title} {content}"));
    match algo {
        FingerprintAlgo::Sha256 => hex_digest(Sha256::new(), normalized.as_bytes()),
        FingerprintAlgo::Md5 => hex_digest(Md5::new(), normalized.as_bytes()),
        FingerprintAlgo::Sha1 => hex_digest(Sha1::new(), normalized.as_bytes()),
    }
}

fn hex_digest<D: Digest>(mut hasher: D, bytes: &[u8]) -> String {
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Clean feed-provided text: strip markup, unescape the common HTML
/// entities, collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    let stripped = strip_tags(raw);
    let unescaped = unescape_entities(&stripped);
    collapse_whitespace(&unescaped)
}

/// Remove HTML/XML tags, keeping the text between them.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                // Tag boundaries act as word separators
                out.push(' ');
            }
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn unescape_entities(text: &str) -> String {
    let mut out = text.to_string();
    for (entity, replacement) in [
        ("&amp;", "&"),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&#x27;", "'"),
        ("&apos;", "'"),
        ("&nbsp;", " "),
        ("&mdash;", "—"),
        ("&ndash;", "–"),
        ("&hellip;", "…"),
        ("&rsquo;", "'"),
        ("&lsquo;", "'"),
        ("&rdquo;", "\u{201d}"),
        ("&ldquo;", "\u{201c}"),
    ] {
        if out.contains(entity) {
            out = out.replace(entity, replacement);
        }
    }
    out
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}
