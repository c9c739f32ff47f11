//! Borderline duplicate validation through the LLM provider.
//!
//! The LLM is an untrusted input channel: its reply is parsed into a narrow
//! verdict struct with explicit defaulting, never into domain types. Any
//! provider or parse failure reduces to `None` so the caller's algorithmic
//! decision stands.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::provider::OpenAiClient;

#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateVerdict {
    pub is_duplicate: bool,
    pub confidence: f64,
    pub reasoning: String,
}

/// One side of a comparison, trimmed to what the prompt needs.
#[derive(Debug, Clone)]
pub struct ComparisonDoc {
    pub title: String,
    pub snippet: String,
    pub source: String,
}

#[async_trait]
pub trait DuplicateValidator: Send + Sync {
    /// `None` means "no usable answer", and the caller must fall back to
    /// its algorithmic decision.
    async fn validate_duplicate(
        &self,
        a: &ComparisonDoc,
        b: &ComparisonDoc,
    ) -> Option<DuplicateVerdict>;
}

const VALIDATION_SYSTEM_PROMPT: &str = "You compare two news items and decide whether they report \
the same underlying story. Respond with only a JSON object: \
{\"is_duplicate\": bool, \"confidence\": number between 0 and 1, \"reasoning\": string}. \
Follow-up coverage of an earlier story is NOT a duplicate.";

pub struct LlmValidator {
    client: OpenAiClient,
    model: String,
}

impl LlmValidator {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: OpenAiClient::new(api_key),
            model: model.to_string(),
        }
    }

    fn build_prompt(a: &ComparisonDoc, b: &ComparisonDoc) -> String {
        format!(
            "Article A ({}):\nTitle: {}\n{}\n\nArticle B ({}):\nTitle: {}\n{}",
            a.source, a.title, a.snippet, b.source, b.title, b.snippet
        )
    }
}

#[async_trait]
impl DuplicateValidator for LlmValidator {
    async fn validate_duplicate(
        &self,
        a: &ComparisonDoc,
        b: &ComparisonDoc,
    ) -> Option<DuplicateVerdict> {
        let prompt = Self::build_prompt(a, b);
        match self
            .client
            .chat(&self.model, VALIDATION_SYSTEM_PROMPT, &prompt)
            .await
        {
            Ok(reply) => {
                let verdict = parse_verdict(&reply);
                if verdict.is_none() {
                    warn!("Unparseable validation reply, falling back to algorithmic decision");
                }
                verdict
            }
            Err(e) => {
                warn!(error = %e, "Duplicate validation provider failed");
                None
            }
        }
    }
}

/// Raw reply shape; every field optional so partial JSON still parses.
#[derive(Deserialize)]
struct RawVerdict {
    #[serde(default)]
    is_duplicate: Option<bool>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Extract the first balanced JSON object from free-form model output and
/// coerce it into a verdict. Missing or ill-formed fields become safe
/// defaults (`false` / `0.0`).
pub fn parse_verdict(reply: &str) -> Option<DuplicateVerdict> {
    let json = extract_first_json_object(reply)?;
    let raw: RawVerdict = serde_json::from_str(json).ok()?;
    Some(DuplicateVerdict {
        is_duplicate: raw.is_duplicate.unwrap_or(false),
        confidence: raw.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
        reasoning: raw.reasoning.unwrap_or_default(),
    })
}

/// Scan for the first `{ ... }` with balanced braces, skipping brace
/// characters inside JSON strings.
fn extract_first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json_reply() {
        let v = parse_verdict(
            r#"{"is_duplicate": true, "confidence": 0.92, "reasoning": "same deal"}"#,
        )
        .unwrap();
        assert!(v.is_duplicate);
        assert!((v.confidence - 0.92).abs() < 1e-9);
        assert_eq!(v.reasoning, "same deal");
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let reply = "Sure! Here's the analysis:\n```json\n{\"is_duplicate\": false, \"confidence\": 0.4}\n```\nLet me know.";
        let v = parse_verdict(reply).unwrap();
        assert!(!v.is_duplicate);
        assert!((v.confidence - 0.4).abs() < 1e-9);
        assert_eq!(v.reasoning, "");
    }

    #[test]
    fn missing_fields_default_safely() {
        let v = parse_verdict(r#"{"reasoning": "unsure"}"#).unwrap();
        assert!(!v.is_duplicate);
        assert_eq!(v.confidence, 0.0);
    }

    #[test]
    fn confidence_clamped_to_unit_interval() {
        let v = parse_verdict(r#"{"is_duplicate": true, "confidence": 3.5}"#).unwrap();
        assert_eq!(v.confidence, 1.0);
    }

    #[test]
    fn braces_inside_strings_do_not_break_extraction() {
        let reply = r#"{"is_duplicate": true, "confidence": 0.9, "reasoning": "both cover {Acme}"}"#;
        let v = parse_verdict(reply).unwrap();
        assert_eq!(v.reasoning, "both cover {Acme}");
    }

    #[test]
    fn garbage_reply_yields_none() {
        assert!(parse_verdict("I cannot answer that.").is_none());
        assert!(parse_verdict("{unbalanced").is_none());
        assert!(parse_verdict("").is_none());
    }

    #[test]
    fn first_of_multiple_objects_wins() {
        let reply = r#"{"is_duplicate": true, "confidence": 0.9} {"is_duplicate": false}"#;
        let v = parse_verdict(reply).unwrap();
        assert!(v.is_duplicate);
    }
}
