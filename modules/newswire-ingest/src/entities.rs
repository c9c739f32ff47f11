//! Heuristic entity extraction over title + content.
//!
//! Regex and capitalization heuristics with per-type confidence. Ticker
//! candidates only survive when the surrounding text carries financial
//! context. Results are deduplicated by (lowercased name, type) and capped
//! to the top N by confidence.

use std::collections::HashSet;

use regex::Regex;

use newswire_common::{Entity, EntityType};

/// Keep the N most confident entities per article.
const MAX_ENTITIES: usize = 20;

/// Words that gate ticker-symbol extraction: an all-caps token only counts
/// as a ticker when the text talks about markets.
const FINANCIAL_CONTEXT: &[&str] = &[
    "stock", "stocks", "shares", "trading", "nasdaq", "nyse", "ticker", "ipo", "earnings",
    "market", "markets", "investors",
];

/// All-caps tokens that are ordinary abbreviations, not tickers.
const TICKER_STOPLIST: &[&str] = &[
    "CEO", "CFO", "CTO", "USA", "USD", "GDP", "FBI", "SEC", "LLC", "INC", "LTD", "API", "NEWS",
    "THE", "AND", "FOR",
];

const ORG_SUFFIXES: &[&str] = &[
    "Inc", "Corp", "Corporation", "Ltd", "LLC", "Co", "Group", "Holdings", "Bank", "Capital",
    "Partners", "Ventures", "Labs", "Technologies", "Systems", "Media", "Airlines", "Motors",
];

const LOCATION_CUES: &[&str] = &["in", "at", "near", "from", "across"];

pub struct EntityExtractor {
    money: Regex,
    percentage: Regex,
    date: Regex,
    ticker: Regex,
    capitalized_run: Regex,
}

impl EntityExtractor {
    pub fn new() -> Self {
        Self {
            money: Regex::new(
                r"\$\s?\d+(?:[.,]\d+)*\s?(?:million|billion|trillion|[MBK])?\b",
            )
            .expect("Invalid money regex"),
            percentage: Regex::new(r"\b\d+(?:\.\d+)?\s?(?:%|percent\b)")
                .expect("Invalid percentage regex"),
            date: Regex::new(
                r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2}(?:,\s*\d{4})?\b|\b\d{4}-\d{2}-\d{2}\b",
            )
            .expect("Invalid date regex"),
            ticker: Regex::new(r"\b[A-Z]{2,5}\b").expect("Invalid ticker regex"),
            capitalized_run: Regex::new(
                r"\b[A-Z][a-zA-Z&'-]+(?:\s+[A-Z][a-zA-Z&'-]+){0,3}\b",
            )
            .expect("Invalid name regex"),
        }
    }

    /// Extract entities from the combined title + content text.
    pub fn extract(&self, text: &str) -> Vec<Entity> {
        let mut entities = Vec::new();

        for m in self.money.find_iter(text) {
            entities.push(Entity {
                name: m.as_str().trim().to_string(),
                entity_type: EntityType::Money,
                confidence: 0.9,
            });
        }

        for m in self.percentage.find_iter(text) {
            entities.push(Entity {
                name: m.as_str().trim().to_string(),
                entity_type: EntityType::Percentage,
                confidence: 0.9,
            });
        }

        for m in self.date.find_iter(text) {
            entities.push(Entity {
                name: m.as_str().trim().to_string(),
                entity_type: EntityType::Date,
                confidence: 0.8,
            });
        }

        if has_financial_context(text) {
            for m in self.ticker.find_iter(text) {
                let symbol = m.as_str();
                if TICKER_STOPLIST.contains(&symbol) {
                    continue;
                }
                entities.push(Entity {
                    name: symbol.to_string(),
                    entity_type: EntityType::Ticker,
                    confidence: 0.6,
                });
            }
        }

        entities.extend(self.extract_names(text));

        dedupe_and_cap(entities)
    }

    /// Capitalized runs classified by suffix and surrounding cues.
    fn extract_names(&self, text: &str) -> Vec<Entity> {
        let mut names = Vec::new();
        for m in self.capitalized_run.find_iter(text) {
            let name = m.as_str();
            let words: Vec<&str> = name.split_whitespace().collect();

            // Single sentence-leading words are too noisy to keep
            let at_sentence_start = {
                let before = text[..m.start()].trim_end();
                before.is_empty()
                    || before.ends_with('.')
                    || before.ends_with('!')
                    || before.ends_with('?')
            };
            if words.len() == 1 && at_sentence_start {
                continue;
            }

            if words
                .last()
                .is_some_and(|last| ORG_SUFFIXES.contains(&last.trim_end_matches('.')))
            {
                names.push(Entity {
                    name: name.to_string(),
                    entity_type: EntityType::Organization,
                    confidence: 0.85,
                });
                continue;
            }

            let preceding_word = text[..m.start()]
                .split_whitespace()
                .last()
                .map(|w| w.to_lowercase());
            if preceding_word
                .as_deref()
                .is_some_and(|w| LOCATION_CUES.contains(&w))
            {
                names.push(Entity {
                    name: name.to_string(),
                    entity_type: EntityType::Location,
                    confidence: 0.7,
                });
                continue;
            }

            if words.len() >= 2 && words.len() <= 3 {
                names.push(Entity {
                    name: name.to_string(),
                    entity_type: EntityType::Person,
                    confidence: 0.6,
                });
            } else if words.len() == 1 {
                names.push(Entity {
                    name: name.to_string(),
                    entity_type: EntityType::Organization,
                    confidence: 0.5,
                });
            }
        }
        names
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn has_financial_context(text: &str) -> bool {
    let lower = text.to_lowercase();
    FINANCIAL_CONTEXT
        .iter()
        .any(|word| lower.split(|c: char| !c.is_alphanumeric()).any(|t| t == *word))
}

/// Dedupe by (lowercased name, type), keeping the highest confidence, then
/// cap to the top N.
fn dedupe_and_cap(mut entities: Vec<Entity>) -> Vec<Entity> {
    entities.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for entity in entities {
        let key = (entity.name.to_lowercase(), entity.entity_type);
        if seen.insert(key) {
            out.push(entity);
            if out.len() >= MAX_ENTITIES {
                break;
            }
        }
    }
    out
}
