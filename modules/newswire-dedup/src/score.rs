//! Signal combination, primary-method election, and threshold decisions.
//!
//! Pure functions: the engine computes the seven signals, this module turns
//! them into an auditable verdict.

use newswire_common::{DetectionMethod, SimilarityBreakdown};

// Fixed blend weights for the non-configurable signals.
const SEMANTIC_WEIGHT: f64 = 0.30;
const TEMPORAL_WEIGHT: f64 = 0.10;
const SOURCE_ALIGN_WEIGHT: f64 = 0.10;

// Per-method thresholds applied to the overall score.
const TITLE_THRESHOLD: f64 = 0.9;
const SEMANTIC_THRESHOLD: f64 = 0.85;
const ENTITY_THRESHOLD: f64 = 0.8;

/// Candidates scoring below this overall are discarded without further work.
pub const CHEAP_DISCARD_FLOOR: f64 = 0.3;

/// The three configurable signal weights. Must sum to 1.0 (validated at
/// startup by `AppConfig`).
#[derive(Debug, Clone, Copy)]
pub struct SignalWeights {
    pub title: f64,
    pub content: f64,
    pub entity: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            title: 0.4,
            content: 0.4,
            entity: 0.2,
        }
    }
}

/// Combine per-signal scores into the overall score and fill in the
/// breakdown. An exact content-hash match short-circuits to 1.0.
pub fn combine(mut breakdown: SimilarityBreakdown, weights: SignalWeights) -> SimilarityBreakdown {
    if breakdown.content_hash >= 1.0 {
        breakdown.overall = 1.0;
        return breakdown;
    }
    breakdown.overall = weights.title * breakdown.title
        + weights.content * breakdown.content
        + weights.entity * breakdown.entity
        + SEMANTIC_WEIGHT * breakdown.semantic
        + TEMPORAL_WEIGHT * breakdown.temporal
        + SOURCE_ALIGN_WEIGHT * breakdown.source_alignment;
    breakdown
}

/// Elect the primary detection method from the highest-precedence signal
/// that dominates the decision.
pub fn primary_method(breakdown: &SimilarityBreakdown) -> DetectionMethod {
    if breakdown.content_hash >= 1.0 {
        DetectionMethod::ContentHash
    } else if breakdown.title >= TITLE_THRESHOLD {
        DetectionMethod::TitleSimilarity
    } else if breakdown.semantic >= SEMANTIC_THRESHOLD {
        DetectionMethod::SemanticSimilarity
    } else if breakdown.entity >= ENTITY_THRESHOLD {
        DetectionMethod::EntitySimilarity
    } else {
        DetectionMethod::ContentSimilarity
    }
}

/// The overall-score threshold a candidate must reach under its primary
/// method. `content_threshold` is the configured knob (default 0.85).
pub fn threshold_for(method: DetectionMethod, content_threshold: f64) -> f64 {
    match method {
        DetectionMethod::ContentHash => 1.0,
        DetectionMethod::TitleSimilarity => TITLE_THRESHOLD,
        DetectionMethod::SemanticSimilarity => SEMANTIC_THRESHOLD,
        DetectionMethod::EntitySimilarity => ENTITY_THRESHOLD,
        DetectionMethod::ContentSimilarity => content_threshold,
    }
}

/// Verdict for one candidate pair.
#[derive(Debug, Clone, Copy)]
pub struct PairDecision {
    pub method: DetectionMethod,
    pub threshold: f64,
    /// Threshold comparison alone, before any LLM gating.
    pub algorithmic_match: bool,
    /// Overall score falls in the band where an LLM check is worthwhile.
    pub borderline: bool,
}

/// Borderline band: `[0.7, threshold + 0.05]`. Inside it, an available LLM
/// validator decides; outside it, the threshold comparison stands.
const BORDERLINE_FLOOR: f64 = 0.7;
const BORDERLINE_MARGIN: f64 = 0.05;

pub fn decide(breakdown: &SimilarityBreakdown, content_threshold: f64) -> PairDecision {
    let method = primary_method(breakdown);
    let threshold = threshold_for(method, content_threshold);
    let algorithmic_match = breakdown.overall >= threshold;
    let borderline = method != DetectionMethod::ContentHash
        && breakdown.overall >= BORDERLINE_FLOOR
        && breakdown.overall <= threshold + BORDERLINE_MARGIN;
    PairDecision {
        method,
        threshold,
        algorithmic_match,
        borderline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakdown() -> SimilarityBreakdown {
        SimilarityBreakdown::default()
    }

    #[test]
    fn content_hash_short_circuits_overall_to_one() {
        let b = combine(
            SimilarityBreakdown {
                content_hash: 1.0,
                ..breakdown()
            },
            SignalWeights::default(),
        );
        assert_eq!(b.overall, 1.0);
        assert_eq!(primary_method(&b), DetectionMethod::ContentHash);
    }

    #[test]
    fn overall_is_weighted_sum() {
        let b = combine(
            SimilarityBreakdown {
                title: 0.5,
                content: 0.5,
                entity: 0.5,
                semantic: 1.0,
                temporal: 1.0,
                source_alignment: 1.0,
                ..breakdown()
            },
            SignalWeights::default(),
        );
        // 0.4*0.5 + 0.4*0.5 + 0.2*0.5 + 0.3 + 0.1 + 0.1 = 1.0
        assert!((b.overall - 1.0).abs() < 1e-9);
    }

    #[test]
    fn all_zero_signals_give_zero_overall() {
        let b = combine(breakdown(), SignalWeights::default());
        assert_eq!(b.overall, 0.0);
    }

    #[test]
    fn method_precedence_title_over_semantic() {
        let b = SimilarityBreakdown {
            title: 0.95,
            semantic: 0.9,
            entity: 0.85,
            ..breakdown()
        };
        assert_eq!(primary_method(&b), DetectionMethod::TitleSimilarity);
    }

    #[test]
    fn method_precedence_semantic_over_entity() {
        let b = SimilarityBreakdown {
            title: 0.6,
            semantic: 0.9,
            entity: 0.95,
            ..breakdown()
        };
        assert_eq!(primary_method(&b), DetectionMethod::SemanticSimilarity);
    }

    #[test]
    fn method_falls_through_to_content() {
        let b = SimilarityBreakdown {
            title: 0.5,
            semantic: 0.5,
            entity: 0.5,
            content: 0.9,
            ..breakdown()
        };
        assert_eq!(primary_method(&b), DetectionMethod::ContentSimilarity);
    }

    #[test]
    fn thresholds_follow_method() {
        assert_eq!(threshold_for(DetectionMethod::ContentHash, 0.85), 1.0);
        assert_eq!(threshold_for(DetectionMethod::TitleSimilarity, 0.85), 0.9);
        assert_eq!(threshold_for(DetectionMethod::SemanticSimilarity, 0.85), 0.85);
        assert_eq!(threshold_for(DetectionMethod::EntitySimilarity, 0.85), 0.8);
        assert_eq!(threshold_for(DetectionMethod::ContentSimilarity, 0.7), 0.7);
    }

    #[test]
    fn paraphrase_scenario_matches_via_semantic() {
        // Paraphrased repost: title ~0.6, entity 1.0, semantic 0.9, temporal ~0.97
        let b = combine(
            SimilarityBreakdown {
                title: 0.6,
                content: 0.6,
                entity: 1.0,
                semantic: 0.9,
                temporal: 0.97,
                source_alignment: 0.3,
                ..breakdown()
            },
            SignalWeights::default(),
        );
        assert!(b.overall >= 0.85, "overall was {}", b.overall);
        let decision = decide(&b, 0.85);
        assert_eq!(decision.method, DetectionMethod::SemanticSimilarity);
        assert!(decision.algorithmic_match);
    }

    #[test]
    fn followup_story_does_not_match() {
        // Follow-up coverage: moderate entity overlap, low title, content below threshold
        let b = combine(
            SimilarityBreakdown {
                title: 0.3,
                content: 0.4,
                entity: 0.5,
                semantic: 0.6,
                temporal: 0.67,
                source_alignment: 0.7,
                ..breakdown()
            },
            SignalWeights::default(),
        );
        let decision = decide(&b, 0.85);
        assert!(!decision.algorithmic_match, "overall was {}", b.overall);
    }

    #[test]
    fn borderline_band_is_inclusive() {
        let at_floor = SimilarityBreakdown {
            overall: 0.7,
            ..breakdown()
        };
        assert!(decide(&at_floor, 0.85).borderline);

        let at_ceiling = SimilarityBreakdown {
            overall: 0.9,
            ..breakdown()
        };
        assert!(decide(&at_ceiling, 0.85).borderline);

        let above = SimilarityBreakdown {
            overall: 0.91,
            ..breakdown()
        };
        assert!(!decide(&above, 0.85).borderline);

        let below = SimilarityBreakdown {
            overall: 0.69,
            ..breakdown()
        };
        assert!(!decide(&below, 0.85).borderline);
    }

    #[test]
    fn hash_matches_are_never_borderline() {
        let b = SimilarityBreakdown {
            content_hash: 1.0,
            overall: 1.0,
            ..breakdown()
        };
        let decision = decide(&b, 0.85);
        assert!(!decision.borderline);
        assert!(decision.algorithmic_match);
    }
}
