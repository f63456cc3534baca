//! Hypothesis resolution - decides emit, defer, or ambient per generation
//!
//! A small state machine with three outcomes. Ambiguity is handled by
//! waiting for a later generation, never by forcing a winner; only a clear
//! leader above the publish threshold reaches the scheduler bridge. Each
//! generation is evaluated independently; nothing accumulates across
//! fixations here.

use crate::config::AttentionConfig;
use crate::types::FocusHypothesis;
use serde::Serialize;
use std::fmt;

/// Resolver outcome states, exposed for observability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolverState {
    /// No object currently merits an attention hypothesis
    Ambient,
    /// Hypotheses exist but confidence or agreement is insufficient
    Deferred,
    /// A clear leader met the publish threshold
    Resolved,
}

impl fmt::Display for ResolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverState::Ambient => write!(f, "ambient"),
            ResolverState::Deferred => write!(f, "deferred"),
            ResolverState::Resolved => write!(f, "resolved"),
        }
    }
}

/// Outcome of resolving one generation of hypotheses
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Ambient,
    Deferred { hypotheses: Vec<FocusHypothesis> },
    Resolved { hypothesis: FocusHypothesis },
}

impl Resolution {
    pub fn state(&self) -> ResolverState {
        match self {
            Resolution::Ambient => ResolverState::Ambient,
            Resolution::Deferred { .. } => ResolverState::Deferred,
            Resolution::Resolved { .. } => ResolverState::Resolved,
        }
    }
}

/// Stateless per-generation resolver
pub struct HypothesisResolver;

impl HypothesisResolver {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one generation of hypotheses
    ///
    /// - no hypotheses at all: Ambient, regardless of prior state
    /// - leader below `defer_threshold`: Deferred
    /// - two or more above `defer_threshold` within `conflict_margin` of
    ///   each other: Deferred (ambiguous; wait for a later generation)
    /// - a clear leader outside the margin: Resolved
    pub fn resolve(
        &self,
        hypotheses: &[FocusHypothesis],
        config: &AttentionConfig,
    ) -> Resolution {
        let Some(leader) = hypotheses.iter().max_by(|a, b| {
            a.probability
                .partial_cmp(&b.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        }) else {
            return Resolution::Ambient;
        };

        if leader.probability < config.defer_threshold {
            return Resolution::Deferred {
                hypotheses: hypotheses.to_vec(),
            };
        }

        let contender = hypotheses
            .iter()
            .filter(|h| h.object_id != leader.object_id)
            .max_by(|a, b| {
                a.probability
                    .partial_cmp(&b.probability)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

        if let Some(second) = contender {
            let ambiguous = second.probability >= config.defer_threshold
                && leader.probability - second.probability <= config.conflict_margin;
            if ambiguous {
                log::debug!(
                    "ambiguous generation {}: {} at {:.2} vs {} at {:.2}, deferring",
                    leader.generation,
                    leader.object_id,
                    leader.probability,
                    second.object_id,
                    second.probability
                );
                return Resolution::Deferred {
                    hypotheses: hypotheses.to_vec(),
                };
            }
        }

        Resolution::Resolved {
            hypothesis: *leader,
        }
    }
}

impl Default for HypothesisResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectId;

    fn hypothesis(id: u64, probability: f32) -> FocusHypothesis {
        FocusHypothesis {
            object_id: ObjectId(id),
            probability,
            generation: 1,
        }
    }

    fn config() -> AttentionConfig {
        AttentionConfig {
            defer_threshold: 0.55,
            conflict_margin: 0.05,
            ..Default::default()
        }
    }

    #[test]
    fn no_hypotheses_is_ambient() {
        let resolver = HypothesisResolver::new();
        assert_eq!(resolver.resolve(&[], &config()), Resolution::Ambient);
    }

    #[test]
    fn weak_leader_is_deferred() {
        let resolver = HypothesisResolver::new();
        let resolution = resolver.resolve(&[hypothesis(1, 0.4)], &config());
        assert_eq!(resolution.state(), ResolverState::Deferred);
    }

    #[test]
    fn near_tie_above_threshold_is_deferred() {
        let resolver = HypothesisResolver::new();
        // The canonical ambiguity case: 0.81 vs 0.80 with margin 0.05.
        let resolution = resolver.resolve(
            &[hypothesis(1, 0.81), hypothesis(2, 0.80)],
            &config(),
        );
        assert_eq!(resolution.state(), ResolverState::Deferred);
    }

    #[test]
    fn clear_leader_is_resolved() {
        let resolver = HypothesisResolver::new();
        let resolution = resolver.resolve(
            &[hypothesis(1, 0.85), hypothesis(2, 0.60)],
            &config(),
        );
        match resolution {
            Resolution::Resolved { hypothesis } => {
                assert_eq!(hypothesis.object_id, ObjectId(1));
            }
            other => panic!("expected Resolved, got {:?}", other.state()),
        }
    }

    #[test]
    fn single_strong_hypothesis_is_resolved() {
        let resolver = HypothesisResolver::new();
        let resolution = resolver.resolve(&[hypothesis(1, 0.9)], &config());
        assert_eq!(resolution.state(), ResolverState::Resolved);
    }

    #[test]
    fn close_contender_below_threshold_does_not_defer() {
        let resolver = HypothesisResolver::new();
        // Contender is within the margin but itself unpublishable.
        let resolution = resolver.resolve(
            &[hypothesis(1, 0.56), hypothesis(2, 0.54)],
            &config(),
        );
        assert_eq!(resolution.state(), ResolverState::Resolved);
    }
}
