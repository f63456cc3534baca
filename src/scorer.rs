//! Attention scoring - turns ranked hits into probability-weighted hypotheses
//!
//! Combines intersection geometry with dwell time, externally supplied
//! salience, recency-of-attention decay, and context alignment through a
//! configurable weighted sum. Probabilities are independent beliefs per
//! object, clamped to [0, 1]; they are not a distribution and do not sum
//! to 1. The recency trace is the only state this stage carries across
//! generations.

use crate::config::AttentionConfig;
use crate::types::{Fixation, FocusHypothesis, Hit, ObjectId};
use std::collections::HashMap;

/// Context alignment applied to objects with no explicit bias
const NEUTRAL_CONTEXT: f32 = 0.5;

/// Recency traces below this strength are dropped
const TRACE_FLOOR: f32 = 0.01;

#[derive(Debug, Clone, Copy)]
struct RecencyTrace {
    last_seen_ns: u64,
    strength: f32,
}

/// Scores hits into focus hypotheses, one evaluation per fixation update
pub struct AttentionScorer {
    recency: HashMap<ObjectId, RecencyTrace>,
    context_bias: HashMap<ObjectId, f32>,
}

impl AttentionScorer {
    pub fn new() -> Self {
        Self {
            recency: HashMap::new(),
            context_bias: HashMap::new(),
        }
    }

    /// Host-supplied per-object context alignment (e.g. active workspace
    /// mode); objects absent from the map score neutral
    pub fn set_context_bias(&mut self, bias: HashMap<ObjectId, f32>) {
        self.context_bias = bias;
    }

    /// Evaluate one generation of hits into at most `max_hypotheses`
    /// hypotheses, ordered by probability descending
    pub fn score(
        &mut self,
        hits: &[Hit],
        fixation: &Fixation,
        salience_of: &dyn Fn(ObjectId) -> f32,
        config: &AttentionConfig,
    ) -> Vec<FocusHypothesis> {
        if hits.is_empty() {
            return Vec::new();
        }

        let weights = &config.weights;
        let total_weight = weights.total();
        let now_ns = fixation.updated_ns;

        // Dwell saturates at twice the emission threshold so very long
        // fixations stop inflating every candidate equally.
        let dwell_factor =
            (fixation.dwell_ms as f32 / (2 * config.min_dwell_ms) as f32).min(1.0);

        let mut hypotheses: Vec<FocusHypothesis> = hits
            .iter()
            .map(|hit| {
                let recency = self.recency_factor(hit.object_id, now_ns, config);
                let salience = salience_of(hit.object_id).clamp(0.0, 1.0);
                let context = self
                    .context_bias
                    .get(&hit.object_id)
                    .copied()
                    .unwrap_or(NEUTRAL_CONTEXT)
                    .clamp(0.0, 1.0);

                let weighted = weights.intersection * hit.intersection_score
                    + weights.dwell * dwell_factor
                    + weights.salience * salience
                    + weights.recency * recency
                    + weights.context * context;

                FocusHypothesis {
                    object_id: hit.object_id,
                    probability: (weighted / total_weight).clamp(0.0, 1.0),
                    generation: fixation.generation,
                }
            })
            .collect();

        hypotheses.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hypotheses.truncate(config.max_hypotheses);

        for hypothesis in &hypotheses {
            self.note_attended(hypothesis, now_ns);
        }
        self.prune(now_ns, config);

        hypotheses
    }

    /// Decayed recency of attention for an object, 0.0 when never seen
    fn recency_factor(&self, id: ObjectId, now_ns: u64, config: &AttentionConfig) -> f32 {
        match self.recency.get(&id) {
            Some(trace) => {
                let dt_s = now_ns.saturating_sub(trace.last_seen_ns) as f32 / 1e9;
                trace.strength * (-config.recency_decay_rate * dt_s).exp()
            }
            None => 0.0,
        }
    }

    fn note_attended(&mut self, hypothesis: &FocusHypothesis, now_ns: u64) {
        let trace = self
            .recency
            .entry(hypothesis.object_id)
            .or_insert(RecencyTrace {
                last_seen_ns: now_ns,
                strength: 0.0,
            });
        trace.strength = trace.strength.max(hypothesis.probability);
        trace.last_seen_ns = now_ns;
    }

    fn prune(&mut self, now_ns: u64, config: &AttentionConfig) {
        self.recency.retain(|_, trace| {
            let dt_s = now_ns.saturating_sub(trace.last_seen_ns) as f32 / 1e9;
            trace.strength * (-config.recency_decay_rate * dt_s).exp() >= TRACE_FLOOR
        });
    }

    /// Drop the recency window, e.g. on pipeline reset
    pub fn reset(&mut self) {
        self.recency.clear();
    }
}

impl Default for AttentionScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixation(dwell_ms: u64, generation: u64, updated_ns: u64) -> Fixation {
        Fixation {
            center_x: 0.5,
            center_y: 0.5,
            radius: 0.06,
            dwell_ms,
            confidence: 0.9,
            generation,
            updated_ns,
        }
    }

    fn hit(id: u64, score: f32) -> Hit {
        Hit {
            object_id: ObjectId(id),
            intersection_score: score,
            distance: 0.0,
            visibility: 1.0,
        }
    }

    #[test]
    fn probabilities_stay_in_unit_range() {
        let mut scorer = AttentionScorer::new();
        let config = AttentionConfig::default();
        let hits = vec![hit(1, 1.0), hit(2, 0.0)];

        let hypotheses = scorer.score(
            &hits,
            &fixation(5000, 1, 0),
            &|_| 1.0,
            &config,
        );
        for h in &hypotheses {
            assert!((0.0..=1.0).contains(&h.probability), "p = {}", h.probability);
        }
    }

    #[test]
    fn hypothesis_count_is_capped() {
        let mut scorer = AttentionScorer::new();
        let config = AttentionConfig {
            max_hypotheses: 3,
            ..Default::default()
        };
        let hits: Vec<Hit> = (0..10).map(|i| hit(i, 0.9)).collect();

        let hypotheses = scorer.score(&hits, &fixation(600, 1, 0), &|_| 0.8, &config);
        assert_eq!(hypotheses.len(), 3);
    }

    #[test]
    fn empty_hits_give_empty_hypotheses() {
        let mut scorer = AttentionScorer::new();
        let hypotheses = scorer.score(
            &[],
            &fixation(600, 1, 0),
            &|_| 1.0,
            &AttentionConfig::default(),
        );
        assert!(hypotheses.is_empty());
    }

    #[test]
    fn hypotheses_carry_the_fixation_generation() {
        let mut scorer = AttentionScorer::new();
        let hypotheses = scorer.score(
            &[hit(1, 0.9)],
            &fixation(600, 7, 0),
            &|_| 1.0,
            &AttentionConfig::default(),
        );
        assert_eq!(hypotheses[0].generation, 7);
    }

    #[test]
    fn recently_attended_objects_are_favored() {
        let mut scorer = AttentionScorer::new();
        let config = AttentionConfig::default();

        // First generation attends object 1.
        scorer.score(&[hit(1, 0.9)], &fixation(600, 1, 0), &|_| 0.8, &config);

        // 100ms later both objects intersect identically; the one with a
        // recency trace must lead.
        let later = 100_000_000;
        let hypotheses = scorer.score(
            &[hit(1, 0.7), hit(2, 0.7)],
            &fixation(700, 2, later),
            &|_| 0.8,
            &config,
        );
        assert_eq!(hypotheses[0].object_id, ObjectId(1));
        assert!(hypotheses[0].probability > hypotheses[1].probability);
    }

    #[test]
    fn new_high_score_hits_can_overcome_recency() {
        let mut scorer = AttentionScorer::new();
        let config = AttentionConfig::default();

        scorer.score(&[hit(1, 0.5)], &fixation(600, 1, 0), &|_| 0.5, &config);

        // A fresh, clearly stronger hit wins despite having no trace.
        let hypotheses = scorer.score(
            &[hit(1, 0.2), hit(2, 1.0)],
            &fixation(700, 2, 50_000_000),
            &|_| 0.5,
            &config,
        );
        assert_eq!(hypotheses[0].object_id, ObjectId(2));
    }

    #[test]
    fn stale_traces_are_pruned() {
        let mut scorer = AttentionScorer::new();
        let config = AttentionConfig {
            recency_decay_rate: 2.0,
            ..Default::default()
        };

        scorer.score(&[hit(1, 0.9)], &fixation(600, 1, 0), &|_| 1.0, &config);
        assert_eq!(scorer.recency.len(), 1);

        // Ten seconds later the trace has decayed to nothing.
        scorer.score(
            &[hit(2, 0.9)],
            &fixation(600, 2, 10_000_000_000),
            &|_| 1.0,
            &config,
        );
        assert!(!scorer.recency.contains_key(&ObjectId(1)));
    }
}
