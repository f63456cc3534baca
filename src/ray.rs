//! Ray emission - turns a fixation into a directional attention cone
//!
//! A deterministic pure function of the fixation: no internal state, so a
//! cone can be re-derived from a recorded fixation during replay.

use crate::config::AttentionConfig;
use crate::types::{Fixation, Ray};

/// Default forward direction when no depth context is available
pub const DEFAULT_FORWARD_ANGLE: f32 = 0.0;

/// Derive the attention cone for a fixation
///
/// The spread (cone half-angle) is monotonically non-increasing in the
/// fixation confidence: lower confidence widens the cone to model
/// uncertainty rather than pretending to a precise pointer.
pub fn emit(fixation: &Fixation, config: &AttentionConfig) -> Ray {
    let uncertainty = 1.0 - fixation.confidence.clamp(0.0, 1.0);
    let spread = config.spread_min + (config.spread_max - config.spread_min) * uncertainty;

    Ray {
        origin_x: fixation.center_x,
        origin_y: fixation.center_y,
        angle: DEFAULT_FORWARD_ANGLE,
        spread,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixation(confidence: f32) -> Fixation {
        Fixation {
            center_x: 0.4,
            center_y: 0.6,
            radius: 0.06,
            dwell_ms: 600,
            confidence,
            generation: 1,
            updated_ns: 0,
        }
    }

    #[test]
    fn origin_is_the_fixation_center() {
        let ray = emit(&fixation(0.9), &AttentionConfig::default());
        assert_eq!(ray.origin_x, 0.4);
        assert_eq!(ray.origin_y, 0.6);
        assert_eq!(ray.angle, DEFAULT_FORWARD_ANGLE);
    }

    #[test]
    fn spread_is_monotone_non_increasing_in_confidence() {
        let config = AttentionConfig::default();
        let mut last_spread = f32::INFINITY;
        for step in 0..=10 {
            let confidence = step as f32 / 10.0;
            let ray = emit(&fixation(confidence), &config);
            assert!(
                ray.spread <= last_spread,
                "spread widened as confidence rose: {} -> {}",
                last_spread,
                ray.spread
            );
            last_spread = ray.spread;
        }
    }

    #[test]
    fn spread_stays_within_configured_bounds() {
        let config = AttentionConfig::default();
        assert_eq!(emit(&fixation(1.0), &config).spread, config.spread_min);
        assert_eq!(emit(&fixation(0.0), &config).spread, config.spread_max);
    }
}
