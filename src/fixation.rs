//! Fixation detection - temporal smoothing and dwell-threshold logic
//!
//! Consumes the ordered sample stream and maintains an EMA position
//! estimate. Samples inside the cluster radius accumulate dwell; a
//! fixation is emitted once dwell crosses the configured minimum and is
//! updated on every subsequent in-cluster sample. Brief excursions inside
//! the micro-saccade window are absorbed; longer ones are saccades and
//! restart dwell accounting at the current sample. Samples below the
//! confidence floor are noise, not motion, and never touch the estimate.

use crate::config::AttentionConfig;
use crate::types::{Fixation, GazeSample};

/// Detects fixations in a gaze sample stream
///
/// Holds the process-wide active-fixation state: at most one fixation is
/// active at a time, and a new one replaces it atomically. The generation
/// counter increases once per fixation and survives resets.
pub struct FixationDetector {
    ema_x: f32,
    ema_y: f32,
    ema_confidence: f32,
    has_estimate: bool,
    dwell_ns: u64,
    last_sample_ns: u64,
    excursion_since_ns: Option<u64>,
    generation: u64,
    active: Option<Fixation>,
}

impl FixationDetector {
    pub fn new() -> Self {
        Self {
            ema_x: 0.0,
            ema_y: 0.0,
            ema_confidence: 0.0,
            has_estimate: false,
            dwell_ns: 0,
            last_sample_ns: 0,
            excursion_since_ns: None,
            generation: 0,
            active: None,
        }
    }

    /// Feed one sample; returns a fixation update when dwell has crossed
    /// the threshold, zero or one per input sample
    pub fn push_sample(
        &mut self,
        sample: GazeSample,
        config: &AttentionConfig,
    ) -> Option<Fixation> {
        if sample.confidence < config.confidence_floor {
            // Noise, not motion: no dwell or EMA impact.
            return None;
        }

        if !self.has_estimate {
            self.begin_cluster(&sample);
            return None;
        }

        let delta_ns = sample.timestamp_ns.saturating_sub(self.last_sample_ns);
        if delta_ns > config.stream_gap_ms * 1_000_000 {
            log::debug!(
                "gaze stream gap of {}ms, restarting dwell accumulation",
                delta_ns / 1_000_000
            );
            self.begin_cluster(&sample);
            return None;
        }

        let dx = sample.x_norm - self.ema_x;
        let dy = sample.y_norm - self.ema_y;
        let offset = (dx * dx + dy * dy).sqrt();
        let window_ns = config.micro_saccade_window_ms * 1_000_000;

        if offset <= config.fixation_radius {
            if let Some(start) = self.excursion_since_ns {
                if sample.timestamp_ns.saturating_sub(start) > window_ns {
                    // Gaze came back, but it was away longer than a
                    // micro-saccade: dwell restarts here.
                    self.begin_cluster(&sample);
                    return None;
                }
                self.excursion_since_ns = None;
            }

            let alpha = config.ema_alpha;
            self.ema_x = alpha * sample.x_norm + (1.0 - alpha) * self.ema_x;
            self.ema_y = alpha * sample.y_norm + (1.0 - alpha) * self.ema_y;
            self.ema_confidence = alpha * sample.confidence + (1.0 - alpha) * self.ema_confidence;
            self.dwell_ns += delta_ns;
            self.last_sample_ns = sample.timestamp_ns;

            let dwell_ms = self.dwell_ns / 1_000_000;
            if dwell_ms >= config.min_dwell_ms {
                if self.active.is_none() {
                    self.generation += 1;
                }
                let fixation = Fixation {
                    center_x: self.ema_x,
                    center_y: self.ema_y,
                    radius: config.fixation_radius,
                    dwell_ms,
                    confidence: self.ema_confidence.clamp(0.0, 1.0),
                    generation: self.generation,
                    updated_ns: sample.timestamp_ns,
                };
                self.active = Some(fixation);
                return Some(fixation);
            }
            return None;
        }

        // Outside the cluster radius.
        match self.excursion_since_ns {
            None => {
                self.excursion_since_ns = Some(sample.timestamp_ns);
                self.last_sample_ns = sample.timestamp_ns;
                None
            }
            Some(start) => {
                if sample.timestamp_ns.saturating_sub(start) > window_ns {
                    // A real saccade: the active fixation is destroyed and a
                    // candidate cluster starts at the current sample.
                    self.begin_cluster(&sample);
                } else {
                    self.last_sample_ns = sample.timestamp_ns;
                }
                None
            }
        }
    }

    /// The currently active fixation, if any
    pub fn active_fixation(&self) -> Option<Fixation> {
        self.active
    }

    /// Generation counter of the most recent fixation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Discard all cluster state; the generation counter is preserved
    pub fn reset(&mut self) {
        self.has_estimate = false;
        self.dwell_ns = 0;
        self.excursion_since_ns = None;
        self.active = None;
    }

    fn begin_cluster(&mut self, sample: &GazeSample) {
        self.ema_x = sample.x_norm;
        self.ema_y = sample.y_norm;
        self.ema_confidence = sample.confidence;
        self.has_estimate = true;
        self.dwell_ns = 0;
        self.last_sample_ns = sample.timestamp_ns;
        self.excursion_since_ns = None;
        self.active = None;
    }
}

impl Default for FixationDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: u64 = 1_000_000;

    fn sample(t_ms: u64, x: f32, y: f32, confidence: f32) -> GazeSample {
        GazeSample {
            timestamp_ns: t_ms * MS,
            x_norm: x,
            y_norm: y,
            confidence,
        }
    }

    fn config() -> AttentionConfig {
        AttentionConfig {
            min_dwell_ms: 500,
            micro_saccade_window_ms: 80,
            fixation_radius: 0.06,
            confidence_floor: 0.25,
            stream_gap_ms: 200,
            ..Default::default()
        }
    }

    #[test]
    fn fixation_emitted_only_after_min_dwell() {
        let config = config();
        let mut detector = FixationDetector::new();

        // 60Hz-ish cadence; dwell crosses 500ms between t=480 and t=512.
        let mut emitted_at = None;
        for i in 0..40u64 {
            let t = i * 32;
            let update = detector.push_sample(sample(t, 0.5, 0.5, 0.9), &config);
            if update.is_some() && emitted_at.is_none() {
                emitted_at = Some(t);
            }
            if t < 500 {
                assert!(update.is_none(), "fixation emitted early at {t}ms");
            }
        }

        assert_eq!(emitted_at, Some(512));
        let active = detector.active_fixation().expect("active fixation");
        assert_eq!(active.generation, 1);
        assert!((active.center_x - 0.5).abs() < 1e-4);
    }

    #[test]
    fn low_confidence_samples_do_not_accumulate_dwell() {
        let config = config();
        let mut detector = FixationDetector::new();

        for i in 0..40u64 {
            let update = detector.push_sample(sample(i * 32, 0.5, 0.5, 0.1), &config);
            assert!(update.is_none());
        }
        assert!(detector.active_fixation().is_none());
    }

    #[test]
    fn micro_saccade_within_window_is_absorbed() {
        let config = config();
        let mut detector = FixationDetector::new();

        // 300ms of steady gaze.
        for i in 0..10u64 {
            detector.push_sample(sample(i * 32, 0.5, 0.5, 0.9), &config);
        }
        // Brief excursion: out at 320ms, back at 370ms (50ms < 80ms window).
        assert!(detector.push_sample(sample(320, 0.8, 0.8, 0.9), &config).is_none());
        assert!(detector.push_sample(sample(370, 0.5, 0.5, 0.9), &config).is_none());

        // Dwell was never reset, so it crosses 500ms shortly after.
        let mut emitted = false;
        for i in 0..8u64 {
            if detector
                .push_sample(sample(400 + i * 32, 0.5, 0.5, 0.9), &config)
                .is_some()
            {
                emitted = true;
                break;
            }
        }
        assert!(emitted, "micro-saccade must not reset dwell");
    }

    #[test]
    fn excursion_longer_than_window_resets_dwell() {
        let config = config();
        let mut detector = FixationDetector::new();

        for i in 0..10u64 {
            detector.push_sample(sample(i * 32, 0.5, 0.5, 0.9), &config);
        }
        // Out at 320ms, still out at 440ms: 120ms > 80ms window.
        detector.push_sample(sample(320, 0.8, 0.8, 0.9), &config);
        detector.push_sample(sample(440, 0.8, 0.8, 0.9), &config);

        // The cluster restarted at (0.8, 0.8); 300ms there is not enough.
        for i in 0..10u64 {
            let update = detector.push_sample(sample(470 + i * 32, 0.8, 0.8, 0.9), &config);
            assert!(update.is_none(), "dwell must restart after a saccade");
        }
    }

    #[test]
    fn long_excursion_with_late_return_also_resets() {
        let config = config();
        let mut detector = FixationDetector::new();

        for i in 0..10u64 {
            detector.push_sample(sample(i * 32, 0.5, 0.5, 0.9), &config);
        }
        // Leaves at 320ms, returns to the old center only at 450ms.
        detector.push_sample(sample(320, 0.8, 0.8, 0.9), &config);
        assert!(detector.push_sample(sample(450, 0.5, 0.5, 0.9), &config).is_none());

        // Accumulation restarted at 450ms; 300ms more is still short of 500.
        for i in 1..10u64 {
            let update = detector.push_sample(sample(450 + i * 32, 0.5, 0.5, 0.9), &config);
            assert!(update.is_none());
        }
    }

    #[test]
    fn stream_gap_restarts_dwell() {
        let config = config();
        let mut detector = FixationDetector::new();

        // 300ms of dwell, then a 2s sensor dropout.
        for i in 0..10u64 {
            detector.push_sample(sample(i * 32, 0.5, 0.5, 0.9), &config);
        }
        // Post-gap samples must not inherit pre-gap dwell.
        for i in 0..10u64 {
            let update = detector.push_sample(sample(2300 + i * 32, 0.5, 0.5, 0.9), &config);
            assert!(update.is_none(), "stale dwell survived a stream gap");
        }
        assert!(detector.active_fixation().is_none());
    }

    #[test]
    fn each_new_fixation_bumps_generation() {
        let config = config();
        let mut detector = FixationDetector::new();

        for i in 0..20u64 {
            detector.push_sample(sample(i * 32, 0.3, 0.3, 0.9), &config);
        }
        assert_eq!(detector.generation(), 1);

        // Saccade to a new target, dwell there past the threshold.
        detector.push_sample(sample(700, 0.7, 0.7, 0.9), &config);
        detector.push_sample(sample(820, 0.7, 0.7, 0.9), &config);
        for i in 0..20u64 {
            detector.push_sample(sample(850 + i * 32, 0.7, 0.7, 0.9), &config);
        }
        assert_eq!(detector.generation(), 2);
        let active = detector.active_fixation().expect("second fixation");
        assert!((active.center_x - 0.7).abs() < 1e-3);
    }
}
