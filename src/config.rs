//! Configuration surface for the attention pipeline
//!
//! All options are defaulted and hot-reloadable: readers fetch an immutable
//! snapshot per cycle via [`ConfigHandle::current`], and a reload publishes a
//! new snapshot only after validation succeeds. An invalid file never
//! replaces a running configuration.

use crate::types::AttentionError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Weights for the attention scorer's combination function
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Weight of the geometric intersection score
    pub intersection: f32,
    /// Weight of accumulated dwell time
    pub dwell: f32,
    /// Weight of externally supplied object salience
    pub salience: f32,
    /// Weight of recency-of-attention
    pub recency: f32,
    /// Weight of context/mode alignment
    pub context: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            intersection: 0.4,
            dwell: 0.2,
            salience: 0.2,
            recency: 0.1,
            context: 0.1,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f32 {
        self.intersection + self.dwell + self.salience + self.recency + self.context
    }
}

/// Configuration for the attention pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttentionConfig {
    // Fixation detection
    /// Minimum accumulated dwell before a fixation is emitted
    pub min_dwell_ms: u64,
    /// EMA smoothing factor for the position estimate (0.0-1.0]
    pub ema_alpha: f32,
    /// Excursions shorter than this are absorbed, not treated as saccades
    pub micro_saccade_window_ms: u64,
    /// Cluster radius in normalized screen units
    pub fixation_radius: f32,
    /// Samples below this confidence are dropped as noise, not motion
    pub confidence_floor: f32,
    /// Timestamp gap treated as a sensor stream interruption
    pub stream_gap_ms: u64,

    // Ray emission
    /// Cone half-angle at full confidence (radians)
    pub spread_min: f32,
    /// Cone half-angle at zero confidence (radians)
    pub spread_max: f32,

    // Intersection
    /// Maximum hits retained per cone cast
    pub candidate_cap: usize,
    /// Latency budget for a single scene query (watchdog threshold)
    pub query_budget_ms: u64,
    /// Score attenuation per unit of object depth
    pub distance_falloff: f32,
    /// Score multiplier applied to fully occluded objects
    pub occlusion_discount: f32,

    // Scoring
    pub weights: ScoreWeights,
    /// Exponential decay rate of the recency trace, per second
    pub recency_decay_rate: f32,
    /// Upper bound on simultaneously held hypotheses
    pub max_hypotheses: usize,

    // Resolution
    /// Hypotheses below this probability are never published
    pub defer_threshold: f32,
    /// Two hypotheses closer than this are ambiguous; policy is wait
    pub conflict_margin: f32,

    // Stage queues (applied at pipeline startup, not hot-reloaded)
    pub sample_queue_len: usize,
    pub fixation_queue_len: usize,
    pub intent_queue_len: usize,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            min_dwell_ms: 500,
            ema_alpha: 0.3,
            micro_saccade_window_ms: 80,
            fixation_radius: 0.06,
            confidence_floor: 0.25,
            stream_gap_ms: 200,
            spread_min: 0.02,
            spread_max: 0.20,
            candidate_cap: 32,
            query_budget_ms: 5,
            distance_falloff: 0.5,
            occlusion_discount: 0.1,
            weights: ScoreWeights::default(),
            recency_decay_rate: 0.5,
            max_hypotheses: 4,
            defer_threshold: 0.55,
            conflict_margin: 0.05,
            sample_queue_len: 128,
            fixation_queue_len: 16,
            intent_queue_len: 32,
        }
    }
}

impl AttentionConfig {
    /// Parse a TOML document; missing fields fall back to defaults
    pub fn from_toml_str(raw: &str) -> Result<Self, AttentionError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, AttentionError> {
        let raw = std::fs::read_to_string(path).map_err(|source| AttentionError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Check all values against their valid ranges
    pub fn validate(&self) -> Result<(), AttentionError> {
        fn reject(field: &'static str, reason: impl Into<String>) -> AttentionError {
            AttentionError::InvalidConfig {
                field,
                reason: reason.into(),
            }
        }

        if self.min_dwell_ms == 0 {
            return Err(reject("min_dwell_ms", "must be at least 1ms"));
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(reject("ema_alpha", format!("{} not in (0.0, 1.0]", self.ema_alpha)));
        }
        if !(self.fixation_radius > 0.0 && self.fixation_radius <= 0.5) {
            return Err(reject(
                "fixation_radius",
                format!("{} not in (0.0, 0.5]", self.fixation_radius),
            ));
        }
        if !(0.0..1.0).contains(&self.confidence_floor) {
            return Err(reject(
                "confidence_floor",
                format!("{} not in [0.0, 1.0)", self.confidence_floor),
            ));
        }
        if self.stream_gap_ms == 0 {
            return Err(reject("stream_gap_ms", "must be at least 1ms"));
        }
        if self.spread_min <= 0.0 {
            return Err(reject("spread_min", "must be positive"));
        }
        if self.spread_max < self.spread_min {
            return Err(reject("spread_max", "must be >= spread_min"));
        }
        if self.spread_max >= std::f32::consts::FRAC_PI_2 {
            return Err(reject("spread_max", "must be below pi/2 radians"));
        }
        if self.candidate_cap == 0 {
            return Err(reject("candidate_cap", "must be at least 1"));
        }
        if self.query_budget_ms == 0 {
            return Err(reject("query_budget_ms", "must be at least 1ms"));
        }
        if self.distance_falloff < 0.0 {
            return Err(reject("distance_falloff", "must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.occlusion_discount) {
            return Err(reject(
                "occlusion_discount",
                format!("{} not in [0.0, 1.0]", self.occlusion_discount),
            ));
        }
        let w = &self.weights;
        if w.intersection < 0.0
            || w.dwell < 0.0
            || w.salience < 0.0
            || w.recency < 0.0
            || w.context < 0.0
        {
            return Err(reject("weights", "individual weights must be non-negative"));
        }
        if w.total() <= 0.0 {
            return Err(reject("weights", "must sum to a positive value"));
        }
        if self.recency_decay_rate < 0.0 {
            return Err(reject("recency_decay_rate", "must be non-negative"));
        }
        if self.max_hypotheses == 0 {
            return Err(reject("max_hypotheses", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.defer_threshold) {
            return Err(reject(
                "defer_threshold",
                format!("{} not in [0.0, 1.0]", self.defer_threshold),
            ));
        }
        if !(0.0..=1.0).contains(&self.conflict_margin) {
            return Err(reject(
                "conflict_margin",
                format!("{} not in [0.0, 1.0]", self.conflict_margin),
            ));
        }
        if self.sample_queue_len == 0 || self.fixation_queue_len == 0 || self.intent_queue_len == 0
        {
            return Err(reject("queue lengths", "must be at least 1"));
        }
        Ok(())
    }
}

/// Shared, hot-reloadable view of the configuration
///
/// Cloning the handle is cheap; every clone observes reloads.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<AttentionConfig>>>,
}

impl ConfigHandle {
    pub fn new(config: AttentionConfig) -> Result<Self, AttentionError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        })
    }

    /// Snapshot of the current configuration
    pub fn current(&self) -> Arc<AttentionConfig> {
        self.inner.read().clone()
    }

    /// Validate and publish a new configuration
    pub fn replace(&self, config: AttentionConfig) -> Result<(), AttentionError> {
        config.validate()?;
        *self.inner.write() = Arc::new(config);
        log::info!("attention configuration replaced");
        Ok(())
    }

    /// Reload from a TOML file; the previous configuration stays active on failure
    pub fn reload_from_path(&self, path: &Path) -> Result<(), AttentionError> {
        match AttentionConfig::load(path) {
            Ok(config) => self.replace(config),
            Err(e) => {
                log::warn!("config reload rejected, keeping previous configuration: {e}");
                Err(e)
            }
        }
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(AttentionConfig::default()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        assert!(AttentionConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_dwell() {
        let config = AttentionConfig {
            min_dwell_ms: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_dwell_ms"));
    }

    #[test]
    fn rejects_alpha_out_of_range() {
        let config = AttentionConfig {
            ema_alpha: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = AttentionConfig::from_toml_str("min_dwell_ms = 650\n").unwrap();
        assert_eq!(config.min_dwell_ms, 650);
        assert_eq!(config.max_hypotheses, AttentionConfig::default().max_hypotheses);
    }

    #[test]
    fn reload_keeps_previous_on_invalid_file() {
        let handle = ConfigHandle::new(AttentionConfig::default()).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "defer_threshold = 3.0").unwrap();

        assert!(handle.reload_from_path(file.path()).is_err());
        assert_eq!(
            handle.current().defer_threshold,
            AttentionConfig::default().defer_threshold
        );

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "defer_threshold = 0.7").unwrap();
        handle.reload_from_path(file.path()).unwrap();
        assert_eq!(handle.current().defer_threshold, 0.7);
    }
}
