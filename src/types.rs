//! Core data types for the attention pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A unique identifier for scene objects, assigned by the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj:{}", self.0)
    }
}

/// A single normalized eye-tracking sample
///
/// Produced by the gaze-estimation collaborator, consumed and discarded
/// by the fixation detector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GazeSample {
    /// Monotonic timestamp in nanoseconds
    pub timestamp_ns: u64,
    /// X coordinate on screen (normalized 0.0-1.0)
    pub x_norm: f32,
    /// Y coordinate on screen (normalized 0.0-1.0)
    pub y_norm: f32,
    /// Confidence of the gaze estimate (0.0-1.0)
    pub confidence: f32,
}

/// A sustained low-motion gaze cluster that has crossed the dwell threshold
///
/// Exactly one fixation is active per sensor stream; a new fixation
/// replaces the active one atomically.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Fixation {
    /// Cluster center X (normalized)
    pub center_x: f32,
    /// Cluster center Y (normalized)
    pub center_y: f32,
    /// Cluster radius (normalized)
    pub radius: f32,
    /// Accumulated dwell time in milliseconds
    pub dwell_ms: u64,
    /// Smoothed confidence of the contributing samples (0.0-1.0)
    pub confidence: f32,
    /// Monotonically increasing counter, bumped once per fixation (not per update)
    pub generation: u64,
    /// Timestamp of the sample that produced this update (monotonic ns)
    pub updated_ns: u64,
}

/// A directional attention cone derived from a fixation
///
/// Derived value, re-derivable from the fixation alone; never persisted
/// beyond one pipeline cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ray {
    /// Cone origin X (the fixation center)
    pub origin_x: f32,
    /// Cone origin Y (the fixation center)
    pub origin_y: f32,
    /// Cone direction in radians (default forward when no depth context)
    pub angle: f32,
    /// Half-angle of the attention cone in radians; wider = less certain
    pub spread: f32,
}

impl Ray {
    /// Radius of the cone footprint on the scene plane at the given depth
    pub fn footprint(&self, depth: f32) -> f32 {
        self.spread.tan() * (1.0 + depth.max(0.0))
    }
}

/// One candidate object intersected by an attention cone
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Hit {
    pub object_id: ObjectId,
    /// Relevance of this object to the cone (0.0-1.0, degrades with
    /// angular offset from the cone axis)
    pub intersection_score: f32,
    /// Depth of the object relative to the screen plane
    pub distance: f32,
    /// Fractional visibility (1.0 = unoccluded, 0.0 = fully occluded)
    pub visibility: f32,
}

/// A probability-weighted belief that an object is the focus of attention
///
/// Coexisting hypotheses are independent beliefs, not a partition; their
/// probabilities are not required to sum to 1. Hypotheses from an older
/// generation are superseded, never merged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocusHypothesis {
    pub object_id: ObjectId,
    /// Belief strength (0.0-1.0)
    pub probability: f32,
    /// Generation of the fixation that produced this hypothesis
    pub generation: u64,
}

/// Errors surfaced by the attention pipeline
#[derive(Debug, Error)]
pub enum AttentionError {
    #[error("invalid configuration: {field}: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    #[error("failed to read configuration file {path}: {source}")]
    ConfigIo {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("pipeline already started")]
    AlreadyStarted,
}
