//! # RayOS Attention - Phase 6: The Gaze
//!
//! The attention pipeline converts raw eye-tracking samples into
//! probability-weighted focus hypotheses for the kernel's System 2 intent
//! queue. Gaze is never a mouse: the pipeline favors probabilistic,
//! multi-hypothesis output over forced single-target selection, and defers
//! whenever the evidence is ambiguous.
//!
//! ## Architecture
//!
//! ```text
//! GazeIngestor → FixationDetector → RayEmitter → IntersectionEngine → AttentionScorer → HypothesisResolver → SchedulerBridge
//!   normalize      EMA + dwell       attention      cast against the     weighted sum      ambient/defer/      System 2
//!   raw samples    + saccades        cone           spatial index        of evidence       resolve             intent queue
//! ```
//!
//! Stages hand off over bounded queues (oldest dropped first); the spatial
//! index is owned by the compositor and only ever queried through a
//! snapshot-consistent read-only capability.
//!
//! ## Example
//!
//! ```no_run
//! use rayos_attention::{
//!     AttentionConfig, AttentionPipeline, Bounds, ConfigHandle, ObjectId, SceneIndex,
//!     SceneObject,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let scene = Arc::new(SceneIndex::new());
//!     scene.publish(vec![SceneObject {
//!         id: ObjectId(1),
//!         bounds: Bounds { x: 0.4, y: 0.4, width: 0.2, height: 0.2 },
//!         depth: 0.0,
//!         salience: 0.9,
//!         visibility: 1.0,
//!     }]);
//!
//!     let config = ConfigHandle::new(AttentionConfig::default())?;
//!     let (mut pipeline, intents) = AttentionPipeline::new(config, scene);
//!     pipeline.start().await?;
//!
//!     // Feed samples through pipeline.sample_sender(), consume `intents`.
//!     # let _ = intents;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod fixation;
pub mod ingest;
pub mod intersect;
pub mod pipeline;
pub mod ray;
pub mod resolver;
pub mod scene;
pub mod scorer;
pub mod types;

pub use bridge::SchedulerBridge;
pub use config::{AttentionConfig, ConfigHandle, ScoreWeights};
pub use fixation::FixationDetector;
pub use intersect::{IntersectionEngine, LatencyWatchdog};
pub use pipeline::{AttentionPipeline, SampleSender, StatsSnapshot};
pub use resolver::{HypothesisResolver, Resolution, ResolverState};
pub use scene::{Bounds, SceneIndex, SceneObject, SceneQuery, SceneQueryError, SceneSnapshot};
pub use scorer::AttentionScorer;
pub use types::{
    AttentionError, Fixation, FocusHypothesis, GazeSample, Hit, ObjectId, Ray,
};
