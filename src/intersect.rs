//! Intersection engine - casts attention cones against the spatial index
//!
//! The only stage with a hard latency budget: the scene may be queried at
//! sample rate, so every cast is timed against a watchdog and per-query
//! allocation is bounded by a fixed candidate cap. A failed or timed-out
//! scene query degrades the cycle to zero hits (Ambient), never an error.

use crate::config::AttentionConfig;
use crate::scene::{SceneObject, SceneQuery};
use crate::types::{Hit, Ray};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

/// Hard bound on candidates examined per cast, regardless of scene size
const MAX_CANDIDATES_PER_QUERY: usize = 256;

/// Records scene queries that blew their latency budget
pub struct LatencyWatchdog {
    violations: RwLock<VecDeque<QueryViolation>>,
    violation_count: AtomicU64,
    max_history: usize,
}

#[derive(Debug, Clone)]
pub struct QueryViolation {
    pub at: Instant,
    pub duration: Duration,
    pub budget: Duration,
}

impl LatencyWatchdog {
    pub fn new() -> Self {
        Self {
            violations: RwLock::new(VecDeque::new()),
            violation_count: AtomicU64::new(0),
            max_history: 256,
        }
    }

    /// Record one query duration against the configured budget
    pub fn record(&self, duration: Duration, budget: Duration) {
        if duration <= budget {
            return;
        }

        log::warn!(
            "scene query took {:.2}ms (budget: {:.2}ms)",
            duration.as_secs_f64() * 1000.0,
            budget.as_secs_f64() * 1000.0
        );
        self.violation_count.fetch_add(1, AtomicOrdering::Relaxed);

        let mut violations = self.violations.write();
        violations.push_back(QueryViolation {
            at: Instant::now(),
            duration,
            budget,
        });
        if violations.len() > self.max_history {
            violations.pop_front();
        }
    }

    pub fn recent_violations(&self, count: usize) -> Vec<QueryViolation> {
        self.violations.read().iter().rev().take(count).cloned().collect()
    }

    pub fn violation_count(&self) -> u64 {
        self.violation_count.load(AtomicOrdering::Relaxed)
    }
}

impl Default for LatencyWatchdog {
    fn default() -> Self {
        Self::new()
    }
}

/// Casts cones against a [`SceneQuery`] and ranks the resulting hits
pub struct IntersectionEngine {
    watchdog: LatencyWatchdog,
    casts: AtomicU64,
    query_failures: AtomicU64,
}

impl IntersectionEngine {
    pub fn new() -> Self {
        Self {
            watchdog: LatencyWatchdog::new(),
            casts: AtomicU64::new(0),
            query_failures: AtomicU64::new(0),
        }
    }

    /// Cast a cone; returns hits ordered most relevant first, possibly empty
    pub fn cast(
        &self,
        ray: &Ray,
        scene: &dyn SceneQuery,
        config: &AttentionConfig,
    ) -> Vec<Hit> {
        self.casts.fetch_add(1, AtomicOrdering::Relaxed);
        let budget = Duration::from_millis(config.query_budget_ms);
        let started = Instant::now();

        let candidates = match scene.query(ray) {
            Ok(candidates) => candidates,
            Err(e) => {
                log::warn!("scene query failed, degrading cycle to ambient: {e}");
                self.query_failures.fetch_add(1, AtomicOrdering::Relaxed);
                self.watchdog.record(started.elapsed(), budget);
                return Vec::new();
            }
        };

        let mut hits: Vec<Hit> = candidates
            .iter()
            .take(MAX_CANDIDATES_PER_QUERY)
            .filter_map(|object| score_candidate(ray, object, config))
            .collect();

        hits.sort_by(|a, b| {
            b.intersection_score
                .partial_cmp(&a.intersection_score)
                .unwrap_or(Ordering::Equal)
        });
        hits.truncate(config.candidate_cap);

        self.watchdog.record(started.elapsed(), budget);
        hits
    }

    pub fn watchdog(&self) -> &LatencyWatchdog {
        &self.watchdog
    }

    pub fn cast_count(&self) -> u64 {
        self.casts.load(AtomicOrdering::Relaxed)
    }

    pub fn query_failure_count(&self) -> u64 {
        self.query_failures.load(AtomicOrdering::Relaxed)
    }
}

impl Default for IntersectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Score one candidate against the cone axis
///
/// The score decreases monotonically with angular offset from the axis,
/// attenuates with depth, and is discounted (never discarded) for
/// partially visible objects. Fully occluded objects keep a heavily
/// discounted residual so nearer geometry can still be disambiguated.
fn score_candidate(ray: &Ray, object: &SceneObject, config: &AttentionConfig) -> Option<Hit> {
    let (cx, cy) = object.bounds.center();
    let dx = cx - ray.origin_x;
    let dy = cy - ray.origin_y;
    let center_offset = (dx * dx + dy * dy).sqrt();

    // Objects covering the cone axis score from zero offset.
    let axial_offset = (center_offset - object.bounds.half_extent()).max(0.0);
    let depth = object.depth.max(0.0);
    if axial_offset > ray.footprint(depth) {
        return None;
    }

    let angular_offset = (axial_offset / (1.0 + depth)).atan();
    let axis_score = if ray.spread > f32::EPSILON {
        (1.0 - angular_offset / ray.spread).clamp(0.0, 1.0)
    } else if axial_offset <= f32::EPSILON {
        1.0
    } else {
        0.0
    };

    let attenuation = 1.0 / (1.0 + config.distance_falloff * depth);
    let visibility = object.visibility.clamp(0.0, 1.0);
    let visibility_factor = if visibility <= 0.01 {
        config.occlusion_discount
    } else {
        visibility
    };

    let score = (axis_score * attenuation * visibility_factor).clamp(0.0, 1.0);

    Some(Hit {
        object_id: object.id,
        intersection_score: score,
        distance: depth,
        visibility,
    })
}
