//! Scene query contract and an in-process snapshot index
//!
//! The spatial index is owned and mutated by the compositor/scene-graph
//! collaborator; this pipeline only ever performs read-only queries through
//! the [`SceneQuery`] capability. The contract requires every query to see
//! a consistent snapshot even while the owner mutates the scene.
//!
//! [`SceneIndex`] is the in-process implementation: writers publish a whole
//! new immutable snapshot behind an `Arc`, readers clone the `Arc` and can
//! never observe a half-updated scene.

use crate::types::{ObjectId, Ray};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Axis-aligned bounds in normalized screen coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Half-diagonal, used as a conservative radius for cone overlap tests
    pub fn half_extent(&self) -> f32 {
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        (hw * hw + hh * hh).sqrt()
    }
}

/// One candidate object as exposed by the spatial index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: ObjectId,
    pub bounds: Bounds,
    /// Depth behind the screen plane (0.0 = on the plane)
    pub depth: f32,
    /// Externally supplied visual/contextual prominence (0.0-1.0)
    pub salience: f32,
    /// Fractional visibility after occlusion by nearer geometry
    pub visibility: f32,
}

/// Failure modes of a scene query; both degrade the cycle to Ambient
#[derive(Debug, Error)]
pub enum SceneQueryError {
    #[error("spatial index unavailable: {0}")]
    Unavailable(String),

    #[error("spatial index query timed out after {0:?}")]
    Timeout(Duration),
}

/// Read-only, snapshot-consistent access to the externally owned scene
///
/// Implementations must be side-effect-free and bounded in time; the
/// pipeline treats any error as zero candidates for that cycle.
pub trait SceneQuery: Send + Sync {
    /// Candidate objects whose bounds overlap the attention cone
    fn query(&self, ray: &Ray) -> Result<Vec<SceneObject>, SceneQueryError>;

    /// Salience weight for an object; 1.0 when unknown
    fn salience(&self, id: ObjectId) -> f32 {
        let _ = id;
        1.0
    }
}

/// An immutable, versioned view of the scene
#[derive(Debug, Clone)]
pub struct SceneSnapshot {
    pub version: u64,
    objects: Vec<SceneObject>,
    by_id: HashMap<ObjectId, usize>,
}

impl SceneSnapshot {
    fn empty() -> Self {
        Self {
            version: 0,
            objects: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.by_id.get(&id).map(|&i| &self.objects[i])
    }
}

/// In-process spatial index with atomic snapshot publication
pub struct SceneIndex {
    snapshot: RwLock<Arc<SceneSnapshot>>,
}

impl SceneIndex {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(SceneSnapshot::empty())),
        }
    }

    /// Replace the scene contents; in-flight queries keep their old snapshot
    pub fn publish(&self, objects: Vec<SceneObject>) {
        let mut guard = self.snapshot.write();
        let by_id = objects
            .iter()
            .enumerate()
            .map(|(i, o)| (o.id, i))
            .collect();
        let next = SceneSnapshot {
            version: guard.version + 1,
            objects,
            by_id,
        };
        log::debug!(
            "scene snapshot v{} published with {} objects",
            next.version,
            next.objects.len()
        );
        *guard = Arc::new(next);
    }

    /// The current snapshot
    pub fn snapshot(&self) -> Arc<SceneSnapshot> {
        self.snapshot.read().clone()
    }
}

impl Default for SceneIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneQuery for SceneIndex {
    fn query(&self, ray: &Ray) -> Result<Vec<SceneObject>, SceneQueryError> {
        let snapshot = self.snapshot();
        let candidates = snapshot
            .objects()
            .iter()
            .filter(|o| overlaps_cone(ray, o))
            .cloned()
            .collect();
        Ok(candidates)
    }

    fn salience(&self, id: ObjectId) -> f32 {
        self.snapshot().get(id).map(|o| o.salience).unwrap_or(1.0)
    }
}

/// Conservative overlap test between a cone footprint and object bounds
pub fn overlaps_cone(ray: &Ray, object: &SceneObject) -> bool {
    let (cx, cy) = object.bounds.center();
    let dx = cx - ray.origin_x;
    let dy = cy - ray.origin_y;
    let center_offset = (dx * dx + dy * dy).sqrt();
    center_offset - object.bounds.half_extent() <= ray.footprint(object.depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(id: u64, x: f32, y: f32) -> SceneObject {
        SceneObject {
            id: ObjectId(id),
            bounds: Bounds {
                x,
                y,
                width: 0.1,
                height: 0.1,
            },
            depth: 0.0,
            salience: 0.8,
            visibility: 1.0,
        }
    }

    fn ray_at(x: f32, y: f32, spread: f32) -> Ray {
        Ray {
            origin_x: x,
            origin_y: y,
            angle: 0.0,
            spread,
        }
    }

    #[test]
    fn empty_index_yields_no_candidates() {
        let index = SceneIndex::new();
        let hits = index.query(&ray_at(0.5, 0.5, 0.1)).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn query_filters_by_cone_footprint() {
        let index = SceneIndex::new();
        index.publish(vec![object(1, 0.45, 0.45), object(2, 0.05, 0.05)]);

        let near = index.query(&ray_at(0.5, 0.5, 0.05)).unwrap();
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].id, ObjectId(1));
    }

    #[test]
    fn publish_bumps_version_and_swaps_atomically() {
        let index = SceneIndex::new();
        let before = index.snapshot();

        index.publish(vec![object(1, 0.4, 0.4)]);
        let after = index.snapshot();

        assert_eq!(before.version, 0);
        assert_eq!(after.version, 1);
        // The old snapshot is still intact for readers that hold it.
        assert!(before.objects().is_empty());
        assert_eq!(after.objects().len(), 1);
    }

    #[test]
    fn salience_lookup_defaults_to_one_for_unknown_objects() {
        let index = SceneIndex::new();
        index.publish(vec![object(1, 0.4, 0.4)]);
        assert_eq!(index.salience(ObjectId(1)), 0.8);
        assert_eq!(index.salience(ObjectId(99)), 1.0);
    }
}
