//! Scheduler bridge - publishes resolved hypotheses to System 2
//!
//! Producer-only client of the scheduler's intent queue. The publish is
//! best-effort and non-blocking; a full or disconnected queue is counted
//! and forgotten, because a superseding generation will follow naturally.
//! The bridge never invokes actions itself.

use crate::types::FocusHypothesis;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hands resolved hypotheses to the scheduler's intent queue
#[derive(Clone)]
pub struct SchedulerBridge {
    tx: Sender<FocusHypothesis>,
    published: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl SchedulerBridge {
    /// Create a bridge and the receiving end for the scheduler collaborator
    pub fn new(capacity: usize) -> (Self, Receiver<FocusHypothesis>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                published: Arc::new(AtomicU64::new(0)),
                failed: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Non-blocking publish; returns whether the scheduler accepted it
    pub fn publish(&self, hypothesis: FocusHypothesis) -> bool {
        match self.tx.try_send(hypothesis) {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "published {} p={:.2} gen={}",
                    hypothesis.object_id,
                    hypothesis.probability,
                    hypothesis.generation
                );
                true
            }
            Err(TrySendError::Full(h)) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "intent queue full, dropping hypothesis for {} gen={}",
                    h.object_id,
                    h.generation
                );
                false
            }
            Err(TrySendError::Disconnected(h)) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "intent queue disconnected, dropping hypothesis for {}",
                    h.object_id
                );
                false
            }
        }
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectId;

    fn hypothesis(id: u64) -> FocusHypothesis {
        FocusHypothesis {
            object_id: ObjectId(id),
            probability: 0.8,
            generation: 1,
        }
    }

    #[test]
    fn publish_delivers_to_the_scheduler_end() {
        let (bridge, rx) = SchedulerBridge::new(4);
        assert!(bridge.publish(hypothesis(1)));
        assert_eq!(rx.recv().unwrap().object_id, ObjectId(1));
        assert_eq!(bridge.published_count(), 1);
        assert_eq!(bridge.failed_count(), 0);
    }

    #[test]
    fn full_queue_fails_silently_and_is_counted() {
        let (bridge, _rx) = SchedulerBridge::new(1);
        assert!(bridge.publish(hypothesis(1)));
        assert!(!bridge.publish(hypothesis(2)));
        assert_eq!(bridge.published_count(), 1);
        assert_eq!(bridge.failed_count(), 1);
    }

    #[test]
    fn disconnected_queue_fails_silently() {
        let (bridge, rx) = SchedulerBridge::new(1);
        drop(rx);
        assert!(!bridge.publish(hypothesis(1)));
        assert_eq!(bridge.failed_count(), 1);
    }
}
