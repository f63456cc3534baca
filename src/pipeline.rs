//! The staged attention pipeline
//!
//! Wires the stages into a sequence of bounded producer/consumer hops:
//!
//! ```text
//! sensor ──▶ [sample queue] ──▶ detect stage ──▶ [fixation queue] ──▶ eval stage ──▶ [intent queue] ──▶ scheduler
//!              drop-oldest        FixationDetector   drop-oldest         cast / score / resolve          System 2
//! ```
//!
//! Every hand-off queue is bounded; when one fills, the oldest pending item
//! is dropped and counted, because a stale gaze sample is worse than no
//! sample. Stages run as their own tokio tasks and never block each other
//! indefinitely. Pausing (sensor disconnect, host not focused) discards
//! input without touching downstream state; reset additionally drops the
//! active fixation, the recency window, and everything in flight.

use crate::bridge::SchedulerBridge;
use crate::config::ConfigHandle;
use crate::fixation::FixationDetector;
use crate::intersect::IntersectionEngine;
use crate::ray;
use crate::resolver::{HypothesisResolver, Resolution, ResolverState};
use crate::scene::SceneQuery;
use crate::scorer::AttentionScorer;
use crate::types::{AttentionError, Fixation, FocusHypothesis, GazeSample};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const IDLE_POLL: Duration = Duration::from_millis(2);
const PAUSE_POLL: Duration = Duration::from_millis(10);

#[derive(Default)]
struct Counters {
    samples_in: AtomicU64,
    samples_dropped: AtomicU64,
    fixations_started: AtomicU64,
    fixation_updates: AtomicU64,
    fixations_dropped: AtomicU64,
    stale_generations: AtomicU64,
    ambient_cycles: AtomicU64,
    deferred_cycles: AtomicU64,
    resolved_cycles: AtomicU64,
}

/// Point-in-time view of pipeline activity
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub samples_in: u64,
    pub samples_dropped: u64,
    pub fixations_started: u64,
    pub fixation_updates: u64,
    pub fixations_dropped: u64,
    pub stale_generations: u64,
    pub casts: u64,
    pub query_failures: u64,
    pub query_budget_violations: u64,
    pub ambient_cycles: u64,
    pub deferred_cycles: u64,
    pub resolved_cycles: u64,
    pub published: u64,
    pub publish_failures: u64,
}

/// Cloneable producer handle feeding the pipeline's sample queue
#[derive(Clone)]
pub struct SampleSender {
    tx: Sender<GazeSample>,
    rx: Receiver<GazeSample>,
    counters: Arc<Counters>,
}

impl SampleSender {
    /// Enqueue a sample; when the queue is full the oldest pending sample
    /// is dropped first
    pub fn push(&self, sample: GazeSample) {
        self.counters.samples_in.fetch_add(1, Ordering::Relaxed);
        send_drop_oldest(&self.tx, &self.rx, sample, &self.counters.samples_dropped);
    }
}

/// State owned by the evaluation stage task
struct EvalStage {
    engine: IntersectionEngine,
    scorer: AttentionScorer,
    resolver: HypothesisResolver,
    latest_generation: u64,
}

/// The Gaze→Ray→Scheduler attention pipeline
pub struct AttentionPipeline {
    config: ConfigHandle,
    scene: Arc<dyn SceneQuery>,
    detector: Arc<Mutex<FixationDetector>>,
    eval: Arc<Mutex<EvalStage>>,
    bridge: SchedulerBridge,
    sample_tx: Sender<GazeSample>,
    sample_rx: Receiver<GazeSample>,
    fixation_tx: Sender<Fixation>,
    fixation_rx: Receiver<Fixation>,
    counters: Arc<Counters>,
    paused: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    last_resolution: Arc<RwLock<Resolution>>,
    started: bool,
}

impl AttentionPipeline {
    /// Build a pipeline over the given scene; returns the pipeline and the
    /// scheduler-side end of the intent queue
    pub fn new(
        config: ConfigHandle,
        scene: Arc<dyn SceneQuery>,
    ) -> (Self, Receiver<FocusHypothesis>) {
        let snapshot = config.current();
        let (sample_tx, sample_rx) = bounded(snapshot.sample_queue_len);
        let (fixation_tx, fixation_rx) = bounded(snapshot.fixation_queue_len);
        let (bridge, intent_rx) = SchedulerBridge::new(snapshot.intent_queue_len);

        let pipeline = Self {
            config,
            scene,
            detector: Arc::new(Mutex::new(FixationDetector::new())),
            eval: Arc::new(Mutex::new(EvalStage {
                engine: IntersectionEngine::new(),
                scorer: AttentionScorer::new(),
                resolver: HypothesisResolver::new(),
                latest_generation: 0,
            })),
            bridge,
            sample_tx,
            sample_rx,
            fixation_tx,
            fixation_rx,
            counters: Arc::new(Counters::default()),
            paused: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
            last_resolution: Arc::new(RwLock::new(Resolution::Ambient)),
            started: false,
        };

        (pipeline, intent_rx)
    }

    /// Producer handle for the sensor side
    pub fn sample_sender(&self) -> SampleSender {
        SampleSender {
            tx: self.sample_tx.clone(),
            rx: self.sample_rx.clone(),
            counters: self.counters.clone(),
        }
    }

    /// Spawn the stage tasks; call once from within a tokio runtime
    pub async fn start(&mut self) -> Result<(), AttentionError> {
        if self.started {
            return Err(AttentionError::AlreadyStarted);
        }
        self.started = true;
        log::info!("starting attention pipeline");

        {
            let config = self.config.clone();
            let detector = self.detector.clone();
            let sample_rx = self.sample_rx.clone();
            let fixation_tx = self.fixation_tx.clone();
            let fixation_rx = self.fixation_rx.clone();
            let counters = self.counters.clone();
            let paused = self.paused.clone();
            let shutdown = self.shutdown.clone();

            tokio::spawn(async move {
                detect_loop(
                    config,
                    detector,
                    sample_rx,
                    fixation_tx,
                    fixation_rx,
                    counters,
                    paused,
                    shutdown,
                )
                .await;
            });
        }

        {
            let config = self.config.clone();
            let scene = self.scene.clone();
            let eval = self.eval.clone();
            let bridge = self.bridge.clone();
            let fixation_rx = self.fixation_rx.clone();
            let counters = self.counters.clone();
            let paused = self.paused.clone();
            let shutdown = self.shutdown.clone();
            let last_resolution = self.last_resolution.clone();

            tokio::spawn(async move {
                eval_loop(
                    config,
                    scene,
                    eval,
                    bridge,
                    fixation_rx,
                    counters,
                    paused,
                    shutdown,
                    last_resolution,
                )
                .await;
            });
        }

        Ok(())
    }

    /// Stop emitting hypotheses; incoming samples are discarded until resume
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            log::info!("attention pipeline paused");
        }
    }

    /// Resume after a pause; dwell accumulation restarts from the next
    /// valid sample
    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            log::info!("attention pipeline resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Discard the active fixation, the recency window, and everything
    /// queued between stages
    pub fn reset(&self) {
        self.detector.lock().reset();
        {
            let mut eval = self.eval.lock();
            eval.scorer.reset();
        }
        while self.sample_rx.try_recv().is_ok() {}
        while self.fixation_rx.try_recv().is_ok() {}
        *self.last_resolution.write() = Resolution::Ambient;
        log::info!("attention pipeline reset");
    }

    /// Signal the stage tasks to exit
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        log::info!("attention pipeline shutting down");
    }

    /// Outcome of the most recent evaluation cycle
    pub fn current_resolution(&self) -> Resolution {
        self.last_resolution.read().clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        let eval = self.eval.lock();
        StatsSnapshot {
            samples_in: self.counters.samples_in.load(Ordering::Relaxed),
            samples_dropped: self.counters.samples_dropped.load(Ordering::Relaxed),
            fixations_started: self.counters.fixations_started.load(Ordering::Relaxed),
            fixation_updates: self.counters.fixation_updates.load(Ordering::Relaxed),
            fixations_dropped: self.counters.fixations_dropped.load(Ordering::Relaxed),
            stale_generations: self.counters.stale_generations.load(Ordering::Relaxed),
            casts: eval.engine.cast_count(),
            query_failures: eval.engine.query_failure_count(),
            query_budget_violations: eval.engine.watchdog().violation_count(),
            ambient_cycles: self.counters.ambient_cycles.load(Ordering::Relaxed),
            deferred_cycles: self.counters.deferred_cycles.load(Ordering::Relaxed),
            resolved_cycles: self.counters.resolved_cycles.load(Ordering::Relaxed),
            published: self.bridge.published_count(),
            publish_failures: self.bridge.failed_count(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn detect_loop(
    config: ConfigHandle,
    detector: Arc<Mutex<FixationDetector>>,
    sample_rx: Receiver<GazeSample>,
    fixation_tx: Sender<Fixation>,
    fixation_rx: Receiver<Fixation>,
    counters: Arc<Counters>,
    paused: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        if paused.load(Ordering::SeqCst) {
            // Discard input while paused; the stream-gap logic restarts
            // dwell on resume.
            while sample_rx.try_recv().is_ok() {}
            tokio::time::sleep(PAUSE_POLL).await;
            continue;
        }

        match sample_rx.try_recv() {
            Ok(sample) => {
                let config = config.current();
                let update = detector.lock().push_sample(sample, &config);
                if let Some(fixation) = update {
                    counters.fixation_updates.fetch_add(1, Ordering::Relaxed);
                    send_drop_oldest(
                        &fixation_tx,
                        &fixation_rx,
                        fixation,
                        &counters.fixations_dropped,
                    );
                }
            }
            Err(TryRecvError::Empty) => tokio::time::sleep(IDLE_POLL).await,
            Err(TryRecvError::Disconnected) => break,
        }
    }
    log::debug!("detect stage exited");
}

#[allow(clippy::too_many_arguments)]
async fn eval_loop(
    config: ConfigHandle,
    scene: Arc<dyn SceneQuery>,
    eval: Arc<Mutex<EvalStage>>,
    bridge: SchedulerBridge,
    fixation_rx: Receiver<Fixation>,
    counters: Arc<Counters>,
    paused: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    last_resolution: Arc<RwLock<Resolution>>,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        if paused.load(Ordering::SeqCst) {
            while fixation_rx.try_recv().is_ok() {}
            tokio::time::sleep(PAUSE_POLL).await;
            continue;
        }

        match fixation_rx.try_recv() {
            Ok(fixation) => {
                let config = config.current();
                let mut stage = eval.lock();

                if fixation.generation < stage.latest_generation {
                    // Superseded by a newer fixation already in flight.
                    counters.stale_generations.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                if fixation.generation > stage.latest_generation {
                    stage.latest_generation = fixation.generation;
                    counters.fixations_started.fetch_add(1, Ordering::Relaxed);
                }

                let ray = ray::emit(&fixation, &config);
                let hits = stage.engine.cast(&ray, scene.as_ref(), &config);
                let hypotheses =
                    stage
                        .scorer
                        .score(&hits, &fixation, &|id| scene.salience(id), &config);
                let resolution = stage.resolver.resolve(&hypotheses, &config);

                match resolution.state() {
                    ResolverState::Ambient => {
                        counters.ambient_cycles.fetch_add(1, Ordering::Relaxed);
                    }
                    ResolverState::Deferred => {
                        counters.deferred_cycles.fetch_add(1, Ordering::Relaxed);
                    }
                    ResolverState::Resolved => {
                        counters.resolved_cycles.fetch_add(1, Ordering::Relaxed);
                        if let Resolution::Resolved { hypothesis } = &resolution {
                            bridge.publish(*hypothesis);
                        }
                    }
                }
                *last_resolution.write() = resolution;
            }
            Err(TryRecvError::Empty) => tokio::time::sleep(IDLE_POLL).await,
            Err(TryRecvError::Disconnected) => break,
        }
    }
    log::debug!("eval stage exited");
}

/// Bounded enqueue with a drop-oldest policy; the dropped count is
/// incremented once per evicted item
fn send_drop_oldest<T>(tx: &Sender<T>, rx: &Receiver<T>, item: T, dropped: &AtomicU64) {
    let mut item = item;
    loop {
        match tx.try_send(item) {
            Ok(()) => return,
            Err(TrySendError::Full(returned)) => {
                if rx.try_recv().is_ok() {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
                item = returned;
            }
            Err(TrySendError::Disconnected(_)) => return,
        }
    }
}
