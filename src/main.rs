//! RayOS Attention CLI
//!
//! Runs the attention pipeline against a live UDP gaze sensor or a
//! synthetic gaze trace, and validates configuration files. Published
//! hypotheses are logged; wiring them into the kernel's System 2 is the
//! scheduler collaborator's job.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rayos_attention::{
    ingest, AttentionConfig, AttentionPipeline, Bounds, ConfigHandle, GazeSample, ObjectId,
    SceneIndex, SceneObject,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "attention")]
#[command(about = "RayOS Attention - Gaze to System 2 intent hypotheses", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline against a live UDP gaze sensor
    Run {
        /// UDP bind address for sensor datagrams
        #[arg(long, default_value = "127.0.0.1:9901")]
        bind: SocketAddr,
    },

    /// Feed the pipeline a synthetic gaze trace over a demo scene
    Simulate {
        /// How long to run, in milliseconds
        #[arg(long, default_value = "5000")]
        duration_ms: u64,
    },

    /// Validate a configuration file and exit
    CheckConfig { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { bind } => run(cli.config, bind).await,
        Commands::Simulate { duration_ms } => simulate(cli.config, duration_ms).await,
        Commands::CheckConfig { file } => {
            let config = AttentionConfig::load(&file)?;
            println!("configuration ok (min_dwell_ms = {})", config.min_dwell_ms);
            Ok(())
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ConfigHandle> {
    let config = match path {
        Some(path) => {
            log::info!("loading configuration from {}", path.display());
            AttentionConfig::load(path)?
        }
        None => AttentionConfig::default(),
    };
    Ok(ConfigHandle::new(config)?)
}

/// A plausible desktop: a focused window, a sidebar, and a dock
fn demo_scene() -> Arc<SceneIndex> {
    let index = SceneIndex::new();
    index.publish(vec![
        SceneObject {
            id: ObjectId(1),
            bounds: Bounds { x: 0.30, y: 0.25, width: 0.40, height: 0.45 },
            depth: 0.0,
            salience: 0.9,
            visibility: 1.0,
        },
        SceneObject {
            id: ObjectId(2),
            bounds: Bounds { x: 0.02, y: 0.10, width: 0.20, height: 0.75 },
            depth: 0.2,
            salience: 0.5,
            visibility: 1.0,
        },
        SceneObject {
            id: ObjectId(3),
            bounds: Bounds { x: 0.25, y: 0.90, width: 0.50, height: 0.08 },
            depth: 0.1,
            salience: 0.6,
            visibility: 1.0,
        },
    ]);
    Arc::new(index)
}

/// Log published hypotheses from the scheduler side of the intent queue
fn spawn_intent_logger(intents: crossbeam_channel::Receiver<rayos_attention::FocusHypothesis>) {
    tokio::spawn(async move {
        loop {
            match intents.try_recv() {
                Ok(h) => log::info!(
                    "intent: {} p={:.2} gen={}",
                    h.object_id,
                    h.probability,
                    h.generation
                ),
                Err(crossbeam_channel::TryRecvError::Empty) => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Err(crossbeam_channel::TryRecvError::Disconnected) => break,
            }
        }
    });
}

async fn run(config_path: Option<PathBuf>, bind: SocketAddr) -> Result<()> {
    let config = load_config(config_path.as_ref())?;
    let scene = demo_scene();

    let (mut pipeline, intents) = AttentionPipeline::new(config.clone(), scene);
    pipeline.start().await?;
    spawn_intent_logger(intents);

    let bind = ingest::udp_addr_from_env().unwrap_or(bind);
    ingest::spawn_udp_ingest_task(bind, pipeline.sample_sender()).await?;

    // SIGHUP reloads configuration without restarting the pipeline.
    #[cfg(unix)]
    if let Some(path) = config_path.clone() {
        let config = config.clone();
        tokio::spawn(async move {
            let mut hangup = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
                Ok(signal) => signal,
                Err(e) => {
                    log::warn!("SIGHUP handler unavailable, hot reload disabled: {e}");
                    return;
                }
            };
            while hangup.recv().await.is_some() {
                if config.reload_from_path(&path).is_ok() {
                    log::info!("configuration reloaded from {}", path.display());
                }
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    pipeline.shutdown();

    let stats = pipeline.stats();
    log::info!("final stats: {}", serde_json::to_string(&stats)?);
    Ok(())
}

async fn simulate(config_path: Option<PathBuf>, duration_ms: u64) -> Result<()> {
    let config = load_config(config_path.as_ref())?;
    let scene = demo_scene();

    let (mut pipeline, intents) = AttentionPipeline::new(config, scene);
    pipeline.start().await?;
    spawn_intent_logger(intents);

    let sender = pipeline.sample_sender();
    let tick = Duration::from_millis(8); // ~120Hz sensor
    let mut t_ms: u64 = 0;

    log::info!("simulating {duration_ms}ms of synthetic gaze");
    while t_ms < duration_ms {
        let sample = if t_ms < duration_ms / 3 {
            // Wandering phase: a slow sweep across the screen.
            let t = t_ms as f32 / 1000.0;
            GazeSample {
                timestamp_ns: t_ms * 1_000_000,
                x_norm: 0.5 + 0.3 * (t * 1.7).sin(),
                y_norm: 0.5 + 0.25 * (t * 1.1).cos(),
                confidence: 0.7,
            }
        } else {
            // Dwell phase: settle on the focused window with small jitter.
            let jitter = ((t_ms % 7) as f32 - 3.0) * 0.002;
            GazeSample {
                timestamp_ns: t_ms * 1_000_000,
                x_norm: 0.5 + jitter,
                y_norm: 0.47 - jitter,
                confidence: 0.92,
            }
        };
        sender.push(sample);

        tokio::time::sleep(tick).await;
        t_ms += tick.as_millis() as u64;
    }

    // Let the stages drain before reading the outcome.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stats = pipeline.stats();
    log::info!("final resolution: {}", pipeline.current_resolution().state());
    log::info!("stats: {}", serde_json::to_string(&stats)?);
    println!(
        "fixations: {}, resolved: {}, deferred: {}, ambient: {}, published: {}",
        stats.fixations_started,
        stats.resolved_cycles,
        stats.deferred_cycles,
        stats.ambient_cycles,
        stats.published
    );

    pipeline.shutdown();
    Ok(())
}
