//! Simulation dispatcher: fans generated events out to concurrent delivery workers.

use crate::config::{ConfigError, DeliveryOptions, Mode};
use crate::delivery::DeliveryClient;
use crate::factory::EventFactory;
use crate::generator::{generate_historical, generate_live};
use crate::master::{DataFormat, ReferenceData};
use crate::metrics::stats::{Stats, StatsSnapshot};
use crate::model::PlayEvent;
use crate::output::OutputWriter;
use crate::rate::RateController;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tokio::sync::Mutex;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(thiserror::Error, Debug)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Dispatcher parameters as they arrive from the command line.
#[derive(Clone, Debug)]
pub struct SimulationRequest {
    pub mode: Mode,
    pub threads: usize,
    /// Total events (historical) or events per minute per worker (live).
    pub volume: u64,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Per-worker cap on historical posts per second; absent or <= 0 is unthrottled.
    pub posting_rate: Option<f64>,
    /// Live run length; 0 runs until cancelled.
    pub duration_seconds: u64,
    pub delivery: DeliveryOptions,
    pub snapshot_interval_secs: u64,
    pub output_file: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SimulationPlan {
    Historical {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        volume: usize,
        posting_rate: Option<f64>,
    },
    Live {
        rate_per_minute: f64,
        duration_seconds: u64,
    },
}

impl SimulationRequest {
    /// Check required parameters and resolve the mode-specific plan.
    pub fn plan(&self) -> Result<SimulationPlan, ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "threads",
                reason: "at least one worker is required".into(),
            });
        }
        match self.mode {
            Mode::Historical => {
                let start = self.start.ok_or(ConfigError::MissingParameter("--start-datetime"))?;
                let end = self.end.ok_or(ConfigError::MissingParameter("--end-datetime"))?;
                if end < start {
                    return Err(ConfigError::InvalidParameter {
                        name: "end-datetime",
                        reason: format!("{} is before start {}", end, start),
                    });
                }
                let volume = usize::try_from(self.volume).map_err(|_| ConfigError::InvalidParameter {
                    name: "volume",
                    reason: "too large for this platform".into(),
                })?;
                Ok(SimulationPlan::Historical {
                    start,
                    end,
                    volume,
                    posting_rate: self.posting_rate.filter(|r| *r > 0.0),
                })
            }
            Mode::Live => Ok(SimulationPlan::Live {
                rate_per_minute: self.volume as f64,
                duration_seconds: self.duration_seconds,
            }),
        }
    }
}

#[derive(Clone, Copy)]
enum Outcome {
    Delivered(u64),
    Failed,
}

/// Owns the shared, read-only pieces every worker uses.
#[derive(Clone)]
pub struct Simulator {
    factory: EventFactory,
    client: DeliveryClient,
}

impl Simulator {
    pub fn new(factory: EventFactory, client: DeliveryClient) -> Self {
        Self { factory, client }
    }

    /// Run to completion and return the final counts. Individual delivery
    /// failures are counted, never returned; the only error is a bad request,
    /// raised before any worker starts.
    pub async fn run(
        &self,
        request: &SimulationRequest,
        cancel: CancellationToken,
    ) -> Result<StatsSnapshot, SimulationError> {
        let plan = request.plan()?;
        let stats = Arc::new(Stats::new());

        // Single collector so workers never contend on the stats locks
        let (tx, rx) = flume::bounded::<Outcome>(10_000);
        let collector = {
            let stats = stats.clone();
            tokio::spawn(async move {
                while let Ok(outcome) = rx.recv_async().await {
                    match outcome {
                        Outcome::Delivered(ns) => stats.record_delivered(ns).await,
                        Outcome::Failed => stats.record_failed().await,
                    }
                }
            })
        };

        let output = match OutputWriter::open(request.output_file.as_deref()).await {
            Ok(o) => Some(Arc::new(Mutex::new(o))),
            Err(e) => {
                warn!(error = %e, "snapshot output unavailable, continuing without it");
                None
            }
        };
        let snapshot_handle = match (&output, request.snapshot_interval_secs) {
            (Some(out), secs) if secs > 0 => {
                let stats = stats.clone();
                let out = out.clone();
                Some(tokio::spawn(async move {
                    let mut t = interval(Duration::from_secs(secs));
                    t.tick().await;
                    loop {
                        t.tick().await;
                        let snap = stats.snapshot().await;
                        if let Err(e) = out.lock().await.write_snapshot(&snap).await {
                            warn!(error = %e, "failed to write snapshot");
                        }
                    }
                }))
            }
            _ => None,
        };

        match plan {
            SimulationPlan::Historical {
                start,
                end,
                volume,
                posting_rate,
            } => {
                info!(volume, %start, %end, threads = request.threads, "starting historical simulation");
                let events = generate_historical(&self.factory, start, end, volume);
                self.dispatch_historical(events, request.threads, request.delivery, posting_rate, tx)
                    .await;
                info!("historical simulation complete");
            }
            SimulationPlan::Live {
                rate_per_minute,
                duration_seconds,
            } => {
                info!(
                    rate_per_minute,
                    duration_seconds,
                    threads = request.threads,
                    "starting live simulation"
                );
                self.dispatch_live(
                    request.threads,
                    rate_per_minute,
                    duration_seconds,
                    request.delivery,
                    cancel,
                    tx,
                )
                .await;
                info!("live simulation complete");
            }
        }

        // All senders are gone once the workers finish
        let _ = collector.await;
        if let Some(h) = snapshot_handle {
            h.abort();
        }
        let final_stats = stats.snapshot().await;
        if let Some(out) = output {
            if let Err(e) = out.lock().await.write_snapshot(&final_stats).await {
                warn!(error = %e, "failed to write final snapshot");
            }
        }
        Ok(final_stats)
    }

    /// Contiguous, near-equal chunks, one worker each; returns once every worker is done.
    async fn dispatch_historical(
        &self,
        events: Vec<PlayEvent>,
        threads: usize,
        delivery: DeliveryOptions,
        posting_rate: Option<f64>,
        tx: flume::Sender<Outcome>,
    ) {
        let mut handles = Vec::new();
        for (worker, chunk) in partition(events, threads).into_iter().enumerate() {
            let client = self.client.clone();
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                info!(worker, events = chunk.len(), "historical worker started");
                let mut rate = posting_rate.map(RateController::per_second);
                for event in &chunk {
                    if let Some(rc) = &mut rate {
                        rc.wait_for_next().await;
                    }
                    deliver(&client, event, delivery, &tx).await;
                }
            }));
        }
        drop(tx);
        for res in join_all(handles).await {
            if let Err(e) = res {
                warn!(error = %e, "historical worker aborted");
            }
        }
    }

    /// Symmetric workers, each pacing its own live generator.
    async fn dispatch_live(
        &self,
        threads: usize,
        rate_per_minute: f64,
        duration_seconds: u64,
        delivery: DeliveryOptions,
        cancel: CancellationToken,
        tx: flume::Sender<Outcome>,
    ) {
        let mut handles = Vec::new();
        for worker in 0..threads {
            let mut live =
                generate_live(self.factory.clone(), rate_per_minute, duration_seconds, cancel.clone());
            let client = self.client.clone();
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let mut sent = 0u64;
                while let Some(event) = live.next().await {
                    deliver(&client, &event, delivery, &tx).await;
                    sent += 1;
                }
                info!(worker, sent, "live worker finished");
            }));
        }
        drop(tx);
        for res in join_all(handles).await {
            if let Err(e) = res {
                warn!(error = %e, "live worker aborted");
            }
        }
    }
}

async fn deliver(
    client: &DeliveryClient,
    event: &PlayEvent,
    delivery: DeliveryOptions,
    tx: &flume::Sender<Outcome>,
) {
    let t0 = Instant::now();
    let ok = client
        .post_event(event, delivery.timeout, delivery.max_retries)
        .await;
    let outcome = if ok {
        Outcome::Delivered(t0.elapsed().as_nanos() as u64)
    } else {
        Outcome::Failed
    };
    let _ = tx.send_async(outcome).await;
}

/// Split into at most `parts` contiguous chunks of `ceil(len / parts)`; the
/// last chunk may be shorter and empty chunks are not produced.
pub fn partition<T>(items: Vec<T>, parts: usize) -> Vec<Vec<T>> {
    if items.is_empty() || parts == 0 {
        return Vec::new();
    }
    let chunk_size = items.len().div_ceil(parts);
    let mut chunks = Vec::with_capacity(parts);
    let mut iter = items.into_iter();
    loop {
        let chunk: Vec<T> = iter.by_ref().take(chunk_size).collect();
        if chunk.is_empty() {
            break;
        }
        chunks.push(chunk);
    }
    chunks
}

/// Everything `play-sim run` needs, resolved from the command line.
pub struct SimulatorConfig {
    pub master_data_dir: PathBuf,
    pub format: DataFormat,
    pub api_endpoint: String,
    pub request: SimulationRequest,
}

pub async fn run_simulation(config: SimulatorConfig) -> Result<StatsSnapshot> {
    // Surface parameter errors before touching the filesystem or network
    config.request.plan()?;

    println!("Starting simulation:");
    println!("  Endpoint: {}", config.api_endpoint);
    println!("  Master data: {} ({})", config.master_data_dir.display(), config.format);
    println!("  Workers: {}", config.request.threads);
    println!(
        "  Attempts per event: {} (timeout {:?})",
        config.request.delivery.max_retries.max(1),
        config.request.delivery.timeout
    );

    let data = ReferenceData::load(&config.master_data_dir, config.format)
        .with_context(|| format!("loading master data from {}", config.master_data_dir.display()))?;
    let factory = EventFactory::new(Arc::new(data))?;
    let client = DeliveryClient::http(config.api_endpoint.clone(), config.request.threads)?;
    let simulator = Simulator::new(factory, client);

    let cancel = CancellationToken::new();
    let watcher = (config.request.mode == Mode::Live).then(|| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("Ctrl+C received, stopping live workers");
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        })
    });

    let report = simulator.run(&config.request, cancel.clone()).await?;
    cancel.cancel();
    if let Some(h) = watcher {
        let _ = h.await;
    }

    println!("\nFinal Simulation Statistics:");
    println!("  Events attempted: {}", report.attempted_count);
    println!("  Events delivered: {}", report.delivered_count);
    println!("  Events failed: {}", report.failed_count);
    println!("  Average rate: {:.2} events/s", report.total_throughput());
    println!(
        "  Post latency p50/p99: {:.2} / {:.2} ms",
        report.latency_ns_p50 as f64 / 1e6,
        report.latency_ns_p99 as f64 / 1e6
    );
    println!("  Total duration: {:.2}s", report.total_duration.as_secs_f64());
    Ok(report)
}
