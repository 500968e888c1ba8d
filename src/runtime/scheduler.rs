//! Runs the harvest and delivery loops side by side until shutdown.
//!
//! ```text
//!   Idle ──run()──> Running ──shutdown──> Draining ──loops done──> Stopped
//! ```
//!
//! Each loop is a task ticking on its own interval. Shutdown stops the ticks
//! but never interrupts a cycle body: a half written batch or a half finished
//! upload is worse than a slightly slower exit. Draining waits for both tasks
//! to finish, bounded by `drain_timeout`, after which still running loops are
//! aborted.

use super::{EngineContext, StatsSnapshot};
use crate::delivery::DeliveryWorker;
use crate::harvest::{CycleOutcome, Harvester};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub read_interval: Duration,
    pub upload_interval: Duration,
    pub drain_timeout: Duration,
}

/// How a loop ended during drain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Finished its current cycle and stopped
    Completed,
    /// Still busy when the drain timeout expired
    Aborted,
    /// The loop task panicked
    Panicked,
}

#[derive(Debug, Clone)]
pub struct DrainReport {
    pub harvest: LoopExit,
    pub delivery: LoopExit,
    /// Batches still waiting for delivery, they stay on disk for the next run
    pub undelivered: usize,
    pub stats: StatsSnapshot,
}

pub struct Scheduler {
    ctx: EngineContext,
    harvester: Harvester,
    worker: DeliveryWorker,
    config: SchedulerConfig,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(
        ctx: EngineContext,
        harvester: Harvester,
        worker: DeliveryWorker,
        config: SchedulerConfig,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            ctx,
            harvester,
            worker,
            config,
            state,
        }
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Runs both loops until `shutdown` is cancelled, then drains them
    pub async fn run(self, shutdown: CancellationToken) -> DrainReport {
        let Scheduler {
            ctx,
            harvester,
            worker,
            config,
            state,
        } = self;

        // pick up batches left behind by a previous run before anything else
        match harvester.reconcile().await {
            Ok(found) if found > 0 => info!(found = found, "Recovered undelivered batches"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Failed to scan for undelivered batches"),
        }

        state.send_replace(SchedulerState::Running);
        info!(
            read_interval_ms = config.read_interval.as_millis() as u64,
            upload_interval_ms = config.upload_interval.as_millis() as u64,
            "Scheduler running"
        );

        let harvest_active = Arc::new(AtomicBool::new(false));
        let delivery_active = Arc::new(AtomicBool::new(false));

        let harvest_handle = tokio::spawn(harvest_loop(
            harvester,
            config.read_interval,
            Arc::clone(&harvest_active),
            shutdown.clone(),
        ));
        let delivery_handle = tokio::spawn(delivery_loop(
            worker,
            config.upload_interval,
            Arc::clone(&delivery_active),
            shutdown.clone(),
        ));

        shutdown.cancelled().await;
        state.send_replace(SchedulerState::Draining);
        info!("Shutting down gracefully, waiting for running cycles to finish");

        let deadline = Instant::now() + config.drain_timeout;
        let harvest = drain("harvest", harvest_handle, &harvest_active, deadline).await;
        let delivery = drain("delivery", delivery_handle, &delivery_active, deadline).await;

        let report = DrainReport {
            harvest,
            delivery,
            undelivered: ctx.queue.len() + ctx.queue.in_flight(),
            stats: ctx.stats.snapshot(),
        };

        state.send_replace(SchedulerState::Stopped);
        info!(undelivered = report.undelivered, stats = %report.stats, "Shutdown complete");
        report
    }
}

async fn harvest_loop(
    mut harvester: Harvester,
    period: Duration,
    active: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        active.store(true, Ordering::SeqCst);
        match harvester.run_cycle().await {
            Ok(CycleOutcome::Committed { lines, batches, .. }) => {
                info!(lines = lines, batches = batches.len(), "Harvest cycle committed");
            }
            Ok(outcome) => debug!(outcome = ?outcome, "Harvest cycle finished"),
            Err(e) => error!(error = %e, "Harvest cycle failed"),
        }
        active.store(false, Ordering::SeqCst);
    }
}

async fn delivery_loop(
    worker: DeliveryWorker,
    period: Duration,
    active: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        active.store(true, Ordering::SeqCst);
        worker.run_cycle().await;
        active.store(false, Ordering::SeqCst);
    }
}

async fn drain(
    name: &'static str,
    mut handle: JoinHandle<()>,
    active: &AtomicBool,
    deadline: Instant,
) -> LoopExit {
    if active.load(Ordering::SeqCst) {
        info!(task = name, "Waiting for running cycle to finish");
    }

    match tokio::time::timeout_at(deadline, &mut handle).await {
        Ok(Ok(())) => {
            debug!(task = name, "Loop stopped");
            LoopExit::Completed
        }
        Ok(Err(e)) => {
            error!(task = name, error = %e, "Loop task failed");
            LoopExit::Panicked
        }
        Err(_) => {
            warn!(
                task = name,
                active = active.load(Ordering::SeqCst),
                "Drain timeout expired, aborting loop"
            );
            handle.abort();
            LoopExit::Aborted
        }
    }
}
