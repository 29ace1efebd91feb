// THEORY:
// The `ResultPoller` pulls the backend's latest detection result on a fixed
// period while a detection run is active. It is a single tokio task with an
// interval timer; each tick awaits its request before the next tick is taken,
// so at most one request is ever in flight. Ticks that fall due while a slow
// request is pending are skipped, not queued.
//
// Stopping goes through a watch channel, the same play/pause signal shape the
// control handle uses. The stop signal is raced against both the timer and the
// request itself, so a stalled request is abandoned rather than waited out.
// Dropping the `PollHandle` stops the task as well, so a poller can never
// outlive the code that started it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::api::BackendClient;
use crate::{DetectionUpdate, ResultBus, UpdateSource};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Counters shared between the polling task and its handle.
#[derive(Debug, Default)]
pub struct PollStats {
    requests: AtomicU64,
    results: AtomicU64,
    empty: AtomicU64,
    failures: AtomicU64,
}

impl PollStats {
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn results(&self) -> u64 {
        self.results.load(Ordering::Relaxed)
    }

    pub fn empty(&self) -> u64 {
        self.empty.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

pub struct ResultPoller;

impl ResultPoller {
    /// Starts polling `client` every `period`, publishing results on `bus`.
    pub fn spawn(client: BackendClient, period: Duration, bus: ResultBus) -> PollHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let stats = Arc::new(PollStats::default());
        let task = tokio::spawn(poll_loop(client, period, bus, stop_rx, stats.clone()));
        info!("result polling started every {} ms", period.as_millis());
        PollHandle {
            stop_tx,
            stats,
            task: Some(task),
        }
    }
}

async fn poll_loop(
    client: BackendClient,
    period: Duration,
    bus: ResultBus,
    mut stop_rx: watch::Receiver<bool>,
    stats: Arc<PollStats>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_signalled(&mut stop_rx) => break,
            _ = ticker.tick() => {}
        }

        stats.requests.fetch_add(1, Ordering::Relaxed);
        // An in-flight request is dropped as soon as stop is signalled.
        let outcome = tokio::select! {
            _ = stop_signalled(&mut stop_rx) => break,
            outcome = client.get_result() => outcome,
        };
        match outcome {
            Ok(Some(payload)) => {
                stats.results.fetch_add(1, Ordering::Relaxed);
                bus.publish(DetectionUpdate::new(payload, UpdateSource::Poll));
            }
            Ok(None) => {
                stats.empty.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                stats.failures.fetch_add(1, Ordering::Relaxed);
                warn!("result poll failed: {err}");
            }
        }
    }
    debug!("result polling stopped after {} requests", stats.requests());
}

/// Resolves once stop is requested or the handle is gone.
async fn stop_signalled(stop_rx: &mut watch::Receiver<bool>) {
    loop {
        let stop = *stop_rx.borrow_and_update();
        if stop || stop_rx.changed().await.is_err() {
            return;
        }
    }
}

pub struct PollHandle {
    stop_tx: watch::Sender<bool>,
    stats: Arc<PollStats>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    /// A counter handle that outlives the `PollHandle`.
    pub fn shared_stats(&self) -> Arc<PollStats> {
        self.stats.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Signals the task to stop and waits for it to wind down.
    pub async fn stop(mut self) {
        self.stop_tx.send_replace(true);
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("result polling task ended abnormally: {err}");
            }
        }
        info!("result polling stopped");
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}
