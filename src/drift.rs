//! Background drift checks.
//!
//! Routing a receiver schedules a drift check against the transmitter without
//! waiting for it. Checks are jobs on a bounded queue, executed by at most
//! `workers` concurrent tasks. Outcomes are logged and published on a
//! broadcast channel; [`DriftMonitor::wait_idle`] resolves once every
//! submitted job has finished.
//!
//! ```text
//!  set_route ──submit──▶ [ queue (queue_depth) ] ──▶ dispatcher ──▶ worker × N
//!                                                                    │
//!                                      subscribe() ◀── DriftReport ──┘
//! ```

use crate::config::DriftConfig;
use crate::engine::{DriftOutcome, RouteEngine};
use crate::error::MatrixError;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, Semaphore};
use tracing::Instrument;

/// Capacity of the report broadcast channel.
const REPORT_CAPACITY: usize = 64;

/// Outcome of one background check.
#[derive(Debug, Clone)]
pub struct DriftReport {
    /// Transmitter address as submitted.
    pub transmitter: String,
    /// Check result.
    pub result: Result<DriftOutcome, Arc<MatrixError>>,
}

#[derive(Debug)]
struct DriftJob {
    transmitter: String,
}

/// Handle to the drift worker pool.
///
/// Clones share the same pool. The dispatcher stops once every handle is dropped
/// and the queue has drained.
#[derive(Debug, Clone)]
pub struct DriftMonitor {
    jobs: mpsc::Sender<DriftJob>,
    reports: broadcast::Sender<DriftReport>,
    pending: Arc<watch::Sender<usize>>,
}

impl DriftMonitor {
    /// Start the dispatcher on the current tokio runtime.
    pub fn spawn(engine: Arc<RouteEngine>, config: &DriftConfig) -> Self {
        let (jobs, queue) = mpsc::channel(config.queue_depth.max(1));
        let (reports, _) = broadcast::channel(REPORT_CAPACITY);
        let (pending, _) = watch::channel(0usize);
        let pending = Arc::new(pending);

        let limit = Arc::new(Semaphore::new(config.workers.max(1)));
        tokio::spawn(
            dispatch(engine, queue, limit, reports.clone(), pending.clone())
                .instrument(tracing::debug_span!("drift_monitor")),
        );

        Self {
            jobs,
            reports,
            pending,
        }
    }

    /// Queue a drift check for `transmitter`.
    ///
    /// Never waits. Returns `false` (and logs) if the queue is full.
    pub fn submit(&self, transmitter: &str) -> bool {
        self.pending.send_modify(|n| *n += 1);
        let job = DriftJob {
            transmitter: transmitter.to_string(),
        };
        match self.jobs.try_send(job) {
            Ok(()) => {
                tracing::debug!(transmitter, "Drift check scheduled");
                true
            }
            Err(e) => {
                self.pending.send_modify(|n| *n = n.saturating_sub(1));
                tracing::warn!(transmitter, error = %e, "Drift check dropped");
                false
            }
        }
    }

    /// Receive reports for checks that finish after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<DriftReport> {
        self.reports.subscribe()
    }

    /// Jobs submitted but not yet finished.
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Wait until every submitted job has finished.
    pub async fn wait_idle(&self) {
        let mut rx = self.pending.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

async fn dispatch(
    engine: Arc<RouteEngine>,
    mut queue: mpsc::Receiver<DriftJob>,
    limit: Arc<Semaphore>,
    reports: broadcast::Sender<DriftReport>,
    pending: Arc<watch::Sender<usize>>,
) {
    while let Some(job) = queue.recv().await {
        let Ok(permit) = limit.clone().acquire_owned().await else {
            break;
        };
        let engine = engine.clone();
        let reports = reports.clone();
        let pending = pending.clone();
        let span = tracing::info_span!("drift_check", transmitter = %job.transmitter);

        tokio::spawn(
            async move {
                let result = engine.check_drift(&job.transmitter).await;
                match &result {
                    Ok(outcome) => tracing::debug!(%outcome, "Drift check finished"),
                    Err(e) => tracing::warn!(error = %e, "Drift check failed"),
                }
                // No subscribers is fine.
                let _ = reports.send(DriftReport {
                    transmitter: job.transmitter,
                    result: result.map_err(Arc::new),
                });
                drop(permit);
                pending.send_modify(|n| *n = n.saturating_sub(1));
            }
            .instrument(span),
        );
    }
    tracing::debug!("Drift dispatcher stopped");
}
