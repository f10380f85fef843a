//! Worker dispatcher
//!
//! Work units are identified by a stable key and delivered at least once;
//! idempotency is the unit's responsibility, not the queue's. Failed units
//! are redelivered with exponential backoff until the payout reaches a
//! terminal state or the redelivery budget runs out. Shutdown is
//! cooperative: workers stop claiming new items and in-flight units finish
//! their current atomic step.

use crate::{
    config::Config,
    engine::{IntakeOutcome, PayoutEngine},
    error::{Error, Result},
    retry::RetryPolicy,
    types::PayoutRequest,
};
use ledger_core::PayoutStatus;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// One unit of work on the queue
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Stable key, `process_payout:<payout_id>`
    pub key: String,

    /// Payout to drive
    pub payout_id: Uuid,

    /// Redeliveries so far
    pub attempt: u32,
}

impl WorkItem {
    fn process_payout(payout_id: Uuid) -> Self {
        Self {
            key: format!("process_payout:{}", payout_id),
            payout_id,
            attempt: 0,
        }
    }
}

/// Worker pool consuming payout work from a bounded queue
pub struct Dispatcher {
    queue: mpsc::Sender<WorkItem>,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawn the configured number of workers
    pub fn spawn(engine: Arc<PayoutEngine>, config: &Config) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.worker.queue_depth);
        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let policy = RetryPolicy::new(config.retry.clone());
        let max_redeliveries = config.worker.max_redeliveries;

        let workers = (0..config.worker.concurrency)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    engine.clone(),
                    queue_rx.clone(),
                    queue_tx.clone(),
                    shutdown_rx.clone(),
                    policy.clone(),
                    max_redeliveries,
                ))
            })
            .collect();

        Self {
            queue: queue_tx,
            shutdown: shutdown_tx,
            workers,
        }
    }

    /// Enqueue processing of a payout. Applies backpressure when the queue
    /// is full.
    pub async fn enqueue_process_payout(&self, payout_id: Uuid) -> Result<()> {
        self.queue
            .send(WorkItem::process_payout(payout_id))
            .await
            .map_err(|_| Error::Queue("work queue closed".to_string()))
    }

    /// Stop claiming new work and wait for in-flight units to finish their
    /// current step
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.workers {
            let _ = handle.await;
        }
        tracing::info!("Dispatcher stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    engine: Arc<PayoutEngine>,
    queue_rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    queue_tx: mpsc::Sender<WorkItem>,
    mut shutdown_rx: watch::Receiver<bool>,
    policy: RetryPolicy,
    max_redeliveries: u32,
) {
    tracing::debug!(worker_id, "Worker started");

    loop {
        let item = tokio::select! {
            _ = shutdown_rx.changed() => break,
            item = async {
                let mut rx = queue_rx.lock().await;
                rx.recv().await
            } => match item {
                Some(item) => item,
                None => break,
            },
        };

        match engine.process_payout(item.payout_id).await {
            Ok(payout) => {
                tracing::info!(
                    worker_id,
                    work_key = %item.key,
                    status = %payout.status,
                    "Work unit finished"
                );
            }
            Err(error) if error.is_retryable() => {
                if item.attempt >= max_redeliveries {
                    tracing::error!(
                        worker_id,
                        work_key = %item.key,
                        attempt = item.attempt,
                        %error,
                        "Redelivery budget exhausted, dropping work unit"
                    );
                    continue;
                }

                let delay = policy.delay_for(item.attempt);
                tracing::warn!(
                    worker_id,
                    work_key = %item.key,
                    attempt = item.attempt,
                    ?delay,
                    %error,
                    "Work unit failed, redelivering after backoff"
                );

                let redelivery = WorkItem {
                    attempt: item.attempt + 1,
                    ..item
                };
                let queue_tx = queue_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = queue_tx.send(redelivery).await;
                });
            }
            Err(error) => {
                tracing::error!(
                    worker_id,
                    work_key = %item.key,
                    %error,
                    "Work unit failed permanently"
                );
            }
        }
    }

    tracing::debug!(worker_id, "Worker stopped");
}

/// Intake plus dispatch: the surface an API transport binds to
pub struct PayoutService {
    engine: Arc<PayoutEngine>,
    dispatcher: Dispatcher,
}

impl PayoutService {
    /// Start the service over an engine
    pub fn start(engine: Arc<PayoutEngine>, config: &Config) -> Self {
        let dispatcher = Dispatcher::spawn(engine.clone(), config);
        Self { engine, dispatcher }
    }

    /// Accept a request and schedule processing. Replays of a still-pending
    /// payout re-enqueue it, which keeps delivery at-least-once even if an
    /// earlier work item was lost.
    pub async fn submit(&self, request: PayoutRequest) -> Result<IntakeOutcome> {
        let outcome = self.engine.intake(request).await?;

        let payout = outcome.payout();
        if payout.status == PayoutStatus::Pending {
            self.dispatcher.enqueue_process_payout(payout.id).await?;
        }

        Ok(outcome)
    }

    /// Engine handle for queries and direct state machine access
    pub fn engine(&self) -> &Arc<PayoutEngine> {
        &self.engine
    }

    /// Stop the dispatcher
    pub async fn shutdown(self) {
        self.dispatcher.shutdown().await;
    }
}
