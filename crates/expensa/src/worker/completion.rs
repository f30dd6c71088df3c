use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::model::job::JobStatus;
use crate::model::signal::CompletionSignal;
use crate::notify::Delivery;
use crate::pipeline::CompletionHandler;

/// Totals for one worker lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub received: usize,
    pub completed: usize,
    pub failed: usize,
    /// Signals whose run returned an error or panicked.
    pub errors: usize,
    /// Notifications delivered across all runs.
    pub delivered: usize,
    /// Subscribers pruned across all runs.
    pub pruned: usize,
}

impl WorkerSummary {
    async fn settle(&mut self, delivery: Delivery) {
        let report = delivery.report().await;
        self.delivered += report.delivered;
        self.pruned += report.pruned.len();
    }
}

/// Consumes completion signals and runs the handler for each, at most
/// `concurrency` at a time. Each run is its own task so a panic stays
/// contained to one signal.
pub struct CompletionWorker {
    handler: Arc<CompletionHandler>,
    concurrency: usize,
}

impl CompletionWorker {
    pub fn new(handler: Arc<CompletionHandler>, concurrency: usize) -> Self {
        Self {
            handler,
            concurrency: concurrency.max(1),
        }
    }

    /// Starts the worker on the current runtime. Dropping every sender ends
    /// it once queued signals are handled and their notifications sent.
    pub fn spawn(self, capacity: usize) -> (mpsc::Sender<CompletionSignal>, JoinHandle<WorkerSummary>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(async move { self.run(rx).await });
        (tx, handle)
    }

    pub async fn run(&self, signals: mpsc::Receiver<CompletionSignal>) -> WorkerSummary {
        info!(concurrency = self.concurrency, "Completion worker started");

        let incoming = stream::unfold(signals, |mut rx| async move {
            rx.recv().await.map(|signal| (signal, rx))
        });

        let (mut summary, in_flight) = incoming
            .map(|signal| {
                let handler = Arc::clone(&self.handler);
                debug!(job_id = %signal.job_id, "Completion signal received");
                tokio::spawn(async move { handler.handle(signal).await })
            })
            .buffer_unordered(self.concurrency)
            .fold(
                (WorkerSummary::default(), Vec::<Delivery>::new()),
                |(mut summary, mut in_flight), joined| async move {
                    summary.received += 1;
                    match joined {
                        Ok(Ok(outcome)) => {
                            match outcome.status {
                                JobStatus::Failed => summary.failed += 1,
                                _ => summary.completed += 1,
                            }
                            in_flight.push(outcome.delivery);
                        }
                        Ok(Err(e)) => {
                            error!(error = %e, "Completion signal could not be handled");
                            summary.errors += 1;
                        }
                        Err(e) => {
                            error!(error = %e, "Completion task panicked");
                            summary.errors += 1;
                        }
                    }

                    let (finished, pending): (Vec<_>, Vec<_>) =
                        in_flight.into_iter().partition(Delivery::is_finished);
                    for delivery in finished {
                        summary.settle(delivery).await;
                    }
                    (summary, pending)
                },
            )
            .await;

        for delivery in in_flight {
            summary.settle(delivery).await;
        }

        info!(
            received = summary.received,
            completed = summary.completed,
            failed = summary.failed,
            errors = summary.errors,
            delivered = summary.delivered,
            pruned = summary.pruned,
            "Completion worker stopped"
        );
        summary
    }
}
