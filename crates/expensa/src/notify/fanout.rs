//! Delivers one completion message to every registered subscriber.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::channel::PushChannel;
use super::message::NotificationMessage;
use super::registry::SubscriberRegistry;
use crate::config::NotifyConfig;
use crate::error::DeliveryError;

/// Outcome of one fan-out round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub attempted: usize,
    pub delivered: usize,
    pub pruned: Vec<String>,
}

/// A fan-out round running in the background.
#[derive(Debug)]
pub struct Delivery {
    job_id: String,
    task: JoinHandle<FanoutReport>,
}

impl Delivery {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the round to finish. A round that panicked or was aborted
    /// reports nothing delivered.
    pub async fn report(self) -> FanoutReport {
        match self.task.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(job_id = %self.job_id, error = %e, "Notification task did not finish");
                FanoutReport::default()
            }
        }
    }
}

#[derive(Clone)]
pub struct NotificationFanout {
    registry: Arc<dyn SubscriberRegistry>,
    channel: Arc<dyn PushChannel>,
    workers: usize,
    delivery_timeout: Duration,
}

impl NotificationFanout {
    pub fn new(
        registry: Arc<dyn SubscriberRegistry>,
        channel: Arc<dyn PushChannel>,
        config: &NotifyConfig,
    ) -> Self {
        Self {
            registry,
            channel,
            workers: config.workers.max(1),
            delivery_timeout: config.delivery_timeout(),
        }
    }

    pub fn registry(&self) -> &Arc<dyn SubscriberRegistry> {
        &self.registry
    }

    /// Runs [`notify`](Self::notify) on its own task so the caller does not
    /// wait on slow subscribers. Must be called from within a Tokio runtime.
    pub fn spawn(&self, message: NotificationMessage) -> Delivery {
        let fanout = self.clone();
        let job_id = message.job_id.clone();
        let task = tokio::spawn(async move { fanout.notify(&message).await }.in_current_span());
        Delivery { job_id, task }
    }

    /// Serializes the message once and pushes it to every connection listed
    /// at call time. Failures are logged and never returned.
    pub async fn notify(&self, message: &NotificationMessage) -> FanoutReport {
        let span = tracing::info_span!("notify.fanout", job_id = %message.job_id);
        match message.to_payload() {
            Ok(payload) => self.broadcast(&payload).instrument(span).await,
            Err(e) => {
                let _guard = span.entered();
                tracing::error!(error = %e, "Failed to serialize notification");
                FanoutReport::default()
            }
        }
    }

    /// Pushes a payload to every active connection. A connection whose
    /// delivery fails or times out is removed from the registry as soon as
    /// its own delivery ends; the rest still receive the payload.
    pub async fn broadcast(&self, payload: &[u8]) -> FanoutReport {
        let connections = match self.registry.list_active().await {
            Ok(connections) => connections,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list subscribers");
                return FanoutReport::default();
            }
        };

        let attempted = connections.len();
        if attempted == 0 {
            tracing::debug!("No subscribers connected");
            return FanoutReport::default();
        }

        let outcomes: Vec<(String, bool)> = stream::iter(connections)
            .map(|connection_id| async move {
                let delivered = match self.deliver(&connection_id, payload).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(connection_id = %connection_id, error = %e, "Delivery failed, pruning subscriber");
                        if let Err(e) = self.registry.remove(&connection_id).await {
                            tracing::error!(connection_id = %connection_id, error = %e, "Failed to prune subscriber");
                        }
                        false
                    }
                };
                (connection_id, delivered)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut report = FanoutReport {
            attempted,
            ..Default::default()
        };
        for (connection_id, delivered) in outcomes {
            if delivered {
                report.delivered += 1;
            } else {
                report.pruned.push(connection_id);
            }
        }
        report.pruned.sort();

        tracing::info!(
            attempted = report.attempted,
            delivered = report.delivered,
            pruned = report.pruned.len(),
            "Notification fan-out finished"
        );
        report
    }

    async fn deliver(&self, connection_id: &str, payload: &[u8]) -> Result<(), DeliveryError> {
        match tokio::time::timeout(self.delivery_timeout, self.channel.send(connection_id, payload))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout {
                connection_id: connection_id.to_string(),
                timeout_ms: self.delivery_timeout.as_millis() as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::job::BoundingBoxStatus;
    use crate::model::extraction::Extraction;
    use crate::notify::registry::MemoryRegistry;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedChannel {
        failing: HashSet<String>,
        hanging: HashSet<String>,
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PushChannel for ScriptedChannel {
        async fn send(&self, connection_id: &str, _payload: &[u8]) -> Result<(), DeliveryError> {
            if self.hanging.contains(connection_id) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.failing.contains(connection_id) {
                return Err(DeliveryError::Gone(connection_id.to_string()));
            }
            self.delivered.lock().unwrap().push(connection_id.to_string());
            Ok(())
        }
    }

    fn config(timeout_ms: u64) -> NotifyConfig {
        NotifyConfig {
            workers: 4,
            delivery_timeout_ms: timeout_ms,
        }
    }

    fn message() -> NotificationMessage {
        NotificationMessage::assemble(
            "job-1",
            BoundingBoxStatus::Completed,
            "u/t/s/a.png",
            &[],
            0,
            &Extraction::default(),
        )
    }

    async fn registry_with(ids: &[&str]) -> Arc<MemoryRegistry> {
        let registry = Arc::new(MemoryRegistry::new());
        for id in ids {
            registry.register(id).await.unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_failed_connections_are_pruned_others_delivered() {
        let registry = registry_with(&["a", "b", "c", "d", "e"]).await;
        let channel = Arc::new(ScriptedChannel {
            failing: HashSet::from(["b".to_string(), "d".to_string()]),
            ..Default::default()
        });
        let fanout = NotificationFanout::new(registry.clone(), channel.clone(), &config(1_000));

        let report = fanout.notify(&message()).await;

        assert_eq!(report.attempted, 5);
        assert_eq!(report.delivered, 3);
        assert_eq!(report.pruned, vec!["b", "d"]);

        let mut remaining = registry.list_active().await.unwrap();
        remaining.sort();
        assert_eq!(remaining, vec!["a", "c", "e"]);

        let mut delivered = channel.delivered.lock().unwrap().clone();
        delivered.sort();
        assert_eq!(delivered, vec!["a", "c", "e"]);
    }

    #[tokio::test]
    async fn test_slow_connection_times_out_and_is_pruned() {
        let registry = registry_with(&["fast", "slow"]).await;
        let channel = Arc::new(ScriptedChannel {
            hanging: HashSet::from(["slow".to_string()]),
            ..Default::default()
        });
        let fanout = NotificationFanout::new(registry.clone(), channel, &config(50));

        let report = fanout.notify(&message()).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.pruned, vec!["slow"]);
        assert_eq!(registry.list_active().await.unwrap(), vec!["fast"]);
    }

    #[tokio::test]
    async fn test_spawned_round_does_not_wait_for_slow_connection() {
        let registry = registry_with(&["fast", "slow"]).await;
        let channel = Arc::new(ScriptedChannel {
            hanging: HashSet::from(["slow".to_string()]),
            ..Default::default()
        });
        let fanout = NotificationFanout::new(registry.clone(), channel.clone(), &config(200));

        let delivery = fanout.spawn(message());
        assert_eq!(delivery.job_id(), "job-1");

        let report = delivery.report().await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.pruned, vec!["slow"]);
        assert_eq!(*channel.delivered.lock().unwrap(), vec!["fast"]);
    }

    #[tokio::test]
    async fn test_no_subscribers_is_a_no_op() {
        let registry = registry_with(&[]).await;
        let channel = Arc::new(ScriptedChannel::default());
        let fanout = NotificationFanout::new(registry, channel, &config(1_000));

        assert_eq!(fanout.notify(&message()).await, FanoutReport::default());
    }

    #[tokio::test]
    async fn test_pruned_connection_is_not_retried_next_round() {
        let registry = registry_with(&["a", "gone"]).await;
        let channel = Arc::new(ScriptedChannel {
            failing: HashSet::from(["gone".to_string()]),
            ..Default::default()
        });
        let fanout = NotificationFanout::new(registry, channel, &config(1_000));

        fanout.notify(&message()).await;
        let second = fanout.notify(&message()).await;

        assert_eq!(second.attempted, 1);
        assert!(second.pruned.is_empty());
    }
}
