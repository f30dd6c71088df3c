//! Guarantees a completion notification on every exit path.

use tokio::runtime::Handle;

use crate::model::job::{BoundingBoxStatus, JobRecord};
use crate::notify::{NotificationFanout, NotificationMessage};

/// Holds the latest notification snapshot of a run. If the guard is dropped
/// while still armed (early return, cancelled future, panic) the snapshot is
/// sent from a detached task with its bounding-box status forced to FAILED
/// unless rendering already finished.
pub struct NotifyGuard {
    fanout: NotificationFanout,
    message: Option<NotificationMessage>,
}

impl NotifyGuard {
    pub fn arm(fanout: NotificationFanout, record: &JobRecord) -> Self {
        Self {
            fanout,
            message: Some(NotificationMessage::from_record(record)),
        }
    }

    /// Replaces the snapshot with the record's current state.
    pub fn update(&mut self, record: &JobRecord) {
        if self.message.is_some() {
            self.message = Some(NotificationMessage::from_record(record));
        }
    }

    /// Hands the snapshot back to the caller, who is now responsible for
    /// sending it.
    pub fn disarm(mut self) -> Option<NotificationMessage> {
        self.message.take()
    }
}

impl Drop for NotifyGuard {
    fn drop(&mut self) {
        let Some(mut message) = self.message.take() else {
            return;
        };
        if message.bounding_box_status == BoundingBoxStatus::Pending {
            message.bounding_box_status = BoundingBoxStatus::Failed;
        }

        tracing::warn!(
            job_id = %message.job_id,
            panicking = std::thread::panicking(),
            "Completion run ended abnormally, sending fallback notification"
        );

        match Handle::try_current() {
            Ok(handle) => {
                let fanout = self.fanout.clone();
                handle.spawn(async move {
                    fanout.notify(&message).await;
                });
            }
            Err(_) => {
                tracing::error!(
                    job_id = %message.job_id,
                    "No async runtime available, fallback notification dropped"
                );
            }
        }
    }
}
