use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{Channel, MessageTemplate, NotificationError, NotificationGateway, SendReceipt};

/// One detached message.
#[derive(Clone, Debug)]
pub struct NotificationJob {
    pub to: String,
    pub channel: Channel,
    pub template: MessageTemplate,
    /// Correlates log lines with the registration that triggered the job.
    pub registration_id: Option<Uuid>,
}

/// What happened to a job once the worker handled it.
#[derive(Debug)]
pub struct NotificationOutcome {
    pub registration_id: Option<Uuid>,
    pub result: Result<SendReceipt, NotificationError>,
}

/// Handle for enqueueing messages onto the background worker.
#[derive(Clone, Debug)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<NotificationJob>,
}

impl NotificationDispatcher {
    pub fn new(sender: mpsc::Sender<NotificationJob>) -> Self {
        Self { sender }
    }

    /// Starts the worker and returns the handle to feed it.
    pub fn spawn(gateway: NotificationGateway, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_worker(gateway, rx, None));
        (Self::new(tx), handle)
    }

    /// Like [`spawn`](Self::spawn) but reports every outcome on the returned receiver.
    pub fn spawn_observed(
        gateway: NotificationGateway,
        capacity: usize,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<NotificationOutcome>,
        JoinHandle<()>,
    ) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(gateway, rx, Some(outcome_tx)));
        (Self::new(tx), outcome_rx, handle)
    }

    /// Never waits: a full queue drops the job.
    pub fn enqueue(&self, job: NotificationJob) -> Result<(), NotificationError> {
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => {
                warn!(registration_id = ?job.registration_id, "notification queue full, dropping message");
                metrics::counter!("checkout.notifications.dropped", 1);
                NotificationError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => NotificationError::QueueClosed,
        })
    }
}

pub async fn run_worker(
    gateway: NotificationGateway,
    mut rx: mpsc::Receiver<NotificationJob>,
    outcomes: Option<mpsc::UnboundedSender<NotificationOutcome>>,
) {
    info!("Starting notification worker");

    while let Some(job) = rx.recv().await {
        debug!(registration_id = ?job.registration_id, channel = %job.channel, "dispatching notification");
        let result = gateway
            .send_template(&job.to, &job.template, job.channel)
            .await;

        if let Err(e) = &result {
            error!(
                registration_id = ?job.registration_id,
                channel = %job.channel,
                error = %e,
                "notification failed"
            );
        }

        if let Some(outcomes) = &outcomes {
            let _ = outcomes.send(NotificationOutcome {
                registration_id: job.registration_id,
                result,
            });
        }
    }

    info!("Notification worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::{MockMessageSender, SendReceipt};
    use std::sync::Arc;

    fn job(to: &str) -> NotificationJob {
        NotificationJob {
            to: to.into(),
            channel: Channel::Sms,
            template: MessageTemplate::Welcome {
                name: "Asha".into(),
            },
            registration_id: Some(Uuid::new_v4()),
        }
    }

    #[tokio::test]
    async fn worker_survives_failures_and_reports_outcomes() {
        let mut sender = MockMessageSender::new();
        let mut calls = 0;
        sender.expect_deliver().times(2).returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Err(NotificationError::Provider {
                    code: Some(20429),
                    reason: "rate limited".into(),
                })
            } else {
                Ok(SendReceipt {
                    sid: "SM2".into(),
                    status: "queued".into(),
                })
            }
        });
        let gateway = NotificationGateway::new(Arc::new(sender), "+91");
        let (dispatcher, mut outcomes, _handle) = NotificationDispatcher::spawn_observed(gateway, 4);

        dispatcher.enqueue(job("9876543210")).unwrap();
        dispatcher.enqueue(job("9876543211")).unwrap();

        let first = outcomes.recv().await.unwrap();
        assert!(first.result.is_err());
        let second = outcomes.recv().await.unwrap();
        assert_eq!(second.result.unwrap().sid, "SM2");
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let (tx, _rx) = mpsc::channel(1);
        let dispatcher = NotificationDispatcher::new(tx);
        dispatcher.enqueue(job("9876543210")).unwrap();
        assert_eq!(
            dispatcher.enqueue(job("9876543210")),
            Err(NotificationError::QueueFull)
        );
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let dispatcher = NotificationDispatcher::new(tx);
        assert_eq!(
            dispatcher.enqueue(job("9876543210")),
            Err(NotificationError::QueueClosed)
        );
    }
}
