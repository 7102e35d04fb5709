use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::domain::{BatchReport, DeliveryStatus, DispatchReport, NotificationJob, NotificationRoute};
use super::transport::{NotificationError, NotificationTransport};

/// Sends notification jobs, either awaited (`send_one`/`send_batch`) or queued.
pub struct NotificationDispatcher<T> {
    transport: Arc<T>,
}

impl<T> Clone for NotificationDispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T> NotificationDispatcher<T>
where
    T: NotificationTransport + 'static,
{
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    pub async fn send_one(&self, job: NotificationJob) -> DispatchReport {
        let route = job.route();
        self.deliver(route, std::slice::from_ref(&job)).await
    }

    /// One call per bot route present in `jobs`; each call is reported on its own.
    pub async fn send_batch(&self, jobs: Vec<NotificationJob>) -> BatchReport {
        let mut calls = Vec::new();
        for route in NotificationRoute::ordered() {
            let group: Vec<NotificationJob> = jobs
                .iter()
                .filter(|job| job.route() == route)
                .cloned()
                .collect();
            if group.is_empty() {
                continue;
            }
            calls.push(self.deliver(route, &group).await);
        }
        BatchReport { calls }
    }

    /// Start the background worker. Jobs queued while a call is in flight go out together,
    /// at most `max_batch` at a time. The worker stops once every queue handle is dropped.
    pub fn spawn_queue(&self, max_batch: usize) -> (NotificationQueue, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<NotificationJob>();
        let dispatcher = self.clone();
        let max_batch = max_batch.max(1);

        let worker = tokio::spawn(async move {
            while let Some(first) = receiver.recv().await {
                let mut batch = vec![first];
                while batch.len() < max_batch {
                    match receiver.try_recv() {
                        Ok(job) => batch.push(job),
                        Err(_) => break,
                    }
                }

                let report = dispatcher.send_batch(batch).await;
                if !report.all_delivered() {
                    warn!(
                        delivered = report.delivered_jobs(),
                        failed = report.failed_jobs(),
                        "queued notifications partially failed"
                    );
                }
            }
        });

        (NotificationQueue { sender }, worker)
    }

    async fn deliver(&self, route: NotificationRoute, jobs: &[NotificationJob]) -> DispatchReport {
        let delivery = match self.transport.deliver(route, jobs).await {
            Ok(()) => {
                info!(?route, jobs = jobs.len(), "notifications delivered");
                DeliveryStatus::Delivered
            }
            Err(err) => {
                warn!(?route, jobs = jobs.len(), %err, "notification delivery failed");
                DeliveryStatus::Failed {
                    message: err.to_string(),
                }
            }
        };

        DispatchReport {
            route,
            jobs: jobs.len(),
            delivery,
        }
    }
}

/// Fire-and-forget handle onto the dispatcher's worker.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    sender: mpsc::UnboundedSender<NotificationJob>,
}

impl NotificationQueue {
    pub fn enqueue(&self, job: NotificationJob) -> Result<(), NotificationError> {
        self.sender
            .send(job)
            .map_err(|_| NotificationError::QueueClosed)
    }
}
