use super::transport::{DeliveryOutcome, Transport};
use crate::runtime::EngineContext;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What a delivery cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryCycle {
    /// Queue was empty
    Idle,
    /// Batch accepted by the receiver and removed from disk
    Delivered(PathBuf),
    /// Delivery failed, batch is back at the head of the queue
    Requeued(PathBuf),
}

/// Takes one batch per cycle off the queue and hands it to the transport
pub struct DeliveryWorker {
    ctx: EngineContext,
    transport: Arc<dyn Transport>,
    url: String,
    category: Option<String>,
}

impl DeliveryWorker {
    pub fn new(
        ctx: EngineContext,
        transport: Arc<dyn Transport>,
        url: String,
        category: Option<String>,
    ) -> Self {
        Self {
            ctx,
            transport,
            url,
            category,
        }
    }

    /// Runs one delivery cycle. Failures are logged and never propagated, the
    /// batch stays queued and is retried on the next tick.
    pub async fn run_cycle(&self) -> DeliveryCycle {
        let Some(batch) = self.ctx.queue.dequeue() else {
            debug!("No batches to deliver");
            return DeliveryCycle::Idle;
        };

        debug!(batch = %batch.display(), "Delivering batch");
        let outcome = self
            .transport
            .deliver(&batch, &self.url, self.category.as_deref())
            .await;

        match outcome {
            DeliveryOutcome::Delivered { bytes } => {
                // the batch is delivered either way; a file left behind is
                // picked up by the next scan and sent again
                if let Err(e) = self.ctx.batches.remove(&batch).await {
                    error!(batch = %batch.display(), error = %e, "Failed to remove delivered batch");
                }
                self.ctx.queue.complete(&batch);
                if bytes == 0 {
                    debug!(batch = %batch.display(), "Batch file already gone, dropped from queue");
                } else {
                    self.ctx.stats.record_delivery(bytes);
                    info!(batch = %batch.display(), bytes = bytes, "Batch delivered");
                }
                DeliveryCycle::Delivered(batch)
            }
            DeliveryOutcome::Retriable(e) => {
                warn!(batch = %batch.display(), error = %e, "Delivery failed, will retry");
                self.requeue(batch)
            }
            DeliveryOutcome::Fatal(e) => {
                error!(batch = %batch.display(), error = %e, "Delivery failed");
                self.requeue(batch)
            }
        }
    }

    fn requeue(&self, batch: PathBuf) -> DeliveryCycle {
        self.ctx.stats.record_failure();
        self.ctx.queue.requeue_front(batch.clone());
        DeliveryCycle::Requeued(batch)
    }
}
