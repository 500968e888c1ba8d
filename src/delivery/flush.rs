use super::transport::{DeliveryOutcome, Transport, TransportError};
use crate::storage::{BatchStore, StoreError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum FlushError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to deliver {batch}: {source}")]
    Delivery {
        batch: String,
        #[source]
        source: TransportError,
    },
}

/// Uploads every pending batch file in sequence order, removing each one once
/// the receiver accepted it. Stops at the first failure so nothing is sent out
/// of order. Returns the number of batches delivered.
pub async fn flush_pending(
    store: &BatchStore,
    transport: &dyn Transport,
    url: &str,
    category: Option<&str>,
) -> Result<usize, FlushError> {
    let pending = store.scan().await?;
    info!(count = pending.len(), "Flushing pending batches");

    let mut delivered = 0;
    for batch in pending {
        match transport.deliver(&batch, url, category).await {
            DeliveryOutcome::Delivered { bytes } => {
                store.remove(&batch).await?;
                delivered += 1;
                info!(batch = %batch.display(), bytes = bytes, "Batch delivered");
            }
            DeliveryOutcome::Retriable(source) | DeliveryOutcome::Fatal(source) => {
                return Err(FlushError::Delivery {
                    batch: batch.display().to_string(),
                    source,
                });
            }
        }
    }

    Ok(delivered)
}
