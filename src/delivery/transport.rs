use crate::config::types::DeliveryConfig;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Header carrying the source category override
pub const CATEGORY_HEADER: &str = "X-Sumo-Category";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("receiver returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to read batch {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of handing one batch to the receiver
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// Receiver confirmed the batch, or the batch no longer exists
    Delivered { bytes: u64 },
    /// Network or server-side failure, worth trying again
    Retriable(TransportError),
    /// The request could not be built or the batch could not be read
    Fatal(TransportError),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, batch: &Path, url: &str, category: Option<&str>) -> DeliveryOutcome;
}

/// Posts compressed batch files to an HTTP receiver
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    content_encoding: &'static str,
}

impl HttpTransport {
    pub fn new(
        config: &DeliveryConfig,
        content_encoding: &'static str,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            content_encoding,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, batch: &Path, url: &str, category: Option<&str>) -> DeliveryOutcome {
        let body = match tokio::fs::read(batch).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(batch = %batch.display(), "Batch already gone, nothing to send");
                return DeliveryOutcome::Delivered { bytes: 0 };
            }
            Err(source) => {
                return DeliveryOutcome::Fatal(TransportError::Read {
                    path: batch.to_path_buf(),
                    source,
                })
            }
        };
        let bytes = body.len() as u64;

        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_ENCODING, self.content_encoding)
            .body(body);
        if let Some(category) = category {
            request = request.header(CATEGORY_HEADER, category);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => return DeliveryOutcome::Fatal(e.into()),
            Err(e) => return DeliveryOutcome::Retriable(e.into()),
        };

        let status = response.status();
        debug!(batch = %batch.display(), status = status.as_u16(), "Receiver responded");

        if status.is_success() {
            DeliveryOutcome::Delivered { bytes }
        } else {
            DeliveryOutcome::Retriable(TransportError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            })
        }
    }
}
