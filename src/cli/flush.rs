use super::run::{prepare_work_dir, resolve_endpoint, RunError};
use crate::codec::{Codec, ZstdCodec};
use crate::config::parse::resolve_config;
use crate::config::Overrides;
use crate::delivery::{flush_pending, HttpTransport};
use crate::storage::BatchStore;
use std::path::PathBuf;
use tracing::info;

/// Uploads whatever batches a previous run left behind, then exits
pub async fn flush(
    config_path: Option<PathBuf>,
    overrides: Overrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(config_path.as_deref(), overrides).map_err(RunError::from)?;
    prepare_work_dir(&config.work_dir).await?;

    let url = resolve_endpoint(&config).await?;
    let codec = ZstdCodec::new(config.harvest.compression_level);
    let transport =
        HttpTransport::new(&config.delivery, codec.content_encoding()).map_err(RunError::from)?;

    let store = BatchStore::new(&config.work_dir);
    let delivered = flush_pending(
        &store,
        &transport,
        &url,
        config.delivery.category.as_deref(),
    )
    .await?;

    info!(delivered = delivered, "Flush complete");
    Ok(())
}
