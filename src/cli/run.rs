use crate::codec::{Codec, ZstdCodec};
use crate::config::parse::{resolve_config, ConfigError};
use crate::config::types::Config;
use crate::config::{ApiCredentials, Overrides};
use crate::delivery::{DeliveryWorker, HttpTransport, TransportError};
use crate::harvest::Harvester;
use crate::provision::{ProvisionClient, ProvisionError};
use crate::runtime::{DrainReport, EngineContext, LoopExit, Scheduler, SchedulerConfig};
use crate::source::JournalctlSource;
use crate::storage::{BatchStore, CursorStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to create working directory {path}: {source}")]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to determine host name: {0}")]
    Hostname(String),

    #[error("endpoint provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

pub async fn run(
    config_path: Option<PathBuf>,
    overrides: Overrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = run_engine(config_path.as_deref(), overrides).await?;

    if report.harvest != LoopExit::Completed || report.delivery != LoopExit::Completed {
        warn!(
            harvest = ?report.harvest,
            delivery = ?report.delivery,
            "Not every loop stopped cleanly"
        );
    }
    Ok(())
}

async fn run_engine(config_path: Option<&Path>, overrides: Overrides) -> Result<DrainReport, RunError> {
    match config_path {
        Some(path) => info!(config_path = %path.display(), "Loading configuration"),
        None => info!("No config file found, using defaults"),
    }
    let config = resolve_config(config_path, overrides)?;

    prepare_work_dir(&config.work_dir).await?;
    let url = resolve_endpoint(&config).await?;
    info!(url = %url, work_dir = %config.work_dir.display(), "Receiver endpoint resolved");

    let ctx = EngineContext::new(BatchStore::new(&config.work_dir));
    let codec = Arc::new(ZstdCodec::new(config.harvest.compression_level));
    let transport = Arc::new(HttpTransport::new(&config.delivery, codec.content_encoding())?);

    let harvester = Harvester::new(
        ctx.clone(),
        Arc::new(JournalctlSource::new(&config.source)),
        codec,
        CursorStore::new(&config.work_dir),
        config.harvest.batch_size,
    );
    let worker = DeliveryWorker::new(ctx.clone(), transport, url, config.delivery.category.clone());
    let scheduler = Scheduler::new(
        ctx,
        harvester,
        worker,
        SchedulerConfig {
            read_interval: config.harvest.interval,
            upload_interval: config.delivery.interval,
            drain_timeout: config.shutdown.drain_timeout,
        },
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        signal_token.cancel();
    });

    info!("Forwarder started, press Ctrl+C to shutdown");
    Ok(scheduler.run(shutdown).await)
}

pub(crate) async fn prepare_work_dir(path: &Path) -> Result<(), RunError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| RunError::WorkDir {
            path: path.to_path_buf(),
            source,
        })
}

/// Returns the configured receiver URL, or provisions one named after this
/// host when none is configured
pub(crate) async fn resolve_endpoint(config: &Config) -> Result<String, RunError> {
    if let Some(url) = &config.delivery.url {
        return Ok(url.clone());
    }

    let host = hostname::get()
        .map_err(|e| RunError::Hostname(e.to_string()))?
        .into_string()
        .map_err(|raw| RunError::Hostname(format!("not valid UTF-8: {:?}", raw)))?;

    info!(host = %host, "No receiver URL configured, provisioning endpoint");
    let credentials = ApiCredentials::from_env()?;
    let client = ProvisionClient::new(&config.provision, credentials)?;
    Ok(client.resolve_receiver_url(&host).await?)
}
