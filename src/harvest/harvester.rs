//! One harvest cycle: reconcile, read, split, compress, persist, commit.
//!
//! The cursor is the only commit point. It is overwritten after every batch
//! of the cycle is on disk, so a failure anywhere before that leaves the old
//! cursor in place and the same records are read again on the next tick.
//! Batch files already written by the failed attempt are harmless: the next
//! reconcile finds them and they are delivered before anything new is read.

use super::batcher::Batcher;
use crate::codec::Codec;
use crate::runtime::EngineContext;
use crate::source::{parse_output, LogSource, ProtocolError, ResumeMode, SourceError};
use crate::storage::{CursorStore, StoreError, INITIAL_SEQUENCE};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("log source error: {0}")]
    Source(#[from] SourceError),

    #[error("malformed log source output: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("compression failed: {0}")]
    Compress(#[source] std::io::Error),

    #[error("persist error: {0}")]
    Persist(#[from] StoreError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, HarvestError>;

/// What a harvest cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Undelivered batches exist, nothing was read
    Backpressure { pending: usize },
    /// The source produced no output at all, cursor unchanged
    NoOutput,
    /// Batches persisted and cursor advanced
    Committed {
        lines: usize,
        batches: Vec<PathBuf>,
        cursor: String,
    },
}

pub struct Harvester {
    ctx: EngineContext,
    source: Arc<dyn LogSource>,
    codec: Arc<dyn Codec>,
    cursor: CursorStore,
    batch_size: usize,
    started_at: DateTime<Utc>,
    sequence: u64,
}

impl Harvester {
    pub fn new(
        ctx: EngineContext,
        source: Arc<dyn LogSource>,
        codec: Arc<dyn Codec>,
        cursor: CursorStore,
        batch_size: usize,
    ) -> Self {
        Self {
            ctx,
            source,
            codec,
            cursor,
            batch_size,
            started_at: Utc::now(),
            sequence: INITIAL_SEQUENCE,
        }
    }

    /// Lower bound used for the first read when no cursor is stored
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Brings the delivery queue in line with the batch files on disk: pending
    /// entries whose file is gone are dropped, then every file not already
    /// tracked is appended in sequence order. Returns the number of batch
    /// files found.
    pub async fn reconcile(&self) -> Result<usize> {
        let on_disk = self.ctx.batches.scan().await?;
        let found = on_disk.len();

        let dropped = self.ctx.queue.retain_existing(&on_disk);
        if dropped > 0 {
            debug!(dropped = dropped, "Dropped queue entries without a batch file");
        }

        for batch in on_disk {
            if self.ctx.queue.enqueue(batch.clone()) {
                info!(batch = %batch.display(), "Queued undelivered batch found on disk");
            }
        }

        Ok(found)
    }

    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let started = Instant::now();

        let found = self.reconcile().await?;
        // an upload still running may hold a name this cycle is about to reuse
        let pending = found.max(self.ctx.queue.in_flight());
        if pending > 0 {
            debug!(pending = pending, "Undelivered batches outstanding, skipping read");
            return Ok(CycleOutcome::Backpressure { pending });
        }

        let mode = match self.cursor.load().await? {
            Some(cursor) => ResumeMode::AfterCursor(cursor),
            None => ResumeMode::Since(self.started_at),
        };
        let raw = self.source.read(&mode).await?;
        if raw.is_empty() {
            debug!("Log source produced no output");
            return Ok(CycleOutcome::NoOutput);
        }

        let result = self.commit_output(&raw).await;
        self.sequence = INITIAL_SEQUENCE;

        if let Ok(CycleOutcome::Committed { lines, batches, .. }) = &result {
            debug!(
                lines = lines,
                batches = batches.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Harvest cycle committed"
            );
        }
        result
    }

    async fn commit_output(&mut self, raw: &[u8]) -> Result<CycleOutcome> {
        let output = parse_output(raw)?;
        let lines = output.lines.len();
        info!(lines = lines, bytes = raw.len(), "Read records from log source");

        let mut batcher = Batcher::new(self.batch_size);
        let mut batches = Vec::new();
        for line in &output.lines {
            if let Some(batch) = batcher.push(line) {
                batches.push(self.persist(batch).await?);
            }
        }
        if let Some(batch) = batcher.finish() {
            batches.push(self.persist(batch).await?);
        }

        self.cursor.save(&output.cursor).await?;
        self.ctx.stats.record_lines(lines as u64);

        Ok(CycleOutcome::Committed {
            lines,
            batches,
            cursor: output.cursor,
        })
    }

    async fn persist(&mut self, data: Vec<u8>) -> Result<PathBuf> {
        self.sequence += 1;
        let raw_len = data.len();

        let codec = Arc::clone(&self.codec);
        let compressed = tokio::task::spawn_blocking(move || codec.encode(&data))
            .await?
            .map_err(HarvestError::Compress)?;

        let path = self.ctx.batches.write(self.sequence, &compressed).await?;
        debug!(
            batch = %path.display(),
            raw_bytes = raw_len,
            compressed_bytes = compressed.len(),
            ratio = %format!("{:.2}", raw_len as f64 / compressed.len().max(1) as f64),
            "Batch file created"
        );

        self.ctx.queue.enqueue(path.clone());
        self.ctx.stats.record_batch_written();
        Ok(path)
    }
}
