//! Pending delivery units on disk.
//!
//! Every batch is a single file named `batch-<seq>.zst.jfwd` in the working
//! directory. The naming is what crash recovery relies on: a directory scan is
//! the only way leftover batches are found again after a restart, and an empty
//! scan is what tells the harvester that all previous output was delivered.

use super::{write_atomic, Result, StoreError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name prefix shared by all batch files
pub const BATCH_PREFIX: &str = "batch-";

/// File name suffix shared by all batch files
pub const BATCH_EXTENSION: &str = ".zst.jfwd";

/// Base of the per-cycle sequence counter. The first batch of a cycle is
/// `INITIAL_SEQUENCE + 1`, which keeps every name the same width.
pub const INITIAL_SEQUENCE: u64 = 1_000_000;

#[derive(Debug, Clone)]
pub struct BatchStore {
    dir: PathBuf,
}

impl BatchStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the batch with the given sequence number
    pub fn path_for(&self, sequence: u64) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", BATCH_PREFIX, sequence, BATCH_EXTENSION))
    }

    /// Extracts the sequence number from a batch location, or `None` if the
    /// file name doesn't follow the batch naming scheme.
    pub fn sequence_of(path: &Path) -> Option<u64> {
        let name = path.file_name()?.to_str()?;
        name.strip_prefix(BATCH_PREFIX)?
            .strip_suffix(BATCH_EXTENSION)?
            .parse()
            .ok()
    }

    /// Lists every batch file in the working directory, ordered by sequence
    /// number. Leftover temporary files from an interrupted write are removed,
    /// their cycle never committed its cursor so the data will be read again.
    pub async fn scan(&self) -> Result<Vec<PathBuf>> {
        let scan_err = |source| StoreError::Scan {
            path: self.dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(scan_err)?;
        let mut found = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(scan_err)? {
            let path = entry.path();
            if let Some(sequence) = Self::sequence_of(&path) {
                found.push((sequence, path));
            } else if is_stale_batch_tmp(&path) {
                debug!(path = %path.display(), "Removing partial batch file");
                self.remove(&path).await?;
            }
        }

        found.sort_by_key(|(sequence, _)| *sequence);
        Ok(found.into_iter().map(|(_, path)| path).collect())
    }

    /// Durably writes a batch payload and returns its location
    pub async fn write(&self, sequence: u64, payload: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(sequence);
        write_atomic(&path, payload).await?;
        Ok(path)
    }

    /// Deletes a batch file. Returns `false` if it was already gone.
    pub async fn remove(&self, path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Remove {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

fn is_stale_batch_tmp(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix('.'))
        .and_then(|n| n.strip_suffix(".tmp"))
        .map(|n| BatchStore::sequence_of(Path::new(n)).is_some())
        .unwrap_or(false)
}
