pub mod batch_store;
pub mod cursor;

pub use batch_store::{BatchStore, BATCH_EXTENSION, BATCH_PREFIX, INITIAL_SEQUENCE};
pub use cursor::{CursorStore, CURSOR_FILENAME};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to scan working directory {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Writes `contents` next to `path` under a hidden temporary name, syncs it and
/// renames it into place, so readers only ever observe complete files. The
/// parent directory is synced afterwards so the rename itself survives a power
/// loss.
pub(crate) async fn write_atomic(path: &std::path::Path, contents: &[u8]) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::File::create(&tmp_path).await.map_err(write_err)?;
    file.write_all(contents).await.map_err(write_err)?;
    file.sync_all().await.map_err(write_err)?;
    drop(file);

    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => std::path::Path::new("."),
    };
    tokio::fs::File::open(dir)
        .await
        .map_err(write_err)?
        .sync_all()
        .await
        .map_err(write_err)
}
