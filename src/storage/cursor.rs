use super::{write_atomic, Result, StoreError};
use std::path::{Path, PathBuf};

/// Name of the cursor file inside the working directory
pub const CURSOR_FILENAME: &str = "jforward-cursor";

/// Single-value checkpoint holding the journal cursor of the last record that
/// was durably written to a batch. The file holds the raw token, nothing else.
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(CURSOR_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored cursor, `None` on first run
    pub async fn load(&self) -> Result<Option<String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Overwrites the stored cursor. The previous value survives a crash
    /// during the write.
    pub async fn save(&self, cursor: &str) -> Result<()> {
        write_atomic(&self.path, cursor.as_bytes()).await
    }
}
