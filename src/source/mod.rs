pub mod journal;
pub mod output;

pub use journal::JournalctlSource;
pub use output::{parse_output, JournalOutput, ProtocolError, CURSOR_MARKER};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Where the next read starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeMode {
    /// No cursor stored yet: everything since the given wall clock time
    Since(DateTime<Utc>),
    /// Everything after the given journal cursor
    AfterCursor(String),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Producer of raw journal output: newline-delimited records followed by a
/// cursor trailer (see [`output`]).
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn read(&self, mode: &ResumeMode) -> Result<Vec<u8>, SourceError>;
}
