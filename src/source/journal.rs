use super::{LogSource, ResumeMode, SourceError};
use crate::config::types::SourceConfig;
use async_trait::async_trait;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

const SINCE_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Reads the systemd journal through `journalctl`
#[derive(Debug, Clone)]
pub struct JournalctlSource {
    program: String,
    grep: Option<String>,
}

impl JournalctlSource {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            program: config.program.clone(),
            grep: config.grep.clone(),
        }
    }

    /// Command line arguments for a read starting at `mode`
    pub fn args(&self, mode: &ResumeMode) -> Vec<String> {
        let mut args = vec![
            "--output=short-iso-precise".to_string(),
            "--utc".to_string(),
            "--show-cursor".to_string(),
            "--quiet".to_string(),
        ];

        match mode {
            ResumeMode::AfterCursor(cursor) => args.push(format!("--after-cursor={}", cursor)),
            ResumeMode::Since(started_at) => {
                args.push(format!("--since={}", started_at.format(SINCE_FORMAT)))
            }
        }

        if let Some(pattern) = &self.grep {
            args.push(format!("--grep={}", pattern));
        }

        args
    }
}

#[async_trait]
impl LogSource for JournalctlSource {
    async fn read(&self, mode: &ResumeMode) -> Result<Vec<u8>, SourceError> {
        let started = Instant::now();
        let args = self.args(mode);
        debug!(program = %self.program, args = ?args, "Running log source");

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| SourceError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            // journalctl exits non-zero without a message when --grep matched nothing
            if self.grep.is_some() && output.stderr.is_empty() {
                debug!("Log source matched no records");
            } else {
                return Err(SourceError::Exit {
                    program: self.program.clone(),
                    status: output.status,
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
        }

        debug!(
            bytes = output.stdout.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Log source read complete"
        );
        Ok(output.stdout)
    }
}
