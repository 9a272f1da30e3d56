//! Audit trail for batch completions.
//!
//! One line per completed job, appended to a plain text file:
//! `[2024-05-01T12:00:00.000Z] Job <id> marked as completed.`

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::StorageError;

/// Append-only sink for audit lines.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append all `lines` in order. Each line is written newline-terminated.
    async fn append(&self, lines: &[String]) -> Result<(), StorageError>;
}

/// Format the audit line for one completed job.
pub fn completion_line(at: DateTime<Utc>, job_id: Uuid) -> String {
    format!(
        "[{}] Job {} marked as completed.",
        at.to_rfc3339_opts(SecondsFormat::Millis, true),
        job_id
    )
}

/// Audit log kept in a text file. Created on first append.
#[derive(Debug, Clone)]
pub struct FileAuditLog {
    path: PathBuf,
}

impl FileAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AuditSink for FileAuditLog {
    async fn append(&self, lines: &[String]) -> Result<(), StorageError> {
        if lines.is_empty() {
            return Ok(());
        }

        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let mut buf = lines.join("\n");
        buf.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io_err)?;
        file.write_all(buf.as_bytes()).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        Ok(())
    }
}
