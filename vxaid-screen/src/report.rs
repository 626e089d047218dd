//! Report saving
//!
//! Writes PDF bytes returned by the backend into the report directory under a
//! unique `VisionXaid_Report_<millis>.pdf` name.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const REPORT_PREFIX: &str = "VisionXaid_Report_";
pub const REPORT_EXTENSION: &str = "pdf";

/// Upper bound on collision suffixes tried for one timestamp
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Report saving errors
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Backend returned an empty report")]
    Empty,

    #[error("Failed to save report to {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No free report file name in {}", .0.display())]
    NameExhausted(PathBuf),
}

/// `VisionXaid_Report_<unix millis>.pdf`
pub fn report_file_name(at: DateTime<Utc>) -> String {
    format!("{}{}.{}", REPORT_PREFIX, at.timestamp_millis(), REPORT_EXTENSION)
}

/// Saves reports into one directory
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save `bytes` under a fresh name stamped with the current time
    pub async fn save(&self, bytes: &[u8]) -> Result<PathBuf, ReportError> {
        self.save_at(bytes, Utc::now()).await
    }

    /// Save `bytes` under a name stamped with `at`
    ///
    /// Content goes to a hidden temporary file first and is renamed into
    /// place, so a failed write leaves nothing behind under the report name.
    pub async fn save_at(&self, bytes: &[u8], at: DateTime<Utc>) -> Result<PathBuf, ReportError> {
        if bytes.is_empty() {
            return Err(ReportError::Empty);
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ReportError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let target = self.free_path(at).await?;
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let temp = self.dir.join(format!(".{file_name}.part"));

        if let Err(source) = tokio::fs::write(&temp, bytes).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(ReportError::Io { path: temp, source });
        }

        if let Err(source) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(ReportError::Io {
                path: target,
                source,
            });
        }

        info!(path = %target.display(), size = bytes.len(), "Report saved");
        Ok(target)
    }

    /// Delete a report this writer saved
    pub async fn remove(&self, path: &Path) -> Result<(), ReportError> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|source| ReportError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), "Report removed");
        Ok(())
    }

    /// First unused name for `at`, suffixing `_1`, `_2`, ... on collision
    async fn free_path(&self, at: DateTime<Utc>) -> Result<PathBuf, ReportError> {
        let base = format!("{}{}", REPORT_PREFIX, at.timestamp_millis());

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                report_file_name(at)
            } else {
                format!("{base}_{attempt}.{REPORT_EXTENSION}")
            };
            let candidate = self.dir.join(name);

            let exists = tokio::fs::try_exists(&candidate)
                .await
                .map_err(|source| ReportError::Io {
                    path: candidate.clone(),
                    source,
                })?;
            if !exists {
                return Ok(candidate);
            }
            debug!(path = %candidate.display(), "Report name taken");
        }

        Err(ReportError::NameExhausted(self.dir.clone()))
    }
}
