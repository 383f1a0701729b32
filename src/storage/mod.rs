//! Prediction record persistence.
//!
//! Records are written fire-and-forget after each request completes and
//! read back in bulk by the periodic weight recompute job. The default
//! backend is an append-only JSONL file; a resolution job outside this
//! service rewrites records once markets resolve.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::types::PredictionRecord;

/// Capability to persist and reload prediction records.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Append one record. Failures here must never fail the request
    /// that produced the record.
    async fn append(&self, record: &PredictionRecord) -> Result<()>;

    /// Load every record, resolved or not.
    async fn load(&self) -> Result<Vec<PredictionRecord>>;
}

/// Append-only JSONL file store, one record per line.
pub struct JsonlStore {
    path: PathBuf,
    /// Serializes appends so concurrent record tasks never interleave
    /// partial lines.
    write_lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl PredictionStore for JsonlStore {
    async fn append(&self, record: &PredictionRecord) -> Result<()> {
        let mut line = serde_json::to_string(record).context("Failed to serialize record")?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .context("Failed to append record")?;
        file.flush().await.context("Failed to flush record")?;

        Ok(())
    }

    async fn load(&self) -> Result<Vec<PredictionRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        let mut records = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PredictionRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    // Skip corrupt lines rather than losing the whole file.
                    warn!(line = number + 1, error = %e, "Skipping malformed record");
                }
            }
        }

        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
