// src/output.rs
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::document::ResultDocument;

#[async_trait::async_trait]
pub trait OutputSink: Send + Sync {
    async fn write(&self, doc: &ResultDocument) -> Result<()>;
}

/// Pretty JSON on disk. Writes to a sibling temp file, then renames over the
/// target so the dashboard never reads a half-written snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait::async_trait]
impl OutputSink for JsonFileSink {
    async fn write(&self, doc: &ResultDocument) -> Result<()> {
        let body = serde_json::to_vec_pretty(doc).context("serializing snapshot")?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("renaming {} -> {}", tmp.display(), self.path.display()))?;

        tracing::info!(
            path = %self.path.display(),
            indicators = doc.indicators().len(),
            bytes = body.len(),
            "snapshot written"
        );
        Ok(())
    }
}

// --- Test helper ---
pub struct MemorySink {
    pub docs: std::sync::Mutex<Vec<ResultDocument>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            docs: std::sync::Mutex::new(vec![]),
        }
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl OutputSink for MemorySink {
    async fn write(&self, doc: &ResultDocument) -> Result<()> {
        self.docs
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink mutex poisoned"))?
            .push(doc.clone());
        Ok(())
    }
}
