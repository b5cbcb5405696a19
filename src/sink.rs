use crate::client::ResultSink;
use crate::errors::SimError;
use crate::metrics::MetricsBundle;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Keeps every stored bundle in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    bundles: Mutex<Vec<MetricsBundle>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn bundles(&self) -> Vec<MetricsBundle> {
        self.bundles.lock().await.clone()
    }

    pub async fn last(&self) -> Option<MetricsBundle> {
        self.bundles.lock().await.last().cloned()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn store(&self, bundle: &MetricsBundle) -> Result<(), SimError> {
        self.bundles.lock().await.push(bundle.clone());
        Ok(())
    }
}

/// Writes the bundle as pretty-printed JSON, replacing any existing file.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ResultSink for JsonFileSink {
    async fn store(&self, bundle: &MetricsBundle) -> Result<(), SimError> {
        let json = serde_json::to_vec_pretty(bundle).map_err(|e| SimError::Sink(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| SimError::Sink(format!("{}: {}", self.path.display(), e)))?;
        tracing::info!(path = %self.path.display(), steps = bundle.len(), "Metrics bundle saved.");
        Ok(())
    }
}
