//! Lap persistence collaborators

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::types::LapRecord;
use crate::{Result, TimingError};

/// Error type returned by lap stores.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Destination for captured laps.
///
/// Submissions are independent: one failing record says nothing about the
/// next one.
#[async_trait]
pub trait LapStore: Send + Sync {
    async fn submit(&self, record: &LapRecord) -> std::result::Result<(), StoreError>;
}

/// Keeps submitted laps in memory.
#[derive(Debug, Default)]
pub struct MemoryLapStore {
    records: Mutex<Vec<LapRecord>>,
}

impl MemoryLapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in submission order.
    pub async fn records(&self) -> Vec<LapRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl LapStore for MemoryLapStore {
    async fn submit(&self, record: &LapRecord) -> std::result::Result<(), StoreError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}

/// Appends one JSON object per lap to a file.
#[derive(Debug)]
pub struct JsonlLapStore {
    path: PathBuf,
    // Serializes appends from concurrent submitters.
    write: Mutex<()>,
}

impl JsonlLapStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every record in the file. A missing file holds no laps.
    pub async fn load(&self) -> Result<Vec<LapRecord>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TimingError::io_error(&self.path, e)),
        };

        text.lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|e| {
                    TimingError::decode(format!("{} line {}", self.path.display(), i + 1), e.to_string())
                })
            })
            .collect()
    }
}

#[async_trait]
impl LapStore for JsonlLapStore {
    async fn submit(&self, record: &LapRecord) -> std::result::Result<(), StoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write.lock().await;
        let mut file =
            tokio::fs::OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!("Appended lap {}ms to {}", record.time, self.path.display());
        Ok(())
    }
}
