//! Result sinks
//!
//! Where successful extractions go so an independent viewer can pick them
//! up later.

use crate::types::ExtractedText;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Destination for successful extractions
pub trait ResultSink: Send {
    fn store(&mut self, result: &ExtractedText) -> Result<()>;

    fn clear(&mut self) -> Result<()>;
}

/// Shared in-memory slot holding the latest result
///
/// Clones share the same slot, so one clone can be handed to the reader and
/// another kept by a polling consumer.
#[derive(Debug, Clone, Default)]
pub struct MemoryResultStore {
    slot: Arc<Mutex<Option<ExtractedText>>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<ExtractedText> {
        self.slot.lock().map(|slot| slot.clone()).unwrap_or(None)
    }
}

impl ResultSink for MemoryResultStore {
    fn store(&mut self, result: &ExtractedText) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("result store lock poisoned"))?;
        *slot = Some(result.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("result store lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

/// Latest result persisted as a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored result; a missing file means nothing is stored
    pub fn load(&self) -> Result<Option<ExtractedText>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let result = serde_json::from_str(&json)
            .with_context(|| format!("Corrupt result file {}", self.path.display()))?;
        Ok(Some(result))
    }
}

impl ResultSink for JsonFileStore {
    fn store(&mut self, result: &ExtractedText) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(result)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove {}", self.path.display()))
            }
        }
    }
}
