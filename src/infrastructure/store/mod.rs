//! Append-only record sinks
//!
//! The durable backends write newline-delimited JSON, one self-contained
//! record per line, through a single appending write so that interleaved
//! writers never corrupt a record. In-memory backends back the tests and any
//! deployment that does not care about durability.

use crate::domain::event::{CallEvent, EventLog, EventRecord};
use crate::domain::lead::{Lead, LeadStore};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

async fn append_line(path: &Path, mut line: String) -> Result<(), String> {
    line.push('\n');

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("failed to create {}: {e}", parent.display()))?;
        }
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| format!("failed to open {}: {e}", path.display()))?;

    file.write_all(line.as_bytes())
        .await
        .map_err(|e| format!("failed to append to {}: {e}", path.display()))?;
    file.flush()
        .await
        .map_err(|e| format!("failed to flush {}: {e}", path.display()))
}

/// Durable lead sink: one JSON line per captured lead
pub struct JsonlLeadStore {
    path: PathBuf,
}

impl JsonlLeadStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl LeadStore for JsonlLeadStore {
    async fn append(&self, lead: &Lead) -> Result<(), String> {
        let line =
            serde_json::to_string(lead).map_err(|e| format!("failed to encode lead: {e}"))?;
        append_line(&self.path, line).await
    }
}

/// Durable event sink: one JSON line per operational event
pub struct JsonlEventLog {
    path: PathBuf,
}

impl JsonlEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl EventLog for JsonlEventLog {
    async fn append(&self, event: CallEvent) -> Result<(), String> {
        let record = EventRecord::now(event);
        let line =
            serde_json::to_string(&record).map_err(|e| format!("failed to encode event: {e}"))?;
        append_line(&self.path, line).await
    }
}

/// In-memory lead sink
#[derive(Default)]
pub struct MemoryLeadStore {
    leads: RwLock<Vec<Lead>>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<Lead> {
        self.leads.read().await.clone()
    }
}

#[async_trait::async_trait]
impl LeadStore for MemoryLeadStore {
    async fn append(&self, lead: &Lead) -> Result<(), String> {
        self.leads.write().await.push(lead.clone());
        Ok(())
    }
}

/// In-memory event sink
#[derive(Default)]
pub struct MemoryEventLog {
    records: RwLock<Vec<EventRecord>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<EventRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait::async_trait]
impl EventLog for MemoryEventLog {
    async fn append(&self, event: CallEvent) -> Result<(), String> {
        let record = EventRecord::now(event);
        self.records.write().await.push(record);
        Ok(())
    }
}
