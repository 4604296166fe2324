// ABOUTME: Volatile append-only store with the same contract as the file driver.
// ABOUTME: Lets callers exercise optimistic concurrency without touching the filesystem.

use async_trait::async_trait;
use evlog_core::{AppendOnlyStore, Payload, Record, StoreError, StreamId, Version, VersionIndex};
use tokio::sync::{RwLock, broadcast};

#[derive(Debug, Default)]
struct MemoryLog {
    records: Vec<Record>,
    index: VersionIndex,
}

/// Append-only store held entirely in memory. Contents are lost on drop.
pub struct InMemoryDriver {
    log: RwLock<MemoryLog>,
    events: broadcast::Sender<Record>,
}

impl Default for InMemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDriver {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            log: RwLock::new(MemoryLog::default()),
            events,
        }
    }

    /// Seed the store with existing records, validating each stream's
    /// version sequence as if replaying a log.
    pub fn with_records(records: Vec<Record>) -> Result<Self, StoreError> {
        let mut index = VersionIndex::new();
        for (i, record) in records.iter().enumerate() {
            index.replay(record, i + 1)?;
        }
        let (events, _) = broadcast::channel(256);
        Ok(Self {
            log: RwLock::new(MemoryLog { records, index }),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Record> {
        self.events.subscribe()
    }

    pub async fn stream_ids(&self) -> Vec<(StreamId, Version)> {
        self.log.read().await.index.streams()
    }
}

#[async_trait]
impl AppendOnlyStore for InMemoryDriver {
    async fn append(
        &self,
        stream_id: &StreamId,
        payloads: Vec<Payload>,
        expected_version: Version,
    ) -> Result<Record, StoreError> {
        if payloads.is_empty() {
            return Err(StoreError::EmptyBatch(stream_id.clone()));
        }

        let mut log = self.log.write().await;
        let version = log.index.check(stream_id, expected_version)?;
        let record = Record::new(stream_id.clone(), payloads, version);
        log.index.commit(&record);
        log.records.push(record.clone());
        let _ = self.events.send(record.clone());

        tracing::debug!(stream_id = %record.stream_id, version, "appended record in memory");
        Ok(record)
    }

    async fn read_all_records(&self) -> Result<Vec<Record>, StoreError> {
        Ok(self.log.read().await.records.clone())
    }

    async fn read_records(&self, stream_id: &StreamId) -> Result<Vec<Record>, StoreError> {
        let log = self.log.read().await;
        Ok(log
            .records
            .iter()
            .filter(|r| &r.stream_id == stream_id)
            .cloned()
            .collect())
    }

    async fn current_version(&self, stream_id: &StreamId) -> Result<Version, StoreError> {
        Ok(self.log.read().await.index.current(stream_id))
    }
}
