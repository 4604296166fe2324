// ABOUTME: The append-only store contract implemented by every storage driver.
// ABOUTME: Appends are optimistic: they succeed only when the caller's expected version is current.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::{Payload, Record, StreamId, Version};

/// Durable, ordered log of records grouped by stream.
///
/// Properties required from implementations:
/// - Append-only: existing records are never rewritten
/// - Ordered: reads return records in commit order
/// - Per-stream versions run 1, 2, 3, ... with no gaps or repeats
/// - The check-write-update sequence of `append` is atomic across all streams
#[async_trait]
pub trait AppendOnlyStore: Send + Sync {
    /// Append a non-empty batch to `stream_id`.
    ///
    /// Fails with [`StoreError::Concurrency`] when `expected_version` is not the
    /// stream's current version (0 for a stream with no records). Nothing is
    /// written in that case.
    async fn append(
        &self,
        stream_id: &StreamId,
        payloads: Vec<Payload>,
        expected_version: Version,
    ) -> Result<Record, StoreError>;

    /// Every record in commit order.
    async fn read_all_records(&self) -> Result<Vec<Record>, StoreError>;

    /// Records of one stream in commit order.
    async fn read_records(&self, stream_id: &StreamId) -> Result<Vec<Record>, StoreError> {
        let records = self.read_all_records().await?;
        Ok(records
            .into_iter()
            .filter(|r| &r.stream_id == stream_id)
            .collect())
    }

    /// Last committed version of the stream, 0 if it has none.
    async fn current_version(&self, stream_id: &StreamId) -> Result<Version, StoreError>;
}
