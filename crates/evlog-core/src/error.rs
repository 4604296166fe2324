// ABOUTME: Error taxonomy shared by every append-only store driver.
// ABOUTME: Separates version conflicts from storage failures and log corruption.

use thiserror::Error;

use crate::record::{StreamId, Version};

/// Errors returned by store operations. None of them are retried by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The caller's expected version no longer matches the stream.
    #[error("Expected stream {stream_id} to be {expected}, got {actual}")]
    Concurrency {
        stream_id: StreamId,
        expected: Version,
        actual: Version,
    },

    #[error("cannot append an empty batch to stream {0}")]
    EmptyBatch(StreamId),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record at line {line}: {source}")]
    MalformedRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A decodable line whose version breaks the 1, 2, 3, ... sequence of its stream.
    #[error("stream {stream_id} expected version {expected} at line {line}, found {found}")]
    VersionGap {
        stream_id: StreamId,
        line: usize,
        expected: Version,
        found: Version,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StoreError {
    /// True for optimistic concurrency conflicts, which callers may retry
    /// after refreshing the stream version.
    pub fn is_concurrency(&self) -> bool {
        matches!(self, StoreError::Concurrency { .. })
    }
}
