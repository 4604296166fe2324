// ABOUTME: In-memory map from stream to its last committed version.
// ABOUTME: Always derivable by replaying the log; drivers treat it as a cache, never as the truth.

use std::collections::HashMap;

use crate::error::StoreError;
use crate::record::{Record, StreamId, Version};

#[derive(Debug, Default, Clone)]
pub struct VersionIndex {
    versions: HashMap<StreamId, Version>,
}

impl VersionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last committed version of the stream, 0 if it has never been appended to.
    pub fn current(&self, stream_id: &StreamId) -> Version {
        self.versions.get(stream_id).copied().unwrap_or(0)
    }

    /// Validate an optimistic append and return the version it would produce.
    pub fn check(&self, stream_id: &StreamId, expected: Version) -> Result<Version, StoreError> {
        let actual = self.current(stream_id);
        if actual != expected {
            return Err(StoreError::Concurrency {
                stream_id: stream_id.clone(),
                expected,
                actual,
            });
        }
        Ok(actual + 1)
    }

    /// Record a committed append. Only call after the record is on disk.
    pub fn commit(&mut self, record: &Record) {
        self.versions
            .insert(record.stream_id.clone(), record.version);
    }

    /// Apply a record read back from the log, rejecting any break in the
    /// stream's version sequence. `line` is 1-based and only used for errors.
    pub fn replay(&mut self, record: &Record, line: usize) -> Result<(), StoreError> {
        let expected = self.current(&record.stream_id) + 1;
        if record.version != expected {
            return Err(StoreError::VersionGap {
                stream_id: record.stream_id.clone(),
                line,
                expected,
                found: record.version,
            });
        }
        self.commit(record);
        Ok(())
    }

    /// Known streams with their versions, sorted by stream id.
    pub fn streams(&self) -> Vec<(StreamId, Version)> {
        let mut streams: Vec<_> = self
            .versions
            .iter()
            .map(|(id, version)| (id.clone(), *version))
            .collect();
        streams.sort();
        streams
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
