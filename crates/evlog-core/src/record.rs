// ABOUTME: Defines the persisted record and its one-line JSON encoding for the append log.
// ABOUTME: A record is a batch of opaque payloads appended to one stream, stamped with a version.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of accepted appends to a stream. 0 means the stream has no records.
pub type Version = u64;

/// Caller-supplied content. The store never looks inside it.
pub type Payload = serde_json::Value;

/// Opaque, caller-chosen name of a logical stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for StreamId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for StreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One accepted append: the payload batch plus the stream version it produced.
///
/// Field order here is the field order on disk:
/// `{"streamId":...,"data":[...],"version":N}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Record {
    #[serde(rename = "streamId")]
    pub stream_id: StreamId,
    pub data: Vec<Payload>,
    pub version: Version,
}

impl Record {
    pub fn new(stream_id: StreamId, data: Vec<Payload>, version: Version) -> Self {
        Self {
            stream_id,
            data,
            version,
        }
    }

    /// Serialize as a single JSON line, including the trailing newline.
    /// serde_json escapes control characters inside strings, so the only
    /// newline in the output is the terminator.
    pub fn encode_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Parse one line of the log. Surrounding whitespace, including the
    /// line terminator, is ignored. Invalid UTF-8 is a decode error.
    pub fn decode_line(line: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(line)
    }
}
