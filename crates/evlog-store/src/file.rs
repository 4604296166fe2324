// ABOUTME: File-backed append-only store: one JSON record per line, fsynced before it is acknowledged.
// ABOUTME: A single writer lock serializes check-write-update so concurrent appends never race.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use evlog_core::{AppendOnlyStore, Payload, Record, StoreError, StreamId, Version, VersionIndex};
use serde::Deserialize;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{RwLock, broadcast};

use crate::jsonl;

fn default_sync() -> bool {
    true
}

/// Construction options for [`FileSystemDriver`].
#[derive(Debug, Clone, Deserialize)]
pub struct DriverConfig {
    /// Log file; created if absent, replayed if present.
    pub filepath: PathBuf,
    /// fsync every append before acknowledging it.
    #[serde(default = "default_sync")]
    pub sync: bool,
}

impl DriverConfig {
    pub fn new(filepath: impl Into<PathBuf>) -> Self {
        Self {
            filepath: filepath.into(),
            sync: true,
        }
    }
}

/// Index and length of the log as recovered from disk.
struct Recovered {
    index: VersionIndex,
    len: u64,
    records: usize,
}

/// Read the log back, cut a torn final line, and terminate an unterminated
/// final record so the next append starts on a fresh line.
async fn recover(file: &mut File, path: &Path) -> Result<Recovered, StoreError> {
    let bytes = fs::read(path).await?;
    let scan = jsonl::scan(&bytes)?;
    let mut len = scan.valid_len;

    if let Some((line, err)) = &scan.torn_tail {
        tracing::warn!(
            path = %path.display(),
            line,
            error = %err,
            dropped_bytes = bytes.len() as u64 - len,
            "truncating torn final line"
        );
        file.set_len(len).await?;
        file.sync_all().await?;
    } else if (bytes.len() as u64) > len {
        // Trailing whitespace only; drop it so lengths stay exact.
        file.set_len(len).await?;
    }

    if scan.missing_newline {
        file.write_all(b"\n").await?;
        file.flush().await?;
        file.sync_data().await?;
        len += 1;
    }

    Ok(Recovered {
        index: scan.index,
        len,
        records: scan.records.len(),
    })
}

/// State owned by the writer lock: the append handle, the version index,
/// and the byte length of the committed log.
struct LogWriter {
    path: PathBuf,
    file: File,
    index: VersionIndex,
    len: u64,
    sync: bool,
    /// Set when a failed write leaves the on-disk state uncertain. The index
    /// is rebuilt from the log before it is trusted again.
    stale: bool,
}

impl LogWriter {
    async fn append(
        &mut self,
        stream_id: StreamId,
        payloads: Vec<Payload>,
        expected_version: Version,
    ) -> Result<Record, StoreError> {
        if self.stale {
            self.rebuild().await?;
        }

        let version = self.index.check(&stream_id, expected_version)?;
        let record = Record::new(stream_id, payloads, version);
        let line = record.encode_line().map_err(StoreError::Encode)?;

        if let Err(err) = self.write_line(line.as_bytes()).await {
            self.rollback().await;
            return Err(err.into());
        }

        self.len += line.len() as u64;
        self.index.commit(&record);

        tracing::debug!(
            stream_id = %record.stream_id,
            version = record.version,
            payloads = record.data.len(),
            bytes = line.len(),
            "appended record"
        );
        Ok(record)
    }

    async fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.file.write_all(line).await?;
        self.file.flush().await?;
        if self.sync {
            self.file.sync_data().await?;
        }
        Ok(())
    }

    /// Cut the log back to the last committed length after a failed write.
    async fn rollback(&mut self) {
        self.stale = true;
        if let Err(err) = self.file.set_len(self.len).await {
            tracing::error!(
                path = %self.path.display(),
                error = %err,
                "failed to roll back partial append"
            );
        }
    }

    async fn rebuild(&mut self) -> Result<(), StoreError> {
        tracing::warn!(path = %self.path.display(), "rebuilding version index from log");
        let recovered = recover(&mut self.file, &self.path).await?;
        self.index = recovered.index;
        self.len = recovered.len;
        self.stale = false;
        Ok(())
    }
}

/// Durable append-only store backed by a single newline-delimited JSON file.
///
/// The log is the source of truth; the version index is rebuilt from it on
/// open. All appends, across every stream, go through one writer lock.
pub struct FileSystemDriver {
    path: PathBuf,
    writer: Arc<RwLock<LogWriter>>,
    events: broadcast::Sender<Record>,
}

impl FileSystemDriver {
    /// Open (or create) the log at `config.filepath` and replay it into the
    /// version index. Parent directories are created as needed.
    ///
    /// A torn final line is truncated with a warning. Corruption anywhere
    /// else fails with [`StoreError::MalformedRecord`] or
    /// [`StoreError::VersionGap`].
    pub async fn open(config: DriverConfig) -> Result<Self, StoreError> {
        let path = config.filepath;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let recovered = recover(&mut file, &path).await?;
        if recovered.index.is_empty() {
            tracing::info!(path = %path.display(), "opened empty event log");
        } else {
            tracing::info!(
                path = %path.display(),
                records = recovered.records,
                streams = recovered.index.len(),
                "opened event log"
            );
        }

        let (events, _) = broadcast::channel(256);
        let writer = LogWriter {
            path: path.clone(),
            file,
            index: recovered.index,
            len: recovered.len,
            sync: config.sync,
            stale: false,
        };

        Ok(Self {
            path,
            writer: Arc::new(RwLock::new(writer)),
            events,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Receive every record committed after this call, in commit order.
    pub fn subscribe(&self) -> broadcast::Receiver<Record> {
        self.events.subscribe()
    }

    /// Known streams and their current versions, sorted by stream id.
    pub async fn stream_ids(&self) -> Result<Vec<(StreamId, Version)>, StoreError> {
        {
            let writer = self.writer.read().await;
            if !writer.stale {
                return Ok(writer.index.streams());
            }
        }
        let mut writer = self.writer.write().await;
        if writer.stale {
            writer.rebuild().await?;
        }
        Ok(writer.index.streams())
    }
}

#[async_trait]
impl AppendOnlyStore for FileSystemDriver {
    async fn append(
        &self,
        stream_id: &StreamId,
        payloads: Vec<Payload>,
        expected_version: Version,
    ) -> Result<Record, StoreError> {
        if payloads.is_empty() {
            return Err(StoreError::EmptyBatch(stream_id.clone()));
        }

        // The critical section runs on its own task so a caller dropping
        // this future cannot interrupt it between write and index update.
        let writer = Arc::clone(&self.writer);
        let events = self.events.clone();
        let stream_id = stream_id.clone();
        let task = tokio::spawn(async move {
            let mut writer = writer.write().await;
            let record = writer.append(stream_id, payloads, expected_version).await?;
            // No subscribers is fine.
            let _ = events.send(record.clone());
            Ok::<_, StoreError>(record)
        });

        task.await.map_err(|err| StoreError::Io(io::Error::other(err)))?
    }

    async fn read_all_records(&self) -> Result<Vec<Record>, StoreError> {
        // Shared lock: no append is mid-write while we read.
        let _writer = self.writer.read().await;
        let bytes = fs::read(&self.path).await?;
        let scan = jsonl::scan(&bytes)?;
        if let Some((line, source)) = scan.torn_tail {
            return Err(StoreError::MalformedRecord { line, source });
        }
        Ok(scan.records)
    }

    async fn current_version(&self, stream_id: &StreamId) -> Result<Version, StoreError> {
        {
            let writer = self.writer.read().await;
            if !writer.stale {
                return Ok(writer.index.current(stream_id));
            }
        }
        let mut writer = self.writer.write().await;
        if writer.stale {
            writer.rebuild().await?;
        }
        Ok(writer.index.current(stream_id))
    }
}
