// ABOUTME: Line-level reading of the JSONL append log: scanning, torn-tail detection, and repair.
// ABOUTME: Shared by driver open, index rebuild, the read paths, and the offline repair command.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use evlog_core::{Record, StoreError, VersionIndex};

/// Result of decoding a whole log image.
#[derive(Debug)]
pub(crate) struct Scan {
    pub records: Vec<Record>,
    pub index: VersionIndex,
    /// Byte length of the prefix made of complete, valid lines.
    pub valid_len: u64,
    /// The last valid record ends at EOF without its newline.
    pub missing_newline: bool,
    /// An undecodable final line with nothing but whitespace after it.
    pub torn_tail: Option<(usize, serde_json::Error)>,
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

/// Decode every line of `bytes`. Blank lines are skipped. A malformed line
/// is tolerated only as the final line (reported in `torn_tail`); anywhere
/// else it fails with [`StoreError::MalformedRecord`]. Version sequences are
/// checked per stream while decoding.
pub(crate) fn scan(bytes: &[u8]) -> Result<Scan, StoreError> {
    let mut records = Vec::new();
    let mut index = VersionIndex::new();
    let mut valid_len = 0u64;
    let mut missing_newline = false;
    let mut torn_tail = None;

    let mut start = 0usize;
    let mut line = 0usize;
    while start < bytes.len() {
        line += 1;
        let (end, next) = match bytes[start..].iter().position(|b| *b == b'\n') {
            Some(offset) => (start + offset, start + offset + 1),
            None => (bytes.len(), bytes.len()),
        };
        let segment = &bytes[start..end];

        if is_blank(segment) {
            if next > end {
                valid_len = next as u64;
            }
            start = next;
            continue;
        }

        match Record::decode_line(segment) {
            Ok(record) => {
                index.replay(&record, line)?;
                records.push(record);
                valid_len = next as u64;
                missing_newline = next == end;
            }
            Err(source) => {
                if !is_blank(&bytes[next..]) {
                    return Err(StoreError::MalformedRecord { line, source });
                }
                torn_tail = Some((line, source));
                break;
            }
        }
        start = next;
    }

    Ok(Scan {
        records,
        index,
        valid_len,
        missing_newline,
        torn_tail,
    })
}

/// Outcome of [`repair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairReport {
    pub kept: usize,
    pub dropped: usize,
}

/// Rewrite a log so that it opens cleanly: keep lines that decode and
/// continue their stream's version sequence, drop everything else.
/// Uses temp file + fsync + rename so a crash never loses the original.
///
/// Must not run while a driver has the log open.
pub fn repair(path: &Path) -> Result<RepairReport, StoreError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut index = VersionIndex::new();
    let mut valid_lines: Vec<String> = Vec::new();
    let mut dropped = 0;

    for (number, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        if is_blank(&line) {
            continue;
        }
        let kept = Record::decode_line(&line)
            .ok()
            .filter(|record| index.replay(record, number + 1).is_ok());
        match (kept, String::from_utf8(line)) {
            (Some(_), Ok(text)) => valid_lines.push(text.trim().to_string()),
            _ => {
                dropped += 1;
                tracing::warn!(line = number + 1, "dropping unreadable log line");
            }
        }
    }

    let tmp_path = path.with_extension("log.tmp");
    let mut tmp_file = File::create(&tmp_path)?;
    for line in &valid_lines {
        writeln!(tmp_file, "{}", line)?;
    }
    tmp_file.sync_all()?;

    fs::rename(&tmp_path, path)?;

    // Best-effort: the rename already happened, so the data is consistent
    // even if the directory fsync fails.
    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    let report = RepairReport {
        kept: valid_lines.len(),
        dropped,
    };
    tracing::info!(path = %path.display(), kept = report.kept, dropped = report.dropped, "repaired log");
    Ok(report)
}
