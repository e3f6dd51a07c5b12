//! Append-only JSON array log file.
//!
//! # Responsibilities
//! - Keep the log file a valid JSON array at rest
//! - Append records in place by overwriting the closing `\n]`
//! - Load every complete record in append order
//! - Repair a crash-truncated tail when the store is opened
//!
//! # Design Decisions
//! - The file always ends in exactly `\n]` between operations; an empty
//!   corpus is the literal `[\n]`
//! - Each append is a single buffer written at a fixed offset, so a failed
//!   write is rolled back by truncating to the previous length
//! - Appends and snapshot reads share one mutex

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::de;
use thiserror::Error;

use crate::config::LogStoreConfig;
use crate::ledger::record::LogRecord;

const EMPTY_ARRAY: &[u8] = b"[\n]";
const CLOSE: &[u8] = b"\n]";
const SEPARATOR: &[u8] = b",\n";

/// Errors raised by the log store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The file is not a JSON array of log records.
    #[error("Malformed log file at byte {offset}: {source}")]
    Malformed {
        offset: usize,
        #[source]
        source: serde_json::Error,
    },

    /// The file no longer ends in `\n]`; something outside the store touched it.
    #[error("Log file tail is not a closed array (length {len})")]
    CorruptTail { len: u64 },
}

struct Inner {
    file: File,
    is_first: bool,
}

/// Durable, append-only store for the request log.
pub struct LogStore {
    path: PathBuf,
    sync_on_append: bool,
    inner: Mutex<Inner>,
}

impl LogStore {
    /// Open the store described by the config section.
    pub fn from_config(config: &LogStoreConfig) -> Result<Self, StorageError> {
        let mut store = Self::open(&config.path)?;
        store.sync_on_append = config.sync_on_append;
        Ok(store)
    }

    /// Open (or create) the log file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        let is_first = if buf.iter().all(u8::is_ascii_whitespace) {
            file.set_len(0)?;
            write_at(&mut file, 0, EMPTY_ARRAY, true)?;
            tracing::info!(path = %path.display(), "Initialized empty log file");
            true
        } else {
            let scan = scan(&buf)?;
            if !scan.complete || !buf.ends_with(CLOSE) {
                tracing::warn!(
                    path = %path.display(),
                    kept_records = scan.records.len(),
                    dropped_bytes = buf.len() - scan.tail,
                    "Repairing log file tail"
                );
                file.set_len(scan.tail as u64)?;
                write_at(&mut file, scan.tail as u64, CLOSE, true)?;
            }
            tracing::info!(
                path = %path.display(),
                records = scan.records.len(),
                "Opened log file"
            );
            scan.records.is_empty()
        };

        Ok(Self {
            path,
            sync_on_append: false,
            inner: Mutex::new(Inner { file, is_first }),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as the new last array element.
    pub fn append(&self, record: &LogRecord) -> Result<(), StorageError> {
        let body = serde_json::to_vec_pretty(record)?;

        let mut inner = self.lock();
        let len = inner.file.metadata()?.len();
        if len < EMPTY_ARRAY.len() as u64 {
            return Err(StorageError::CorruptTail { len });
        }

        let mut tail = [0u8; 2];
        inner.file.seek(SeekFrom::Start(len - 2))?;
        inner.file.read_exact(&mut tail)?;
        if tail != CLOSE {
            return Err(StorageError::CorruptTail { len });
        }

        let (offset, mut buf) = if inner.is_first {
            // Overwrite only the `]` of `[\n]`.
            (len - 1, Vec::with_capacity(body.len() + CLOSE.len()))
        } else {
            let mut buf = Vec::with_capacity(SEPARATOR.len() + body.len() + CLOSE.len());
            buf.extend_from_slice(SEPARATOR);
            (len - 2, buf)
        };
        buf.extend_from_slice(&body);
        buf.extend_from_slice(CLOSE);

        if let Err(e) = write_at(&mut inner.file, offset, &buf, self.sync_on_append) {
            if let Err(rollback) = restore_tail(&mut inner.file, len) {
                tracing::error!(
                    path = %self.path.display(),
                    error = %rollback,
                    "Failed to roll back partial append"
                );
            }
            return Err(e.into());
        }

        inner.is_first = false;
        Ok(())
    }

    /// Snapshot of every complete record, in append order.
    pub fn load_all(&self) -> Result<Vec<LogRecord>, StorageError> {
        let mut inner = self.lock();
        let mut buf = Vec::new();
        inner.file.seek(SeekFrom::Start(0))?;
        inner.file.read_to_end(&mut buf)?;
        drop(inner);

        if buf.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let scan = scan(&buf)?;
        if !scan.complete {
            tracing::warn!(
                path = %self.path.display(),
                records = scan.records.len(),
                "Log file has an unterminated tail; returning complete records only"
            );
        }
        Ok(scan.records)
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        self.load_all().map(|records| records.len())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        self.len().map(|n| n == 0)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The guarded state stays consistent across a panic: the file is
        // either rolled back or fully appended before the flag flips.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("path", &self.path)
            .field("sync_on_append", &self.sync_on_append)
            .finish()
    }
}

fn write_at(file: &mut File, offset: u64, bytes: &[u8], sync: bool) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)?;
    file.flush()?;
    if sync {
        file.sync_data()?;
    }
    Ok(())
}

fn restore_tail(file: &mut File, len: u64) -> std::io::Result<()> {
    file.set_len(len)?;
    write_at(file, len - 2, CLOSE, true)
}

/// Result of scanning the raw file bytes.
struct Scan {
    records: Vec<LogRecord>,
    /// Byte offset just past the last complete element (or past `[`).
    tail: usize,
    /// Whether the closing `]` was found.
    complete: bool,
}

fn skip_ws(buf: &[u8], mut pos: usize) -> usize {
    while pos < buf.len() && buf[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Parse the array element by element, stopping cleanly at an unterminated tail.
fn scan(buf: &[u8]) -> Result<Scan, StorageError> {
    let mut pos = skip_ws(buf, 0);
    if buf.get(pos) != Some(&b'[') {
        return Err(StorageError::Malformed {
            offset: pos,
            source: de::Error::custom("expected '['"),
        });
    }
    pos += 1;

    let mut records = Vec::new();
    let mut tail = pos;
    let mut after_comma = false;

    loop {
        pos = skip_ws(buf, pos);
        let Some(&byte) = buf.get(pos) else {
            return Ok(Scan { records, tail, complete: false });
        };

        match byte {
            b']' if !after_comma => {
                let end = skip_ws(buf, pos + 1);
                if end != buf.len() {
                    return Err(StorageError::Malformed {
                        offset: end,
                        source: de::Error::custom("trailing bytes after array"),
                    });
                }
                return Ok(Scan { records, tail, complete: true });
            }
            b',' if !after_comma && !records.is_empty() => {
                after_comma = true;
                pos += 1;
            }
            _ if after_comma || records.is_empty() => {
                let mut stream =
                    serde_json::Deserializer::from_slice(&buf[pos..]).into_iter::<LogRecord>();
                match stream.next() {
                    Some(Ok(record)) => {
                        pos += stream.byte_offset();
                        tail = pos;
                        records.push(record);
                        after_comma = false;
                    }
                    Some(Err(e)) if e.is_eof() => {
                        return Ok(Scan { records, tail, complete: false });
                    }
                    Some(Err(e)) => {
                        return Err(StorageError::Malformed {
                            offset: pos,
                            source: e,
                        });
                    }
                    None => return Ok(Scan { records, tail, complete: false }),
                }
            }
            other => {
                return Err(StorageError::Malformed {
                    offset: pos,
                    source: de::Error::custom(format_args!("unexpected byte {:?}", other as char)),
                });
            }
        }
    }
}
