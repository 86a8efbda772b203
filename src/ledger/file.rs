//! File-backed Operation Ledger
//!
//! One line per entry: `<crc32 hex>\t<json>\n`. Every append is fsynced
//! before it is acknowledged.
//!
//! On open:
//! - a final line without its newline is a torn write and is truncated
//! - a complete line whose checksum does not match is corruption and
//!   refuses to open
//!
//! Another process may append between our calls (a one-shot CLI command
//! next to a running server). Every call re-reads the file when its length
//! no longer matches what this handle has seen. Appends themselves are
//! serialized by the transition state lock.
//!
//! An append that fails is cut back off the file before the error is
//! returned, and a partial line left by a dead writer is cut before the
//! next append. Only acknowledged entries ever reach a reader.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use crc32fast::Hasher;
use tracing::{info, warn};
use uuid::Uuid;

use super::entry::{select_range, NewOperation, OperationLogEntry};
use super::OperationLedger;
use crate::errors::{HaError, HaResult};
use crate::sync::lock;

const LEDGER_FILE_NAME: &str = "operations.log";

fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

struct Inner {
    file: File,
    entries: Vec<OperationLogEntry>,
    next_id: u64,
    /// File length covered by `entries`
    synced_len: u64,
}

impl Inner {
    fn refresh(&mut self, path: &Path) -> HaResult<()> {
        let len = fs::metadata(path)
            .map_err(|e| HaError::Storage(format!("failed to stat ledger: {}", e)))?
            .len();
        if len == self.synced_len {
            return Ok(());
        }
        let (entries, complete_len) = load(path, false)?;
        self.next_id = next_id(&entries);
        self.entries = entries;
        self.synced_len = complete_len;
        Ok(())
    }

    /// Cut a partial line left by a writer that died mid-append. Only
    /// called under the append path, where appends are serialized.
    fn discard_partial_tail(&mut self, path: &Path) -> HaResult<()> {
        let len = self
            .file
            .metadata()
            .map_err(|e| HaError::Storage(format!("failed to stat ledger: {}", e)))?
            .len();
        if len > self.synced_len {
            warn!(
                path = %path.display(),
                torn_bytes = len - self.synced_len,
                "discarding partial ledger line"
            );
            self.truncate_to_synced()?;
        }
        Ok(())
    }

    fn write_line(&mut self, line: &[u8]) -> HaResult<()> {
        self.file
            .write_all(line)
            .map_err(|e| HaError::Storage(format!("failed to write ledger entry: {}", e)))?;
        self.file
            .sync_data()
            .map_err(|e| HaError::Storage(format!("failed to fsync ledger: {}", e)))
    }

    fn truncate_to_synced(&mut self) -> HaResult<()> {
        self.file
            .set_len(self.synced_len)
            .and_then(|()| self.file.sync_data())
            .map_err(|e| HaError::Storage(format!("failed to roll back ledger: {}", e)))
    }
}

fn next_id(entries: &[OperationLogEntry]) -> u64 {
    entries.iter().map(|e| e.id).max().unwrap_or(0) + 1
}

/// Durable append-only ledger
pub struct FileLedger {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl FileLedger {
    /// Open (or create) the ledger under `data_dir/ledger`.
    pub fn open(data_dir: &Path) -> HaResult<Self> {
        let dir = data_dir.join("ledger");
        fs::create_dir_all(&dir).map_err(|e| {
            HaError::Storage(format!("failed to create ledger directory: {}", e))
        })?;
        let path = dir.join(LEDGER_FILE_NAME);

        let (entries, synced_len) = if path.exists() {
            load(&path, true)?
        } else {
            (Vec::new(), 0)
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| HaError::Storage(format!("failed to open ledger: {}", e)))?;

        info!(path = %path.display(), entries = entries.len(), "ledger opened");

        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                file,
                next_id: next_id(&entries),
                entries,
                synced_len,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OperationLedger for FileLedger {
    fn append(&self, op: NewOperation) -> HaResult<OperationLogEntry> {
        let mut inner = lock(&self.inner);
        inner.refresh(&self.path)?;
        inner.discard_partial_tail(&self.path)?;
        let entry = op.into_entry(inner.next_id);

        let json = serde_json::to_string(&entry)?;
        let line = format!("{:08x}\t{}\n", compute_checksum(json.as_bytes()), json);

        if let Err(e) = inner.write_line(line.as_bytes()) {
            // The caller is told this entry does not exist; make it so
            if let Err(rollback) = inner.truncate_to_synced() {
                warn!(error = %rollback, "ledger rollback after failed append failed");
            }
            return Err(e);
        }

        inner.next_id += 1;
        inner.synced_len += line.len() as u64;
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    fn query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> HaResult<Vec<OperationLogEntry>> {
        let mut inner = lock(&self.inner);
        inner.refresh(&self.path)?;
        Ok(select_range(&inner.entries, start, end))
    }

    fn find_attempt(&self, attempt_id: Uuid) -> HaResult<Option<OperationLogEntry>> {
        let mut inner = lock(&self.inner);
        inner.refresh(&self.path)?;
        Ok(inner
            .entries
            .iter()
            .find(|e| e.attempt_id == Some(attempt_id))
            .cloned())
    }
}

/// Read every complete line. Returns the entries and the length they cover.
///
/// With `truncate_torn`, a trailing partial line is cut from the file.
/// Otherwise it is ignored; it may be another process mid-append.
fn load(path: &Path, truncate_torn: bool) -> HaResult<(Vec<OperationLogEntry>, u64)> {
    let bytes = fs::read(path)?;
    let complete_len = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);

    if truncate_torn && complete_len < bytes.len() {
        warn!(
            path = %path.display(),
            torn_bytes = bytes.len() - complete_len,
            "truncating torn ledger tail"
        );
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(complete_len as u64)?;
        file.sync_all()?;
    }

    let content = std::str::from_utf8(&bytes[..complete_len])
        .map_err(|e| HaError::LedgerCorrupted(format!("ledger is not UTF-8: {}", e)))?;

    let entries = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .map(|(n, line)| parse_line(n + 1, line))
        .collect::<HaResult<Vec<_>>>()?;
    Ok((entries, complete_len as u64))
}

fn parse_line(line_no: usize, line: &str) -> HaResult<OperationLogEntry> {
    let (crc_hex, json) = line
        .split_once('\t')
        .ok_or_else(|| HaError::LedgerCorrupted(format!("line {}: missing checksum", line_no)))?;
    let expected = u32::from_str_radix(crc_hex, 16).map_err(|_| {
        HaError::LedgerCorrupted(format!("line {}: malformed checksum '{}'", line_no, crc_hex))
    })?;
    if compute_checksum(json.as_bytes()) != expected {
        return Err(HaError::LedgerCorrupted(format!(
            "line {}: checksum mismatch",
            line_no
        )));
    }
    serde_json::from_str(json)
        .map_err(|e| HaError::LedgerCorrupted(format!("line {}: {}", line_no, e)))
}
