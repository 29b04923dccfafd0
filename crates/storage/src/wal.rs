// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable storage backed by a write-ahead log
//!
//! Every committed transaction is appended as one checksummed JSON line and
//! synced before the call returns. Opening a log replays it into memory.
//! A torn final line is cut off; corruption before the last line fails the
//! open and is left for [`WalStorage::repair`]. The directory is held under
//! an exclusive `wal.lock` for the lifetime of the handle.

use crate::entry::WalEntry;
use crate::state::MaterializedState;
use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use stepwise_core::config::{load_toml, parse_toml};
use stepwise_core::{
    ConfigError, StateId, StateRecord, StepExecution, Storage, StorageError, Transaction,
};

const WAL_FILE: &str = "wal.jsonl";
const LOCK_FILE: &str = "wal.lock";

/// Configuration for [`WalStorage`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalStorageConfig {
    /// Directory holding `wal.jsonl`
    pub dir: PathBuf,
    /// Written into every entry
    pub machine_id: String,
    /// fsync after every append
    pub sync_writes: bool,
}

impl Default for WalStorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".stepwise"),
            machine_id: uuid::Uuid::new_v4().to_string(),
            sync_writes: true,
        }
    }
}

impl WalStorageConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        parse_toml(text)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_toml(path)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.dir.join(WAL_FILE)
    }
}

/// Outcome of scanning a log file
#[derive(Debug, Default)]
pub struct Replay {
    pub entries: Vec<WalEntry>,
    /// Byte length of the valid prefix
    pub valid_len: u64,
    /// Total byte length of the file
    pub file_len: u64,
    /// The first invalid line is also the last line in the file
    pub torn_tail: bool,
}

impl Replay {
    pub fn is_corrupt(&self) -> bool {
        self.valid_len < self.file_len
    }

    /// Invalid data followed by more lines; truncating would drop them
    pub fn is_corrupt_mid_log(&self) -> bool {
        self.is_corrupt() && !self.torn_tail
    }
}

struct Inner {
    file: File,
    len: u64,
    next_sequence: u64,
    state: MaterializedState,
}

pub struct WalStorage {
    path: PathBuf,
    // Released when the handle is dropped
    _lock: File,
    machine_id: String,
    sync_writes: bool,
    inner: Mutex<Inner>,
}

impl WalStorage {
    /// Open or create the log under `config.dir` and replay it.
    ///
    /// Fails with [`StorageError::Unavailable`] while another handle holds
    /// the directory. A torn final line is cut off before the writer is
    /// positioned; any earlier corruption fails with
    /// [`StorageError::Corrupt`] and leaves the file untouched.
    pub fn open(config: &WalStorageConfig) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&config.dir)?;
        let path = config.wal_path();

        let span = tracing::info_span!("wal.open", path = %path.display());
        let _guard = span.enter();

        let lock = lock_dir(&config.dir)?;

        let replay = Self::replay(&path)?;
        if replay.is_corrupt_mid_log() {
            tracing::error!(
                valid_len = replay.valid_len,
                file_len = replay.file_len,
                "WAL corrupt before its last line, refusing to open"
            );
            return Err(StorageError::Corrupt {
                offset: replay.valid_len,
                len: replay.file_len,
            });
        }
        if replay.is_corrupt() {
            tracing::warn!(
                valid_len = replay.valid_len,
                file_len = replay.file_len,
                "torn WAL tail, truncating at last valid entry"
            );
            truncate(&path, replay.valid_len)?;
        }

        let mut state = MaterializedState::default();
        let mut applied = 0usize;
        for entry in &replay.entries {
            if let Err(e) = state.apply_transaction(&entry.transaction) {
                tracing::warn!(sequence = entry.sequence, error = %e, "skipping unappliable WAL entry");
                continue;
            }
            applied += 1;
        }

        let next_sequence = replay
            .entries
            .last()
            .map(|entry| entry.sequence + 1)
            .unwrap_or(0);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        tracing::info!(
            entries = applied,
            states = state.state_count(),
            next_sequence,
            "WAL replayed"
        );

        Ok(Self {
            path,
            _lock: lock,
            machine_id: config.machine_id.clone(),
            sync_writes: config.sync_writes,
            inner: Mutex::new(Inner {
                file,
                len: replay.valid_len,
                next_sequence,
                state,
            }),
        })
    }

    /// Open with default settings under `dir`
    pub fn open_dir(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Self::open(&WalStorageConfig::new(dir))
    }

    /// Scan a log, collecting entries up to the first invalid line.
    ///
    /// A missing file is an empty log. A final line without its newline is a
    /// torn write even if it happens to parse.
    pub fn replay(path: &Path) -> Result<Replay, StorageError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e.into()),
        };
        let file_len = file.metadata()?.len();

        let mut reader = BufReader::new(file);
        let mut replay = Replay {
            file_len,
            ..Replay::default()
        };
        let mut buf = Vec::new();
        let mut line_no = 0u64;

        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf)?;
            if read == 0 {
                break;
            }
            line_no += 1;

            let at_end = replay.valid_len + read as u64 == file_len;
            if buf.last() != Some(&b'\n') {
                tracing::warn!(line = line_no, "torn write at end of WAL");
                replay.torn_tail = true;
                break;
            }
            if buf.iter().all(u8::is_ascii_whitespace) {
                replay.valid_len += read as u64;
                continue;
            }

            let entry = match std::str::from_utf8(&buf)
                .map_err(|e| e.to_string())
                .and_then(|line| WalEntry::from_line(line).map_err(|e| e.to_string()))
            {
                Ok(entry) => entry,
                Err(reason) => {
                    tracing::warn!(line = line_no, reason = %reason, "unparseable WAL entry");
                    replay.torn_tail = at_end;
                    break;
                }
            };
            if !entry.verify() {
                tracing::warn!(line = line_no, sequence = entry.sequence, "WAL checksum mismatch");
                replay.torn_tail = at_end;
                break;
            }

            replay.valid_len += read as u64;
            replay.entries.push(entry);
        }

        Ok(replay)
    }

    /// Truncate the log in `dir` at its first corrupt entry, discarding
    /// everything after it.
    ///
    /// Returns the number of bytes removed, 0 when the log is intact. Fails
    /// while the directory is open.
    pub fn repair(dir: &Path) -> Result<u64, StorageError> {
        let _lock = lock_dir(dir)?;
        let path = dir.join(WAL_FILE);
        let replay = Self::replay(&path)?;
        if !replay.is_corrupt() {
            return Ok(0);
        }
        truncate(&path, replay.valid_len)?;
        Ok(replay.file_len - replay.valid_len)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sequence number the next commit will receive
    pub fn next_sequence(&self) -> u64 {
        self.inner
            .lock()
            .map(|inner| inner.next_sequence)
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StorageError> {
        self.inner
            .lock()
            .map_err(|_| StorageError::Unavailable("WAL lock poisoned".to_string()))
    }
}

fn lock_dir(dir: &Path) -> Result<File, StorageError> {
    let path = dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)?;
    file.try_lock_exclusive().map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "WAL directory already locked");
        StorageError::Unavailable(format!("{} is locked: {e}", path.display()))
    })?;
    Ok(file)
}

fn truncate(path: &Path, len: u64) -> Result<(), StorageError> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(len)?;
    file.sync_all()?;
    tracing::info!(len, "WAL truncated");
    Ok(())
}

impl Inner {
    fn append(&mut self, entry: &WalEntry, sync: bool) -> Result<(), StorageError> {
        let line = entry.to_line()?;
        let written = self
            .file
            .write_all(line.as_bytes())
            .and_then(|()| if sync { self.file.sync_all() } else { self.file.flush() });

        if let Err(e) = written {
            // Drop any partial line so the log stays replayable
            if let Err(trunc) = self.file.set_len(self.len) {
                tracing::error!(error = %trunc, "failed to trim partial WAL write");
            }
            return Err(e.into());
        }

        self.len += line.len() as u64;
        Ok(())
    }
}

#[async_trait]
impl Storage for WalStorage {
    async fn run_transaction(&self, tx: Transaction) -> Result<(), StorageError> {
        let mut inner = self.lock()?;

        let undo = inner.state.apply_transaction(&tx)?;

        let sequence = inner.next_sequence;
        let written = WalEntry::new(sequence, &self.machine_id, tx)
            .and_then(|entry| inner.append(&entry, self.sync_writes));
        if let Err(e) = written {
            tracing::error!(sequence, error = %e, "WAL append failed, rolling back");
            undo.rollback(&mut inner.state);
            return Err(e);
        }

        inner.next_sequence += 1;
        tracing::trace!(sequence, "WAL entry committed");
        Ok(())
    }

    async fn get_state_by_id(&self, id: &StateId) -> Result<StateRecord, StorageError> {
        self.lock()?
            .state
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("state", id.as_str()))
    }

    async fn get_state_by_idempotency_key(&self, key: &str) -> Result<StateRecord, StorageError> {
        self.lock()?
            .state
            .get_by_idempotency_key(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found("idempotency_key", key))
    }

    async fn step_executions(&self, id: &StateId) -> Result<Vec<StepExecution>, StorageError> {
        Ok(self.lock()?.state.executions(id))
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
