// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-lines write-ahead log of store operations.
//!
//! One entry per line, each carrying a sequence number. A crash mid-append
//! can leave the last line without its newline. That entry was never
//! acknowledged, so replay drops it and `open` trims it before appending. Any other unparsable
//! line is corruption and fails replay.

use cb_core::Operation;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("WAL is closed: an earlier append could not be rolled back")]
    Closed,
}

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    seq: u64,
    op: Operation,
}

impl Entry {
    fn line(seq: u64, op: &Operation) -> Result<String, WalError> {
        let mut line = serde_json::to_string(&Entry { seq, op: op.clone() })?;
        line.push('\n');
        Ok(line)
    }
}

/// Entries parsed from a log plus the byte length of its intact prefix
struct Scan {
    entries: Vec<Entry>,
    intact_len: u64,
}

fn scan(content: &str) -> Result<Scan, WalError> {
    let mut entries = Vec::new();
    let mut intact_len = 0u64;
    let mut rest = content;

    while !rest.is_empty() {
        let Some(end) = rest.find('\n') else {
            // Unterminated: the append never completed
            tracing::warn!(bytes = rest.len(), "dropping torn WAL tail");
            break;
        };
        let line = &rest[..end];
        if !line.trim().is_empty() {
            entries.push(serde_json::from_str(line)?);
        }
        intact_len += end as u64 + 1;
        rest = &rest[end + 1..];
    }

    Ok(Scan {
        entries,
        intact_len,
    })
}

fn read_log(path: &Path) -> Result<String, WalError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

/// Append handle on a WAL file
pub struct Wal {
    path: PathBuf,
    file: File,
    sequence: u64,
    /// Bytes of durable, newline-terminated entries
    len: u64,
    closed: bool,
}

impl Wal {
    /// Open or create the log, trimming a torn tail
    pub fn open(path: &Path) -> Result<Self, WalError> {
        let content = read_log(path)?;
        let scan = scan(&content)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;
        if scan.intact_len < content.len() as u64 {
            file.set_len(scan.intact_len)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            sequence: scan.entries.last().map_or(0, |e| e.seq),
            len: scan.intact_len,
            closed: false,
        })
    }

    /// Append and fsync one operation, returning its sequence number.
    ///
    /// On failure the file is truncated back to its last durable entry, so
    /// a failed append never reappears on replay. If that truncation fails
    /// too, the WAL closes and every later append returns `Closed`.
    pub fn append(&mut self, op: &Operation) -> Result<u64, WalError> {
        if self.closed {
            return Err(WalError::Closed);
        }
        let seq = self.sequence + 1;
        let line = Entry::line(seq, op)?;

        let written = self
            .file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.sync_all());
        if let Err(e) = written {
            self.roll_back();
            return Err(e.into());
        }

        self.sequence = seq;
        self.len += line.len() as u64;
        Ok(seq)
    }

    /// Drop bytes past the last durable entry
    fn roll_back(&mut self) {
        let truncated = self
            .file
            .set_len(self.len)
            .and_then(|()| self.file.sync_all());
        if let Err(e) = truncated {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "WAL rollback failed; refusing further appends"
            );
            self.closed = true;
        }
    }

    /// Sequence number of the last durable entry
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Replace the log contents with `ops`.
    ///
    /// Writes a sibling temp file and renames it over the log, so a crash
    /// leaves either the old or the new log in place.
    pub fn rewrite(&mut self, ops: &[Operation]) -> Result<(), WalError> {
        if self.closed {
            return Err(WalError::Closed);
        }
        let tmp_path = self.path.with_extension("wal.tmp");
        let mut buf = String::new();
        for (seq, op) in (1u64..).zip(ops) {
            buf.push_str(&Entry::line(seq, op)?);
        }
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(buf.as_bytes())?;
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        self.file = OpenOptions::new().append(true).read(true).open(&self.path)?;
        self.sequence = ops.len() as u64;
        self.len = buf.len() as u64;
        Ok(())
    }

    /// Every intact operation in the log, oldest first
    pub fn replay(path: &Path) -> Result<Vec<Operation>, WalError> {
        let content = read_log(path)?;
        Ok(scan(&content)?.entries.into_iter().map(|e| e.op).collect())
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
