//! Append-only store journal with crash-safe replay.
//!
//! The journal uses JSON Lines format: one JSON object per line. This format
//! is crash-safe because:
//! - Complete lines are always valid JSON
//! - Partial lines (from crash mid-write) are detected and truncated on replay
//!
//! Every append is fsynced before it returns: a commit is acknowledged to the
//! engine only once its event is durable. A failed append is cut back out of
//! the file before the error is returned, so a line the caller saw fail never
//! replays.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::error;

use super::event::{StoreEvent, StoreEventPayload};
use super::fsync::{fsync_file, truncate_durably};

/// Errors that can occur during journal operations.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A failed append could not be rolled back. The file tail is unknown
    /// until the journal is replayed again.
    #[error("journal {0} has an unrecoverable tail; reopen the store")]
    Poisoned(PathBuf),
}

/// Result type for journal operations.
pub type Result<T> = std::result::Result<T, EventLogError>;

/// The outcome of replaying a journal file.
#[derive(Debug, Default)]
pub struct Replay {
    /// The valid prefix of events, in order.
    pub events: Vec<StoreEvent>,
    /// One past the highest sequence number seen, or 0 for an empty journal.
    pub next_seq: u64,
    /// Bytes cut from the end of the file (torn or corrupt tail).
    pub truncated_bytes: u64,
}

/// An append-only journal.
pub struct EventLog {
    file: File,
    path: PathBuf,
    next_seq: u64,
    poisoned: bool,
}

impl EventLog {
    /// Opens (creating if needed) a journal that will assign `next_seq` to
    /// its next event.
    ///
    /// Call [`EventLog::replay`] first to learn `next_seq` for an existing
    /// file.
    pub fn open(path: impl AsRef<Path>, next_seq: u64) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(EventLog {
            file,
            path,
            next_seq,
            poisoned: false,
        })
    }

    /// Appends an event and syncs it to disk.
    ///
    /// On error the sequence number is not consumed and the file is cut back
    /// to its length before the append. If that cut fails too, the log
    /// refuses every later append with [`EventLogError::Poisoned`].
    pub fn append(&mut self, payload: StoreEventPayload) -> Result<StoreEvent> {
        self.append_with(payload, |file, line| {
            file.write_all(line)?;
            fsync_file(file)
        })
    }

    fn append_with(
        &mut self,
        payload: StoreEventPayload,
        write: impl FnOnce(&mut File, &[u8]) -> io::Result<()>,
    ) -> Result<StoreEvent> {
        if self.poisoned {
            return Err(EventLogError::Poisoned(self.path.clone()));
        }

        let event = StoreEvent::new(self.next_seq, payload);
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let len_before = self.file.metadata()?.len();
        if let Err(e) = write(&mut self.file, line.as_bytes()) {
            if let Err(rollback) = truncate_durably(&self.path, len_before) {
                error!(
                    path = %self.path.display(),
                    seq = event.seq,
                    error = %rollback,
                    "Could not roll back failed journal append"
                );
                self.poisoned = true;
            }
            return Err(e.into());
        }

        self.next_seq += 1;
        Ok(event)
    }

    /// Empties the journal, keeping the sequence counter.
    ///
    /// Used after a snapshot has durably absorbed every event.
    pub fn reset(&mut self) -> io::Result<()> {
        truncate_durably(&self.path, 0)
    }

    /// Returns the next sequence number that will be assigned.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replays a journal file, truncating any torn or corrupt tail.
    ///
    /// A missing or empty file replays as empty. Reading stops at the first
    /// line that does not parse, or whose sequence number does not increase;
    /// the file is cut back to the end of the last good line.
    pub fn replay(path: impl AsRef<Path>) -> Result<Replay> {
        let path = path.as_ref();

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e.into()),
        };
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut events: Vec<StoreEvent> = Vec::new();
        let mut valid_len = 0u64;
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = match reader.read_line(&mut line) {
                Ok(n) => n,
                // Non-UTF-8 garbage is a torn tail too.
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            };
            if bytes_read == 0 {
                break;
            }

            // A final line without its newline was never fully written.
            if !line.ends_with('\n') {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                valid_len += bytes_read as u64;
                continue;
            }

            let Ok(event) = serde_json::from_str::<StoreEvent>(trimmed) else {
                break;
            };
            if events.last().is_some_and(|prev| event.seq <= prev.seq) {
                break;
            }

            valid_len += bytes_read as u64;
            events.push(event);
        }

        let truncated_bytes = file_len - valid_len;
        if truncated_bytes > 0 {
            truncate_durably(path, valid_len)?;
        }

        let next_seq = events.last().map(|e| e.seq + 1).unwrap_or(0);
        Ok(Replay {
            events,
            next_seq,
            truncated_bytes,
        })
    }
}
