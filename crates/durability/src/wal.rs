//! WAL file operations
//!
//! - `Wal::open()` - open existing log or create a new one
//! - `Wal::replay()` - decode all records, truncating a torn tail
//! - `Wal::append()` - write one record, fsync per the sync policy
//! - `Wal::sync()` - force an fsync
//!
//! The durability point is the fsync inside `append`: callers must not
//! acknowledge a mutation before `append` returns with `SyncPolicy::Sync`.
//! The file is owned exclusively by its `Wal` handle and held append-only
//! for the lifetime of that handle.

use crate::record::WalRecord;
use capstan_core::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Whether an append must reach durable storage before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Flush and fsync before returning. The default durability contract.
    Sync,
    /// Write without fsync. Used only by the engine's unreliable test mode;
    /// an acked record may be lost on power failure.
    Skip,
}

/// Append-only write-ahead log of JSON-line records.
#[derive(Debug)]
pub struct Wal {
    path: PathBuf,
    file: File,
}

impl Wal {
    /// Open an existing WAL or create a new one.
    ///
    /// Creates parent directories if they don't exist. The file is opened
    /// in append mode with read capability. Call [`Wal::replay`] before the
    /// first append to recover prior state and trim any torn tail.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;

        Ok(Self { path, file })
    }

    /// Decode every record from the start of the file.
    ///
    /// A record that fails to parse on the *final* line, or whose trailing
    /// newline never made it to disk, is a torn write left by a crash: it is
    /// discarded and the file is truncated back to the last well-formed
    /// record. A parse failure on any earlier line is fatal corruption.
    pub fn replay(&mut self) -> Result<Vec<WalRecord>> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        let mut good_bytes: u64 = 0;
        let mut line_no: usize = 0;
        let mut buf: Vec<u8> = Vec::new();

        loop {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf)?;
            if n == 0 {
                break;
            }
            line_no += 1;
            let terminated = buf.last() == Some(&b'\n');
            let body = if terminated {
                &buf[..buf.len() - 1]
            } else {
                &buf[..]
            };

            match serde_json::from_slice::<WalRecord>(body) {
                Ok(record) if terminated => {
                    good_bytes += n as u64;
                    records.push(record);
                }
                Ok(_) => {
                    // Parses, but the terminator never reached disk: torn.
                    tracing::warn!(
                        path = %self.path.display(),
                        line = line_no,
                        "discarding unterminated trailing record"
                    );
                    self.truncate_to(good_bytes)?;
                    break;
                }
                Err(e) => {
                    let at_eof = !terminated || reader.fill_buf()?.is_empty();
                    if at_eof {
                        tracing::warn!(
                            path = %self.path.display(),
                            line = line_no,
                            error = %e,
                            "discarding torn trailing record"
                        );
                        self.truncate_to(good_bytes)?;
                        break;
                    }
                    return Err(Error::corrupt_log(line_no, e.to_string()));
                }
            }
        }

        Ok(records)
    }

    /// Append one record as a single LF-terminated line.
    ///
    /// With `SyncPolicy::Sync` the record is fsynced before this returns;
    /// with `SyncPolicy::Skip` it is written to the OS only.
    pub fn append(&mut self, record: &WalRecord, sync: SyncPolicy) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        if sync == SyncPolicy::Sync {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Force all written records to durable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Current file size in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Whether the log holds no records.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn truncate_to(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        self.file.sync_all()?;
        Ok(())
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        // Final fsync so a clean shutdown never leaves buffered records.
        let _ = self.file.sync_all();
    }
}
