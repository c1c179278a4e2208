//! Write-ahead logging for Capstan
//!
//! The WAL is the durability contract of the store: a mutation is
//! acknowledged only after its record has been appended to the log and
//! fsynced. On startup the log is replayed into an empty in-memory state.
//!
//! File format: UTF-8 text, one JSON record per LF-terminated line. A final
//! line without its terminator (or that fails to parse) is a torn write left
//! by a crash and is truncated away on open; a malformed line anywhere else
//! is fatal corruption.

pub mod record;
pub mod wal;

pub use record::WalRecord;
pub use wal::{SyncPolicy, Wal};
