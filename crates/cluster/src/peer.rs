//! Peer capability interface
//!
//! The cluster layers replicate through this trait rather than calling the
//! engine directly, so the transport stays pluggable: in-process for the
//! shipped cluster objects and tests, a network client in a distributed
//! deployment.

use capstan_core::Result;
use capstan_engine::{SetOptions, Store};
use std::sync::Arc;

/// Value and LWW version fetched from a peer.
///
/// Absent keys report version 0 and no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    /// The stored value, if the key exists on the peer.
    pub value: Option<String>,
    /// The peer's recorded version for the key (0 if never written).
    pub version: u64,
}

/// Operations a replication peer must expose.
pub trait Peer: Send + Sync {
    /// Apply a set, optionally gated by an LWW version.
    fn apply_set(&self, key: &str, value: &str, version: Option<u64>) -> Result<()>;

    /// Apply a delete; returns whether the key existed on this peer.
    fn apply_delete(&self, key: &str, version: Option<u64>) -> Result<bool>;

    /// Apply an atomic batch, each item gated by the LWW rule.
    fn apply_bulk_set(&self, items: &[(String, String)], version: Option<u64>) -> Result<()>;

    /// Read a key together with its version.
    fn fetch(&self, key: &str) -> Result<VersionedValue>;

    /// Transport-level liveness. In-process peers are always reachable;
    /// a network transport would report its connection health here.
    fn is_alive(&self) -> bool {
        true
    }
}

/// In-process peer backed by a storage engine.
pub struct EnginePeer {
    store: Arc<Store>,
}

impl EnginePeer {
    /// Wrap an engine as a peer.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// The underlying engine.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}

impl Peer for EnginePeer {
    fn apply_set(&self, key: &str, value: &str, version: Option<u64>) -> Result<()> {
        self.store.set_opts(
            key,
            value,
            SetOptions {
                unreliable: false,
                version,
            },
        )
    }

    fn apply_delete(&self, key: &str, version: Option<u64>) -> Result<bool> {
        self.store.delete_versioned(key, version)
    }

    fn apply_bulk_set(&self, items: &[(String, String)], version: Option<u64>) -> Result<()> {
        self.store.bulk_set_versioned(items, version)
    }

    fn fetch(&self, key: &str) -> Result<VersionedValue> {
        let (value, version) = self.store.fetch_versioned(key);
        Ok(VersionedValue { value, version })
    }
}
