//! # Capstan
//!
//! A durable, cluster-aware key-value store.
//!
//! Three layers, bottom up:
//!
//! - a crash-safe single-node **engine** (WAL + fsync before every ack,
//!   atomic bulk mutations, inverted full-text and bag-of-words embedding
//!   indexes rebuilt from the log on open);
//! - a **primary–secondary cluster** with deterministic failover and
//!   best-effort follower replication;
//! - a **masterless quorum cluster** with majority commits and
//!   last-writer-wins conflict resolution.
//!
//! # Quick Start
//!
//! ```no_run
//! use capstan::Store;
//!
//! fn main() -> capstan::Result<()> {
//!     let store = Store::open("./data/node.wal")?;
//!     store.set("user:name", "Alice")?;
//!     assert_eq!(store.get("user:name").as_deref(), Some("Alice"));
//!
//!     // Atomic batch: other observers see all three keys or none.
//!     store.bulk_set(&[
//!         ("a".into(), "1".into()),
//!         ("b".into(), "2".into()),
//!         ("c".into(), "3".into()),
//!     ])?;
//!
//!     // Secondary indexes are maintained on every write.
//!     let hits = store.search_full_text("alice");
//!     let ranked = store.search_embedding("alice", 5);
//!     drop((hits, ranked));
//!     store.close()
//! }
//! ```
//!
//! Clustered use goes through [`PrimaryCluster`] or [`QuorumCluster`] over
//! the same engine; the wire adapter in `capstan-server` exposes a
//! newline-delimited JSON protocol over TCP.

pub use capstan_cluster::{EnginePeer, Peer, PrimaryCluster, QuorumCluster, VersionedValue};
pub use capstan_core::{Error, Result, EMBEDDING_DIM};
pub use capstan_durability::{SyncPolicy, Wal, WalRecord};
pub use capstan_engine::{SetOptions, Store};
pub use capstan_server::{dispatch, dispatch_line, Request, Response};
