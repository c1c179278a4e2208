//! Masterless quorum replication
//!
//! Every mutation gets a version from the cluster's monotonic clock and is
//! dispatched to all alive nodes concurrently; it commits once a majority
//! acknowledges. Nodes that acked a failed write are not rolled back —
//! last-writer-wins at each node absorbs the inconsistency, because any two
//! majorities intersect and a reader takes the highest version it sees.
//!
//! Reads also require a majority: the first `Q` responses vote and the value
//! at the highest version wins. An absent entry counts as version 0.

use crate::membership::{Membership, Node};
use crate::peer::Peer;
use capstan_core::{Error, Result};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Masterless cluster committing against a majority.
pub struct QuorumCluster {
    membership: Membership,
    clock: AtomicU64,
}

impl QuorumCluster {
    /// Open a cluster of engines under `dir`, one WAL per node id.
    pub fn open<P: AsRef<Path>>(dir: P, ids: &[&str]) -> Result<Self> {
        Ok(Self {
            membership: Membership::open(dir.as_ref(), ids)?,
            clock: AtomicU64::new(0),
        })
    }

    /// Build a cluster over pre-constructed peers (tests, custom transports).
    pub fn from_peers(peers: Vec<(String, Box<dyn Peer>)>) -> Result<Self> {
        Ok(Self {
            membership: Membership::from_peers(peers)?,
            clock: AtomicU64::new(0),
        })
    }

    /// Node ids in declaration order.
    pub fn node_ids(&self) -> Vec<String> {
        self.membership.ids()
    }

    /// Number of nodes currently routable.
    pub fn alive_count(&self) -> usize {
        self.membership.alive_count()
    }

    /// Majority size: `⌊N/2⌋ + 1`.
    pub fn quorum(&self) -> usize {
        self.membership.len() / 2 + 1
    }

    /// Stop routing requests to a node. Returns whether the id matched.
    pub fn mark_down(&self, id: &str) -> bool {
        self.membership.mark_down(id)
    }

    /// Resume routing requests to a node. Returns whether the id matched.
    pub fn mark_up(&self, id: &str) -> bool {
        self.membership.mark_up(id)
    }

    /// Write one key at a fresh version; commits on majority ack.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let version = self.next_version();
        self.replicate("set", |peer| peer.apply_set(key, value, Some(version)))
            .map(|_| ())
    }

    /// Delete one key at a fresh version; commits on majority ack.
    ///
    /// Returns whether any acking node held the key.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let version = self.next_version();
        let acks = self.replicate("delete", |peer| peer.apply_delete(key, Some(version)))?;
        Ok(acks.into_iter().any(|existed| existed))
    }

    /// Write a batch sharing one version; commits on majority ack.
    ///
    /// Each node applies the batch atomically under its engine lock and
    /// gates items individually against its local versions.
    pub fn bulk_set(&self, items: &[(String, String)]) -> Result<()> {
        let version = self.next_version();
        self.replicate("bulk_set", |peer| {
            peer.apply_bulk_set(items, Some(version))
        })
        .map(|_| ())
    }

    /// Read one key from a majority; the highest version wins.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let required = self.quorum();
        let responses = self.replicate("get", |peer| peer.fetch(key))?;
        let winner = responses
            .into_iter()
            .take(required)
            .max_by_key(|vv| vv.version);
        Ok(winner.and_then(|vv| vv.value))
    }

    /// Strictly monotonic per-process version assignment.
    fn next_version(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Dispatch an operation to every alive node concurrently and collect
    /// at least a quorum of successes.
    fn replicate<R: Send>(
        &self,
        op: &str,
        apply: impl Fn(&dyn Peer) -> Result<R> + Sync,
    ) -> Result<Vec<R>> {
        let required = self.quorum();
        let alive: Vec<&Node> = self.membership.alive().collect();
        if alive.len() < required {
            return Err(Error::no_quorum(required, 0));
        }

        let apply = &apply;
        let results: Vec<Result<R>> = std::thread::scope(|scope| {
            let handles: Vec<_> = alive
                .iter()
                .map(|node| {
                    let node = *node;
                    scope.spawn(move || apply(node.peer.as_ref()))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(Error::internal("peer worker panicked")))
                })
                .collect()
        });

        let mut acks = Vec::new();
        for (node, result) in alive.iter().zip(results) {
            match result {
                Ok(ack) => acks.push(ack),
                Err(e) => {
                    tracing::warn!(node = %node.id, op, error = %e, "peer apply failed");
                }
            }
        }
        if acks.len() >= required {
            Ok(acks)
        } else {
            Err(Error::no_quorum(required, acks.len()))
        }
    }
}
