//! Primary–secondary replication
//!
//! The primary is the first alive node in declaration order, re-evaluated
//! at the start of every operation; there is no persistent leader state and
//! no election. Writes apply to the primary synchronously (its WAL fsync
//! must succeed) and fan out best-effort to the remaining alive nodes:
//! secondary failures are logged, never surfaced to the client.
//!
//! Failover consequence: a freshly promoted follower may be missing writes
//! the old primary acked before the follower fell behind. The primary's
//! state is the reference order; callers must not expect more.

use crate::membership::{Membership, Node};
use crate::peer::Peer;
use capstan_core::{Error, Result};
use std::path::Path;

/// Cluster with a deterministic primary and best-effort followers.
pub struct PrimaryCluster {
    membership: Membership,
}

impl PrimaryCluster {
    /// Open a cluster of engines under `dir`, one WAL per node id.
    pub fn open<P: AsRef<Path>>(dir: P, ids: &[&str]) -> Result<Self> {
        Ok(Self {
            membership: Membership::open(dir.as_ref(), ids)?,
        })
    }

    /// Build a cluster over pre-constructed peers (tests, custom transports).
    pub fn from_peers(peers: Vec<(String, Box<dyn Peer>)>) -> Result<Self> {
        Ok(Self {
            membership: Membership::from_peers(peers)?,
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

    /// Id of the node that would serve the next operation, if any.
    pub fn primary_id(&self) -> Option<String> {
        self.membership.alive().next().map(|n| n.id.clone())
    }

    /// Stop routing requests to a node. Returns whether the id matched.
    pub fn mark_down(&self, id: &str) -> bool {
        self.membership.mark_down(id)
    }

    /// Resume routing requests to a node. Returns whether the id matched.
    pub fn mark_up(&self, id: &str) -> bool {
        self.membership.mark_up(id)
    }

    /// Write one key through the primary.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.fan_out("set", |peer| peer.apply_set(key, value, None))
    }

    /// Delete one key through the primary. Returns the primary's view of
    /// whether the key existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.fan_out("delete", |peer| peer.apply_delete(key, None))
    }

    /// Write a batch atomically through the primary.
    pub fn bulk_set(&self, items: &[(String, String)]) -> Result<()> {
        self.fan_out("bulk_set", |peer| peer.apply_bulk_set(items, None))
    }

    /// Read one key from the current primary.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.primary()?.peer.fetch(key)?.value)
    }

    /// First alive node in declaration order.
    fn primary(&self) -> Result<&Node> {
        self.membership
            .alive()
            .next()
            .ok_or_else(|| Error::no_quorum(1, 0))
    }

    /// Apply to the primary synchronously, then best-effort to the rest.
    fn fan_out<R>(&self, op: &str, apply: impl Fn(&dyn Peer) -> Result<R>) -> Result<R> {
        let primary = self.primary()?;
        let result = apply(primary.peer.as_ref())?;
        for node in self.membership.alive() {
            if node.id == primary.id {
                continue;
            }
            if let Err(e) = apply(node.peer.as_ref()) {
                tracing::warn!(node = %node.id, op, error = %e, "secondary apply failed");
            }
        }
        Ok(result)
    }
}
