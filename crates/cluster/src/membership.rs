//! Node topology shared by both cluster flavors
//!
//! Membership is fixed at construction: an ordered list of node ids, each
//! owning a storage engine backed by its own WAL file under the cluster
//! directory. Nodes can be marked down (not routable) and back up without
//! stopping their engines.

use crate::peer::{EnginePeer, Peer};
use capstan_core::{validate_node_id, Error, Result};
use capstan_engine::Store;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One member of a cluster.
pub(crate) struct Node {
    pub(crate) id: String,
    pub(crate) peer: Box<dyn Peer>,
    routable: AtomicBool,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("routable", &self.routable.load(Ordering::Acquire))
            .finish()
    }
}

impl Node {
    fn new(id: String, peer: Box<dyn Peer>) -> Self {
        Self {
            id,
            peer,
            routable: AtomicBool::new(true),
        }
    }

    /// Whether requests may be routed to this node.
    pub(crate) fn alive(&self) -> bool {
        self.routable.load(Ordering::Acquire) && self.peer.is_alive()
    }

    fn set_routable(&self, up: bool) {
        self.routable.store(up, Ordering::Release);
    }
}

/// Fixed, ordered node list with routability flags.
#[derive(Debug)]
pub(crate) struct Membership {
    nodes: Vec<Node>,
}

impl Membership {
    /// Open one engine per node id under `dir` (`<dir>/<id>.wal`).
    pub(crate) fn open(dir: &Path, ids: &[&str]) -> Result<Self> {
        let mut peers: Vec<(String, Box<dyn Peer>)> = Vec::with_capacity(ids.len());
        for id in ids {
            validate_node_id(id)?;
            let store = Store::open(dir.join(format!("{id}.wal")))?;
            peers.push((id.to_string(), Box::new(EnginePeer::new(Arc::new(store)))));
        }
        Self::from_peers(peers)
    }

    /// Build a membership over pre-constructed peers.
    pub(crate) fn from_peers(peers: Vec<(String, Box<dyn Peer>)>) -> Result<Self> {
        if peers.is_empty() {
            return Err(Error::config("cluster requires at least one node"));
        }
        let mut seen = HashSet::new();
        for (id, _) in &peers {
            validate_node_id(id)?;
            if !seen.insert(id.clone()) {
                return Err(Error::config(format!("duplicate node id {id:?}")));
            }
        }
        Ok(Self {
            nodes: peers
                .into_iter()
                .map(|(id, peer)| Node::new(id, peer))
                .collect(),
        })
    }

    /// Total number of nodes, alive or not.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Alive nodes in declaration order.
    pub(crate) fn alive(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.alive())
    }

    /// Number of alive nodes.
    pub(crate) fn alive_count(&self) -> usize {
        self.alive().count()
    }

    /// Node ids in declaration order.
    pub(crate) fn ids(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// Mark a node unroutable. Returns whether the id matched a node.
    pub(crate) fn mark_down(&self, id: &str) -> bool {
        self.set_node(id, false)
    }

    /// Mark a node routable again. Returns whether the id matched a node.
    pub(crate) fn mark_up(&self, id: &str) -> bool {
        self.set_node(id, true)
    }

    fn set_node(&self, id: &str, up: bool) -> bool {
        match self.nodes.iter().find(|n| n.id == id) {
            Some(node) => {
                node.set_routable(up);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_one_wal_per_node() {
        let dir = TempDir::new().unwrap();
        let membership = Membership::open(dir.path(), &["n1", "n2", "n3"]).unwrap();
        assert_eq!(membership.len(), 3);
        assert_eq!(membership.alive_count(), 3);
        for id in ["n1", "n2", "n3"] {
            assert!(dir.path().join(format!("{id}.wal")).exists());
        }
    }

    #[test]
    fn test_mark_down_and_up() {
        let dir = TempDir::new().unwrap();
        let membership = Membership::open(dir.path(), &["n1", "n2"]).unwrap();

        assert!(membership.mark_down("n1"));
        assert_eq!(membership.alive_count(), 1);
        assert_eq!(
            membership.alive().map(|n| n.id.clone()).collect::<Vec<_>>(),
            vec!["n2".to_string()]
        );

        assert!(membership.mark_up("n1"));
        assert_eq!(membership.alive_count(), 2);

        assert!(!membership.mark_down("unknown"));
    }

    #[test]
    fn test_empty_topology_rejected() {
        assert!(Membership::from_peers(Vec::new()).is_err());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dir = TempDir::new().unwrap();
        let err = Membership::open(dir.path(), &["n1", "n1"]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
