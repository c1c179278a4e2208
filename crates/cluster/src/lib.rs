//! Cluster layers for Capstan
//!
//! Two replication strategies over the same node topology:
//!
//! - [`PrimaryCluster`]: one deterministic primary takes every write
//!   synchronously and fans it out best-effort to the other alive nodes;
//!   reads go to the primary. Failover is stateless: the primary is simply
//!   the first alive node in declaration order, re-evaluated per call.
//! - [`QuorumCluster`]: masterless. Writes carry a coordinator-assigned
//!   version and must be acknowledged by a majority; reads collect a
//!   majority of responses and the highest version wins (last-writer-wins).
//!
//! Both operate over peers exposing the [`Peer`] capability interface. The
//! shipped transport is [`EnginePeer`], a synchronous in-process call into a
//! storage engine; a network transport can implement the same trait without
//! touching the cluster logic.

mod membership;

pub mod peer;
pub mod primary;
pub mod quorum;

pub use peer::{EnginePeer, Peer, VersionedValue};
pub use primary::PrimaryCluster;
pub use quorum::QuorumCluster;
