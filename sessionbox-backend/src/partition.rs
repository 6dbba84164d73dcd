//! Consistent-hash ring mapping session keys to backend nodes.
//!
//! Every node is placed on a 32-bit ring at [`REPLICAS`] positions, the hashes
//! of `"<node>_0"` .. `"<node>_9"`. A key is routed by hashing it and picking
//! the owner of the greatest ring position not above the hash. Keys hashing
//! below the first position or at/after the last one go to the owner of the
//! **last** position; existing deployments place sessions this way, so the
//! wrap rule must not be "normalized" to the first position.
//!
//! Adding or removing a node moves only the keys of the segments that node
//! owned. The ring itself is immutable; a changed node set needs a new ring.
//!
//! ```
//! use sessionbox_backend::partition::HashRing;
//! use sessionbox_core::{HashFunction, NodeId};
//!
//! let ring = HashRing::build(["redis-a", "redis-b", "redis-c"], HashFunction::Murmur2).unwrap();
//! let node = ring.route(b"session-42");
//! assert_eq!(node, ring.route(b"session-42"));
//! assert!(ring.nodes().contains(node));
//! ```

use std::collections::BTreeMap;

use sessionbox_core::{HashFunction, NodeId};
use thiserror::Error;
use tracing::warn;

/// Number of virtual positions each node occupies on the ring.
pub const REPLICAS: usize = 10;

/// Errors building a [`HashRing`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    /// A ring needs at least one node to route anything.
    #[error("hash ring requires at least one node")]
    NoNodes,
    /// The same node was listed twice.
    #[error("node `{0}` is listed more than once")]
    DuplicateNode(NodeId),
}

/// Immutable hash ring over a set of backend nodes.
#[derive(Debug, Clone)]
pub struct HashRing {
    hash: HashFunction,
    nodes: Vec<NodeId>,
    // Parallel arrays: `positions` strictly increasing, `owners[i]` indexes `nodes`.
    positions: Vec<u32>,
    owners: Vec<usize>,
}

impl HashRing {
    /// Builds a ring for `nodes`, placing [`REPLICAS`] positions per node.
    ///
    /// When two replicas hash to the same position, the one placed later wins
    /// the position.
    pub fn build<I, N>(nodes: I, hash: HashFunction) -> Result<Self, PartitionError>
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        let mut ordered: Vec<NodeId> = Vec::new();
        for node in nodes {
            let node = node.into();
            if ordered.contains(&node) {
                return Err(PartitionError::DuplicateNode(node));
            }
            ordered.push(node);
        }
        if ordered.is_empty() {
            return Err(PartitionError::NoNodes);
        }

        let mut ring: BTreeMap<u32, usize> = BTreeMap::new();
        for (index, node) in ordered.iter().enumerate() {
            for replica in 0..REPLICAS {
                let position = hash.hash(node.replica(replica).as_bytes());
                if let Some(previous) = ring.insert(position, index) {
                    warn!(
                        position,
                        evicted = %ordered[previous],
                        owner = %node,
                        "Hash ring position collision"
                    );
                }
            }
        }

        let (positions, owners) = ring.into_iter().unzip();
        Ok(Self {
            hash,
            nodes: ordered,
            positions,
            owners,
        })
    }

    /// Returns the node owning `key`.
    pub fn route(&self, key: &[u8]) -> &NodeId {
        &self.nodes[self.route_index(key)]
    }

    /// Returns the index into [`HashRing::nodes`] of the node owning `key`.
    pub fn route_index(&self, key: &[u8]) -> usize {
        self.owners[self.position_index(self.hash.hash(key))]
    }

    /// Ring slot serving `hash`.
    pub fn position_index(&self, hash: u32) -> usize {
        let last = self.positions.len() - 1;
        if hash < self.positions[0] || hash >= self.positions[last] {
            return last;
        }
        // positions[0] <= hash < positions[last]: at least one position is <= hash.
        self.positions.partition_point(|&position| position <= hash) - 1
    }

    /// Nodes in the order they were given.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Ring positions in ascending order, paired with their owner.
    pub fn positions(&self) -> impl Iterator<Item = (u32, &NodeId)> + '_ {
        self.positions
            .iter()
            .zip(&self.owners)
            .map(|(position, owner)| (*position, &self.nodes[*owner]))
    }

    /// Number of distinct positions on the ring.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// A built ring always has at least one position.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Hash function the ring was built with.
    pub fn hash_function(&self) -> HashFunction {
        self.hash
    }
}
