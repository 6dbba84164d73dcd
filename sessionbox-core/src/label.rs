//! Backend node identifier.
//!
//! `NodeId` is a newtype wrapper around `SmolStr` naming one backend shard.
//! The string is opaque: it is only hashed (to place the node on the ring)
//! and compared.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// Identifier of a backend shard.
///
/// Used for:
/// - Ring placement (`"<node>_<i>"` virtual replicas)
/// - Selecting the store a session key is routed to
/// - Per-node activity reporting
///
/// # Example
/// ```
/// use sessionbox_core::NodeId;
///
/// let node = NodeId::new("redis-a");
/// assert_eq!(node.replica(3), "redis-a_3");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(SmolStr);

impl NodeId {
    /// Creates a new node identifier.
    #[inline]
    pub fn new(s: impl Into<SmolStr>) -> Self {
        Self(s.into())
    }

    /// Creates a node identifier from a static string (no allocation).
    #[inline]
    pub const fn new_static(s: &'static str) -> Self {
        Self(SmolStr::new_static(s))
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the `index`-th virtual replica of this node on a hash ring.
    #[inline]
    pub fn replica(&self, index: usize) -> String {
        format!("{}_{}", self.0, index)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for NodeId {
    #[inline]
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<String> for NodeId {
    #[inline]
    fn from(s: String) -> Self {
        Self(SmolStr::from(s))
    }
}

impl From<&String> for NodeId {
    #[inline]
    fn from(s: &String) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<SmolStr> for NodeId {
    #[inline]
    fn from(s: SmolStr) -> Self {
        Self(s)
    }
}
