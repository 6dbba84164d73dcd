//! Session key type.
//!
//! A [`SessionKey`] names one session record in the backend: it is the hash
//! key the session's fields live under, and its bytes are what the
//! partitioner hashes to pick a shard.
//!
//! ```
//! use sessionbox_core::SessionKey;
//!
//! let key = SessionKey::new("app1:q0bsc2mwy3xk4r5zvpqsqc3a");
//! assert_eq!(key.as_str(), "app1:q0bsc2mwy3xk4r5zvpqsqc3a");
//! assert_eq!(format!("{}", key), "app1:q0bsc2mwy3xk4r5zvpqsqc3a");
//! ```
//!
//! [`SessionKey`] uses [`SmolStr`] internally, so cloning is cheap and short
//! keys are stored inline.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a session record in the backend store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(SmolStr);

impl SessionKey {
    /// Creates a new session key.
    #[inline]
    pub fn new(key: impl Into<SmolStr>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the key bytes used for shard routing.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Borrow<str> for SessionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SessionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionKey {
    #[inline]
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<String> for SessionKey {
    #[inline]
    fn from(s: String) -> Self {
        Self(SmolStr::from(s))
    }
}

impl From<SmolStr> for SessionKey {
    #[inline]
    fn from(s: SmolStr) -> Self {
        Self(s)
    }
}
