#![warn(missing_docs)]
//! # sessionbox-core
//!
//! Core types for the sessionbox shared session store.
//!
//! This crate holds the leaf pieces every other sessionbox crate agrees on:
//!
//! - **Hashing** ([`hash`]) - bit-exact MurmurHash2/3 used for shard placement
//! - **Keys** ([`SessionKey`]) - names of session records in the backend
//! - **Nodes** ([`NodeId`]) - names of backend shards
//! - **Values** ([`SessionValue`]) - the closed set of storable field values
//!
//! Nothing here performs I/O. Backend access lives in `sessionbox-backend`,
//! the shared cache and write-back protocol in `sessionbox`.

pub mod hash;
pub mod key;
pub mod label;
pub mod value;

pub use hash::HashFunction;
pub use key::SessionKey;
pub use label::NodeId;
#[doc(hidden)]
pub use smol_str::SmolStr;
pub use value::{SessionValue, ValueKind};
