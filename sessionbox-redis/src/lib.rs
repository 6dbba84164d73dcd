#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backend;
pub mod error;

#[doc(inline)]
pub use crate::backend::{RedisStore, RedisStoreBuilder, with_database};
#[doc(inline)]
pub use crate::error::Error;
