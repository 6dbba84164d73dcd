//! Dispatch of backend write jobs.
//!
//! Saves, expiry refreshes and discards are handed to a [`WriteDispatcher`]
//! as self-contained jobs. By default jobs run in the background so the
//! request never waits on the backend; at-most-once delivery is accepted.
//!
//! # Example
//!
//! ```ignore
//! use sessionbox::offload::{DispatchConfig, WriteDispatcher};
//!
//! let dispatcher = WriteDispatcher::new(DispatchConfig::default());
//!
//! dispatcher.dispatch("save", &key, async move {
//!     // HSET, HDEL, PEXPIRE
//! }).await;
//! ```

mod dispatcher;
mod policy;

pub use dispatcher::{WriteDispatcher, WriteHandle, WriteKey};
pub use policy::{DispatchConfig, DispatchConfigBuilder, TimeoutPolicy};
