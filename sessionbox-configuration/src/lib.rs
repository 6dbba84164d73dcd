//! YAML configuration for sessionbox.
//!
//! [`ServerConfig`] describes the backend nodes and the session settings of
//! a [`SessionProvider`](sessionbox::SessionProvider). Building Redis stores
//! requires the `redis` feature.

pub mod backend;
pub mod error;
pub mod server;

pub use backend::{Backend, Node, Redis};
pub use error::ConfigError;
pub use server::ServerConfig;
