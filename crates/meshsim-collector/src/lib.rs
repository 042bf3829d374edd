//! meshsim metrics collector library.
//!
//! Aggregation, snapshot persistence and the HTTP/WebSocket surface, exposed
//! as a library so the binary and the integration tests share one router.

pub mod aggregate;
pub mod api;
pub mod collector;
pub mod config;
pub mod store;
pub mod ws;

pub use collector::{Collector, CollectorError};
pub use store::{PersistenceError, SnapshotStore};
