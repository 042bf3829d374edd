//! meshsim control service library.
//!
//! Re-exports the API router, shared state, peer registry and configuration
//! so they can be used by integration tests and the command-line client's
//! tests.

pub mod api;
pub mod config;
pub mod registry;
pub mod state;
