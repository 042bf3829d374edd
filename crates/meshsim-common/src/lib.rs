//! Shared types for the meshsim harness.
//!
//! This crate contains:
//! - **Data models**: network profiles, scenarios, peers, test results, aggregates
//! - **Protocol types**: HTTP request/response bodies and observer events
//!   exchanged between the control service, the collector and the CLI

pub mod models;
pub mod protocol;
