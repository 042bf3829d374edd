//! meshsim command-line client library.

pub mod cli;
pub mod client;
pub mod compose;

pub use client::{CollectorClient, ControlClient};
