//! Network condition emulation for the meshsim harness.
//!
//! Provides the [`TrafficShaper`](shaper::TrafficShaper) capability with a
//! `tc`/`netem` backend, the static catalog of network profiles and
//! transition scenarios, and the [`NetworkController`](controller::NetworkController)
//! that applies profiles and drives scenarios over time.

pub mod catalog;
pub mod controller;
pub mod impairment;
pub mod shaper;

pub use catalog::{Catalog, CatalogError};
pub use controller::{ControlError, NetworkController, ScenarioOutcome, ScenarioState};
pub use shaper::{ShapingError, TrafficShaper};
