//! Device computational models for Ohmic.
//!
//! This crate provides the models exercising the common per-analysis
//! contract of `ohmic-core`:
//! - shared junction/FET physics helpers with convergence-safe voltage
//!   limiting,
//! - passive and source models: resistor, capacitor, AC current source,
//! - the nonreciprocal isolator two-port,
//! - the MOSFET-class semiconductor model with temperature-dependent
//!   parameter derivation, Meyer charge integration and dynamic
//!   series-resistance insertion.

pub mod capacitor;
pub mod isolator;
pub mod mosfet;
pub mod physics;
pub mod resistor;
pub mod sources;

pub use capacitor::Capacitor;
pub use isolator::{Isolator, IsolatorFormulation};
pub use mosfet::Mosfet;
pub use resistor::Resistor;
pub use sources::AcCurrentSource;
