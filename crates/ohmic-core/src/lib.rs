//! Core device-model framework for Ohmic.
//!
//! This crate provides the common contract every device model implements
//! across the four analysis modes (DC operating point, small-signal AC,
//! scattering parameters and time-domain transient, plus noise on AC/SP):
//! property maps, operating points, the state-history facility for charge
//! integration, the per-device local matrix container, and the conversions
//! between admittance, scattering and noise-correlation representations.
//!
//! The node/topology registry, the shared linear solver and the sweep
//! driver are external collaborators; devices only write into their own
//! terminal-indexed matrices.

pub mod constants;
pub mod device;
pub mod error;
pub mod node;
pub mod props;
pub mod sparam;
pub mod stamp;
pub mod state;

pub use constants::Constants;
pub use device::{Analysis, Device, DeviceCore};
pub use error::{Error, Result};
pub use node::{NodeId, NodeRegistry, SequentialRegistry};
pub use props::{OperatingPoints, Properties, ScaledProperties, Value};
pub use stamp::DeviceMatrices;
pub use state::StateVector;
