//! The per-analysis device contract and the shared per-device state.
//!
//! An external driver selects an analysis, calls `init<Mode>` once per
//! topology change, then `calc<Mode>` repeatedly: once per Newton
//! iteration for DC/TR, once per sweep point for AC/SP/noise. Devices are
//! evaluated synchronously and never see each other except through the
//! parent/auxiliary-sub-device ownership link.

use num_complex::Complex64;

use crate::constants::Constants;
use crate::node::{NodeId, NodeRegistry};
use crate::props::{OperatingPoints, Properties, ScaledProperties};
use crate::stamp::DeviceMatrices;
use crate::state::StateVector;

/// Analysis modes a device may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analysis {
    Dc,
    Ac,
    Sp,
    Tr,
    NoiseAc,
    NoiseSp,
}

/// State shared by every device model: node associations, driver-supplied
/// terminal voltages, property maps, state history and the local matrix
/// contributions.
#[derive(Debug, Clone)]
pub struct DeviceCore {
    name: String,
    nodes: Vec<NodeId>,
    voltages: Vec<f64>,
    pub props: Properties,
    pub scaled: ScaledProperties,
    pub oper: OperatingPoints,
    pub states: StateVector,
    pub matrices: DeviceMatrices,
    pub constants: Constants,
}

impl DeviceCore {
    /// Create the core for a device connected to the given nodes.
    pub fn new(name: impl Into<String>, nodes: Vec<NodeId>, constants: Constants) -> Self {
        let ports = nodes.len();
        Self {
            name: name.into(),
            nodes,
            voltages: vec![0.0; ports],
            props: Properties::new(),
            scaled: ScaledProperties::new(),
            oper: OperatingPoints::new(),
            states: StateVector::default(),
            matrices: DeviceMatrices::new(ports, 0),
            constants,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of device terminals.
    pub fn ports(&self) -> usize {
        self.nodes.len()
    }

    /// Node association of a local terminal.
    pub fn node(&self, terminal: usize) -> NodeId {
        self.nodes[terminal]
    }

    /// Rebind a local terminal to another node. Used when an auxiliary
    /// sub-device is spliced in between the device and its external node.
    pub fn set_node(&mut self, terminal: usize, node: NodeId) {
        self.nodes[terminal] = node;
    }

    /// Terminal voltage most recently supplied by the driver.
    pub fn voltage(&self, terminal: usize) -> f64 {
        self.voltages[terminal]
    }

    /// Set a single terminal voltage (driver side).
    pub fn set_voltage(&mut self, terminal: usize, v: f64) {
        self.voltages[terminal] = v;
    }

    /// Set all terminal voltages at once (driver side).
    pub fn set_voltages(&mut self, v: &[f64]) {
        self.voltages.copy_from_slice(v);
    }

    /// Allocate the local MNA contribution with the given extra-unknown
    /// count, clearing previous entries.
    pub fn alloc_mna(&mut self, vsources: usize) {
        self.matrices.alloc(vsources);
    }

    /// Declare the fixed state-slot count for transient analysis.
    pub fn set_states(&mut self, count: usize) {
        self.states = StateVector::new(count);
    }

    /// True when this device is embedded inside another device's model
    /// (the "controlled-by" marker) and must not contribute independent
    /// nonlinear physics or reactive currents of its own.
    pub fn is_controlled(&self) -> bool {
        self.props.has("Controlled")
    }

    /// Stamp one charge-storage element as its companion
    /// conductance+current pair between terminals `t1` and `t2`.
    ///
    /// `charge` is the present charge of the element and `cap` its present
    /// (possibly bias-dependent) capacitance; `voltage` the present branch
    /// voltage. The charge history lives in `q_slot`/`q_slot + 1` of the
    /// state vector (see [`StateVector::integrate`]).
    pub fn transient_capacitance(
        &mut self,
        q_slot: usize,
        t1: usize,
        t2: usize,
        cap: f64,
        voltage: f64,
        charge: f64,
    ) {
        self.states.set(q_slot, charge);
        let (geq, i_now) = self.states.integrate(q_slot, cap);
        let g = Complex64::from(geq);
        self.matrices.add_y(t1, t1, g);
        self.matrices.add_y(t2, t2, g);
        self.matrices.add_y(t1, t2, -g);
        self.matrices.add_y(t2, t1, -g);
        // companion source: element current is geq * v + ieq
        let ieq = i_now - geq * voltage;
        self.matrices.add_i(t1, Complex64::from(-ieq));
        self.matrices.add_i(t2, Complex64::from(ieq));
    }
}

/// The common per-analysis contract.
///
/// Every analysis hook has a default no-op so a device implements only
/// the capabilities it declares through [`Device::analyses`]. `init_dc`
/// and `init_tr` receive the topology registry so devices may insert
/// auxiliary sub-circuits; all other devices ignore it.
pub trait Device {
    fn core(&self) -> &DeviceCore;

    fn core_mut(&mut self) -> &mut DeviceCore;

    /// Analysis modes this device contributes to.
    fn analyses(&self) -> &'static [Analysis];

    /// Extra unknowns this device adds to the global system, valid after
    /// the corresponding `init<Mode>`.
    fn extra_unknowns(&self) -> usize {
        self.core().matrices.vsources()
    }

    fn init_dc(&mut self, _registry: &mut dyn NodeRegistry) {}

    fn calc_dc(&mut self) {}

    fn init_ac(&mut self) {}

    fn calc_ac(&mut self, _frequency: f64) {}

    fn init_sp(&mut self) {}

    fn calc_sp(&mut self, _frequency: f64) {}

    fn calc_noise_ac(&mut self, _frequency: f64) {}

    fn calc_noise_sp(&mut self, _frequency: f64) {}

    fn init_tr(&mut self, _registry: &mut dyn NodeRegistry) {}

    fn calc_tr(&mut self, _time: f64) {}

    /// Record the named operating points of the present solve.
    fn calc_operating_points(&mut self) {}
}
