//! Linear resistor, also used as the auxiliary series-resistance
//! sub-device of the semiconductor models.

use num_complex::Complex64;

use ohmic_core::constants::kelvin;
use ohmic_core::node::NodeRegistry;
use ohmic_core::{Analysis, Constants, Device, DeviceCore, NodeId};

const NODE_1: usize = 0;
const NODE_2: usize = 1;

/// A two-terminal resistor.
#[derive(Debug, Clone)]
pub struct Resistor {
    core: DeviceCore,
}

impl Resistor {
    /// Create a resistor between two nodes with resistance in Ohm.
    pub fn new(
        name: impl Into<String>,
        node1: NodeId,
        node2: NodeId,
        resistance: f64,
        constants: Constants,
    ) -> Self {
        let mut core = DeviceCore::new(name, vec![node1, node2], constants);
        core.props.set_real("R", resistance);
        core.props.set_real("Temp", 26.85);
        Self { core }
    }

    /// Conductance 1/R. A non-positive resistance stamps as an open and
    /// warns; exact shorts belong to the driver's voltage-source path.
    pub fn conductance(&self) -> f64 {
        let r = self.core.props.real("R");
        if r > 0.0 {
            1.0 / r
        } else {
            log::warn!("resistor {}: non-positive R = {}, stamping open", self.core.name(), r);
            0.0
        }
    }

    fn stamp_y(&mut self) {
        let g = Complex64::from(self.conductance());
        let m = &mut self.core.matrices;
        m.set_y(NODE_1, NODE_1, g);
        m.set_y(NODE_2, NODE_2, g);
        m.set_y(NODE_1, NODE_2, -g);
        m.set_y(NODE_2, NODE_1, -g);
    }
}

impl Device for Resistor {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn analyses(&self) -> &'static [Analysis] {
        &[
            Analysis::Dc,
            Analysis::Ac,
            Analysis::Sp,
            Analysis::Tr,
            Analysis::NoiseAc,
            Analysis::NoiseSp,
        ]
    }

    fn init_dc(&mut self, _registry: &mut dyn NodeRegistry) {
        self.core.alloc_mna(0);
        self.stamp_y();
    }

    fn calc_dc(&mut self) {
        self.stamp_y();
    }

    fn init_ac(&mut self) {
        self.core.alloc_mna(0);
        self.stamp_y();
    }

    fn init_sp(&mut self) {
        let z0 = self.core.constants.z0;
        let r = self.core.props.real("R").max(0.0);
        let s11 = Complex64::from(r / (r + 2.0 * z0));
        let s21 = Complex64::from(2.0 * z0 / (r + 2.0 * z0));
        let m = &mut self.core.matrices;
        m.set_s(NODE_1, NODE_1, s11);
        m.set_s(NODE_2, NODE_2, s11);
        m.set_s(NODE_1, NODE_2, s21);
        m.set_s(NODE_2, NODE_1, s21);
    }

    fn calc_noise_ac(&mut self, _frequency: f64) {
        let t = self.core.props.real("Temp");
        let t0 = self.core.constants.t0;
        let r = self.core.props.real("R");
        let f = if r > 0.0 { kelvin(t) / t0 / r } else { 0.0 };
        let m = &mut self.core.matrices;
        m.set_n(NODE_1, NODE_1, Complex64::from(f));
        m.set_n(NODE_2, NODE_2, Complex64::from(f));
        m.set_n(NODE_1, NODE_2, Complex64::from(-f));
        m.set_n(NODE_2, NODE_1, Complex64::from(-f));
    }

    fn calc_noise_sp(&mut self, _frequency: f64) {
        let t = self.core.props.real("Temp");
        let t0 = self.core.constants.t0;
        let z0 = self.core.constants.z0;
        let r = self.core.props.real("R").max(0.0);
        let denom = 2.0 * z0 + r;
        let f = kelvin(t) / t0 * 4.0 * r * z0 / (denom * denom);
        let m = &mut self.core.matrices;
        m.set_n(NODE_1, NODE_1, Complex64::from(f));
        m.set_n(NODE_2, NODE_2, Complex64::from(f));
        m.set_n(NODE_1, NODE_2, Complex64::from(-f));
        m.set_n(NODE_2, NODE_1, Complex64::from(-f));
    }

    fn init_tr(&mut self, registry: &mut dyn NodeRegistry) {
        self.init_dc(registry);
    }

    fn calc_tr(&mut self, _time: f64) {
        self.stamp_y();
    }
}
