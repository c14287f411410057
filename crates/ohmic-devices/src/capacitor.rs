//! Linear capacitor.

use num_complex::Complex64;
use std::f64::consts::PI;

use ohmic_core::node::NodeRegistry;
use ohmic_core::{Analysis, Constants, Device, DeviceCore, NodeId};

const NODE_1: usize = 0;
const NODE_2: usize = 1;

const Q_STATE: usize = 0;
const STATE_COUNT: usize = 2;

/// A two-terminal linear capacitor.
///
/// Open at DC; a frequency-proportional susceptance in AC and
/// S-parameter analysis; a trapezoidal companion model in transient.
#[derive(Debug, Clone)]
pub struct Capacitor {
    core: DeviceCore,
}

impl Capacitor {
    /// Create a capacitor between two nodes with capacitance in Farad.
    pub fn new(
        name: impl Into<String>,
        node1: NodeId,
        node2: NodeId,
        capacitance: f64,
        constants: Constants,
    ) -> Self {
        let mut core = DeviceCore::new(name, vec![node1, node2], constants);
        core.props.set_real("C", capacitance);
        Self { core }
    }

    pub fn capacitance(&self) -> f64 {
        self.core.props.real("C")
    }
}

impl Device for Capacitor {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn analyses(&self) -> &'static [Analysis] {
        &[Analysis::Dc, Analysis::Ac, Analysis::Sp, Analysis::Tr]
    }

    fn init_dc(&mut self, _registry: &mut dyn NodeRegistry) {
        self.core.alloc_mna(0);
    }

    fn calc_ac(&mut self, frequency: f64) {
        let y = Complex64::new(0.0, 2.0 * PI * frequency * self.capacitance());
        let m = &mut self.core.matrices;
        m.set_y(NODE_1, NODE_1, y);
        m.set_y(NODE_2, NODE_2, y);
        m.set_y(NODE_1, NODE_2, -y);
        m.set_y(NODE_2, NODE_1, -y);
    }

    fn calc_sp(&mut self, frequency: f64) {
        // normalized series admittance y = 2 j w C z0
        let z0 = self.core.constants.z0;
        let y = Complex64::new(0.0, 2.0 * PI * frequency * self.capacitance() * 2.0 * z0);
        let one = Complex64::new(1.0, 0.0);
        let s11 = one / (one + y);
        let s21 = y / (one + y);
        let m = &mut self.core.matrices;
        m.set_s(NODE_1, NODE_1, s11);
        m.set_s(NODE_2, NODE_2, s11);
        m.set_s(NODE_1, NODE_2, s21);
        m.set_s(NODE_2, NODE_1, s21);
    }

    fn init_tr(&mut self, registry: &mut dyn NodeRegistry) {
        self.init_dc(registry);
        self.core.set_states(STATE_COUNT);
    }

    fn calc_tr(&mut self, _time: f64) {
        // embedded in a semiconductor model: the parent integrates this
        // charge itself
        if self.core.is_controlled() {
            return;
        }
        let c = self.capacitance();
        let v = self.core.voltage(NODE_1) - self.core.voltage(NODE_2);
        self.core.matrices.clear();
        self.core
            .transient_capacitance(Q_STATE, NODE_1, NODE_2, c, v, c * v);
    }
}
