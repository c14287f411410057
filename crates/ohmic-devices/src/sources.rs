//! Independent sources.

use num_complex::Complex64;
use std::f64::consts::PI;

use ohmic_core::node::NodeRegistry;
use ohmic_core::{Analysis, Constants, Device, DeviceCore, NodeId};

const NODE_1: usize = 0;
const NODE_2: usize = 1;

/// An ideal AC current source.
///
/// The amplitude and phase define the AC phasor; in transient analysis
/// the source injects the corresponding sinusoid at its own frequency.
/// As an ideal current source it is an open circuit, so the scattering
/// matrix is the identity.
#[derive(Debug, Clone)]
pub struct AcCurrentSource {
    core: DeviceCore,
}

impl AcCurrentSource {
    /// Create a source driving `amplitude` Ampere from node 2 into node 1,
    /// with phase in degrees and transient frequency in Hertz.
    pub fn new(
        name: impl Into<String>,
        node1: NodeId,
        node2: NodeId,
        amplitude: f64,
        phase: f64,
        frequency: f64,
        constants: Constants,
    ) -> Self {
        let mut core = DeviceCore::new(name, vec![node1, node2], constants);
        core.props.set_real("I", amplitude);
        core.props.set_real("Phase", phase);
        core.props.set_real("f", frequency);
        Self { core }
    }

    fn phasor(&self) -> Complex64 {
        let i = self.core.props.real("I");
        let phase = self.core.props.real("Phase").to_radians();
        Complex64::from_polar(i, phase)
    }
}

impl Device for AcCurrentSource {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn analyses(&self) -> &'static [Analysis] {
        &[Analysis::Dc, Analysis::Ac, Analysis::Sp, Analysis::Tr]
    }

    fn init_sp(&mut self) {
        let one = Complex64::new(1.0, 0.0);
        let m = &mut self.core.matrices;
        m.set_s(NODE_1, NODE_1, one);
        m.set_s(NODE_2, NODE_2, one);
    }

    fn init_dc(&mut self, _registry: &mut dyn NodeRegistry) {
        self.core.alloc_mna(0);
    }

    fn init_ac(&mut self) {
        let i = self.phasor();
        let m = &mut self.core.matrices;
        m.set_i(NODE_1, i);
        m.set_i(NODE_2, -i);
    }

    fn init_tr(&mut self, registry: &mut dyn NodeRegistry) {
        self.init_dc(registry);
    }

    fn calc_tr(&mut self, time: f64) {
        let amplitude = self.core.props.real("I");
        let phase = self.core.props.real("Phase").to_radians();
        let f = self.core.props.real("f");
        let i = Complex64::from(amplitude * (2.0 * PI * f * time + phase).sin());
        let m = &mut self.core.matrices;
        m.set_i(NODE_1, i);
        m.set_i(NODE_2, -i);
    }
}
