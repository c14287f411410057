//! Nonreciprocal isolator two-port.

use num_complex::Complex64;

use ohmic_core::constants::kelvin;
use ohmic_core::node::NodeRegistry;
use ohmic_core::{Analysis, Constants, Device, DeviceCore, Error, NodeId, Result};

const NODE_1: usize = 0;
const NODE_2: usize = 1;
const VSRC_1: usize = 0;
const VSRC_2: usize = 1;

/// How the isolator enters the MNA system outside S-parameter analysis.
///
/// Both formulations describe the same two-port; the augmented one adds
/// two branch-current unknowns and keeps the matrix entries bounded for
/// extreme port impedances, the reduced one stamps a plain 2x2
/// admittance block. The choice is fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolatorFormulation {
    Augmented,
    #[default]
    Reduced,
}

/// An ideal isolator: matched transmission from port 1 to port 2,
/// no transmission backwards.
#[derive(Debug, Clone)]
pub struct Isolator {
    core: DeviceCore,
    formulation: IsolatorFormulation,
}

impl Isolator {
    /// Create an isolator with the given port impedances in Ohm.
    pub fn new(
        name: impl Into<String>,
        node1: NodeId,
        node2: NodeId,
        z1: f64,
        z2: f64,
        formulation: IsolatorFormulation,
        constants: Constants,
    ) -> Result<Self> {
        if z1 <= 0.0 || !z1.is_finite() {
            return Err(Error::InvalidParameter { name: "Z1".into(), value: z1 });
        }
        if z2 <= 0.0 || !z2.is_finite() {
            return Err(Error::InvalidParameter { name: "Z2".into(), value: z2 });
        }
        let mut core = DeviceCore::new(name, vec![node1, node2], constants);
        core.props.set_real("Z1", z1);
        core.props.set_real("Z2", z2);
        core.props.set_real("Temp", 26.85);
        Ok(Self { core, formulation })
    }

    pub fn formulation(&self) -> IsolatorFormulation {
        self.formulation
    }

    fn impedances(&self) -> (f64, f64) {
        (self.core.props.real("Z1"), self.core.props.real("Z2"))
    }

    // DC, AC and TR share one frequency-independent stamp.
    fn stamp_mna(&mut self) {
        let (z1, z2) = self.impedances();
        match self.formulation {
            IsolatorFormulation::Augmented => {
                let z21 = 2.0 * (z1 * z2).sqrt();
                self.core.alloc_mna(2);
                let m = &mut self.core.matrices;
                let one = Complex64::new(1.0, 0.0);
                m.set_b(NODE_1, VSRC_1, one);
                m.set_b(NODE_2, VSRC_2, one);
                m.set_c(VSRC_1, NODE_1, -one);
                m.set_c(VSRC_2, NODE_2, -one);
                m.set_d(VSRC_1, VSRC_1, Complex64::from(z1));
                m.set_d(VSRC_2, VSRC_2, Complex64::from(z2));
                m.set_d(VSRC_2, VSRC_1, Complex64::from(z21));
            }
            IsolatorFormulation::Reduced => {
                self.core.alloc_mna(0);
                let m = &mut self.core.matrices;
                m.set_y(NODE_1, NODE_1, Complex64::from(1.0 / z1));
                m.set_y(NODE_2, NODE_1, Complex64::from(-2.0 / (z1 * z2).sqrt()));
                m.set_y(NODE_2, NODE_2, Complex64::from(1.0 / z2));
            }
        }
    }
}

impl Device for Isolator {
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

    fn init_sp(&mut self) {
        let z0 = self.core.constants.z0;
        let (z1, z2) = self.impedances();
        let s1 = (z1 - z0) / (z1 + z0);
        let s2 = (z2 - z0) / (z2 + z0);
        let m = &mut self.core.matrices;
        m.set_s(NODE_1, NODE_1, Complex64::from(s1));
        m.set_s(NODE_2, NODE_2, Complex64::from(s2));
        m.set_s(NODE_1, NODE_2, Complex64::new(0.0, 0.0));
        m.set_s(
            NODE_2,
            NODE_1,
            Complex64::from((1.0 - s1 * s1).sqrt() * (1.0 - s2 * s2).sqrt()),
        );
    }

    fn calc_noise_sp(&mut self, _frequency: f64) {
        let t = self.core.props.real("Temp");
        let z0 = self.core.constants.z0;
        let t0 = self.core.constants.t0;
        let (z1, z2) = self.impedances();
        let r = (z0 - z1) / (z0 + z2);
        let f = 4.0 * z0 / ((z1 + z0) * (z1 + z0)) * kelvin(t) / t0;
        let m = &mut self.core.matrices;
        m.set_n(NODE_1, NODE_1, Complex64::from(f * z1));
        m.set_n(NODE_1, NODE_2, Complex64::from(f * (z1 * z2).sqrt() * r));
        m.set_n(NODE_2, NODE_1, Complex64::from(f * (z1 * z2).sqrt() * r));
        m.set_n(NODE_2, NODE_2, Complex64::from(f * z2 * r * r));
    }

    fn calc_noise_ac(&mut self, _frequency: f64) {
        let t = self.core.props.real("Temp");
        let t0 = self.core.constants.t0;
        let (z1, z2) = self.impedances();
        let f = 4.0 * kelvin(t) / t0;
        let m = &mut self.core.matrices;
        m.set_n(NODE_1, NODE_1, Complex64::from(f / z1));
        m.set_n(NODE_1, NODE_2, Complex64::new(0.0, 0.0));
        m.set_n(NODE_2, NODE_1, Complex64::from(-f * 2.0 / (z1 * z2).sqrt()));
        m.set_n(NODE_2, NODE_2, Complex64::from(f / z2));
    }

    fn init_dc(&mut self, _registry: &mut dyn NodeRegistry) {
        self.stamp_mna();
    }

    fn init_ac(&mut self) {
        self.stamp_mna();
    }

    fn init_tr(&mut self, registry: &mut dyn NodeRegistry) {
        self.init_dc(registry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ohmic_core::SequentialRegistry;

    fn isolator(z1: f64, z2: f64, f: IsolatorFormulation) -> Isolator {
        Isolator::new("X1", NodeId::new(1), NodeId::new(2), z1, z2, f,
            Constants::default()).unwrap()
    }

    #[test]
    fn test_matched_sp() {
        // ports matched to the reference impedance: |s21| = 1, rest 0
        let mut x = isolator(50.0, 50.0, IsolatorFormulation::Reduced);
        x.init_sp();
        let m = &x.core().matrices;
        assert_eq!(m.get_s(0, 0).re, 0.0);
        assert_eq!(m.get_s(1, 1).re, 0.0);
        assert_eq!(m.get_s(0, 1).re, 0.0);
        assert!((m.get_s(1, 0).re - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_nonreciprocal_sp() {
        let mut x = isolator(25.0, 100.0, IsolatorFormulation::Reduced);
        x.init_sp();
        let m = &x.core().matrices;
        let s1 = (25.0 - 50.0) / (25.0 + 50.0);
        let s2 = (100.0 - 50.0) / (100.0 + 50.0);
        assert!((m.get_s(0, 0).re - s1).abs() < 1e-12);
        assert!((m.get_s(1, 1).re - s2).abs() < 1e-12);
        assert_eq!(m.get_s(0, 1).re, 0.0);
        assert!(m.get_s(1, 0).re > 0.0);
    }

    #[test]
    fn test_reduced_dc_stamp() {
        let mut reg = SequentialRegistry::new(2);
        let mut x = isolator(50.0, 50.0, IsolatorFormulation::Reduced);
        x.init_dc(&mut reg);
        let m = &x.core().matrices;
        assert_eq!(x.extra_unknowns(), 0);
        assert!((m.get_y(0, 0).re - 0.02).abs() < 1e-12);
        assert_eq!(m.get_y(0, 1).re, 0.0);
        assert!((m.get_y(1, 0).re + 0.04).abs() < 1e-12);
        assert!((m.get_y(1, 1).re - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_augmented_dc_stamp() {
        let mut reg = SequentialRegistry::new(2);
        let mut x = isolator(25.0, 100.0, IsolatorFormulation::Augmented);
        x.init_dc(&mut reg);
        let m = &x.core().matrices;
        assert_eq!(x.extra_unknowns(), 2);
        assert_eq!(m.get_b(0, 0).re, 1.0);
        assert_eq!(m.get_b(1, 1).re, 1.0);
        assert_eq!(m.get_c(0, 0).re, -1.0);
        assert_eq!(m.get_c(1, 1).re, -1.0);
        assert!((m.get_d(0, 0).re - 25.0).abs() < 1e-12);
        assert!((m.get_d(1, 1).re - 100.0).abs() < 1e-12);
        assert!((m.get_d(1, 0).re - 100.0).abs() < 1e-12);
        assert_eq!(m.get_d(0, 1).re, 0.0);
        assert_eq!(m.get_e(0).re, 0.0);
    }

    #[test]
    fn test_formulations_agree() {
        // Eliminating the branch currents of the augmented form must give
        // the reduced admittance block: Y = -B D^-1 C.
        let mut reg = SequentialRegistry::new(2);
        let z1 = 30.0;
        let z2 = 70.0;
        let mut aug = isolator(z1, z2, IsolatorFormulation::Augmented);
        aug.init_dc(&mut reg);
        let m = aug.core().matrices.clone();

        let det = m.get_d(0, 0) * m.get_d(1, 1) - m.get_d(0, 1) * m.get_d(1, 0);
        // D^-1 for a lower-triangular 2x2
        let d_inv = [
            [m.get_d(1, 1) / det, -m.get_d(0, 1) / det],
            [-m.get_d(1, 0) / det, m.get_d(0, 0) / det],
        ];
        let mut red = isolator(z1, z2, IsolatorFormulation::Reduced);
        red.init_dc(&mut reg);
        for row in 0..2 {
            for col in 0..2 {
                let mut y = Complex64::new(0.0, 0.0);
                for k in 0..2 {
                    for l in 0..2 {
                        y -= m.get_b(row, k) * d_inv[k][l] * m.get_c(l, col);
                    }
                }
                let want = red.core().matrices.get_y(row, col);
                assert!(
                    (y - want).norm() < 1e-12,
                    "Y[{}][{}] = {}, want {}",
                    row, col, y, want
                );
            }
        }
    }

    #[test]
    fn test_invalid_impedance_rejected() {
        let r = Isolator::new("X1", NodeId::new(1), NodeId::new(2), -5.0, 50.0,
            IsolatorFormulation::Reduced, Constants::default());
        assert!(r.is_err());
    }

    #[test]
    fn test_noise_matched_cold_reverse() {
        // matched input port at reference temperature: r = 0, so the
        // outgoing-wave correlation concentrates at port 1
        let t0_celsius = 290.0 - 273.15;
        let mut x = isolator(50.0, 50.0, IsolatorFormulation::Reduced);
        x.core_mut().props.set_real("Temp", t0_celsius);
        x.calc_noise_sp(1e9);
        let m = &x.core().matrices;
        assert!((m.get_n(0, 0).re - 1.0).abs() < 1e-12);
        assert_eq!(m.get_n(0, 1).re, 0.0);
        assert_eq!(m.get_n(1, 1).re, 0.0);
    }
}
