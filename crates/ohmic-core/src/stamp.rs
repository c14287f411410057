//! Per-device local matrix contributions.
//!
//! Every entry is addressed by the device's own terminal index; the
//! external registry maps terminals into the global MNA system. One
//! complex-valued container serves all analyses: DC reads the real part,
//! AC/SP/TR use the full complex values. Devices using the augmented
//! (voltage-source) formulation additionally fill the B/C/D/E blocks and
//! declare their extra unknown count through [`DeviceMatrices::vsources`].

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

/// Local admittance, current, scattering, noise-correlation and
/// augmented-formulation blocks of a single device.
#[derive(Debug, Clone)]
pub struct DeviceMatrices {
    ports: usize,
    vsources: usize,
    y: DMatrix<Complex64>,
    i: DVector<Complex64>,
    b: DMatrix<Complex64>,
    c: DMatrix<Complex64>,
    d: DMatrix<Complex64>,
    e: DVector<Complex64>,
    s: DMatrix<Complex64>,
    n: DMatrix<Complex64>,
}

impl DeviceMatrices {
    /// Allocate matrices for a device with `ports` terminals and
    /// `vsources` extra voltage-source unknowns.
    pub fn new(ports: usize, vsources: usize) -> Self {
        let zero = Complex64::new(0.0, 0.0);
        Self {
            ports,
            vsources,
            y: DMatrix::from_element(ports, ports, zero),
            i: DVector::from_element(ports, zero),
            b: DMatrix::from_element(ports, vsources, zero),
            c: DMatrix::from_element(vsources, ports, zero),
            d: DMatrix::from_element(vsources, vsources, zero),
            e: DVector::from_element(vsources, zero),
            s: DMatrix::from_element(ports, ports, zero),
            n: DMatrix::from_element(ports, ports, zero),
        }
    }

    /// Number of device terminals.
    pub fn ports(&self) -> usize {
        self.ports
    }

    /// Number of extra unknowns this device contributes to the global
    /// system (the voltage-source-count contract).
    pub fn vsources(&self) -> usize {
        self.vsources
    }

    /// Reallocate with a new extra-unknown count, clearing all entries.
    /// Called from `init<Mode>` when a device (re)declares its shape.
    pub fn alloc(&mut self, vsources: usize) {
        *self = Self::new(self.ports, vsources);
    }

    /// Zero all entries, keeping the shape.
    pub fn clear(&mut self) {
        let zero = Complex64::new(0.0, 0.0);
        self.y.fill(zero);
        self.i.fill(zero);
        self.b.fill(zero);
        self.c.fill(zero);
        self.d.fill(zero);
        self.e.fill(zero);
        self.s.fill(zero);
        self.n.fill(zero);
    }

    // admittance block

    pub fn set_y(&mut self, row: usize, col: usize, value: Complex64) {
        self.y[(row, col)] = value;
    }

    pub fn add_y(&mut self, row: usize, col: usize, value: Complex64) {
        self.y[(row, col)] += value;
    }

    pub fn get_y(&self, row: usize, col: usize) -> Complex64 {
        self.y[(row, col)]
    }

    pub fn clear_y(&mut self) {
        self.y.fill(Complex64::new(0.0, 0.0));
    }

    pub fn y_matrix(&self) -> &DMatrix<Complex64> {
        &self.y
    }

    pub fn set_y_matrix(&mut self, y: DMatrix<Complex64>) {
        debug_assert_eq!(y.nrows(), self.ports);
        self.y = y;
    }

    // independent current vector

    pub fn set_i(&mut self, terminal: usize, value: Complex64) {
        self.i[terminal] = value;
    }

    pub fn add_i(&mut self, terminal: usize, value: Complex64) {
        self.i[terminal] += value;
    }

    pub fn get_i(&self, terminal: usize) -> Complex64 {
        self.i[terminal]
    }

    pub fn clear_i(&mut self) {
        self.i.fill(Complex64::new(0.0, 0.0));
    }

    // scattering block

    pub fn set_s(&mut self, row: usize, col: usize, value: Complex64) {
        self.s[(row, col)] = value;
    }

    pub fn get_s(&self, row: usize, col: usize) -> Complex64 {
        self.s[(row, col)]
    }

    pub fn s_matrix(&self) -> &DMatrix<Complex64> {
        &self.s
    }

    pub fn set_s_matrix(&mut self, s: DMatrix<Complex64>) {
        debug_assert_eq!(s.nrows(), self.ports);
        self.s = s;
    }

    // noise-correlation block

    pub fn set_n(&mut self, row: usize, col: usize, value: Complex64) {
        self.n[(row, col)] = value;
    }

    pub fn get_n(&self, row: usize, col: usize) -> Complex64 {
        self.n[(row, col)]
    }

    pub fn n_matrix(&self) -> &DMatrix<Complex64> {
        &self.n
    }

    pub fn set_n_matrix(&mut self, n: DMatrix<Complex64>) {
        debug_assert_eq!(n.nrows(), self.ports);
        self.n = n;
    }

    // augmented-formulation blocks

    pub fn set_b(&mut self, terminal: usize, vsrc: usize, value: Complex64) {
        self.b[(terminal, vsrc)] = value;
    }

    pub fn get_b(&self, terminal: usize, vsrc: usize) -> Complex64 {
        self.b[(terminal, vsrc)]
    }

    pub fn set_c(&mut self, vsrc: usize, terminal: usize, value: Complex64) {
        self.c[(vsrc, terminal)] = value;
    }

    pub fn get_c(&self, vsrc: usize, terminal: usize) -> Complex64 {
        self.c[(vsrc, terminal)]
    }

    pub fn set_d(&mut self, row: usize, col: usize, value: Complex64) {
        self.d[(row, col)] = value;
    }

    pub fn get_d(&self, row: usize, col: usize) -> Complex64 {
        self.d[(row, col)]
    }

    pub fn set_e(&mut self, vsrc: usize, value: Complex64) {
        self.e[vsrc] = value;
    }

    pub fn get_e(&self, vsrc: usize) -> Complex64 {
        self.e[vsrc]
    }
}
