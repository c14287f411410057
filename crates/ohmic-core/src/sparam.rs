//! Conversions between admittance, scattering and noise-correlation
//! representations, all referenced to a uniform real impedance z0.

use nalgebra::DMatrix;
use num_complex::Complex64;

/// Convert an admittance matrix to a scattering matrix:
/// `S = (E - z0 Y) (E + z0 Y)^-1`.
///
/// Returns `None` if `E + z0 Y` is singular; callers skip the update and
/// emit a diagnostic.
pub fn y_to_s(y: &DMatrix<Complex64>, z0: f64) -> Option<DMatrix<Complex64>> {
    let n = y.nrows();
    let e = DMatrix::<Complex64>::identity(n, n);
    let zy = y * Complex64::from(z0);
    (&e + &zy).try_inverse().map(|inv| (&e - &zy) * inv)
}

/// Convert a scattering matrix to an admittance matrix:
/// `Y = (E + S)^-1 (E - S) / z0`.
pub fn s_to_y(s: &DMatrix<Complex64>, z0: f64) -> Option<DMatrix<Complex64>> {
    let n = s.nrows();
    let e = DMatrix::<Complex64>::identity(n, n);
    (&e + s)
        .try_inverse()
        .map(|inv| inv * (&e - s) * Complex64::from(1.0 / z0))
}

/// Convert a noise-current correlation matrix (already scaled by z0) into
/// the noise-wave representation using the device's scattering matrix:
/// `Cs = (E + S) Cy (E + S)^H / 4`.
pub fn cy_to_cs(cy: &DMatrix<Complex64>, s: &DMatrix<Complex64>) -> DMatrix<Complex64> {
    let n = s.nrows();
    let e = DMatrix::<Complex64>::identity(n, n);
    let f = &e + s;
    (&f * cy * f.adjoint()) * Complex64::from(0.25)
}
