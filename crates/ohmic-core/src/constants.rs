//! Physical constants and the injected reference configuration.

/// Boltzmann constant (J/K).
pub const BOLTZMANN: f64 = 1.380649e-23;

/// Elementary charge (C).
pub const ELECTRON_CHARGE: f64 = 1.602176634e-19;

/// Vacuum permittivity (F/m).
pub const VACUUM_PERMITTIVITY: f64 = 8.854187817e-12;

/// Relative permittivity of silicon.
pub const EPS_SILICON: f64 = 11.7;

/// Relative permittivity of silicon dioxide.
pub const EPS_OXIDE: f64 = 3.9;

/// Intrinsic carrier density of silicon at 300 K (1/m^3).
pub const NI_SILICON: f64 = 1.45e16;

/// kB / q (V/K), the thermal-voltage slope.
pub const KB_OVER_Q: f64 = BOLTZMANN / ELECTRON_CHARGE;

/// q / kB (K/V).
pub const Q_OVER_KB: f64 = ELECTRON_CHARGE / BOLTZMANN;

/// Offset between the Celsius and Kelvin scales.
pub const ZERO_CELSIUS: f64 = 273.15;

/// Convert a temperature given in degrees Celsius to Kelvin.
pub fn kelvin(celsius: f64) -> f64 {
    celsius + ZERO_CELSIUS
}

/// Thermal voltage kT/q at the given absolute temperature (K).
pub fn thermal_voltage(t: f64) -> f64 {
    t * KB_OVER_Q
}

/// Immutable per-analysis reference values.
///
/// Injected into every device at construction instead of living as
/// process-wide globals, so tests can vary the reference impedance and
/// noise temperature without shared mutable state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constants {
    /// Reference impedance for scattering parameters (Ohm).
    pub z0: f64,
    /// Reference temperature for normalized noise correlation (K).
    pub t0: f64,
}

impl Default for Constants {
    fn default() -> Self {
        Self { z0: 50.0, t0: 290.0 }
    }
}

impl Constants {
    /// Create a configuration with a custom reference impedance and noise
    /// temperature. Both must be positive.
    pub fn new(z0: f64, t0: f64) -> crate::Result<Self> {
        if z0 <= 0.0 {
            return Err(crate::Error::InvalidParameter {
                name: "z0".into(),
                value: z0,
            });
        }
        if t0 <= 0.0 {
            return Err(crate::Error::InvalidParameter {
                name: "t0".into(),
                value: t0,
            });
        }
        Ok(Self { z0, t0 })
    }
}
