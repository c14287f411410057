//! Shared junction and FET physics.
//!
//! Pure functions with no device state: temperature scaling of junction
//! potentials and capacitances, the p-n junction current/conductance pair,
//! depletion capacitance and charge, the Meyer gate-capacitance partition,
//! and the voltage-limiting formulas that keep exponential equations from
//! diverging under Newton-Raphson.

use std::f64::consts::SQRT_2;

use ohmic_core::constants::thermal_voltage;

/// Largest exponent fed to `exp` before the junction equation switches to
/// saturation; keeps intermediate results finite.
const EXP_LIMIT: f64 = 709.0;

/// Temperature-dependent bandgap of silicon (eV).
pub fn egap(t: f64) -> f64 {
    1.16 - 7.02e-4 * t * t / (t + 1108.0)
}

/// Scale a junction potential from the nominal temperature `t1` to the
/// analysis temperature `t2` (both Kelvin).
pub fn pn_potential_t(t1: f64, t2: f64, pn: f64) -> f64 {
    let vt = thermal_voltage(t2);
    (t2 / t1) * pn - 3.0 * vt * (t2 / t1).ln() - (t2 / t1) * egap(t1) + egap(t2)
}

/// Temperature-scaling factor for a zero-bias junction capacitance, given
/// the grading coefficient `m` and the ratio `vr` of the scaled to the
/// nominal junction potential.
pub fn pn_capacitance_f(t1: f64, t2: f64, m: f64, vr: f64) -> f64 {
    let dt = t2 - t1;
    1.0 + m * (4e-4 * dt - vr + 1.0)
}

/// Critical junction voltage beyond which the exponential diode equation
/// is replaced by a bounded extrapolation.
pub fn pn_critical_voltage(isat: f64, ute: f64) -> f64 {
    ute * (ute / SQRT_2 / isat).ln()
}

/// Junction-voltage limiting.
///
/// Returns `u` unchanged while it stays below the critical voltage or
/// within two thermal voltages of the previous iterate `u_prev`;
/// otherwise returns a logarithmically damped update derived from the
/// exponential-junction tangent at `u_prev`, never overshooting past
/// `u_crit` in a single iteration.
pub fn pn_voltage(u: f64, u_prev: f64, ute: f64, u_crit: f64) -> f64 {
    if u > u_crit && (u - u_prev).abs() > 2.0 * ute {
        if u_prev > 0.0 {
            let arg = 1.0 + (u - u_prev) / ute;
            if arg > 0.0 {
                u_prev + ute * arg.ln()
            } else {
                u_crit
            }
        } else {
            ute * (u / ute).ln()
        }
    } else {
        u
    }
}

/// Junction current and conductance of a parasitic MOS body diode.
///
/// Below zero bias the exponential is linearized around the origin so the
/// conductance never vanishes. Callers add a floor conductance ("gtiny",
/// typically the saturation current magnitude) on top to keep the local
/// Jacobian non-singular near zero current.
pub fn pn_junction_mos(u: f64, isat: f64, ute: f64) -> (f64, f64) {
    if ute <= 0.0 {
        return (0.0, 0.0);
    }
    if u <= 0.0 {
        let g = isat / ute;
        (g * u, g)
    } else {
        let e = (u / ute).min(EXP_LIMIT).exp();
        (isat * (e - 1.0), isat * e / ute)
    }
}

/// Gate-drive voltage limiting for a FET relative to the previous iterate
/// and the nominal threshold `u_th`.
pub fn fet_voltage(u: f64, u_prev: f64, u_th: f64) -> f64 {
    let u_tst_hi = (2.0 * (u_prev - u_th)).abs() + 2.0;
    let u_tst_lo = u_tst_hi / 2.0 + 2.0;
    let u_tox = u_th + 3.5;
    let delta = u - u_prev;

    if u_prev >= u_th {
        if u_prev >= u_tox {
            if delta <= 0.0 {
                // heading towards cutoff
                if u >= u_tox {
                    if -delta > u_tst_lo {
                        return u_prev - u_tst_lo;
                    }
                    u
                } else {
                    u.max(u_th + 2.0)
                }
            } else if delta >= u_tst_hi {
                u_prev + u_tst_hi
            } else {
                u
            }
        } else if delta <= 0.0 {
            u.max(u_th - 0.5)
        } else {
            u.min(u_th + 4.0)
        }
    } else if delta <= 0.0 {
        if -delta > u_tst_hi {
            u_prev - u_tst_hi
        } else {
            u
        }
    } else {
        let u_on = u_th + 0.5;
        if u <= u_on {
            if delta > u_tst_lo {
                u_prev + u_tst_lo
            } else {
                u
            }
        } else {
            u_on
        }
    }
}

/// Drain-source voltage limiting for a FET relative to the previous
/// iterate.
pub fn fet_voltage_ds(u: f64, u_prev: f64) -> f64 {
    if u_prev >= 3.5 {
        if u > u_prev {
            u.min(3.0 * u_prev + 2.0)
        } else if u < 3.5 {
            u.max(2.0)
        } else {
            u
        }
    } else if u > u_prev {
        u.min(4.0)
    } else {
        u.max(-0.5)
    }
}

/// Depletion capacitance of a p-n junction with zero-bias capacitance
/// `c0`, junction potential `vd`, grading coefficient `m` and
/// forward-bias knee `fc`. Linearized above the knee.
pub fn pn_capacitance(u: f64, c0: f64, vd: f64, m: f64, fc: f64) -> f64 {
    if vd <= 0.0 {
        return c0;
    }
    if u <= fc * vd {
        c0 * (1.0 - u / vd).powf(-m)
    } else {
        c0 * (1.0 - fc).powf(-m) * (1.0 + m * (u - fc * vd) / (vd * (1.0 - fc)))
    }
}

/// Depletion charge consistent with [`pn_capacitance`]; the branch above
/// the knee is the exact integral of the linearized capacitance, so charge
/// and capacitance stay continuous there.
pub fn pn_charge(u: f64, c0: f64, vd: f64, m: f64, fc: f64) -> f64 {
    if vd <= 0.0 {
        return c0 * u;
    }
    if u <= fc * vd {
        c0 * vd / (1.0 - m) * (1.0 - (1.0 - u / vd).powf(1.0 - m))
    } else {
        let q_knee = c0 * vd / (1.0 - m) * (1.0 - (1.0 - fc).powf(1.0 - m));
        let x = u - fc * vd;
        q_knee + c0 * (1.0 - fc).powf(-m) * (x + m * x * x / (2.0 * vd * (1.0 - fc)))
    }
}

/// Meyer partition of the gate-oxide capacitance into gate-source,
/// gate-drain and gate-bulk parts as a function of the terminal voltages.
///
/// `u_gs`/`u_gd` are already ordered for the present conduction direction
/// (the caller swaps them in reverse mode). Returns `(cgs, cgd, cgb)`.
pub fn fet_capacitance_meyer(
    u_gs: f64,
    u_gd: f64,
    u_on: f64,
    u_dsat: f64,
    phi: f64,
    cox: f64,
) -> (f64, f64, f64) {
    let u_tst = u_gs - u_on;
    if u_tst <= -phi {
        // accumulation
        (0.0, 0.0, cox / 2.0)
    } else if u_tst <= -phi / 2.0 {
        (0.0, 0.0, -u_tst * cox / 2.0 / phi)
    } else if u_tst <= 0.0 {
        // depletion
        (u_tst * cox * 2.0 / 3.0 / phi + cox / 3.0, 0.0, -u_tst * cox / 2.0 / phi)
    } else {
        let u_ds = u_gs - u_gd;
        if u_dsat <= u_ds {
            // saturation
            (2.0 * cox / 3.0, 0.0, 0.0)
        } else {
            // linear region
            let s1 = (u_dsat - u_ds) * (u_dsat - u_ds);
            let s2 = (2.0 * u_dsat - u_ds) * (2.0 * u_dsat - u_ds);
            (
                cox * (1.0 - s1 / s2) * 2.0 / 3.0,
                cox * (1.0 - u_dsat * u_dsat / s2) * 2.0 / 3.0,
                0.0,
            )
        }
    }
}
