//! Per-device state slots with a short history ring.
//!
//! Each slot holds the present value at offset 0 and up to two previously
//! accepted values at offsets 1 and 2. Offset 0 is mutable within a
//! timestep; the deeper offsets shift only when the external driver
//! accepts a timestep and calls [`StateVector::shift`]. Reactive devices
//! keep their charge and companion-current history here and use
//! [`StateVector::integrate`] to obtain the trapezoidal companion model.

/// Depth of the history ring per slot.
pub const HISTORY_DEPTH: usize = 3;

/// An indexed array of named state slots with history.
#[derive(Debug, Clone, Default)]
pub struct StateVector {
    slots: Vec<[f64; HISTORY_DEPTH]>,
    delta: f64,
}

impl StateVector {
    /// Allocate `count` state slots, all zero-initialized. The slot count
    /// is fixed per device at transient initialization.
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![[0.0; HISTORY_DEPTH]; count],
            delta: 0.0,
        }
    }

    /// Number of allocated slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Set the current timestep used by [`integrate`](Self::integrate).
    pub fn set_timestep(&mut self, delta: f64) {
        self.delta = delta;
    }

    /// The current timestep, or zero before the first transient step.
    pub fn timestep(&self) -> f64 {
        self.delta
    }

    /// Set the current (offset 0) value of a slot.
    pub fn set(&mut self, slot: usize, value: f64) {
        self.slots[slot][0] = value;
    }

    /// Current (offset 0) value of a slot.
    pub fn get(&self, slot: usize) -> f64 {
        self.slots[slot][0]
    }

    /// Value of a slot at a past offset: 1 is the previously accepted
    /// step, 2 is two steps back.
    pub fn get_at(&self, slot: usize, offset: usize) -> f64 {
        self.slots[slot][offset]
    }

    /// Commit the present values: called by the driver when it accepts a
    /// timestep. Offset 2 takes the old offset 1, offset 1 takes the
    /// present value; offset 0 is left in place as the starting iterate
    /// of the next step.
    pub fn shift(&mut self) {
        for ring in &mut self.slots {
            ring[2] = ring[1];
            ring[1] = ring[0];
        }
    }

    /// Reset every slot history to a value (typically zero at the start
    /// of a transient run).
    pub fn fill(&mut self, value: f64) {
        for ring in &mut self.slots {
            *ring = [value; HISTORY_DEPTH];
        }
    }

    /// Trapezoidal charge integration for the slot pair starting at
    /// `q_slot`.
    ///
    /// `q_slot` holds the present charge (set by the caller before the
    /// call); `q_slot + 1` is the companion current slot maintained by
    /// this function. With h the current timestep,
    ///
    /// ```text
    /// geq  = 2 C / h
    /// i(n) = (2/h) (Q(n) - Q(n-1)) - i(n-1)
    /// ```
    ///
    /// Returns `(geq, i_now)` where `i_now` is the element current at the
    /// present iterate. The caller stamps `geq` between its terminals and
    /// the companion source `i_now - geq * v` into its current vector.
    /// Before the first timestep (h = 0) both results are zero.
    pub fn integrate(&mut self, q_slot: usize, cap: f64) -> (f64, f64) {
        if self.delta <= 0.0 {
            return (0.0, 0.0);
        }
        let c = 2.0 / self.delta;
        let i_slot = q_slot + 1;
        let ieq = c * self.get_at(q_slot, 1) + self.get_at(i_slot, 1);
        let i_now = c * self.get(q_slot) - ieq;
        self.set(i_slot, i_now);
        (c * cap, i_now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_shifts_only_on_accept() {
        let mut sv = StateVector::new(1);
        sv.set(0, 1.0);
        sv.set(0, 2.0); // overwritten within the step
        assert_eq!(sv.get_at(0, 1), 0.0);

        sv.shift();
        assert_eq!(sv.get_at(0, 1), 2.0);
        assert_eq!(sv.get_at(0, 2), 0.0);

        sv.set(0, 3.0);
        sv.shift();
        assert_eq!(sv.get_at(0, 1), 3.0);
        assert_eq!(sv.get_at(0, 2), 2.0);
    }

    #[test]
    fn test_integrate_before_first_step_is_inert() {
        let mut sv = StateVector::new(2);
        sv.set(0, 1e-12);
        let (g, i) = sv.integrate(0, 1e-12);
        assert_eq!(g, 0.0);
        assert_eq!(i, 0.0);
    }

    #[test]
    fn test_integrate_constant_charge_gives_zero_current() {
        let mut sv = StateVector::new(2);
        sv.set_timestep(1e-9);
        sv.set(0, 5e-12);
        sv.shift();
        sv.set(0, 5e-12);
        let (_g, i) = sv.integrate(0, 1e-12);
        assert!(i.abs() < 1e-20, "steady charge must carry no current: {}", i);
    }

    #[test]
    fn test_integrate_voltage_ramp_reproduces_analytic_charge() {
        // Constant C, linear voltage ramp v = k t. The trapezoidal rule is
        // exact for a linear charge history, so the recovered current is
        // C k at every step and the accumulated charge matches C dV.
        let c = 1e-12;
        let k = 1e6; // V/s
        let h = 1e-9;
        let mut sv = StateVector::new(2);
        sv.set_timestep(h);

        // seed the history at t = 0 with the analytic current
        sv.set(0, 0.0);
        sv.set(1, c * k);
        sv.shift();

        let mut q_recovered = 0.0;
        let mut i_prev = c * k;
        for n in 1..=100 {
            let v = k * h * n as f64;
            sv.set(0, c * v);
            let (geq, i_now) = sv.integrate(0, c);
            assert!((geq - 2.0 * c / h).abs() < 1e-12 * geq);
            assert!(
                (i_now - c * k).abs() < 1e-9 * c * k,
                "step {}: i = {} expected {}",
                n,
                i_now,
                c * k
            );
            // trapezoidal charge accumulation from the current samples
            q_recovered += 0.5 * h * (i_now + i_prev);
            i_prev = i_now;
            sv.shift();
        }

        let dv = k * h * 100.0;
        assert!(
            (q_recovered - c * dv).abs() < 1e-6 * c * dv,
            "Q = {} expected {}",
            q_recovered,
            c * dv
        );
    }
}
