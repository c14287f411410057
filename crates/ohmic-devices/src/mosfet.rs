//! MOSFET large-signal model: square-law channel with bulk junction
//! diodes, Meyer gate capacitances and optional series terminal
//! resistances.
//!
//! The model works in a polarity-normalized frame: every internal voltage
//! is multiplied by the device polarity so n-channel equations serve both
//! types, and results are mapped back when stamping. Reverse conduction
//! (negative drain-source voltage) exchanges the drain and source roles
//! through the channel-control conductances, never by renumbering nodes.

use nalgebra::DMatrix;
use num_complex::Complex64;
use std::f64::consts::PI;

use ohmic_core::constants::{
    kelvin, thermal_voltage, BOLTZMANN, ELECTRON_CHARGE, EPS_OXIDE, EPS_SILICON, NI_SILICON,
    Q_OVER_KB, VACUUM_PERMITTIVITY,
};
use ohmic_core::node::NodeRegistry;
use ohmic_core::sparam::{cy_to_cs, y_to_s};
use ohmic_core::{Analysis, Constants, Device, DeviceCore, NodeId};

use crate::physics;
use crate::resistor::Resistor;

pub const NODE_G: usize = 0;
pub const NODE_D: usize = 1;
pub const NODE_S: usize = 2;
pub const NODE_B: usize = 3;

// State-slot layout. The gate charges keep voltage and capacitance
// history next to the charge/current pair for the Meyer charge
// approximation; the bulk junctions need only charge and current.
const Q_GD: usize = 0; // + 1 current, + 2 voltage, + 3 capacitance
const Q_GS: usize = 4;
const Q_BD: usize = 8; // + 1 current
const Q_BS: usize = 10;
const Q_GB: usize = 12;
const STATE_COUNT: usize = 16;

/// An auxiliary series resistor spliced in between a terminal and its
/// external node.
#[derive(Debug, Clone)]
struct SeriesResistor {
    resistor: Resistor,
    external: NodeId,
}

/// Four-terminal MOSFET (gate, drain, source, bulk).
#[derive(Debug, Clone)]
pub struct Mosfet {
    core: DeviceCore,

    // derived model parameters, valid after model initialization
    pol: f64,
    leff: f64,
    cox: f64,
    beta: f64,
    phi: f64,
    ga: f64,
    vto: f64,
    rd_eff: f64,
    rs_eff: f64,

    // previous Newton iterates for voltage limiting
    ugs_prev: f64,
    ugd_prev: f64,
    ubs_prev: f64,
    ubd_prev: f64,
    uds_prev: f64,

    // present polarity-normalized bias
    ugs: f64,
    ugd: f64,
    ubs: f64,
    ubd: f64,
    uds: f64,
    ugb: f64,

    // DC solution
    ids: f64,
    gm: f64,
    gds: f64,
    gmb: f64,
    gbs: f64,
    gbd: f64,
    ibs: f64,
    ibd: f64,
    uon: f64,
    udsat: f64,
    mos_dir: f64,
    source_control: f64,
    drain_control: f64,

    // charges for the transient companion stamps
    qgd: f64,
    qgs: f64,
    qgb: f64,
    qbd: f64,
    qbs: f64,

    transient_mode: i64,

    // terminal-indexed series resistances (gate, drain, source)
    series: [Option<SeriesResistor>; 3],
}

impl Mosfet {
    /// Create a MOSFET with the full default parameter set.
    pub fn new(
        name: impl Into<String>,
        gate: NodeId,
        drain: NodeId,
        source: NodeId,
        bulk: NodeId,
        constants: Constants,
    ) -> Self {
        let mut core = DeviceCore::new(name, vec![gate, drain, source, bulk], constants);
        let p = &mut core.props;
        p.set_text("Type", "nfet");
        p.set_real("Is", 1e-14);
        p.set_real("N", 1.0);
        p.set_real("Vt0", 1.0);
        p.set_real("Lambda", 0.0);
        p.set_real("Kp", 2e-5);
        p.set_real("Gamma", 0.0);
        p.set_real("Phi", 0.6);
        p.set_real("Rd", 0.0);
        p.set_real("Rs", 0.0);
        p.set_real("Rg", 0.0);
        p.set_real("L", 1.0);
        p.set_real("Ld", 0.0);
        p.set_real("W", 1.0);
        p.set_real("Tox", 1e-7);
        p.set_real("Cgso", 0.0);
        p.set_real("Cgdo", 0.0);
        p.set_real("Cgbo", 0.0);
        p.set_real("Cbd", 0.0);
        p.set_real("Cbs", 0.0);
        p.set_real("Pb", 0.8);
        p.set_real("Mj", 0.5);
        p.set_real("Fc", 0.5);
        p.set_real("Cjsw", 0.0);
        p.set_real("Mjsw", 0.33);
        p.set_real("Tt", 0.0);
        p.set_real("Nsub", 0.0);
        p.set_real("Nss", 0.0);
        p.set_real("Tpg", 1.0);
        p.set_real("Uo", 600.0);
        p.set_real("Rsh", 0.0);
        p.set_real("Nrd", 1.0);
        p.set_real("Nrs", 1.0);
        p.set_real("Cj", 0.0);
        p.set_real("Js", 0.0);
        p.set_real("Ad", 0.0);
        p.set_real("As", 0.0);
        p.set_real("Pd", 0.0);
        p.set_real("Ps", 0.0);
        p.set_real("Kf", 0.0);
        p.set_real("Af", 1.0);
        p.set_real("Ffe", 1.0);
        p.set_real("Temp", 26.85);
        p.set_real("Tnom", 26.85);
        p.set_integer("capModel", 1);

        Self {
            core,
            pol: 1.0,
            leff: 0.0,
            cox: 0.0,
            beta: 0.0,
            phi: 0.0,
            ga: 0.0,
            vto: 0.0,
            rd_eff: 0.0,
            rs_eff: 0.0,
            ugs_prev: 0.0,
            ugd_prev: 0.0,
            ubs_prev: 0.0,
            ubd_prev: 0.0,
            uds_prev: 0.0,
            ugs: 0.0,
            ugd: 0.0,
            ubs: 0.0,
            ubd: 0.0,
            uds: 0.0,
            ugb: 0.0,
            ids: 0.0,
            gm: 0.0,
            gds: 0.0,
            gmb: 0.0,
            gbs: 0.0,
            gbd: 0.0,
            ibs: 0.0,
            ibd: 0.0,
            uon: 0.0,
            udsat: 0.0,
            mos_dir: 1.0,
            source_control: 0.0,
            drain_control: 0.0,
            qgd: 0.0,
            qgs: 0.0,
            qgb: 0.0,
            qbd: 0.0,
            qbs: 0.0,
            transient_mode: 0,
            series: [None, None, None],
        }
    }

    /// Create an n-channel MOSFET.
    pub fn nfet(
        name: impl Into<String>,
        gate: NodeId,
        drain: NodeId,
        source: NodeId,
        bulk: NodeId,
        constants: Constants,
    ) -> Self {
        let mut m = Self::new(name, gate, drain, source, bulk, constants);
        m.core.props.set_text("Type", "nfet");
        m
    }

    /// Create a p-channel MOSFET.
    pub fn pfet(
        name: impl Into<String>,
        gate: NodeId,
        drain: NodeId,
        source: NodeId,
        bulk: NodeId,
        constants: Constants,
    ) -> Self {
        let mut m = Self::new(name, gate, drain, source, bulk, constants);
        m.core.props.set_text("Type", "pfet");
        m
    }

    /// Transconductance coefficient after model initialization (A/V^2).
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Absolute gate-oxide capacitance after model initialization (F).
    pub fn cox(&self) -> f64 {
        self.cox
    }

    /// Zero-bias threshold voltage after model initialization (V).
    pub fn threshold(&self) -> f64 {
        self.vto
    }

    /// The auxiliary series resistor at a terminal, if one is inserted.
    pub fn series_resistor(&self, terminal: usize) -> Option<&Resistor> {
        let idx = Self::series_index(terminal)?;
        self.series[idx].as_ref().map(|sr| &sr.resistor)
    }

    fn series_index(terminal: usize) -> Option<usize> {
        match terminal {
            NODE_G => Some(0),
            NODE_D => Some(1),
            NODE_S => Some(2),
            _ => None,
        }
    }

    /// Seed the limiting history from the present terminal voltages, so a
    /// restarted Newton run does not limit against stale iterates.
    pub fn restart_dc(&mut self) {
        let vg = self.core.voltage(NODE_G);
        let vd = self.core.voltage(NODE_D);
        let vs = self.core.voltage(NODE_S);
        let vb = self.core.voltage(NODE_B);
        self.ugd_prev = vg - vd;
        self.ugs_prev = vg - vs;
        self.ubs_prev = vb - vs;
        self.ubd_prev = vb - vd;
        self.uds_prev = self.ugs_prev - self.ugd_prev;
    }

    /// Derive the temperature-dependent model parameters. Runs once per
    /// `init_dc`; results land in the struct fields and the scaled cache.
    fn init_model(&mut self) {
        self.core.scaled.clear();

        let t = self.core.props.real("Temp");
        let t2 = kelvin(t);
        let t1 = kelvin(self.core.props.real("Tnom"));

        self.pol = match self.core.props.text("Type") {
            Some("pfet") => -1.0,
            _ => 1.0,
        };

        // effective channel length
        let l = self.core.props.real("L");
        let ld = self.core.props.real("Ld");
        self.leff = l - 2.0 * ld;
        if self.leff <= 0.0 {
            log::warn!(
                "mosfet {}: effective channel length {} <= 0, set to L = {}",
                self.core.name(),
                self.leff,
                l
            );
            self.leff = l;
        }

        // gate oxide capacitance per area
        let w = self.core.props.real("W");
        let tox = self.core.props.real("Tox");
        if tox <= 0.0 {
            log::warn!(
                "mosfet {}: disabling gate oxide capacitance, Cox = 0",
                self.core.name()
            );
            self.cox = 0.0;
        } else {
            self.cox = EPS_OXIDE * VACUUM_PERMITTIVITY / tox;
        }

        // DC transconductance coefficient
        let f1 = (1.5 * (t1 / t2).ln()).exp();
        let kp = self.core.props.real("Kp") * f1;
        let uo = self.core.props.real("Uo") * f1;
        self.core.scaled.set("Kp", kp);
        self.core.scaled.set("Uo", uo);
        if kp > 0.0 {
            self.beta = kp * w / self.leff;
        } else if self.cox > 0.0 && uo > 0.0 {
            self.beta = uo * 1e-4 * self.cox * w / self.leff;
        } else {
            log::warn!(
                "mosfet {}: adjust Tox, Uo or Kp to get a valid transconductance coefficient",
                self.core.name()
            );
            self.beta = 2e-5 * w / self.leff;
        }

        // surface potential
        let nsub = self.core.props.real("Nsub");
        let ut = thermal_voltage(self.core.constants.t0);
        let p = physics::pn_potential_t(t1, t2, self.core.props.real("Phi"));
        self.core.scaled.set("Phi", p);
        self.phi = p;
        if self.phi <= 0.0 {
            if nsub > 0.0 {
                if nsub * 1e6 >= NI_SILICON {
                    self.phi = 2.0 * ut * (nsub * 1e6 / NI_SILICON).ln();
                } else {
                    log::warn!(
                        "mosfet {}: substrate doping less than intrinsic density, \
                         adjust Nsub >= {}",
                        self.core.name(),
                        NI_SILICON / 1e6
                    );
                    self.phi = 0.6;
                }
            } else {
                log::warn!(
                    "mosfet {}: adjust Nsub or Phi to get a valid surface potential",
                    self.core.name()
                );
                self.phi = 0.6;
            }
        }

        // bulk threshold coefficient
        self.ga = self.core.props.real("Gamma");
        if self.ga < 0.0 {
            if self.cox > 0.0 && nsub > 0.0 {
                self.ga = (2.0 * ELECTRON_CHARGE * EPS_SILICON * VACUUM_PERMITTIVITY
                    * nsub
                    * 1e6)
                    .sqrt()
                    / self.cox;
            } else {
                log::warn!(
                    "mosfet {}: adjust Tox, Nsub or Gamma to get a valid bulk threshold",
                    self.core.name()
                );
                self.ga = 0.0;
            }
        }

        // zero-bias threshold voltage
        self.vto = self.core.props.real("Vt0");
        if self.vto == 0.0 {
            let tpg = self.core.props.real("Tpg");
            let nss = self.core.props.real("Nss");
            let eg = physics::egap(kelvin(t));
            let phi_g = if tpg != 0.0 {
                // n-poly or p-poly gate
                4.15 + eg / 2.0 - self.pol * tpg * eg / 2.0
            } else {
                // alumina gate
                4.1
            };
            let phi_ms = phi_g - (4.15 + eg / 2.0 + self.pol * self.phi / 2.0);
            if nss >= 0.0 && self.cox > 0.0 {
                self.vto = phi_ms - ELECTRON_CHARGE * nss * 1e4 / self.cox
                    + self.pol * (self.phi + self.ga * self.phi.sqrt());
            } else {
                log::warn!(
                    "mosfet {}: adjust Tox, Nss or Vt0 to get a valid threshold voltage",
                    self.core.name()
                );
                self.vto = 0.0;
            }
        }

        self.cox *= w * self.leff;

        // drain and source series resistance including sheet contribution
        let rsh = self.core.props.real("Rsh");
        let nrd = self.core.props.real("Nrd");
        let nrs = self.core.props.real("Nrs");
        self.rd_eff = self.core.props.real("Rd");
        self.rs_eff = self.core.props.real("Rs");
        if rsh > 0.0 {
            if nrd > 0.0 {
                self.rd_eff += rsh * nrd;
            }
            if nrs > 0.0 {
                self.rs_eff += rsh * nrs;
            }
        }

        // zero-bias square junction capacitance
        let mj = self.core.props.real("Mj");
        let mjs = self.core.props.real("Mjsw");
        let pb = self.core.props.real("Pb");
        let pb_t = physics::pn_potential_t(t1, t2, pb);
        let f2 = physics::pn_capacitance_f(t1, t2, mj, pb_t / pb);
        let f3 = physics::pn_capacitance_f(t1, t2, mjs, pb_t / pb);
        self.core.scaled.set("Pb", pb_t);
        let mut cj = self.core.props.real("Cj");
        if cj <= 0.0 {
            if pb_t > 0.0 && nsub >= 0.0 {
                cj = (EPS_SILICON * VACUUM_PERMITTIVITY * ELECTRON_CHARGE * nsub * 1e6
                    / 2.0
                    / pb_t)
                    .sqrt();
            } else {
                log::warn!(
                    "mosfet {}: adjust Pb, Nsub or Cj to get a valid square \
                     junction capacitance",
                    self.core.name()
                );
                cj = 0.0;
            }
        }
        cj *= f2;
        self.core.scaled.set("Cj", cj);

        // bulk junction bottom capacitances
        let ad = self.core.props.real("Ad");
        let as_ = self.core.props.real("As");
        let mut cbd0 = self.core.props.real("Cbd") * f2;
        if cbd0 <= 0.0 {
            cbd0 = cj * ad;
        }
        self.core.scaled.set("Cbd", cbd0);
        let mut cbs0 = self.core.props.real("Cbs") * f2;
        if cbs0 <= 0.0 {
            cbs0 = cj * as_;
        }
        self.core.scaled.set("Cbs", cbs0);

        // bulk junction periphery capacitances
        let cjs = self.core.props.real("Cjsw") * f3;
        self.core.scaled.set("Cbds", cjs * self.core.props.real("Pd"));
        self.core.scaled.set("Cbss", cjs * self.core.props.real("Ps"));

        // junction saturation currents
        let e1 = physics::egap(t1);
        let e2 = physics::egap(t2);
        let f4 = (-Q_OVER_KB / t2 * (t2 / t1 * e1 - e2)).exp();
        let is = self.core.props.real("Is") * f4;
        let js = self.core.props.real("Js") * f4;
        let isd = if ad > 0.0 { js * ad } else { is };
        let iss = if as_ > 0.0 { js * as_ } else { is };
        self.core.scaled.set("Isd", isd);
        self.core.scaled.set("Iss", iss);
    }

    /// Insert or refresh the series resistor at a terminal. Idempotent:
    /// repeated initialization reuses the existing internal node.
    fn split_resistor(
        &mut self,
        terminal: usize,
        label: &str,
        resistance: f64,
        registry: &mut dyn NodeRegistry,
    ) {
        let idx = match Self::series_index(terminal) {
            Some(idx) => idx,
            None => return,
        };
        let temp = self.core.props.real("Temp");
        let name = self.core.name().to_string();

        if self.series[idx].is_none() {
            let external = self.core.node(terminal);
            let internal = registry.allocate_internal(&format!("{}:{}", name, label));
            let resistor = Resistor::new(
                format!("{}.{}", name, label),
                external,
                internal,
                resistance,
                self.core.constants,
            );
            self.core.set_node(terminal, internal);
            self.series[idx] = Some(SeriesResistor { resistor, external });
        }

        if let Some(sr) = self.series[idx].as_mut() {
            let rc = sr.resistor.core_mut();
            rc.props.set_real("Temp", temp);
            rc.props.set_real("R", resistance);
            rc.props.set_text("Controlled", name);
            sr.resistor.init_dc(registry);
        }
    }

    /// Remove the series resistor at a terminal and rebind the terminal to
    /// its external node.
    fn disable_resistor(&mut self, terminal: usize) {
        let idx = match Self::series_index(terminal) {
            Some(idx) => idx,
            None => return,
        };
        if let Some(sr) = self.series[idx].take() {
            self.core.set_node(terminal, sr.external);
        }
    }

    fn calc_matrix_y(&self, frequency: f64) -> DMatrix<Complex64> {
        let o = &self.core.oper;
        let cgd = o.get("Cgd");
        let cgs = o.get("Cgs");
        let cbd = o.get("Cbd");
        let cbs = o.get("Cbs");
        let cgb = o.get("Cgb");
        let gbs = o.get("gbs");
        let gbd = o.get("gbd");
        let gds = o.get("gds");
        let gm = Complex64::from(o.get("gm"));
        let gmb = Complex64::from(o.get("gmb"));
        let dc = Complex64::from(self.drain_control);
        let sc = Complex64::from(self.source_control);

        let w = 2.0 * PI * frequency;
        let ygd = Complex64::new(0.0, w * cgd);
        let ygs = Complex64::new(0.0, w * cgs);
        let yds = Complex64::from(gds);
        let ybd = Complex64::new(gbd, w * cbd);
        let ybs = Complex64::new(gbs, w * cbs);
        let ygb = Complex64::new(0.0, w * cgb);

        let mut y = DMatrix::from_element(4, 4, Complex64::new(0.0, 0.0));
        y[(NODE_G, NODE_G)] = ygd + ygs + ygb;
        y[(NODE_G, NODE_D)] = -ygd;
        y[(NODE_G, NODE_S)] = -ygs;
        y[(NODE_G, NODE_B)] = -ygb;
        y[(NODE_D, NODE_G)] = gm - ygd;
        y[(NODE_D, NODE_D)] = ygd + yds + ybd - dc;
        y[(NODE_D, NODE_S)] = -yds - sc;
        y[(NODE_D, NODE_B)] = -ybd + gmb;
        y[(NODE_S, NODE_G)] = -ygs - gm;
        y[(NODE_S, NODE_D)] = -yds + dc;
        y[(NODE_S, NODE_S)] = ygs + yds + ybs + sc;
        y[(NODE_S, NODE_B)] = -ybs - gmb;
        y[(NODE_B, NODE_G)] = -ygb;
        y[(NODE_B, NODE_D)] = -ybd;
        y[(NODE_B, NODE_S)] = -ybs;
        y[(NODE_B, NODE_B)] = ybd + ybs + ygb;
        y
    }

    /// Channel thermal noise plus flicker noise, concentrated between the
    /// drain and source terminals. The flicker contribution is skipped at
    /// non-positive frequencies where its spectral form is undefined.
    fn calc_matrix_cy(&self, frequency: f64) -> DMatrix<Complex64> {
        let kf = self.core.props.real("Kf");
        let af = self.core.props.real("Af");
        let ffe = self.core.props.real("Ffe");
        let gm = self.core.oper.get("gm").abs();
        let ids = self.core.oper.get("Id").abs();
        let t = self.core.props.real("Temp");
        let t0 = self.core.constants.t0;

        let mut i = 8.0 * kelvin(t) / t0 * gm / 3.0;
        if kf != 0.0 && frequency > 0.0 {
            i += kf * ids.powf(af) / frequency.powf(ffe) / BOLTZMANN / t0;
        }

        let iv = Complex64::from(i);
        let mut cy = DMatrix::from_element(4, 4, Complex64::new(0.0, 0.0));
        cy[(NODE_D, NODE_D)] = iv;
        cy[(NODE_S, NODE_S)] = iv;
        cy[(NODE_D, NODE_S)] = -iv;
        cy[(NODE_S, NODE_D)] = -iv;
        cy
    }

    fn save_operating_points(&mut self) {
        let vg = self.core.voltage(NODE_G);
        let vd = self.core.voltage(NODE_D);
        let vs = self.core.voltage(NODE_S);
        let vb = self.core.voltage(NODE_B);
        let vgd = (vg - vd) * self.pol;
        let vgs = (vg - vs) * self.pol;
        let vbs = (vb - vs) * self.pol;
        let vbd = (vb - vd) * self.pol;
        let o = &mut self.core.oper;
        o.set("Vgs", vgs);
        o.set("Vgd", vgd);
        o.set("Vbs", vbs);
        o.set("Vbd", vbd);
        o.set("Vds", vgs - vgd);
        o.set("Vgb", vgs - vbs);
    }

    fn load_operating_points(&mut self) {
        let o = &self.core.oper;
        self.ugs = o.get("Vgs");
        self.ugd = o.get("Vgd");
        self.ubs = o.get("Vbs");
        self.ubd = o.get("Vbd");
        self.uds = o.get("Vds");
        self.ugb = o.get("Vgb");
    }

    /// Trapezoidal charge approximation for a Meyer capacitance. Returns
    /// the averaged capacitance (including the constant overlap part) and
    /// the accumulated charge.
    fn transient_charge_tr(
        &mut self,
        q_slot: usize,
        cap: f64,
        voltage: f64,
        ccap: f64,
    ) -> (f64, f64) {
        let v_slot = q_slot + 2;
        let c_slot = q_slot + 3;
        let states = &mut self.core.states;
        states.set(c_slot, cap);
        let cap = (cap + states.get_at(c_slot, 1)) / 2.0 + ccap;
        states.set(v_slot, voltage);
        let q = cap * (voltage - states.get_at(v_slot, 1)) + states.get_at(q_slot, 1);
        (cap, q)
    }

    /// Simpson's-rule variant of [`Self::transient_charge_tr`].
    fn transient_charge_sr(
        &mut self,
        q_slot: usize,
        cap: f64,
        voltage: f64,
        ccap: f64,
    ) -> (f64, f64) {
        let v_slot = q_slot + 2;
        let c_slot = q_slot + 3;
        let states = &mut self.core.states;
        states.set(c_slot, cap);
        let cap =
            (cap + 4.0 * states.get_at(c_slot, 1) + states.get_at(c_slot, 2)) / 6.0 + ccap;
        states.set(v_slot, voltage);
        let q = cap * (voltage - states.get_at(v_slot, 1)) + states.get_at(q_slot, 1);
        (cap, q)
    }
}

impl Device for Mosfet {
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

    fn init_dc(&mut self, registry: &mut dyn NodeRegistry) {
        self.core.alloc_mna(0);
        self.restart_dc();
        self.init_model();

        if self.rs_eff != 0.0 {
            self.split_resistor(NODE_S, "source", self.rs_eff, registry);
        } else {
            self.disable_resistor(NODE_S);
        }

        let rg = self.core.props.real("Rg");
        if rg != 0.0 {
            self.split_resistor(NODE_G, "gate", rg, registry);
        } else {
            self.disable_resistor(NODE_G);
        }

        if self.rd_eff != 0.0 {
            self.split_resistor(NODE_D, "drain", self.rd_eff, registry);
        } else {
            self.disable_resistor(NODE_D);
        }
    }

    fn calc_dc(&mut self) {
        let isd = self.core.scaled.get("Isd");
        let iss = self.core.scaled.get("Iss");
        let n = self.core.props.real("N");
        let l = self.core.props.real("Lambda");
        let t = kelvin(self.core.props.real("Temp"));
        let ute = thermal_voltage(t) * n;

        let vg = self.core.voltage(NODE_G);
        let vd = self.core.voltage(NODE_D);
        let vs = self.core.voltage(NODE_S);
        let vb = self.core.voltage(NODE_B);
        self.ugd = (vg - vd) * self.pol;
        self.ugs = (vg - vs) * self.pol;
        self.ubs = (vb - vs) * self.pol;
        self.ubd = (vb - vd) * self.pol;
        self.uds = self.ugs - self.ugd;

        // critical voltages for bad starting values
        let ubs_crit = physics::pn_critical_voltage(iss, ute);
        let ubd_crit = physics::pn_critical_voltage(isd, ute);

        // voltage limiting for convergence
        if self.uds >= 0.0 {
            self.ugs = physics::fet_voltage(self.ugs, self.ugs_prev, self.vto * self.pol);
            self.uds = self.ugs - self.ugd;
            self.uds = physics::fet_voltage_ds(self.uds, self.uds_prev);
            self.ugd = self.ugs - self.uds;
        } else {
            self.ugd = physics::fet_voltage(self.ugd, self.ugd_prev, self.vto * self.pol);
            self.uds = self.ugs - self.ugd;
            self.uds = -physics::fet_voltage_ds(-self.uds, -self.uds_prev);
            self.ugs = self.ugd + self.uds;
        }
        if self.uds >= 0.0 {
            self.ubs = physics::pn_voltage(self.ubs, self.ubs_prev, ute, ubs_crit);
            self.ubd = self.ubs - self.uds;
        } else {
            self.ubd = physics::pn_voltage(self.ubd, self.ubd_prev, ute, ubd_crit);
            self.ubs = self.ubd + self.uds;
        }
        self.ugs_prev = self.ugs;
        self.ugd_prev = self.ugd;
        self.ubd_prev = self.ubd;
        self.uds_prev = self.uds;
        self.ubs_prev = self.ubs;

        // parasitic bulk-source diode with floor conductance
        let gtiny = iss;
        let (ibs, gbs) = physics::pn_junction_mos(self.ubs, iss, ute);
        self.ibs = ibs + gtiny * self.ubs;
        self.gbs = gbs + gtiny;

        // parasitic bulk-drain diode
        let gtiny = isd;
        let (ibd, gbd) = physics::pn_junction_mos(self.ubd, isd, ute);
        self.ibd = ibd + gtiny * self.ubd;
        self.gbd = gbd + gtiny;

        // forward or inverse channel conduction
        self.mos_dir = if self.uds >= 0.0 { 1.0 } else { -1.0 };

        // sqrt (Phi - Upn), Taylor-continued into forward bulk bias
        let upn = if self.mos_dir > 0.0 { self.ubs } else { self.ubd };
        let sphi = self.phi.sqrt();
        let sarg = if upn <= 0.0 {
            (self.phi - upn).sqrt()
        } else {
            (sphi - upn / sphi / 2.0).max(0.0)
        };

        // bias-dependent threshold voltage
        self.uon = self.vto * self.pol + self.ga * (sarg - sphi);
        let utst = if self.mos_dir > 0.0 { self.ugs } else { self.ugd } - self.uon;
        // no infinite backgate transconductance for non-zero Gamma
        let arg = if sarg != 0.0 { self.ga / sarg / 2.0 } else { 0.0 };

        if utst <= 0.0 {
            // cutoff region
            self.ids = 0.0;
            self.gm = 0.0;
            self.gds = 0.0;
            self.gmb = 0.0;
        } else {
            let vds = self.uds * self.mos_dir;
            let b = self.beta * (1.0 + l * vds);
            if utst <= vds {
                // saturation region
                self.ids = b * utst * utst / 2.0;
                self.gm = b * utst;
                self.gds = l * self.beta * utst * utst / 2.0;
            } else {
                // linear region
                self.ids = b * vds * (utst - vds / 2.0);
                self.gm = b * vds;
                self.gds = b * (utst - vds) + l * self.beta * vds * (utst - vds / 2.0);
            }
            self.gmb = self.gm * arg;
        }
        self.udsat = self.pol * utst.max(0.0);
        self.ids *= self.mos_dir;
        self.uon *= self.pol;

        // autonomic current sources
        let ieq_bd = self.ibd - self.gbd * self.ubd;
        let ieq_bs = self.ibs - self.gbs * self.ubs;

        // exchange controlling nodes in inverse mode
        self.source_control = if self.mos_dir > 0.0 { self.gm + self.gmb } else { 0.0 };
        self.drain_control = if self.mos_dir < 0.0 { self.gm + self.gmb } else { 0.0 };
        let ieq_ds = if self.mos_dir > 0.0 {
            self.ids - self.gm * self.ugs - self.gmb * self.ubs - self.gds * self.uds
        } else {
            self.ids - self.gm * self.ugd - self.gmb * self.ubd - self.gds * self.uds
        };

        let pol = self.pol;
        let m = &mut self.core.matrices;
        m.set_i(NODE_G, Complex64::new(0.0, 0.0));
        m.set_i(NODE_D, Complex64::from((ieq_bd - ieq_ds) * pol));
        m.set_i(NODE_S, Complex64::from((ieq_bs + ieq_ds) * pol));
        m.set_i(NODE_B, Complex64::from((-ieq_bd - ieq_bs) * pol));

        let zero = Complex64::new(0.0, 0.0);
        let (gm, gds, gmb) = (self.gm, self.gds, self.gmb);
        let (gbs, gbd) = (self.gbs, self.gbd);
        let (dc, sc) = (self.drain_control, self.source_control);
        m.set_y(NODE_G, NODE_G, zero);
        m.set_y(NODE_G, NODE_D, zero);
        m.set_y(NODE_G, NODE_S, zero);
        m.set_y(NODE_G, NODE_B, zero);
        m.set_y(NODE_D, NODE_G, Complex64::from(gm));
        m.set_y(NODE_D, NODE_D, Complex64::from(gds + gbd - dc));
        m.set_y(NODE_D, NODE_S, Complex64::from(-gds - sc));
        m.set_y(NODE_D, NODE_B, Complex64::from(gmb - gbd));
        m.set_y(NODE_S, NODE_G, Complex64::from(-gm));
        m.set_y(NODE_S, NODE_D, Complex64::from(-gds + dc));
        m.set_y(NODE_S, NODE_S, Complex64::from(gbs + gds + sc));
        m.set_y(NODE_S, NODE_B, Complex64::from(-gbs - gmb));
        m.set_y(NODE_B, NODE_G, zero);
        m.set_y(NODE_B, NODE_D, Complex64::from(-gbd));
        m.set_y(NODE_B, NODE_S, Complex64::from(-gbs));
        m.set_y(NODE_B, NODE_B, Complex64::from(gbs + gbd));
    }

    fn init_ac(&mut self) {
        self.core.alloc_mna(0);
    }

    fn calc_ac(&mut self, frequency: f64) {
        let y = self.calc_matrix_y(frequency);
        self.core.matrices.set_y_matrix(y);
    }

    fn calc_sp(&mut self, frequency: f64) {
        let y = self.calc_matrix_y(frequency);
        match y_to_s(&y, self.core.constants.z0) {
            Some(s) => self.core.matrices.set_s_matrix(s),
            None => log::warn!(
                "mosfet {}: singular admittance matrix at {} Hz, \
                 keeping previous S-parameters",
                self.core.name(),
                frequency
            ),
        }
    }

    fn calc_noise_ac(&mut self, frequency: f64) {
        let cy = self.calc_matrix_cy(frequency);
        self.core.matrices.set_n_matrix(cy);
    }

    // relies on the scattering matrix of the most recent calc_sp
    fn calc_noise_sp(&mut self, frequency: f64) {
        let cy = self.calc_matrix_cy(frequency) * Complex64::from(self.core.constants.z0);
        let cs = cy_to_cs(&cy, self.core.matrices.s_matrix());
        self.core.matrices.set_n_matrix(cs);
    }

    fn init_tr(&mut self, registry: &mut dyn NodeRegistry) {
        self.core.set_states(STATE_COUNT);
        self.init_dc(registry);
    }

    fn calc_tr(&mut self, _time: f64) {
        self.calc_dc();
        self.transient_mode = self.core.props.integer("capModel");
        self.save_operating_points();
        self.load_operating_points();
        self.calc_operating_points();
        self.transient_mode = 0;

        let cgd = self.core.oper.get("Cgd");
        let cgs = self.core.oper.get("Cgs");
        let cbd = self.core.oper.get("Cbd");
        let cbs = self.core.oper.get("Cbs");
        let cgb = self.core.oper.get("Cgb");

        self.uds = self.ugs - self.ugd;
        self.ugb = self.ugs - self.ubs;

        let (ubd, ubs, ugd, ugs, ugb) = (self.ubd, self.ubs, self.ugd, self.ugs, self.ugb);
        let (qbd, qbs, qgd, qgs, qgb) = (self.qbd, self.qbs, self.qgd, self.qgs, self.qgb);
        self.core.transient_capacitance(Q_BD, NODE_B, NODE_D, cbd, ubd, qbd);
        self.core.transient_capacitance(Q_BS, NODE_B, NODE_S, cbs, ubs, qbs);

        // Meyer charges and capacitances
        self.core.transient_capacitance(Q_GD, NODE_G, NODE_D, cgd, ugd, qgd);
        self.core.transient_capacitance(Q_GS, NODE_G, NODE_S, cgs, ugs, qgs);
        self.core.transient_capacitance(Q_GB, NODE_G, NODE_B, cgb, ugb, qgb);
    }

    fn calc_operating_points(&mut self) {
        let cbd0 = self.core.scaled.get("Cbd");
        let cbs0 = self.core.scaled.get("Cbs");
        let cbds = self.core.scaled.get("Cbds");
        let cbss = self.core.scaled.get("Cbss");
        let cgso = self.core.props.real("Cgso");
        let cgdo = self.core.props.real("Cgdo");
        let cgbo = self.core.props.real("Cgbo");
        let pb = self.core.scaled.get("Pb");
        let mj = self.core.props.real("Mj");
        let mjs = self.core.props.real("Mjsw");
        let fc = self.core.props.real("Fc");
        let tt = self.core.props.real("Tt");
        let w = self.core.props.real("W");

        // bulk-drain junction capacitance and charge
        let cbd = self.gbd * tt
            + physics::pn_capacitance(self.ubd, cbd0, pb, mj, fc)
            + physics::pn_capacitance(self.ubd, cbds, pb, mjs, fc);
        self.qbd = self.ibd * tt
            + physics::pn_charge(self.ubd, cbd0, pb, mj, fc)
            + physics::pn_charge(self.ubd, cbds, pb, mjs, fc);

        // bulk-source junction capacitance and charge
        let cbs = self.gbs * tt
            + physics::pn_capacitance(self.ubs, cbs0, pb, mj, fc)
            + physics::pn_capacitance(self.ubs, cbss, pb, mjs, fc);
        self.qbs = self.ibs * tt
            + physics::pn_charge(self.ubs, cbs0, pb, mj, fc)
            + physics::pn_charge(self.ubs, cbss, pb, mjs, fc);

        // bias-dependent Meyer capacitances; swapped in inverse mode
        let (mut cgs, mut cgd, mut cgb) = if self.mos_dir > 0.0 {
            physics::fet_capacitance_meyer(
                self.ugs, self.ugd, self.uon, self.udsat, self.phi, self.cox,
            )
        } else {
            let (cgd, cgs, cgb) = physics::fet_capacitance_meyer(
                self.ugd, self.ugs, self.uon, self.udsat, self.phi, self.cox,
            );
            (cgs, cgd, cgb)
        };

        match self.transient_mode {
            // trapezoidal charge approximation
            1 => {
                let (ugs, ugd, ugb) = (self.ugs, self.ugd, self.ugb);
                let (c, q) = self.transient_charge_tr(Q_GS, cgs, ugs, cgso * w);
                cgs = c;
                self.qgs = q;
                let (c, q) = self.transient_charge_tr(Q_GD, cgd, ugd, cgdo * w);
                cgd = c;
                self.qgd = q;
                let (c, q) = self.transient_charge_tr(Q_GB, cgb, ugb, cgbo * self.leff);
                cgb = c;
                self.qgb = q;
            }
            // Simpson's rule charge approximation
            2 => {
                let (ugs, ugd, ugb) = (self.ugs, self.ugd, self.ugb);
                let (c, q) = self.transient_charge_sr(Q_GS, cgs, ugs, cgso * w);
                cgs = c;
                self.qgs = q;
                let (c, q) = self.transient_charge_sr(Q_GD, cgd, ugd, cgdo * w);
                cgd = c;
                self.qgd = q;
                let (c, q) = self.transient_charge_sr(Q_GB, cgb, ugb, cgbo * self.leff);
                cgb = c;
                self.qgb = q;
            }
            // static operating point: add the constant overlap parts
            _ => {
                cgs += cgso * w;
                cgd += cgdo * w;
                cgb += cgbo * self.leff;
            }
        }

        let o = &mut self.core.oper;
        o.set("Id", self.ids);
        o.set("gm", self.gm);
        o.set("gmb", self.gmb);
        o.set("gds", self.gds);
        o.set("Vth", self.vto);
        o.set("Vdsat", self.udsat);
        o.set("gbs", self.gbs);
        o.set("gbd", self.gbd);
        o.set("Cbd", cbd);
        o.set("Cbs", cbs);
        o.set("Cgs", cgs);
        o.set("Cgd", cgd);
        o.set("Cgb", cgb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ohmic_core::sparam::s_to_y;
    use ohmic_core::SequentialRegistry;

    fn mosfet() -> Mosfet {
        Mosfet::nfet(
            "M1",
            NodeId::new(1),
            NodeId::new(2),
            NodeId::new(3),
            NodeId::new(4),
            Constants::default(),
        )
    }

    // iterate calc_dc with fixed terminal voltages until the limiting
    // history settles
    fn converge(m: &mut Mosfet, v: [f64; 4]) {
        m.core_mut().set_voltages(&v);
        for _ in 0..100 {
            m.calc_dc();
        }
    }

    #[test]
    fn test_model_defaults() {
        let mut reg = SequentialRegistry::new(4);
        let mut m = mosfet();
        m.init_dc(&mut reg);
        // beta = Kp W / Leff with the default geometry
        assert!((m.beta() - 2e-5).abs() < 1e-12);
        assert!((m.threshold() - 1.0).abs() < 1e-12);
        // Cox = eps_ox eps_0 / Tox * W * Leff
        let cox = EPS_OXIDE * VACUUM_PERMITTIVITY / 1e-7;
        assert!((m.cox() - cox).abs() < 1e-9 * cox);
    }

    #[test]
    fn test_short_channel_fallback() {
        // Leff = L - 2 Ld <= 0 falls back to L
        let mut reg = SequentialRegistry::new(4);
        let mut m = mosfet();
        m.core_mut().props.set_real("L", 1e-6);
        m.core_mut().props.set_real("Ld", 1e-6);
        m.init_dc(&mut reg);
        assert!((m.beta() - 2e-5 / 1e-6).abs() < 1e-3);
    }

    #[test]
    fn test_cutoff_region() {
        let mut reg = SequentialRegistry::new(4);
        let mut m = mosfet();
        m.init_dc(&mut reg);
        // gate at 0.5 V, below the 1 V threshold
        converge(&mut m, [0.5, 2.0, 0.0, 0.0]);
        m.calc_operating_points();
        let o = &m.core().oper;
        assert_eq!(o.get("Id"), 0.0);
        assert_eq!(o.get("gm"), 0.0);
        assert_eq!(o.get("gds"), 0.0);
        assert_eq!(o.get("gmb"), 0.0);
        // gate row of the admittance matrix is empty at DC
        assert_eq!(m.core().matrices.get_y(NODE_G, NODE_G).re, 0.0);
    }

    #[test]
    fn test_saturation_region() {
        let mut reg = SequentialRegistry::new(4);
        let mut m = mosfet();
        m.init_dc(&mut reg);
        // Vgs = 3, Vds = 3 > Vgs - Vth = 2: saturation
        converge(&mut m, [3.0, 3.0, 0.0, 0.0]);
        m.calc_operating_points();
        let o = &m.core().oper;
        let b = 2e-5;
        assert!((o.get("Id") - b * 4.0 / 2.0).abs() < 1e-10, "Id = {}", o.get("Id"));
        assert!((o.get("gm") - b * 2.0).abs() < 1e-10);
        assert_eq!(o.get("gds"), 0.0); // Lambda = 0
        assert!((o.get("Vdsat") - 2.0).abs() < 1e-10);
        // transconductance stamp
        assert!((m.core().matrices.get_y(NODE_D, NODE_G).re - b * 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_linear_region() {
        let mut reg = SequentialRegistry::new(4);
        let mut m = mosfet();
        m.init_dc(&mut reg);
        // Vds = 1 < Vgs - Vth = 2: linear region
        converge(&mut m, [3.0, 1.0, 0.0, 0.0]);
        m.calc_operating_points();
        let o = &m.core().oper;
        let b = 2e-5;
        assert!((o.get("Id") - b * 1.0 * 1.5).abs() < 1e-10, "Id = {}", o.get("Id"));
        assert!((o.get("gm") - b * 1.0).abs() < 1e-10);
        assert!((o.get("gds") - b * 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_channel_length_modulation() {
        let mut reg = SequentialRegistry::new(4);
        let mut m = mosfet();
        m.core_mut().props.set_real("Lambda", 0.02);
        m.init_dc(&mut reg);
        converge(&mut m, [3.0, 3.0, 0.0, 0.0]);
        m.calc_operating_points();
        let o = &m.core().oper;
        let b = 2e-5 * (1.0 + 0.02 * 3.0);
        assert!((o.get("Id") - b * 2.0).abs() < 1e-10);
        assert!((o.get("gds") - 0.02 * 2e-5 * 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_inverse_mode_swaps_control() {
        let mut reg = SequentialRegistry::new(4);
        let mut m = mosfet();
        m.init_dc(&mut reg);
        // forward: source-referred control
        converge(&mut m, [3.0, 3.0, 0.0, 0.0]);
        assert!(m.source_control > 0.0);
        assert_eq!(m.drain_control, 0.0);
        let id_fwd = m.ids;

        // exchange drain and source potentials: inverse conduction
        m.restart_dc();
        converge(&mut m, [3.0, 0.0, 3.0, 0.0]);
        assert_eq!(m.source_control, 0.0);
        assert!(m.drain_control > 0.0);
        assert!((m.ids + id_fwd).abs() < 1e-10, "inverse Id = {}", m.ids);
    }

    #[test]
    fn test_pfet_polarity() {
        let mut reg = SequentialRegistry::new(4);
        let mut n = mosfet();
        n.init_dc(&mut reg);
        converge(&mut n, [3.0, 3.0, 0.0, 0.0]);
        n.calc_operating_points();

        let mut p = Mosfet::pfet(
            "M2",
            NodeId::new(1),
            NodeId::new(2),
            NodeId::new(3),
            NodeId::new(4),
            Constants::default(),
        );
        p.init_dc(&mut reg);
        converge(&mut p, [-3.0, -3.0, 0.0, 0.0]);
        p.calc_operating_points();

        // identical normalized operating point, mirrored terminal current
        assert!((p.core().oper.get("Id") - n.core().oper.get("Id")).abs() < 1e-12);
        let id_n = n.core().matrices.get_i(NODE_D).re;
        let id_p = p.core().matrices.get_i(NODE_D).re;
        assert!((id_n + id_p).abs() < 1e-12, "{} vs {}", id_n, id_p);
    }

    #[test]
    fn test_bulk_diode_companion_cancels_at_solution() {
        // at a consistent bias the autonomic sources reproduce the diode
        // currents exactly: I = Y v + Ieq must equal the physical current
        let mut reg = SequentialRegistry::new(4);
        let mut m = mosfet();
        m.init_dc(&mut reg);
        converge(&mut m, [0.0, 0.0, 0.0, -0.3]);
        // reverse-biased junctions conduct linearized leakage only
        let gbs = m.gbs;
        assert!((m.ibs - gbs * m.ubs).abs() < 1e-20);
    }

    #[test]
    fn test_series_resistor_insertion_idempotent() {
        let mut reg = SequentialRegistry::new(4);
        let mut m = mosfet();
        m.core_mut().props.set_real("Rd", 10.0);
        let external = m.core().node(NODE_D);
        m.init_dc(&mut reg);

        let internal = m.core().node(NODE_D);
        assert_ne!(internal, external);
        let r = m.series_resistor(NODE_D).expect("inserted");
        assert!(r.core().is_controlled());
        assert_eq!(r.core().props.real("R"), 10.0);

        // repeated init keeps the same internal node
        m.init_dc(&mut reg);
        assert_eq!(m.core().node(NODE_D), internal);

        // removing the resistance restores the external node
        m.core_mut().props.set_real("Rd", 0.0);
        m.init_dc(&mut reg);
        assert_eq!(m.core().node(NODE_D), external);
        assert!(m.series_resistor(NODE_D).is_none());
    }

    #[test]
    fn test_sheet_resistance_contributes() {
        let mut reg = SequentialRegistry::new(4);
        let mut m = mosfet();
        m.core_mut().props.set_real("Rd", 5.0);
        m.core_mut().props.set_real("Rsh", 20.0);
        m.core_mut().props.set_real("Nrd", 2.0);
        m.init_dc(&mut reg);
        let r = m.series_resistor(NODE_D).expect("inserted");
        assert_eq!(r.core().props.real("R"), 45.0);
    }

    #[test]
    fn test_meyer_capacitances_in_saturation() {
        let mut reg = SequentialRegistry::new(4);
        let mut m = mosfet();
        m.init_dc(&mut reg);
        converge(&mut m, [3.0, 3.0, 0.0, 0.0]);
        m.save_operating_points();
        m.load_operating_points();
        m.calc_operating_points();
        let o = &m.core().oper;
        assert!((o.get("Cgs") - 2.0 * m.cox() / 3.0).abs() < 1e-9 * m.cox());
        assert_eq!(o.get("Cgd"), 0.0);
        assert_eq!(o.get("Cgb"), 0.0);
    }

    #[test]
    fn test_ac_reuses_operating_points() {
        let mut reg = SequentialRegistry::new(4);
        let mut m = mosfet();
        m.init_dc(&mut reg);
        converge(&mut m, [3.0, 3.0, 0.0, 0.0]);
        m.save_operating_points();
        m.load_operating_points();
        m.calc_operating_points();
        let gm = m.core().oper.get("gm");

        m.init_ac();
        // the real transconductance entry is frequency-independent
        m.calc_ac(1e6);
        assert!((m.core().matrices.get_y(NODE_D, NODE_G).re - gm).abs() < 1e-15);
        m.calc_ac(1e9);
        assert!((m.core().matrices.get_y(NODE_D, NODE_G).re - gm).abs() < 1e-15);
        // gate row picks up capacitive susceptance with frequency
        assert!(m.core().matrices.get_y(NODE_G, NODE_G).im > 0.0);
    }

    #[test]
    fn test_sp_matches_admittance() {
        let mut reg = SequentialRegistry::new(4);
        let mut m = mosfet();
        m.init_dc(&mut reg);
        converge(&mut m, [3.0, 3.0, 0.0, 0.0]);
        m.save_operating_points();
        m.load_operating_points();
        m.calc_operating_points();

        let f = 1e9;
        m.calc_sp(f);
        let y = m.calc_matrix_y(f);
        let back = s_to_y(m.core().matrices.s_matrix(), 50.0).expect("nonsingular");
        for r in 0..4 {
            for c in 0..4 {
                assert!(
                    (back[(r, c)] - y[(r, c)]).norm() < 1e-9 * (1.0 + y[(r, c)].norm()),
                    "({}, {}): {} vs {}",
                    r, c, back[(r, c)], y[(r, c)]
                );
            }
        }
    }

    #[test]
    fn test_channel_noise() {
        let mut reg = SequentialRegistry::new(4);
        let mut m = mosfet();
        m.init_dc(&mut reg);
        converge(&mut m, [3.0, 3.0, 0.0, 0.0]);
        m.calc_operating_points();

        m.calc_noise_ac(1e9);
        let gm = m.core().oper.get("gm");
        let i = 8.0 * kelvin(26.85) / 290.0 * gm / 3.0;
        let nm = &m.core().matrices;
        assert!((nm.get_n(NODE_D, NODE_D).re - i).abs() < 1e-12 * i);
        assert!((nm.get_n(NODE_D, NODE_S).re + i).abs() < 1e-12 * i);
        assert_eq!(nm.get_n(NODE_G, NODE_G).re, 0.0);
    }

    #[test]
    fn test_flicker_noise_frequency_dependence() {
        let mut reg = SequentialRegistry::new(4);
        let mut m = mosfet();
        m.core_mut().props.set_real("Kf", 1e-26);
        m.init_dc(&mut reg);
        converge(&mut m, [3.0, 3.0, 0.0, 0.0]);
        m.calc_operating_points();

        m.calc_noise_ac(1e3);
        let low = m.core().matrices.get_n(NODE_D, NODE_D).re;
        m.calc_noise_ac(1e6);
        let high = m.core().matrices.get_n(NODE_D, NODE_D).re;
        assert!(low > high, "flicker noise must fall with frequency");

        // non-positive frequency keeps only the thermal part
        m.calc_noise_ac(0.0);
        let gm = m.core().oper.get("gm");
        let thermal = 8.0 * kelvin(26.85) / 290.0 * gm / 3.0;
        assert!((m.core().matrices.get_n(NODE_D, NODE_D).re - thermal).abs() < 1e-12);
    }

    #[test]
    fn test_noise_sp_wave_conversion() {
        let mut reg = SequentialRegistry::new(4);
        let mut m = mosfet();
        m.init_dc(&mut reg);
        converge(&mut m, [3.0, 3.0, 0.0, 0.0]);
        m.calc_operating_points();
        let gm = m.core().oper.get("gm");
        let i = 8.0 * kelvin(26.85) / 290.0 * gm / 3.0;
        let z0 = 50.0;

        // zero scattering matrix: Cs = (E) (z0 Cy) (E)^H / 4
        m.calc_noise_sp(1e9);
        let nm = &m.core().matrices;
        assert!((nm.get_n(NODE_D, NODE_D).re - z0 * i / 4.0).abs() < 1e-12 * z0 * i);
        assert!((nm.get_n(NODE_D, NODE_S).re + z0 * i / 4.0).abs() < 1e-12 * z0 * i);
        assert_eq!(nm.get_n(NODE_G, NODE_G).re, 0.0);

        // identity scattering matrix: Cs = z0 Cy exactly
        let e = DMatrix::<Complex64>::identity(4, 4);
        m.core_mut().matrices.set_s_matrix(e);
        m.calc_noise_sp(1e9);
        let nm = &m.core().matrices;
        assert!((nm.get_n(NODE_D, NODE_D).re - z0 * i).abs() < 1e-12 * z0 * i);
        assert!((nm.get_n(NODE_S, NODE_S).re - z0 * i).abs() < 1e-12 * z0 * i);
        assert!((nm.get_n(NODE_S, NODE_D).re + z0 * i).abs() < 1e-12 * z0 * i);
    }

    #[test]
    fn test_transient_states_and_first_step() {
        let mut reg = SequentialRegistry::new(4);
        let mut m = mosfet();
        m.core_mut().props.set_real("Cbd", 1e-12);
        m.core_mut().props.set_real("Cbs", 1e-12);
        m.init_tr(&mut reg);
        assert_eq!(m.core().states.len(), STATE_COUNT);

        // before the first accepted step the companion stamps are inert:
        // calc_tr must reduce to the DC stamp
        m.core_mut().set_voltages(&[3.0, 3.0, 0.0, 0.0]);
        for _ in 0..100 {
            m.calc_dc();
        }
        let y_dc = m.core().matrices.get_y(NODE_D, NODE_D);
        m.calc_tr(0.0);
        assert!((m.core().matrices.get_y(NODE_D, NODE_D) - y_dc).norm() < 1e-15);

        // with a timestep the bulk-drain junction contributes 2C/h
        m.core_mut().states.shift();
        m.core_mut().states.set_timestep(1e-9);
        m.calc_tr(1e-9);
        let ybb = m.core().matrices.get_y(NODE_B, NODE_B);
        let gbd = m.core().oper.get("gbd");
        let gbs = m.core().oper.get("gbs");
        assert!(ybb.re > gbd + gbs, "junction companions missing: {}", ybb.re);
        assert_eq!(ybb.im, 0.0);
    }

    #[test]
    fn test_transient_charge_approximations() {
        let mut m = mosfet();
        m.core_mut().set_states(STATE_COUNT);
        // constant capacitance and linear voltage: both rules reduce to
        // Q(n) = C (v(n) - v(n-1)) + Q(n-1)
        let c = 1e-12;
        m.core_mut().states.set(Q_GS + 3, c);
        m.core_mut().states.set(Q_GS + 2, 1.0);
        m.core_mut().states.set(Q_GS, c * 1.0);
        m.core_mut().states.shift();
        m.core_mut().states.shift();

        let (cap, q) = m.transient_charge_tr(Q_GS, c, 2.0, 0.0);
        assert!((cap - c).abs() < 1e-25);
        assert!((q - 2.0 * c).abs() < 1e-25, "Q = {}", q);

        let (cap, q) = m.transient_charge_sr(Q_GS, c, 2.0, 0.0);
        assert!((cap - c).abs() < 1e-25);
        assert!((q - 2.0 * c).abs() < 1e-25, "Q = {}", q);
    }

    #[test]
    fn test_simpson_weighting_with_varying_capacitance() {
        let mut m = mosfet();
        m.core_mut().set_states(STATE_COUNT);
        // distinct capacitance history: c1 one step back, c2 two back
        let (c0, c1, c2) = (3e-12, 2e-12, 1e-12);
        let q_prev = 5e-12;
        let states = &mut m.core_mut().states;
        states.set(Q_GS + 3, c2);
        states.shift();
        states.set(Q_GS + 3, c1);
        states.set(Q_GS + 2, 1.0);
        states.set(Q_GS, q_prev);
        states.shift();

        let (cap_sr, q_sr) = m.transient_charge_sr(Q_GS, c0, 2.0, 0.0);
        let want = (c0 + 4.0 * c1 + c2) / 6.0;
        assert!((cap_sr - want).abs() < 1e-25, "cap = {} want {}", cap_sr, want);
        assert!((q_sr - (want * 1.0 + q_prev)).abs() < 1e-25, "Q = {}", q_sr);

        // the trapezoidal rule weighs the same history differently
        let (cap_tr, _) = m.transient_charge_tr(Q_GS, c0, 2.0, 0.0);
        assert!((cap_tr - (c0 + c1) / 2.0).abs() < 1e-25);
        assert!((cap_tr - cap_sr).abs() > 1e-14, "rules must differ here");
    }
}
