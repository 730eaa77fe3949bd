/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2023 Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Lunar descent planning: the maneuver sequence which brings the vehicle from lunar orbit to
//! powered descent initiation over the landing site.
//!
//! Each [`LdppMode`] is a fixed sequence of [`Phase`]s. Every phase runs one or more of the
//! maneuver computation boxes of [`boxes`] and hands the resulting state to the next phase.

use crate::cosmic::{CoordinateSystem, StateVector, Vehicle, FOOT_KM, NAUTICAL_MILE_KM};
use crate::errors::{InvalidOptionSnafu, NoSolutionSnafu, NotConvergedSnafu, TargetingError, TooManyManeuversSnafu};
use crate::linalg::Vector3;
use crate::md::MissionContext;
use crate::propagators::PropModel;
use crate::time::{Epoch, Unit};
use crate::utils::{between_0_tau, between_pm_pi, unit};
use enum_iterator::Sequence;
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use std::f64::consts::{PI, TAU};
use std::fmt;
use typed_builder::TypedBuilder;

mod boxes;
pub use boxes::DescentTiming;
use boxes::Boxes;

/// Maximum number of maneuvers of a plan
pub const MAX_MANEUVERS: usize = 4;

/// Search step past a site passage which comes too early for the requested revolutions
const PASSAGE_RETRY_MIN: f64 = 20.0;

/// Selects the maneuver sequence of the planner.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Sequence, Serialize, Deserialize)]
pub enum LdppMode {
    /// Plane change combined with circularization, then DOI
    CircularizingPlaneChange,
    /// Plane change, then DOI
    PlaneChange,
    /// Apsis placement burn timed from the DOI revolutions, then DOI
    ApsisPlacement,
    /// Height adjustment, circularization, then DOI
    HeightAdjust,
    /// DOI only
    DoiOnly,
    /// Height adjustment, circularization and DOI, with a plane change inserted first when the
    /// descent orbit misses the site
    HeightAdjustPlaneCheck,
    /// Descent timing only, no maneuver
    TimingOnly,
    /// Plane change checked at the next site passage
    SitePassagePlaneChange,
}

impl LdppMode {
    /// Band around the circular orbit height within which the circularization apsis is accepted
    fn circularization_band_km(self) -> f64 {
        match self {
            Self::HeightAdjustPlaneCheck => 1_000.0 * FOOT_KM,
            _ => 2.0 * NAUTICAL_MILE_KM,
        }
    }
}

impl TryFrom<u8> for LdppMode {
    type Error = TargetingError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        enum_iterator::all::<Self>()
            .nth(code as usize)
            .ok_or_else(|| TargetingError::InvalidOption {
                msg: format!("unknown LDPP mode {code}"),
            })
    }
}

/// Landing site, in the lunar body-fixed frame.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LdppSite {
    pub lat_rad: f64,
    pub lng_rad: f64,
    pub radius_km: f64,
}

#[derive(Clone, Debug, TypedBuilder)]
pub struct LdppOptions {
    pub mode: LdppMode,
    /// Threshold time of each maneuver: a maneuver is never planned before its threshold
    pub thresholds: [Epoch; 4],
    /// Revolutions between DOI and PDI
    #[builder(default)]
    pub revs: u32,
    pub site: LdppSite,
    /// Perilune height of the descent orbit above the site
    #[builder(default = 50_000.0 * FOOT_KM)]
    pub doi_perilune_height_km: f64,
    /// Height of the circular orbit above the site
    #[builder(default = 60.0 * NAUTICAL_MILE_KM)]
    pub circular_height_km: f64,
    /// Angle traveled from PDI to landing
    #[builder(default = 14.0_f64.to_radians())]
    pub descent_angle_rad: f64,
    /// Duration of the powered descent
    #[builder(default = 720.0)]
    pub descent_duration_s: f64,
    /// Approach azimuth over the site, the current one when not set
    #[builder(default, setter(strip_option))]
    pub azimuth_rad: Option<f64>,
    /// Circularize at the crossing of the circular orbit height instead of at an apsis
    #[builder(default)]
    pub circularize_at_crossing: bool,
    #[builder(default)]
    pub model: PropModel,
}

/// Purpose of an LDPP maneuver
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LdppBurn {
    PlaneChange,
    HeightAdjust,
    Circularization,
    ApsisPlacement,
    Doi,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LdppManeuver {
    pub tig: Epoch,
    pub dv_lvlh_km_s: Vector3<f64>,
    pub kind: LdppBurn,
}

impl fmt::Display for LdppManeuver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:?} at {}: dV = [{:.4}, {:.4}, {:.4}] m/s",
            self.kind,
            self.tig,
            self.dv_lvlh_km_s.x * 1e3,
            self.dv_lvlh_km_s.y * 1e3,
            self.dv_lvlh_km_s.z * 1e3
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LdppSolution {
    /// Maneuvers in time order
    pub maneuvers: Vec<LdppManeuver>,
    pub t_doi: Option<Epoch>,
    pub t_pdi: Option<Epoch>,
    /// Landing time, or the site passage for a plane change checked at the site
    pub t_land: Option<Epoch>,
    /// Approach azimuth over the site, from north toward east
    pub azimuth_rad: Option<f64>,
    /// Vehicle mass after all of the maneuvers
    pub lm_mass_kg: f64,
    /// Number of phase transitions executed
    pub transitions: usize,
}

impl LdppSolution {
    /// Total delta-V of the plan, in km/s
    pub fn total_dv_km_s(&self) -> f64 {
        self.maneuvers.iter().map(|m| m.dv_lvlh_km_s.norm()).sum()
    }
}

/// A step of the planner.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Start,
    DoiRevolutions,
    PlaneChange,
    HeightAdjust,
    Circularize,
    ApsisPlacement,
    Doi,
    PlaneCheck,
    Finish,
}

/// Mutable state of one planner run
#[derive(Clone, Debug)]
struct Plan {
    initial: StateVector,
    state: StateVector,
    maneuvers: Vec<LdppManeuver>,
    timing: Option<DescentTiming>,
    /// Landing or site passage epoch to build the plane change on
    landing_hint: Option<Epoch>,
    azimuth_rad: Option<f64>,
    /// Argument of latitude of the site passage, for the apsis placement
    u_site_rad: f64,
    plane_ok: bool,
    insert_plane_change: bool,
}

impl Plan {
    fn new(initial: StateVector) -> Self {
        Self {
            initial,
            state: initial,
            maneuvers: Vec::with_capacity(MAX_MANEUVERS),
            timing: None,
            landing_hint: None,
            azimuth_rad: None,
            u_site_rad: 0.0,
            plane_ok: false,
            insert_plane_change: false,
        }
    }

    /// Restarts the sequence from the initial state, keeping what was learned about the landing
    fn restart(&mut self) {
        self.state = self.initial;
        self.maneuvers.clear();
        self.timing = None;
        self.plane_ok = false;
    }

    /// Threshold of the next maneuver: its own, or later if a maneuver was already planned after it
    fn threshold(&self, opts: &LdppOptions) -> Epoch {
        let own = opts.thresholds[self.maneuvers.len().min(MAX_MANEUVERS - 1)];
        let last = self.maneuvers.last().map_or(own, |m| m.tig);
        own.max(last).max(self.state.epoch)
    }

    /// Applies a maneuver to the current state, which must be at its TIG, and records it
    fn record(&mut self, kind: LdppBurn, dv_lvlh_km_s: Vector3<f64>) -> Result<(), TargetingError> {
        ensure!(
            self.maneuvers.len() < MAX_MANEUVERS,
            TooManyManeuversSnafu { max: MAX_MANEUVERS }
        );
        let tig = self.state.epoch;
        if let Some(last) = self.maneuvers.last() {
            ensure!(
                tig >= last.tig,
                NoSolutionSnafu {
                    msg: format!("{kind:?} at {tig} would precede the {:?} at {}", last.kind, last.tig)
                }
            );
        }
        self.state = self.state.apply_dv_lvlh(&dv_lvlh_km_s);
        let maneuver = LdppManeuver {
            tig,
            dv_lvlh_km_s,
            kind,
        };
        debug!("{maneuver}");
        self.maneuvers.push(maneuver);
        Ok(())
    }
}

struct Planner<'a> {
    boxes: Boxes<'a>,
    opts: &'a LdppOptions,
}

impl<'a> Planner<'a> {
    /// Next phase of the mode after `phase` completed
    fn transition(&self, phase: Phase, plan: &Plan) -> Phase {
        use LdppMode::*;
        match (phase, self.opts.mode) {
            (Phase::Start, CircularizingPlaneChange | PlaneChange | SitePassagePlaneChange) => {
                Phase::PlaneChange
            }
            (Phase::Start, ApsisPlacement) => Phase::DoiRevolutions,
            (Phase::Start, HeightAdjustPlaneCheck) if plan.insert_plane_change => {
                Phase::PlaneChange
            }
            (Phase::Start, HeightAdjust | HeightAdjustPlaneCheck) => Phase::HeightAdjust,
            (Phase::Start, DoiOnly | TimingOnly) => Phase::Doi,
            (Phase::DoiRevolutions, _) => Phase::ApsisPlacement,
            (Phase::ApsisPlacement, _) => Phase::Doi,
            (Phase::PlaneChange, HeightAdjustPlaneCheck) => Phase::HeightAdjust,
            (Phase::PlaneChange, SitePassagePlaneChange) => Phase::PlaneCheck,
            (Phase::PlaneChange, _) => Phase::Doi,
            (Phase::HeightAdjust, _) => Phase::Circularize,
            (Phase::Circularize, _) => Phase::Doi,
            (Phase::Doi, CircularizingPlaneChange | PlaneChange | HeightAdjustPlaneCheck) => {
                Phase::PlaneCheck
            }
            (Phase::Doi, _) => Phase::Finish,
            (Phase::PlaneCheck, _) if plan.plane_ok => Phase::Finish,
            // Start over, planning the plane change on the latest landing time
            (Phase::PlaneCheck, _) => Phase::Start,
            (Phase::Finish, _) => Phase::Finish,
        }
    }

    fn run(&self, phase: Phase, plan: &mut Plan) -> Result<(), TargetingError> {
        match phase {
            Phase::Start => {
                plan.restart();
                Ok(())
            }
            Phase::DoiRevolutions => self.doi_revolutions(plan),
            Phase::PlaneChange => self.plane_change(plan),
            Phase::HeightAdjust => self.height_adjust(plan),
            Phase::Circularize => self.circularize(plan),
            Phase::ApsisPlacement => self.apsis_placement(plan),
            Phase::Doi => self.doi(plan),
            Phase::PlaneCheck => self.plane_check(plan),
            Phase::Finish => Ok(()),
        }
    }

    fn coast_to_threshold(&self, plan: &mut Plan) -> Result<(), TargetingError> {
        plan.state = self.boxes.coast(&plan.state, plan.threshold(self.opts))?;
        Ok(())
    }

    /// Finds the site passage far enough after the DOI threshold for the requested revolutions
    fn doi_revolutions(&self, plan: &mut Plan) -> Result<(), TargetingError> {
        let opts = self.opts;
        let t_h = opts.thresholds[1].max(plan.state.epoch);
        let at_threshold = self.boxes.coast(&plan.state, t_h)?;
        let u_h = at_threshold.arg_latitude_rad(&self.boxes.pole(t_h));
        let n = at_threshold.mean_motion_rad_s(self.boxes.gm);
        let min_travel = TAU * opts.revs as f64 + PI + opts.descent_angle_rad;

        let mut after = t_h + (TAU * opts.revs as f64 / n) * Unit::Second;
        for _ in 0..self.boxes.ctx.params.solver.ldpp_max_iterations {
            let passage = self.boxes.site_passage(&at_threshold, after)?;
            let u_site = passage.arg_latitude_rad(&self.boxes.pole(passage.epoch));
            let swept = between_0_tau(u_site - u_h);
            let elapsed = n * (passage.epoch - t_h).to_seconds();
            let travel = swept + TAU * ((elapsed - swept) / TAU).round();
            if travel >= min_travel {
                plan.landing_hint = Some(passage.epoch);
                plan.u_site_rad = u_site;
                return Ok(());
            }
            after = passage.epoch + PASSAGE_RETRY_MIN * Unit::Minute;
        }
        NoSolutionSnafu {
            msg: "no site passage leaves room for the descent revolutions",
        }
        .fail()
    }

    /// Burn which puts the apsis at the circular height where DOI is to be performed
    fn apsis_placement(&self, plan: &mut Plan) -> Result<(), TargetingError> {
        let opts = self.opts;
        self.coast_to_threshold(plan)?;
        let u_doi = between_0_tau(
            plan.u_site_rad - opts.descent_angle_rad - PI - TAU * opts.revs as f64,
        );
        let radius_km = opts.site.radius_km + opts.circular_height_km;
        let mut u_burn = between_0_tau(u_doi - PI);
        let mut du = f64::INFINITY;
        for _ in 0..self.boxes.ctx.params.solver.ldpp_max_iterations {
            let burn = self.boxes.tima(&plan.state, u_burn)?;
            let dv = self.boxes.sac(&burn, Some(radius_km))?;
            let apsis = self.boxes.stap(&self.boxes.apply(&burn, &dv))?;
            du = between_pm_pi(apsis.arg_latitude_rad(&self.boxes.pole(apsis.epoch)) - u_doi);
            if du.abs() <= self.boxes.angle_tolerance_rad {
                plan.state = burn;
                return plan.record(LdppBurn::ApsisPlacement, dv);
            }
            u_burn = between_0_tau(u_burn - du);
        }
        NotConvergedSnafu {
            solver: "LDPP apsis placement",
            iterations: self.boxes.ctx.params.solver.ldpp_max_iterations,
            residual: du,
        }
        .fail()
    }

    fn plane_change(&self, plan: &mut Plan) -> Result<(), TargetingError> {
        self.coast_to_threshold(plan)?;
        let landing = match plan.landing_hint {
            Some(epoch) => epoch,
            None => {
                let after = self.opts.thresholds[1].max(plan.state.epoch);
                self.boxes.site_passage(&plan.state, after)?.epoch
            }
        };
        let (plane, azimuth) = self.boxes.chapla(&plan.state, landing);
        let (node, mut dv) = self.boxes.cnode(&plan.state, &plane)?;
        if self.opts.mode == LdppMode::CircularizingPlaneChange {
            let in_plane = node.apply_dv_lvlh(&dv);
            let circular = in_plane.apply_dv_lvlh(&self.boxes.sac(&in_plane, None)?);
            dv = node.dv_lvlh_to(&circular.velocity_km_s);
        }
        plan.state = node;
        plan.azimuth_rad = Some(azimuth);
        plan.record(LdppBurn::PlaneChange, dv)
    }

    fn height_adjust(&self, plan: &mut Plan) -> Result<(), TargetingError> {
        self.coast_to_threshold(plan)?;
        plan.state = self.boxes.stap(&plan.state)?;
        let radius_km = self.opts.site.radius_km + self.opts.circular_height_km;
        let dv = self.boxes.sac(&plan.state, Some(radius_km))?;
        plan.record(LdppBurn::HeightAdjust, dv)
    }

    fn circularize(&self, plan: &mut Plan) -> Result<(), TargetingError> {
        self.coast_to_threshold(plan)?;
        if self.opts.circularize_at_crossing {
            plan.state = self.boxes.stcir(&plan.state, self.opts.circular_height_km)?;
        } else {
            let radius_km = self.opts.site.radius_km + self.opts.circular_height_km;
            let band_km = self.opts.mode.circularization_band_km();
            let max_iterations = self.boxes.ctx.params.solver.ldpp_max_iterations;
            let mut apsis = self.boxes.stap(&plan.state)?;
            let mut attempts = 1;
            while (apsis.rmag_km() - radius_km).abs() > band_km {
                ensure!(
                    attempts < max_iterations,
                    NoSolutionSnafu {
                        msg: format!("no apsis within {band_km:.3} km of the circular orbit radius")
                    }
                );
                apsis = self.boxes.stap(&apsis)?;
                attempts += 1;
            }
            plan.state = apsis;
        }
        let dv = self.boxes.sac(&plan.state, None)?;
        plan.record(LdppBurn::Circularization, dv)
    }

    fn doi(&self, plan: &mut Plan) -> Result<(), TargetingError> {
        self.coast_to_threshold(plan)?;
        let timing = self.boxes.lltpr(&plan.state, plan.state.epoch)?;
        plan.timing = Some(timing);
        plan.state = self.boxes.coast(&plan.state, timing.t_doi)?;
        if self.opts.mode != LdppMode::TimingOnly {
            let perilune = self.opts.site.radius_km + self.opts.doi_perilune_height_km;
            let dv = self.boxes.sac(&plan.state, Some(perilune))?;
            plan.record(LdppBurn::Doi, dv)?;
        }
        plan.state = self.boxes.coast(&plan.state, timing.t_pdi)?;
        plan.azimuth_rad = Some(
            self.boxes
                .track_azimuth(&unit(&plan.state.hvec()), timing.t_land),
        );
        Ok(())
    }

    /// Checks whether the site lies in the orbit plane at landing, or at the site passage
    fn plane_check(&self, plan: &mut Plan) -> Result<(), TargetingError> {
        let state = match plan.timing {
            Some(timing) => self.boxes.coast(&plan.state, timing.t_land)?,
            None => {
                let after = self.opts.thresholds[1].max(plan.threshold(self.opts));
                self.boxes.site_passage(&plan.state, after)?
            }
        };
        let h = unit(&state.hvec());
        let cross_track = h.dot(&unit(&self.boxes.site(state.epoch))).clamp(-1.0, 1.0).asin();
        debug!(
            "site {:.5} deg out of plane at {}",
            cross_track.to_degrees(),
            state.epoch
        );
        plan.plane_ok = cross_track.abs() <= self.boxes.angle_tolerance_rad;
        plan.landing_hint = Some(state.epoch);
        if !plan.plane_ok && self.opts.mode == LdppMode::HeightAdjustPlaneCheck {
            plan.insert_plane_change = true;
        }
        Ok(())
    }
}

/// Plans the lunar descent maneuvers of the selected mode from the provided state.
pub fn ldpp(
    ctx: &MissionContext,
    state: &StateVector,
    opts: &LdppOptions,
    vehicle: &dyn Vehicle,
) -> Result<LdppSolution, TargetingError> {
    for pair in opts.thresholds.windows(2) {
        ensure!(
            pair[1] >= pair[0],
            InvalidOptionSnafu {
                msg: "LDPP thresholds must be in time order"
            }
        );
    }
    ensure!(
        opts.site.radius_km > 0.0 && opts.descent_duration_s >= 0.0,
        InvalidOptionSnafu {
            msg: "invalid landing site or descent duration"
        }
    );

    let planner = Planner {
        boxes: Boxes::new(ctx, opts),
        opts,
    };
    let mut plan = Plan::new(ctx.convert(state, CoordinateSystem::MCI)?);
    let max_transitions = ctx.params.solver.ldpp_max_transitions;

    let mut phase = Phase::Start;
    let mut transitions = 0;
    while phase != Phase::Finish {
        ensure!(
            transitions < max_transitions,
            NotConvergedSnafu {
                solver: "LDPP",
                iterations: transitions,
                residual: f64::NAN
            }
        );
        planner.run(phase, &mut plan)?;
        let next = planner.transition(phase, &plan);
        debug!("LDPP {phase:?} -> {next:?}");
        phase = next;
        transitions += 1;
    }

    let total_dv: f64 = plan.maneuvers.iter().map(|m| m.dv_lvlh_km_s.norm()).sum();
    let lm_mass_kg = vehicle.mass_after_kg(total_dv);
    let azimuth_rad = match opts.mode {
        LdppMode::SitePassagePlaneChange => opts.azimuth_rad.or(plan.azimuth_rad),
        _ => plan.azimuth_rad,
    };

    let solution = LdppSolution {
        t_doi: plan.timing.map(|t| t.t_doi),
        t_pdi: plan.timing.map(|t| t.t_pdi),
        t_land: plan.timing.map(|t| t.t_land).or(plan.landing_hint),
        maneuvers: plan.maneuvers,
        azimuth_rad,
        lm_mass_kg,
        transitions,
    };
    info!(
        "LDPP {:?}: {} maneuver(s), {:.3} m/s in {transitions} transitions",
        opts.mode,
        solution.maneuvers.len(),
        solution.total_dv_km_s() * 1e3
    );
    Ok(solution)
}
