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

use super::LdppOptions;
use crate::cosmic::{body_pole, site_inertial_km, Body, CoordinateSystem, StateVector};
use crate::ephemeris::{longitude_crossing, LongitudeSearch};
use crate::errors::{NoSolutionSnafu, NotConvergedSnafu, TargetingError};
use crate::linalg::Vector3;
use crate::md::MissionContext;
use crate::propagators::{
    generate_ephemeris, time_to_arg_latitude, time_to_true_anomaly, Crossing, StopCondition,
};
use crate::time::{Epoch, Unit};
use crate::utils::{between_0_tau, between_pm_pi, rotate_vector, unit};
use snafu::ensure;
use std::f64::consts::{PI, TAU};

/// Convergence of the apoapsis radius targeted by SAC, in km (1 m)
const SAC_TOLERANCE_KM: f64 = 1e-3;
/// An apsis closer than this is the current point, not the next apsis
const STAP_MIN_COAST_S: f64 = 1.0;
/// Below this eccentricity the orbit is circular and every point is an apsis
const STAP_CIRCULAR_ECC: f64 = 1e-5;
/// Refinements of the common node
const CNODE_REFINEMENTS: usize = 3;
/// Samples per revolution of the site passage search ephemeris
const PASSAGE_SAMPLES_PER_REV: f64 = 90.0;

/// Times of the descent computed by LLTPR
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DescentTiming {
    pub t_doi: Epoch,
    pub t_pdi: Epoch,
    pub t_land: Epoch,
}

/// The maneuver computation boxes of the descent planner, all of them about the Moon.
pub(crate) struct Boxes<'a> {
    pub ctx: &'a MissionContext,
    pub opts: &'a LdppOptions,
    pub gm: f64,
    pub angle_tolerance_rad: f64,
    pub time_tolerance_s: f64,
}

impl<'a> Boxes<'a> {
    pub fn new(ctx: &'a MissionContext, opts: &'a LdppOptions) -> Self {
        Self {
            ctx,
            opts,
            gm: ctx.params.moon.gm_km3_s2,
            angle_tolerance_rad: ctx.params.solver.ldpp_angle_tolerance_deg.to_radians(),
            time_tolerance_s: ctx.params.solver.ldpp_time_tolerance_s,
        }
    }

    fn max_iterations(&self) -> usize {
        self.ctx.params.solver.ldpp_max_iterations
    }

    /// Lunar pole in the inertial axes
    pub fn pole(&self, epoch: Epoch) -> Vector3<f64> {
        body_pole(Body::Moon, epoch)
    }

    /// Landing site position in the inertial axes at the provided epoch
    pub fn site(&self, epoch: Epoch) -> Vector3<f64> {
        let site = &self.opts.site;
        site_inertial_km(Body::Moon, site.lat_rad, site.lng_rad, site.radius_km, epoch)
    }

    /// Coasts the state to the provided epoch, in the Moon centered inertial frame
    pub fn coast(&self, state: &StateVector, epoch: Epoch) -> Result<StateVector, TargetingError> {
        if epoch == state.epoch {
            return Ok(*state);
        }
        let coasted = self.ctx.propagate_to(state, epoch, self.opts.model)?;
        Ok(self.ctx.convert(&coasted, CoordinateSystem::MCI)?)
    }

    /// APPLY: impulsive velocity change in LVLH
    pub fn apply(&self, state: &StateVector, dv_lvlh_km_s: &Vector3<f64>) -> StateVector {
        state.apply_dv_lvlh(dv_lvlh_km_s)
    }

    /// TIMA: coasts forward until the argument of latitude about the lunar equator is `u_rad`.
    pub fn tima(&self, state: &StateVector, u_rad: f64) -> Result<StateVector, TargetingError> {
        let pole = self.pole(state.epoch);
        let dt_s = time_to_arg_latitude(state, u_rad, &pole, self.gm).ok_or_else(|| {
            TargetingError::NoSolution {
                msg: format!(
                    "the orbit never reaches an argument of latitude of {:.3} deg",
                    u_rad.to_degrees()
                ),
            }
        })?;
        let mut coasted = self.coast(state, state.epoch + dt_s * Unit::Second)?;
        let mut dt_s = f64::INFINITY;
        for _ in 0..self.max_iterations() {
            let du = between_pm_pi(u_rad - coasted.arg_latitude_rad(&self.pole(coasted.epoch)));
            // Rate of the argument of latitude is h / r²
            dt_s = du * coasted.rmag_km().powi(2) / coasted.hvec().norm();
            if dt_s.abs() <= self.time_tolerance_s {
                return Ok(coasted);
            }
            coasted = self.coast(&coasted, coasted.epoch + dt_s * Unit::Second)?;
        }
        NotConvergedSnafu {
            solver: "TIMA",
            iterations: self.max_iterations(),
            residual: dt_s,
        }
        .fail()
    }

    /// SAC: horizontal burn which places the radius half a revolution later at
    /// `apoapsis_radius_km`, or circularizes when it is not provided. Returns the LVLH delta-V.
    pub fn sac(
        &self,
        state: &StateVector,
        apoapsis_radius_km: Option<f64>,
    ) -> Result<Vector3<f64>, TargetingError> {
        let r = state.rmag_km();
        let target = apoapsis_radius_km.unwrap_or(r);
        let horizontal = state.lvlh_dcm().transpose() * Vector3::x();
        let u_opposite = between_0_tau(state.arg_latitude_rad(&self.pole(state.epoch)) + PI);

        let mut aim = target;
        let mut dr = f64::INFINITY;
        for _ in 0..self.max_iterations() {
            let sma = 0.5 * (aim + r);
            let speed = (2.0 * self.gm / r - self.gm / sma).sqrt();
            ensure!(
                speed.is_finite() && sma > 0.0,
                NoSolutionSnafu {
                    msg: format!("no horizontal burn reaches a radius of {target:.3} km")
                }
            );
            let post = state.with_velocity(speed * horizontal);
            let opposite = self.tima(&post, u_opposite)?;
            dr = target - opposite.rmag_km();
            if dr.abs() <= SAC_TOLERANCE_KM {
                return Ok(state.dv_lvlh_to(&post.velocity_km_s));
            }
            aim += dr;
        }
        NotConvergedSnafu {
            solver: "SAC",
            iterations: self.max_iterations(),
            residual: dr,
        }
        .fail()
    }

    /// STAP: coasts to the next apsis, at least one second away. A circular orbit has no
    /// defined apsis, the current state is returned.
    pub fn stap(&self, state: &StateVector) -> Result<StateVector, TargetingError> {
        if state.ecc(self.gm) < STAP_CIRCULAR_ECC {
            debug!("STAP on a circular orbit, the current point is the apsis");
            return Ok(*state);
        }
        let dt_s = [0.0, PI]
            .into_iter()
            .filter_map(|ta| time_to_true_anomaly(state, ta, self.gm))
            .filter(|dt_s| *dt_s >= STAP_MIN_COAST_S)
            .min_by(|a, b| a.total_cmp(b))
            .ok_or_else(|| TargetingError::NoSolution {
                msg: "the orbit has no apsis ahead".to_string(),
            })?;

        let mut apsis = self.coast(state, state.epoch + dt_s * Unit::Second)?;
        let mut step_s = f64::INFINITY;
        for _ in 0..self.max_iterations() {
            // Newton step on the radial velocity
            let r = apsis.rmag_km();
            let vr = apsis.radial_velocity_km_s();
            let vr_dot = (apsis.vmag_km_s().powi(2) - vr * vr) / r - self.gm / (r * r);
            step_s = -vr / vr_dot;
            if step_s.abs() <= self.time_tolerance_s || !step_s.is_finite() {
                return Ok(apsis);
            }
            apsis = self.coast(&apsis, apsis.epoch + step_s * Unit::Second)?;
        }
        NotConvergedSnafu {
            solver: "STAP",
            iterations: self.max_iterations(),
            residual: step_s,
        }
        .fail()
    }

    /// STCIR: coasts to the nearest crossing of the circular orbit height above the site.
    pub fn stcir(&self, state: &StateVector, height_km: f64) -> Result<StateVector, TargetingError> {
        let radius_km = self.opts.site.radius_km + height_km;
        let period = state.period(self.gm).ok_or_else(|| TargetingError::NoSolution {
            msg: "the orbit is not closed".to_string(),
        })?;
        let crossing = self.ctx.propagate_until(
            state,
            StopCondition::Radius {
                radius_km,
                crossing: Crossing::Any,
            },
            period,
            self.opts.model,
        )?;
        Ok(self.ctx.convert(&crossing, CoordinateSystem::MCI)?)
    }

    /// Time and state at which the vehicle passes abeam of the landing site, after `after`.
    ///
    /// The site longitude crossing is found on a generated ephemeris, then the passage is moved
    /// to the point of the orbit closest to the site.
    pub fn site_passage(
        &self,
        state: &StateVector,
        after: Epoch,
    ) -> Result<StateVector, TargetingError> {
        let start = self.coast(state, after)?;
        let period = start.period(self.gm).ok_or_else(|| TargetingError::NoSolution {
            msg: "the orbit is not closed".to_string(),
        })?;
        let table = generate_ephemeris(
            "CSM",
            &start,
            start.epoch + 1.5 * period,
            period / PASSAGE_SAMPLES_PER_REV,
            self.opts.model,
            &self.ctx.params,
            self.ctx.ephem(),
        )?;
        let search = LongitudeSearch {
            order: self.ctx.params.ephemeris.default_order,
            max_iterations: self.ctx.params.solver.longitude_search_max_iterations,
            tolerance_rad: self.ctx.params.solver.longitude_search_tolerance_rad,
            margin: self.ctx.params.ephemeris.extrapolation_margin_s * Unit::Second,
        };
        let crossing = longitude_crossing(
            &table,
            self.opts.site.lng_rad,
            start.epoch,
            search,
            self.ctx.ephem(),
        )?;

        let mut passage = self.coast(&start, crossing)?;
        let mut dt_s = f64::INFINITY;
        for _ in 0..self.max_iterations() {
            let h = unit(&passage.hvec());
            let site = self.site(passage.epoch);
            let in_plane = unit(&(site - h * h.dot(&site)));
            let r = unit(&passage.radius_km);
            let angle = h.dot(&r.cross(&in_plane)).atan2(r.dot(&in_plane));
            dt_s = angle * passage.rmag_km().powi(2) / passage.hvec().norm();
            if dt_s.abs() <= self.time_tolerance_s {
                return Ok(passage);
            }
            passage = self.coast(&passage, passage.epoch + dt_s * Unit::Second)?;
        }
        NotConvergedSnafu {
            solver: "site passage",
            iterations: self.max_iterations(),
            residual: dt_s,
        }
        .fail()
    }

    /// East and north unit vectors at the site at the provided epoch
    fn site_axes(&self, epoch: Epoch) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        let up = unit(&self.site(epoch));
        let east = unit(&self.pole(epoch).cross(&up));
        let north = up.cross(&east);
        (up, east, north)
    }

    /// Azimuth of the ground track of an orbit with the provided angular momentum over the site
    pub fn track_azimuth(&self, h: &Vector3<f64>, epoch: Epoch) -> f64 {
        let (up, east, north) = self.site_axes(epoch);
        let direction = h.cross(&up);
        between_0_tau(direction.dot(&east).atan2(direction.dot(&north)))
    }

    /// CHAPLA: unit angular momentum of the orbit which overflies the site at `landing`, with the
    /// requested approach azimuth, or with the smallest plane change from `current` otherwise.
    /// Returns the plane normal and the approach azimuth.
    pub fn chapla(&self, current: &StateVector, landing: Epoch) -> (Vector3<f64>, f64) {
        let (up, east, north) = self.site_axes(landing);
        match self.opts.azimuth_rad {
            Some(azimuth) => {
                let (sin, cos) = azimuth.sin_cos();
                let direction = north * cos + east * sin;
                (unit(&up.cross(&direction)), between_0_tau(azimuth))
            }
            None => {
                let h = unit(&current.hvec());
                let desired = unit(&(h - up * h.dot(&up)));
                (desired, self.track_azimuth(&desired, landing))
            }
        }
    }

    /// POSITION MATCH: the state on the orbit of normal `plane` at the same epoch, obtained by
    /// rotating the state about the line of nodes of both planes.
    pub fn position_match(&self, state: &StateVector, plane: &Vector3<f64>) -> StateVector {
        let h = unit(&state.hvec());
        let nodes = h.cross(plane);
        if nodes.norm() < f64::EPSILON {
            return *state;
        }
        let angle = nodes.norm().atan2(h.dot(plane));
        state.with_rv(
            rotate_vector(&nodes, angle, &state.radius_km),
            rotate_vector(&nodes, angle, &state.velocity_km_s),
        )
    }

    /// CNODE: coasts to the first common node with the orbit of normal `plane` and computes the
    /// plane change there. Returns the state at the node and the LVLH delta-V.
    pub fn cnode(
        &self,
        state: &StateVector,
        plane: &Vector3<f64>,
    ) -> Result<(StateVector, Vector3<f64>), TargetingError> {
        let mut node = *state;
        for refinement in 0..=CNODE_REFINEMENTS {
            let h = unit(&node.hvec());
            let line = h.cross(plane);
            if line.norm() < f64::EPSILON {
                // Already coplanar
                return Ok((node, Vector3::zeros()));
            }
            let line = unit(&line);
            let r = unit(&node.radius_km);
            let angle_to = |n: Vector3<f64>| h.dot(&r.cross(&n)).atan2(r.dot(&n));
            let (ascending, descending) = (angle_to(line), angle_to(-line));
            if ascending.abs().min(descending.abs()) <= self.angle_tolerance_rad {
                break;
            }
            if refinement == CNODE_REFINEMENTS {
                debug!("common node not refined below tolerance");
                break;
            }
            let travel = between_0_tau(ascending).min(between_0_tau(descending));
            let u = node.arg_latitude_rad(&self.pole(node.epoch)) + travel;
            node = self.tima(&node, between_0_tau(u))?;
        }
        let matched = self.position_match(&node, plane);
        Ok((node, node.dv_lvlh_to(&matched.velocity_km_s)))
    }

    /// LLTPR: solves the descent orbit insertion time after `threshold` such that the landing
    /// point, a descent angle past the perilune reached after the requested revolutions, is the
    /// site projected in the orbit plane.
    pub fn lltpr(
        &self,
        state: &StateVector,
        threshold: Epoch,
    ) -> Result<DescentTiming, TargetingError> {
        let gm = self.gm;
        let r_descent = self.opts.site.radius_km + self.opts.doi_perilune_height_km;
        let revs = self.opts.revs as f64;
        let (sin_d, cos_d) = self.opts.descent_angle_rad.sin_cos();
        let max_iterations = self.ctx.params.solver.ldpp_lltpr_max_iterations;

        let mut t = threshold;
        let mut eps = f64::INFINITY;
        for iteration in 1..=max_iterations {
            let doi = self.coast(state, t)?;
            let r_a = doi.rmag_km();
            let h_c = unit(&doi.hvec());
            let a_d = gm * r_a / (2.0 * gm - r_a * doi.vmag_km_s().powi(2));
            let along = unit(&h_c.cross(&doi.radius_km));

            let descend = |r_p: f64| -> Result<(f64, StateVector), TargetingError> {
                let transfer_s = (TAU * revs + PI) * ((r_a + r_p).powi(3) / (8.0 * gm)).sqrt();
                let speed = (2.0 * gm * r_p / (r_a * (r_p + r_a))).sqrt();
                let descent = doi.with_velocity(speed * along);
                Ok((transfer_s, self.coast(&descent, t + transfer_s * Unit::Second)?))
            };
            let (_, first) = descend(r_descent)?;
            // Second pass corrects the perilune radius for the perturbations
            let (transfer_s, perilune) = descend(2.0 * r_descent - first.rmag_km())?;

            let h = unit(&perilune.hvec());
            let t_pdi = t + transfer_s * Unit::Second;
            let t_land = t_pdi + self.opts.descent_duration_s * Unit::Second;
            let r_hat = unit(&perilune.radius_km);
            let downrange = unit(&h.cross(&r_hat));
            let landing = r_hat * cos_d + downrange * sin_d;
            let site = self.site(t_land);
            let site_in_plane = unit(&(site - h * h.dot(&site)));
            eps = (landing - site_in_plane).norm();
            debug!(
                "LLTPR iteration {iteration}: DOI at {t}, landing error {:.5} deg",
                eps.to_degrees()
            );

            if eps <= self.angle_tolerance_rad {
                return Ok(DescentTiming {
                    t_doi: t,
                    t_pdi,
                    t_land,
                });
            }

            let mut alpha = landing.dot(&site_in_plane).clamp(-1.0, 1.0).acos();
            let sign = if h.dot(&landing.cross(&site_in_plane)) >= 0.0 {
                1.0
            } else if iteration == 1 {
                // Never move before the threshold
                alpha = TAU - alpha;
                1.0
            } else {
                -1.0
            };
            t = t + sign * alpha * (a_d.powi(3) / gm).sqrt() * Unit::Second;
        }
        NotConvergedSnafu {
            solver: "LLTPR",
            iterations: max_iterations,
            residual: eps,
        }
        .fail()
    }
}
