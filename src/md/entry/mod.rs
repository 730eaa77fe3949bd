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

use super::maneuver::{EngineModel, Maneuver};
use super::MissionContext;
use crate::cosmic::{AstroError, Body, StateVector, Thruster, Vehicle, ENTRY_INTERFACE_ALTITUDE_KM};
use crate::errors::{InvalidOptionSnafu, NoSolutionSnafu, NotConvergedSnafu, TargetingError};
use crate::linalg::Vector3;
use crate::propagators::{conic_after, time_to_radius, Crossing, PropModel, StopCondition};
use crate::time::{Epoch, Unit};
use crate::utils::between_pm_pi;
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;
use typed_builder::TypedBuilder;

mod range;
pub use range::*;

/// Iterations of the delta-V magnitude bisection
const DV_BISECTIONS: usize = 60;
/// Flight path angle convergence threshold of the bound phase, in radians
const FPA_TOLERANCE_RAD: f64 = 1e-6;
/// Delta-V increment of the flight path angle sensitivity, in km/s
const FPA_SENSITIVITY_STEP_KM_S: f64 = 1e-4;

/// Flight path angle to reach at the entry interface.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum EntryFpa {
    /// From the reentry target line, as a function of the entry speed
    #[default]
    TargetLine,
    /// Fixed value in radians
    Fixed(f64),
}

#[derive(Clone, Debug, TypedBuilder)]
pub struct EntryOptions {
    pub tig_guess: Epoch,
    pub target_longitude_rad: f64,
    #[builder(default)]
    pub fpa: EntryFpa,
    /// Refine the conic solution with precision propagation
    #[builder(default = true)]
    pub precision: bool,
    /// Correct the delta-V magnitude for the perturbed flight path angle
    #[builder(default)]
    pub along_track_bias: bool,
    /// Angle of the deorbit delta-V below the local horizontal
    #[builder(default = 31.7_f64.to_radians())]
    pub burn_pitch_rad: f64,
    #[builder(default = 1.0)]
    pub max_dv_km_s: f64,
    /// Overrides the configured landing longitude tolerance, in degrees
    #[builder(default, setter(strip_option))]
    pub tolerance_deg: Option<f64>,
}

/// The three successive phases of the entry iterator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryPhase {
    ConicGuess,
    PrecisionRefine,
    FlightPathAngleBound,
}

impl EntryPhase {
    /// Phase after this one, if any
    fn next(self, opts: &EntryOptions) -> Option<Self> {
        match self {
            Self::ConicGuess if opts.precision => Some(Self::PrecisionRefine),
            Self::PrecisionRefine if matches!(opts.fpa, EntryFpa::Fixed(_)) => {
                Some(Self::FlightPathAngleBound)
            }
            _ => None,
        }
    }
}

/// Result of an entry targeting request.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EntrySolution {
    pub maneuver: Maneuver,
    pub landing: Landing,
    /// Predicted minus target landing longitude
    pub longitude_error_rad: f64,
    pub entry_interface: StateVector,
    pub entry_fpa_rad: f64,
    pub entry_speed_km_s: f64,
    /// Iterations of every phase
    pub iterations: usize,
    /// Last phase executed
    pub phase: EntryPhase,
}

impl fmt::Display for EntrySolution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "deorbit {} -> EI {} (v = {:.4} km/s, fpa = {:.3} deg), landing at {:.3} N {:.3} E",
            self.maneuver,
            self.entry_interface.epoch,
            self.entry_speed_km_s,
            self.entry_fpa_rad.to_degrees(),
            self.landing.lat_rad.to_degrees(),
            self.landing.lng_rad.to_degrees()
        )
    }
}

/// One evaluation of a candidate TIG
#[derive(Copy, Clone, Debug)]
struct Evaluation {
    tig_state: StateVector,
    dv_km_s: f64,
    ei: StateVector,
    landing: Landing,
}

struct EntryIterator<'a> {
    ctx: &'a MissionContext,
    opts: &'a EntryOptions,
    /// Pre-maneuver state, never modified
    initial: StateVector,
    gm: f64,
    ei_radius_km: f64,
    tolerance_rad: f64,
    max_iterations: usize,
    /// Delta-V added to the conic solution for the perturbed flight path angle
    bias_km_s: f64,
}

impl<'a> EntryIterator<'a> {
    /// LVLH unit vector of the deorbit burn
    fn direction(&self) -> Vector3<f64> {
        let (sin, cos) = self.opts.burn_pitch_rad.sin_cos();
        Vector3::new(-cos, 0.0, sin)
    }

    fn target_fpa(&self, speed_km_s: f64) -> f64 {
        match self.opts.fpa {
            EntryFpa::TargetLine => reentry_target_line(speed_km_s),
            EntryFpa::Fixed(fpa_rad) => fpa_rad,
        }
    }

    /// Conic state at the entry interface after the deorbit burn, if it is reached
    fn conic_entry(
        &self,
        tig_state: &StateVector,
        dv_km_s: f64,
    ) -> Result<Option<StateVector>, TargetingError> {
        let post = tig_state.apply_dv_lvlh(&(dv_km_s * self.direction()));
        match time_to_radius(&post, self.ei_radius_km, Crossing::Decreasing, self.gm) {
            Ok(dt_s) => Ok(Some(conic_after(
                &post,
                dt_s,
                self.gm,
                self.ctx.params.solver.kepler_max_iterations,
            )?)),
            Err(_) => Ok(None),
        }
    }

    /// Flight path angle residual at the entry interface, positive when too shallow
    fn fpa_residual(&self, tig_state: &StateVector, dv_km_s: f64) -> Result<f64, TargetingError> {
        Ok(match self.conic_entry(tig_state, dv_km_s)? {
            Some(ei) => ei.fpa_rad() - self.target_fpa(ei.vmag_km_s()),
            None => f64::INFINITY,
        })
    }

    /// Bisection of the delta-V magnitude reaching the entry interface at the target flight path angle
    fn solve_dv(&self, tig_state: &StateVector) -> Result<f64, TargetingError> {
        if self.fpa_residual(tig_state, 0.0)? <= 0.0 {
            return Ok(0.0);
        }
        let (mut lo, mut hi) = (0.0, self.opts.max_dv_km_s);
        ensure!(
            self.fpa_residual(tig_state, hi)? < 0.0,
            NoSolutionSnafu {
                msg: format!(
                    "{:.1} m/s does not reach the entry flight path angle",
                    hi * 1e3
                )
            }
        );
        for _ in 0..DV_BISECTIONS {
            let mid = 0.5 * (lo + hi);
            if self.fpa_residual(tig_state, mid)? > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok(0.5 * (lo + hi))
    }

    fn evaluate(&mut self, tig: Epoch, phase: EntryPhase) -> Result<Evaluation, TargetingError> {
        let model = match phase {
            EntryPhase::ConicGuess => PropModel::Conic,
            _ => PropModel::Precision,
        };
        // Always from the original pre-maneuver state
        let tig_state = self.ctx.propagate_to(&self.initial, tig, model)?;
        let dv_km_s = self.solve_dv(&tig_state)? + self.bias_km_s;

        let ei = match model {
            PropModel::Conic => self.conic_entry(&tig_state, dv_km_s)?.ok_or_else(|| {
                TargetingError::NoSolution {
                    msg: "the deorbit trajectory does not reach the entry interface".to_string(),
                }
            })?,
            PropModel::Precision => {
                let post = tig_state.apply_dv_lvlh(&(dv_km_s * self.direction()));
                let ei = self.ctx.propagate_until(
                    &post,
                    StopCondition::Radius {
                        radius_km: self.ei_radius_km,
                        crossing: Crossing::Decreasing,
                    },
                    3.0 * Unit::Hour,
                    model,
                )?;
                if self.opts.along_track_bias && phase == EntryPhase::PrecisionRefine {
                    let fpa_error = ei.fpa_rad() - self.target_fpa(ei.vmag_km_s());
                    let sensitivity = (self.fpa_residual(&tig_state, dv_km_s + FPA_SENSITIVITY_STEP_KM_S)?
                        - self.fpa_residual(&tig_state, dv_km_s)?)
                        / FPA_SENSITIVITY_STEP_KM_S;
                    if sensitivity.is_finite() && sensitivity.abs() > f64::EPSILON {
                        self.bias_km_s -= fpa_error / sensitivity;
                        debug!("along-track bias now {:.4} m/s", self.bias_km_s * 1e3);
                    }
                }
                ei
            }
        };

        Ok(Evaluation {
            tig_state,
            dv_km_s,
            landing: landing_point(&ei, self.ctx.params.earth.radius_km),
            ei,
        })
    }

    /// Secant iterations on the TIG until the landing longitude error is within tolerance
    fn correct_tig(
        &mut self,
        tig_guess: Epoch,
        phase: EntryPhase,
    ) -> Result<(Epoch, Evaluation, usize), TargetingError> {
        let earth_rate = self.ctx.params.earth.rotation_rate_rad_s;
        let n = self.initial.mean_motion_rad_s(self.gm);
        let half_period_s = std::f64::consts::PI / n;
        let mut tig = tig_guess;
        let mut previous: Option<(Epoch, f64)> = None;
        let mut error = f64::INFINITY;

        for iteration in 0..self.max_iterations {
            let eval = self.evaluate(tig, phase)?;
            error = between_pm_pi(eval.landing.lng_rad - self.opts.target_longitude_rad);
            debug!(
                "{phase:?} iteration {iteration}: TIG {tig}, dV {:.3} m/s, longitude error {:.5} deg",
                eval.dv_km_s * 1e3,
                error.to_degrees()
            );
            if error.abs() < self.tolerance_rad {
                return Ok((tig, eval, iteration + 1));
            }
            // The ground track moves east at the orbit rate while the Earth turns under it
            let slope = match previous {
                Some((prev_tig, prev_error)) if (tig - prev_tig).abs() > 1.0 * Unit::Microsecond => {
                    (error - prev_error) / (tig - prev_tig).to_seconds()
                }
                _ => n - earth_rate,
            };
            ensure!(
                slope.abs() > f64::EPSILON,
                NotConvergedSnafu {
                    solver: "entry",
                    iterations: iteration + 1,
                    residual: error.to_degrees()
                }
            );
            let step_s = (-error / slope).clamp(-half_period_s, half_period_s);
            previous = Some((tig, error));
            tig = tig + step_s * Unit::Second;
        }

        NotConvergedSnafu {
            solver: "entry",
            iterations: self.max_iterations,
            residual: error.to_degrees(),
        }
        .fail()
    }

    /// Secant on the delta-V magnitude until the precision entry flight path angle is the fixed one
    fn bound_fpa(&mut self, tig: Epoch) -> Result<(Evaluation, usize), TargetingError> {
        let fpa_rad = self.target_fpa(0.0);
        let residual = |this: &mut Self| -> Result<(Evaluation, f64), TargetingError> {
            let eval = this.evaluate(tig, EntryPhase::FlightPathAngleBound)?;
            Ok((eval, eval.ei.fpa_rad() - fpa_rad))
        };

        let (mut eval, mut f1) = residual(self)?;
        let mut x1 = self.bias_km_s;
        let mut x0 = x1 - FPA_SENSITIVITY_STEP_KM_S;
        self.bias_km_s = x0;
        let (_, mut f0) = residual(self)?;
        for iteration in 0..self.max_iterations {
            if f1.abs() < FPA_TOLERANCE_RAD {
                self.bias_km_s = x1;
                return Ok((eval, iteration + 1));
            }
            ensure!(
                (f1 - f0).abs() > f64::EPSILON,
                NotConvergedSnafu {
                    solver: "entry flight path angle",
                    iterations: iteration + 1,
                    residual: f1
                }
            );
            let x2 = x1 - f1 * (x1 - x0) / (f1 - f0);
            self.bias_km_s = x2;
            let (next, f2) = residual(self)?;
            (x0, f0, x1, f1, eval) = (x1, f1, x2, f2, next);
        }
        NotConvergedSnafu {
            solver: "entry flight path angle",
            iterations: self.max_iterations,
            residual: f1,
        }
        .fail()
    }
}

/// Solves for the deorbit TIG and delta-V which land the vehicle at the target longitude.
///
/// The conic guess starts from the caller's TIG. With precision refinement, every iteration
/// re-propagates from the pre-maneuver state with the perturbed force model. The bound variant
/// finally adjusts the delta-V magnitude so that the perturbed entry flight path angle is the
/// fixed one.
///
/// The delta-V is solved as impulsive; the maneuver carries the engine and mass of the vehicle.
pub fn entry_targeting(
    ctx: &MissionContext,
    state: &StateVector,
    opts: &EntryOptions,
    vehicle: &dyn Vehicle,
) -> Result<EntrySolution, TargetingError> {
    if state.body() != Body::Earth {
        return Err(AstroError::ReferenceBodyMismatch {
            action: "entry targeting",
            expected: Body::Earth,
            found: state.body(),
        }
        .into());
    }
    ensure!(
        opts.max_dv_km_s > 0.0,
        InvalidOptionSnafu {
            msg: "the maximum deorbit delta-V must be positive"
        }
    );
    let tolerance_deg = opts
        .tolerance_deg
        .unwrap_or(ctx.params.solver.entry_longitude_tolerance_deg);
    ensure!(
        tolerance_deg > 0.0,
        InvalidOptionSnafu {
            msg: format!("invalid longitude tolerance of {tolerance_deg} deg")
        }
    );

    let mut iterator = EntryIterator {
        ctx,
        opts,
        initial: ctx.convert(state, state.frame.inertial())?,
        gm: ctx.params.earth.gm_km3_s2,
        ei_radius_km: ctx.params.earth.radius_km + ENTRY_INTERFACE_ALTITUDE_KM,
        tolerance_rad: tolerance_deg.to_radians(),
        max_iterations: ctx.params.solver.entry_max_iterations,
        bias_km_s: 0.0,
    };

    let mut phase = EntryPhase::ConicGuess;
    let mut tig = opts.tig_guess;
    let mut iterations = 0;
    let eval = loop {
        let (eval, count) = match phase {
            EntryPhase::ConicGuess | EntryPhase::PrecisionRefine => {
                let (new_tig, eval, count) = iterator.correct_tig(tig, phase)?;
                tig = new_tig;
                (eval, count)
            }
            EntryPhase::FlightPathAngleBound => iterator.bound_fpa(tig)?,
        };
        iterations += count;
        info!("entry {phase:?} phase done in {count} iterations");
        match phase.next(opts) {
            Some(next) => phase = next,
            None => break eval,
        }
    };

    let dv_lvlh = eval.dv_km_s * iterator.direction();
    let engine = EngineModel::Thruster(Thruster {
        thrust_N: vehicle.thrust_N(),
        isp_s: vehicle.isp_s(),
    });
    let solution = EntrySolution {
        maneuver: Maneuver::new(tig, dv_lvlh, engine, vehicle.mass_kg()),
        landing: eval.landing,
        longitude_error_rad: between_pm_pi(eval.landing.lng_rad - opts.target_longitude_rad),
        entry_interface: eval.ei,
        entry_fpa_rad: eval.ei.fpa_rad(),
        entry_speed_km_s: eval.ei.vmag_km_s(),
        iterations,
        phase,
    };
    debug!("deorbit from {}", eval.tig_state);
    info!("{solution}");
    Ok(solution)
}
