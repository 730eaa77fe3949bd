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

use super::{universal, LambertArc, LambertInput};
use crate::cosmic::ephem::EphemerisSource;
use crate::cosmic::{convert, StateVector};
use crate::errors::{NotConvergedSnafu, TargetingError};
use crate::io::SystemParameters;
use crate::linalg::Vector3;
use crate::propagators::{propagate, PropModel};
use crate::time::{Duration, Epoch};
use crate::utils::unit;

/// Along-track step used to start the secant iteration of the X-axis solver, in km/s
const X_AXIS_STEP_KM_S: f64 = 1e-4;

/// A transfer from an inertial origin state to an aim point after a time of flight.
#[derive(Copy, Clone, Debug)]
pub struct Transfer {
    /// State at ignition, in an inertial frame
    pub origin: StateVector,
    /// Aim point in the frame of the origin
    pub aim_km: Vector3<f64>,
    pub tof: Duration,
    pub revs: u32,
    pub prograde: bool,
}

impl Transfer {
    pub fn arrival(&self) -> Epoch {
        self.origin.epoch + self.tof
    }

    fn input(&self, aim_km: Vector3<f64>, gm: f64) -> LambertInput {
        LambertInput {
            r_init: self.origin.radius_km,
            v_init: self.origin.velocity_km_s,
            r_final: aim_km,
            tof_s: self.tof.to_seconds(),
            gm,
            revs: self.revs,
            prograde: self.prograde,
        }
    }

    /// Two body solution of this transfer
    pub fn conic(&self, params: &SystemParameters) -> Result<LambertArc, TargetingError> {
        universal(
            &self.input(self.aim_km, params.gm(self.origin.body())),
            &params.solver,
        )
    }

    /// Propagates the origin with the provided departure velocity until the arrival, in the frame
    /// of the origin.
    pub fn fly(
        &self,
        v_init: Vector3<f64>,
        model: PropModel,
        params: &SystemParameters,
        ephem: &dyn EphemerisSource,
    ) -> Result<StateVector, TargetingError> {
        let departure = self.origin.with_velocity(v_init);
        let arrival = propagate(&departure, self.tof, model, params, ephem)?;
        Ok(convert(&arrival, self.origin.frame, ephem)?)
    }
}

/// Solves the transfer under the precision force model.
///
/// The conic solution is flown with the precision propagator and the aim point of the next conic
/// solution is shifted by the miss distance, until the miss is below the configured tolerance.
pub fn perturbed(
    transfer: &Transfer,
    params: &SystemParameters,
    ephem: &dyn EphemerisSource,
) -> Result<LambertArc, TargetingError> {
    let gm = params.gm(transfer.origin.body());
    let max_iterations = params.solver.perturbed_lambert_max_iterations;
    let tolerance_km = params.solver.perturbed_lambert_tolerance_km;

    let mut aim = transfer.aim_km;
    let mut miss_km = f64::INFINITY;
    for iteration in 0..max_iterations {
        let arc = universal(&transfer.input(aim, gm), &params.solver)?;
        let arrival = transfer.fly(arc.v_init, PropModel::Precision, params, ephem)?;
        let miss = transfer.aim_km - arrival.radius_km;
        miss_km = miss.norm();
        debug!("perturbed Lambert iteration {iteration}: miss of {miss_km:.6} km");
        if miss_km < tolerance_km {
            info!("perturbed Lambert converged in {} iterations", iteration + 1);
            return Ok(LambertArc {
                v_final: arrival.velocity_km_s,
                ..arc
            });
        }
        aim += miss;
    }

    NotConvergedSnafu {
        solver: "perturbed Lambert",
        iterations: max_iterations,
        residual: miss_km,
    }
    .fail()
}

/// Solution of a transfer with a velocity change along the local horizontal only.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct XAxisSolution {
    pub v_init: Vector3<f64>,
    /// LVLH X component of the velocity change
    pub dv_along_track_km_s: f64,
    pub arrival: StateVector,
}

/// Solves for the along-track velocity change such that the in-plane central angle traveled in
/// the time of flight reaches the aim point. Radial and out-of-plane components stay zero, so the
/// aim point is only matched in phase.
pub fn x_axis(
    transfer: &Transfer,
    model: PropModel,
    params: &SystemParameters,
    ephem: &dyn EphemerisSource,
) -> Result<XAxisSolution, TargetingError> {
    let origin = transfer.origin;
    let h = unit(&origin.hvec());
    let along_track = origin.lvlh_dcm().row(0).transpose();
    let aim = transfer.aim_km - h * h.dot(&transfer.aim_km);
    let aim_norm = aim.norm();

    let fly = |dvx: f64| -> Result<(f64, StateVector), TargetingError> {
        let arrival = transfer.fly(
            origin.velocity_km_s + dvx * along_track,
            model,
            params,
            ephem,
        )?;
        let r = arrival.radius_km;
        // Signed angle from the arrival to the aim point, about the orbit normal
        Ok((r.cross(&aim).dot(&h).atan2(r.dot(&aim)), arrival))
    };

    // Start from the along-track component of the three axis solution
    let mut x0 = match transfer.conic(params) {
        Ok(arc) => along_track.dot(&(arc.v_init - origin.velocity_km_s)),
        Err(e) => {
            debug!("X-axis solver starts from zero: {e}");
            0.0
        }
    };
    let (mut f0, _) = fly(x0)?;
    let mut x1 = x0 + X_AXIS_STEP_KM_S;
    let max_iterations = params.solver.perturbed_lambert_max_iterations;
    let tolerance_km = params.solver.perturbed_lambert_tolerance_km;

    for iteration in 0..max_iterations {
        let (f1, arrival) = fly(x1)?;
        debug!(
            "X-axis iteration {iteration}: dvx = {:.6} m/s, miss of {:.6} km",
            x1 * 1e3,
            f1 * aim_norm
        );
        if (f1 * aim_norm).abs() < tolerance_km {
            return Ok(XAxisSolution {
                v_init: origin.velocity_km_s + x1 * along_track,
                dv_along_track_km_s: x1,
                arrival,
            });
        }
        if (f1 - f0).abs() < f64::EPSILON {
            return NotConvergedSnafu {
                solver: "X-axis Lambert",
                iterations: iteration + 1,
                residual: f1 * aim_norm,
            }
            .fail();
        }
        let x2 = x1 - f1 * (x1 - x0) / (f1 - f0);
        (x0, f0, x1) = (x1, f1, x2);
    }

    NotConvergedSnafu {
        solver: "X-axis Lambert",
        iterations: max_iterations,
        residual: f0 * aim_norm,
    }
    .fail()
}
