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

use super::{
    conic_after, propagate, time_to_fpa, time_to_radius, Crossing, FlightPathAngleNotReachedSnafu,
    PropAstroSnafu, PropModel, PropagationError, RadiusNotReachedSnafu,
    StopConditionNotConvergedSnafu,
};
use crate::cosmic::ephem::EphemerisSource;
use crate::cosmic::{to_inertial, StateVector};
use crate::io::SystemParameters;
use crate::time::{Duration, Unit};
use snafu::{ensure, ResultExt};
use std::fmt;

/// Flight path angle convergence threshold, in radians
const FPA_TOLERANCE_RAD: f64 = 1e-8;

/// Stops a coast at the first time a condition is met.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum StopCondition {
    /// The distance to the central body reaches this radius, crossing it in the requested direction
    Radius { radius_km: f64, crossing: Crossing },
    /// The flight path angle reaches this value
    FlightPathAngle { fpa_rad: f64 },
}

impl StopCondition {
    fn residual(&self, state: &StateVector) -> f64 {
        match self {
            Self::Radius { radius_km, .. } => state.rmag_km() - radius_km,
            Self::FlightPathAngle { fpa_rad } => state.fpa_rad() - fpa_rad,
        }
    }

    fn tolerance(&self, params: &SystemParameters) -> f64 {
        match self {
            Self::Radius { .. } => params.solver.radius_tolerance_km,
            Self::FlightPathAngle { .. } => FPA_TOLERANCE_RAD,
        }
    }
}

impl fmt::Display for StopCondition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Radius {
                radius_km,
                crossing,
            } => write!(f, "radius of {radius_km:.3} km ({crossing:?})"),
            Self::FlightPathAngle { fpa_rad } => {
                write!(f, "flight path angle of {:.4} deg", fpa_rad.to_degrees())
            }
        }
    }
}

/// Propagates the state until the stop condition is met, within `max_duration`.
///
/// The conic time of flight to the condition is the first guess; with the precision model, the
/// propagated state is then corrected with Newton steps until the residual is within tolerance.
pub fn propagate_until(
    state: &StateVector,
    condition: StopCondition,
    max_duration: Duration,
    model: PropModel,
    params: &SystemParameters,
    ephem: &dyn EphemerisSource,
) -> Result<StateVector, PropagationError> {
    let state = to_inertial(state, ephem).context(PropAstroSnafu)?;
    let gm = params.gm(state.body());

    let guess_s = match condition {
        StopCondition::Radius {
            radius_km,
            crossing,
        } => time_to_radius(&state, radius_km, crossing, gm)?,
        StopCondition::FlightPathAngle { fpa_rad } => time_to_fpa(&state, fpa_rad, gm).ok_or(
            PropagationError::FlightPathAngleNotReached {
                fpa_deg: fpa_rad.to_degrees(),
            },
        )?,
    };
    match condition {
        StopCondition::Radius { radius_km, .. } => ensure!(
            guess_s <= max_duration.to_seconds(),
            RadiusNotReachedSnafu { radius_km }
        ),
        StopCondition::FlightPathAngle { fpa_rad } => ensure!(
            guess_s <= max_duration.to_seconds(),
            FlightPathAngleNotReachedSnafu {
                fpa_deg: fpa_rad.to_degrees()
            }
        ),
    }
    debug!("{condition} expected in {guess_s:.3} s");

    let mut current = propagate(&state, guess_s * Unit::Second, model, params, ephem)?;
    if model == PropModel::Conic {
        return Ok(current);
    }

    let tolerance = condition.tolerance(params);
    let max_iterations = params.solver.stop_condition_max_iterations;
    let mut residual = condition.residual(&current);
    for _ in 0..max_iterations {
        if residual.abs() < tolerance {
            return Ok(current);
        }
        // Rate of the residual from the local conic
        let rate = match condition {
            StopCondition::Radius { .. } => current.radial_velocity_km_s(),
            StopCondition::FlightPathAngle { .. } => {
                let gm = params.gm(current.body());
                let kep = params.solver.kepler_max_iterations;
                let after = conic_after(&current, 1.0, gm, kep)?;
                let before = conic_after(&current, -1.0, gm, kep)?;
                0.5 * (after.fpa_rad() - before.fpa_rad())
            }
        };
        ensure!(
            rate.abs() > f64::EPSILON,
            StopConditionNotConvergedSnafu {
                iterations: max_iterations,
                residual
            }
        );
        let dt_s = -residual / rate;
        current = propagate(&current, dt_s * Unit::Second, model, params, ephem)?;
        residual = condition.residual(&current);
    }

    ensure!(
        residual.abs() < tolerance,
        StopConditionNotConvergedSnafu {
            iterations: max_iterations,
            residual
        }
    );
    Ok(current)
}
