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

use serde_derive::{Deserialize, Serialize};
use snafu::prelude::*;
use std::fmt;

/// Provides different methods for controlling the error computation of the integrator.
pub mod error_ctrl;
pub use self::error_ctrl::*;

// Re-Export
mod conic;
pub use conic::*;
mod dynamics;
pub use dynamics::*;
mod instance;
pub use instance::*;
mod propagator;
pub use propagator::*;
mod rk_methods;
pub use rk_methods::*;
mod options;
pub use options::*;
mod stop;
pub use stop::*;

use crate::cosmic::ephem::{EphemerisError, EphemerisSource};
use crate::cosmic::{to_inertial, AstroError, StateVector};
use crate::ephemeris::{EphemerisTable, InterpolationError};
use crate::errors::ErrorKind;
use crate::io::SystemParameters;
use crate::time::{Duration, Epoch};

/// Stores the details of the previous integration step of a given propagator. Access as `my_prop.clone().latest_details()`.
#[derive(Copy, Clone, Debug)]
pub struct IntegrationDetails {
    /// step size used
    pub step: Duration,
    /// error in the previous integration step
    pub error: f64,
    /// number of attempts needed by an adaptive step size to be within the tolerance
    pub attempts: u8,
}

impl fmt::Display for IntegrationDetails {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "IntegrationDetails {{step: {}, error: {:.3e}, attempts: {}}}",
            self.step, self.error, self.attempts
        )
    }
}

/// Selects between the two body conic and the perturbed numerical integration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropModel {
    #[default]
    Conic,
    Precision,
}

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PropagationError {
    #[snafu(display("propagation failed because {source}"))]
    PropAstro { source: AstroError },
    #[snafu(display("propagation failed because {source}"))]
    PropEphemeris { source: EphemerisError },
    #[snafu(display("Kepler's equation did not converge after {iterations} iterations"))]
    KeplerNotConverged { iterations: usize },
    #[snafu(display("the trajectory never reaches a radius of {radius_km:.3} km"))]
    RadiusNotReached { radius_km: f64 },
    #[snafu(display("the trajectory never reaches a flight path angle of {fpa_deg:.4} deg"))]
    FlightPathAngleNotReached { fpa_deg: f64 },
    #[snafu(display("stop condition not met after {iterations} iterations (residual {residual:.3e})"))]
    StopConditionNotConverged { iterations: usize, residual: f64 },
    #[snafu(display("invalid propagation request: {msg}"))]
    InvalidPropagation { msg: String },
    #[snafu(display("could not build the ephemeris: {source}"))]
    PropTable { source: InterpolationError },
}

impl PropagationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PropAstro { source } => source.kind(),
            Self::PropEphemeris { source } => source.kind(),
            Self::PropTable { source } => source.kind(),
            Self::KeplerNotConverged { .. } | Self::StopConditionNotConverged { .. } => {
                ErrorKind::NotConverged
            }
            Self::RadiusNotReached { .. } | Self::FlightPathAngleNotReached { .. } => {
                ErrorKind::NoSolution
            }
            Self::InvalidPropagation { .. } => ErrorKind::InvalidInput,
        }
    }
}

/// Propagates the state vector by `dt` (backward when negative) with the requested model.
///
/// The result is in the inertial frame of the final primary body; the input is not modified.
pub fn propagate(
    state: &StateVector,
    dt: Duration,
    model: PropModel,
    params: &SystemParameters,
    ephem: &dyn EphemerisSource,
) -> Result<StateVector, PropagationError> {
    match model {
        PropModel::Conic => {
            let inertial = to_inertial(state, ephem).context(PropAstroSnafu)?;
            conic_propagate(
                &inertial,
                dt,
                params.gm(inertial.body()),
                params.solver.kepler_max_iterations,
            )
        }
        PropModel::Precision => {
            let prop = Propagator::default(EnckeDynamics::new(params, ephem));
            let mut instance = prop.with(state)?;
            instance.for_duration(dt)
        }
    }
}

/// Propagates the state vector to the provided epoch.
pub fn propagate_to(
    state: &StateVector,
    epoch: Epoch,
    model: PropModel,
    params: &SystemParameters,
    ephem: &dyn EphemerisSource,
) -> Result<StateVector, PropagationError> {
    propagate(state, epoch - state.epoch, model, params, ephem)
}

/// Builds the ephemeris of a coasting vehicle from `state` until `end`, one sample every `step`.
pub fn generate_ephemeris(
    vehicle: &str,
    state: &StateVector,
    end: Epoch,
    step: Duration,
    model: PropModel,
    params: &SystemParameters,
    ephem: &dyn EphemerisSource,
) -> Result<EphemerisTable, PropagationError> {
    ensure!(
        step > Duration::ZERO && end > state.epoch,
        InvalidPropagationSnafu {
            msg: format!(
                "ephemeris from {} to {end} with a step of {step}",
                state.epoch
            )
        }
    );

    let start = to_inertial(state, ephem).context(PropAstroSnafu)?;
    let mut epochs = Vec::new();
    let mut epoch = start.epoch + step;
    while epoch < end {
        epochs.push(epoch);
        epoch = epoch + step;
    }
    epochs.push(end);

    let mut samples = Vec::with_capacity(epochs.len() + 1);
    samples.push(start);
    match model {
        PropModel::Conic => {
            for epoch in epochs {
                samples.push(propagate_to(&start, epoch, model, params, ephem)?);
            }
        }
        PropModel::Precision => {
            let prop = Propagator::default(EnckeDynamics::new(params, ephem));
            let mut instance = prop.with(&start)?;
            for epoch in epochs {
                samples.push(instance.until_epoch(epoch)?);
            }
        }
    }

    info!(
        "{vehicle} ephemeris generated with {} samples until {end}",
        samples.len()
    );
    EphemerisTable::new(vehicle, samples).context(PropTableSnafu)
}
