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

use super::error_ctrl::{ErrorCtrl, RSSCartesianState};
use super::{EnckeDynamics, Fehlberg45, IntegrationDetails, PropAstroSnafu, PropOpts, PropagationError, RK};
use crate::cosmic::{to_inertial, StateVector};
use crate::linalg::Vector6;
use snafu::ResultExt;

use super::instance::PropInstance;

/// A Propagator allows propagating a state vector forward or backward in time with the precision
/// force model. It includes the options and the set of coefficients used for the monomorphic instance.
#[derive(Debug)]
pub struct Propagator<'a, E: ErrorCtrl> {
    pub dynamics: EnckeDynamics<'a>, // Stores the dynamics used. *Must* use this to get the latest values
    pub opts: PropOpts<E>, // Stores the integration options (tolerance, min/max step, init step, etc.)
    pub(crate) order: u8,  // Order of the integrator
    pub(crate) stages: usize, // Number of stages, i.e. how many times the derivatives will be called
    pub(crate) a_coeffs: &'static [f64],
    pub(crate) b_coeffs: &'static [f64],
}

impl<'a, E: ErrorCtrl> Propagator<'a, E> {
    /// Each propagator must be initialized with `new` which stores propagator information.
    pub fn new<T: RK>(dynamics: EnckeDynamics<'a>, opts: PropOpts<E>) -> Self {
        Self {
            dynamics,
            opts,
            stages: T::STAGES,
            order: T::ORDER,
            a_coeffs: T::A_COEFFS,
            b_coeffs: T::B_COEFFS,
        }
    }

    /// Set the tolerance for the propagator
    pub fn set_tolerance(&mut self, tol: f64) {
        self.opts.tolerance = tol;
    }

    /// A Fehlberg 4(5) propagator with custom propagator options.
    pub fn rkf45(dynamics: EnckeDynamics<'a>, opts: PropOpts<E>) -> Self {
        Self::new::<Fehlberg45>(dynamics, opts)
    }

    /// Starts a propagation of the provided state, which is first converted to the inertial frame
    /// of its central body. The state itself is never modified.
    pub fn with(&'a self, state: &StateVector) -> Result<PropInstance<'a, E>, PropagationError> {
        let state = to_inertial(state, self.dynamics.ephem).context(PropAstroSnafu)?;
        // Pre-allocate the k used in the propagator
        let k = vec![Vector6::zeros(); self.stages];
        Ok(PropInstance {
            state,
            prop: self,
            details: IntegrationDetails {
                step: self.opts.init_step,
                error: 0.0,
                attempts: 1,
            },
            step_size: self.opts.init_step,
            fixed_step: self.opts.fixed_step,
            reference: state,
            delta: Vector6::zeros(),
            rectifications: 0,
            k,
        })
    }
}

impl<'a> Propagator<'a, RSSCartesianState> {
    /// Default propagator is a Fehlberg 4(5) with the default PropOpts.
    pub fn default(dynamics: EnckeDynamics<'a>) -> Self {
        Self::new::<Fehlberg45>(dynamics, PropOpts::default())
    }
}
