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

use crate::cosmic::ephem::{AnalyticEphemeris, EphemerisSource};
use crate::cosmic::{convert, AstroError, CoordinateSystem, StateVector};
use crate::ephemeris::{interpolate, EphemerisTable, Interpolation, InterpolationError};
use crate::io::SystemParameters;
use crate::propagators::{propagate, propagate_until, PropModel, PropagationError, StopCondition};
use crate::time::{Duration, Epoch, Unit};
use std::sync::Arc;

/// Everything a single mission calculation needs besides its own inputs: the lunar and solar
/// ephemeris, the system parameters and the ground elapsed time base.
///
/// A context is built per request and handed by reference to every solver.
#[derive(Clone, Debug)]
pub struct MissionContext {
    pub ephem: Arc<dyn EphemerisSource>,
    pub params: SystemParameters,
    /// Epoch of GET zero
    pub get_base: Epoch,
}

impl MissionContext {
    pub fn new(ephem: Arc<dyn EphemerisSource>, params: SystemParameters, get_base: Epoch) -> Self {
        Self {
            ephem,
            params,
            get_base,
        }
    }

    /// Context using the analytical lunar and solar ephemeris and the default system parameters
    pub fn analytic(get_base: Epoch) -> Self {
        Self::new(
            Arc::new(AnalyticEphemeris::new()),
            SystemParameters::default(),
            get_base,
        )
    }

    pub fn ephem(&self) -> &dyn EphemerisSource {
        self.ephem.as_ref()
    }

    /// Ground elapsed time of the provided epoch
    pub fn get(&self, epoch: Epoch) -> Duration {
        epoch - self.get_base
    }

    /// Epoch of the provided ground elapsed time
    pub fn epoch_at_get(&self, get: Duration) -> Epoch {
        self.get_base + get
    }

    /// Epoch of the provided ground elapsed time, in hours
    pub fn epoch_at_get_hours(&self, hours: f64) -> Epoch {
        self.get_base + hours * Unit::Hour
    }

    pub fn convert(
        &self,
        state: &StateVector,
        to: CoordinateSystem,
    ) -> Result<StateVector, AstroError> {
        convert(state, to, self.ephem())
    }

    pub fn propagate(
        &self,
        state: &StateVector,
        dt: Duration,
        model: PropModel,
    ) -> Result<StateVector, PropagationError> {
        propagate(state, dt, model, &self.params, self.ephem())
    }

    pub fn propagate_to(
        &self,
        state: &StateVector,
        epoch: Epoch,
        model: PropModel,
    ) -> Result<StateVector, PropagationError> {
        self.propagate(state, epoch - state.epoch, model)
    }

    pub fn propagate_until(
        &self,
        state: &StateVector,
        condition: StopCondition,
        max_duration: Duration,
        model: PropModel,
    ) -> Result<StateVector, PropagationError> {
        propagate_until(
            state,
            condition,
            max_duration,
            model,
            &self.params,
            self.ephem(),
        )
    }

    /// Interpolates the table with the configured order and extrapolation margin
    pub fn interpolate(
        &self,
        table: &EphemerisTable,
        epoch: Epoch,
        extrapolate: bool,
    ) -> Result<Interpolation, InterpolationError> {
        interpolate(
            table,
            epoch,
            self.params.ephemeris.default_order,
            extrapolate,
            self.params.ephemeris.extrapolation_margin_s * Unit::Second,
        )
    }
}
