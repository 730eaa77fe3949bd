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

use super::error_ctrl::ErrorCtrl;
use super::{IntegrationDetails, PropAstroSnafu, PropEphemerisSnafu, Propagator, PropagationError};
use crate::cosmic::{convert, Body, CoordinateSystem, StateVector};
use crate::linalg::Vector6;
use crate::time::{Duration, Epoch, Unit};
use snafu::ResultExt;
use std::f64;
use std::time::Instant;

/// A propagation in progress: the current state, the osculating reference conic and the Encke
/// deviation from it, plus the step size control.
#[derive(Debug)]
pub struct PropInstance<'a, E: ErrorCtrl> {
    /// The state of this propagator instance, always in the inertial frame of the primary body
    pub state: StateVector,
    /// The propagator setup (kind, stages, etc.)
    pub prop: &'a Propagator<'a, E>,
    /// Stores the details of the previous integration step
    pub details: IntegrationDetails,
    pub(crate) step_size: Duration, // Stores the adapted step for the _next_ call
    pub(crate) fixed_step: bool,
    /// Osculating state at the latest rectification
    pub(crate) reference: StateVector,
    /// Deviation of position and velocity from the reference conic
    pub(crate) delta: Vector6<f64>,
    pub(crate) rectifications: usize,
    // Allows us to do pre-allocation of the ki vectors
    pub(crate) k: Vec<Vector6<f64>>,
}

impl<'a, E: ErrorCtrl> PropInstance<'a, E> {
    /// Allows setting the step size of the propagator
    pub fn set_step(&mut self, step_size: Duration, fixed: bool) {
        self.step_size = step_size;
        self.fixed_step = fixed;
    }

    /// Number of times the reference conic was rectified, including body switches
    pub fn rectifications(&self) -> usize {
        self.rectifications
    }

    /// This method propagates the state for the provided duration, backward if it is negative.
    pub fn for_duration(&mut self, duration: Duration) -> Result<StateVector, PropagationError> {
        if duration == Duration::ZERO {
            return Ok(self.state);
        }
        let stop_time = self.state.epoch + duration;

        let tick = Instant::now();
        let log_progress = duration.abs() >= 2.0 * Unit::Minute;

        if log_progress {
            info!("Propagating for {} until {}", duration, stop_time);
        }

        let backprop = duration.is_negative();
        if backprop {
            self.step_size = -self.step_size; // Invert the step size
        }
        loop {
            let epoch = self.state.epoch;
            if (!backprop && epoch + self.step_size > stop_time)
                || (backprop && epoch + self.step_size <= stop_time)
            {
                if stop_time == epoch {
                    // No propagation necessary
                    if backprop {
                        self.step_size = -self.step_size;
                    }
                    return Ok(self.state);
                }
                // Take one final step of exactly the needed duration until the stop time
                let prev_step_size = self.step_size;
                let prev_step_kind = self.fixed_step;
                self.set_step(stop_time - epoch, true);

                self.single_step()?;

                // Restore the step size for subsequent calls
                self.set_step(prev_step_size, prev_step_kind);

                if backprop {
                    self.step_size = -self.step_size; // Restore to a positive step size
                }

                if log_progress {
                    let tock: Duration = tick.elapsed().into();
                    info!(
                        "Done in {} ({} rectifications)",
                        tock, self.rectifications
                    );
                }

                return Ok(self.state);
            } else {
                self.single_step()?;
            }
        }
    }

    /// Propagates the state until the provided epoch. Returns the end state.
    pub fn until_epoch(&mut self, end_time: Epoch) -> Result<StateVector, PropagationError> {
        let duration: Duration = end_time - self.state.epoch;
        self.for_duration(duration)
    }

    /// Take a single propagator step, then rectify the reference conic and switch the primary
    /// body if needed.
    pub fn single_step(&mut self) -> Result<(), PropagationError> {
        let (t, delta) = self.derive()?;
        let epoch = self.state.epoch + t;
        let primary = self.state.body();
        let (rho, vrho) = self.prop.dynamics.reference(
            &self.reference_vector(),
            primary,
            (epoch - self.reference.epoch).to_seconds(),
        )?;
        self.delta = delta;
        self.state = StateVector::new(
            epoch,
            rho + delta.fixed_rows::<3>(0),
            vrho + delta.fixed_rows::<3>(3),
            self.state.frame,
        );

        if self.switch_primary()? {
            return Ok(());
        }

        if delta.fixed_rows::<3>(0).norm() / self.state.rmag_km() > self.prop.opts.rectification_ratio {
            debug!("rectifying the reference conic at {}", self.state.epoch);
            self.rectify();
        }

        Ok(())
    }

    /// Starts a new reference conic from the current state
    fn rectify(&mut self) {
        self.reference = self.state;
        self.delta = Vector6::zeros();
        self.rectifications += 1;
    }

    /// Switches the primary body when the lunar sphere of influence is crossed.
    fn switch_primary(&mut self) -> Result<bool, PropagationError> {
        let soi = self.prop.dynamics.params.lunar_soi_km;
        let next = match self.state.body() {
            Body::Earth => {
                let moon = self
                    .prop
                    .dynamics
                    .ephem
                    .lunar_solar(self.state.epoch)
                    .context(PropEphemerisSnafu)?;
                if (self.state.radius_km - moon.moon_radius_km).norm() < soi {
                    Some(CoordinateSystem::MCI)
                } else {
                    None
                }
            }
            Body::Moon => {
                if self.state.rmag_km() > soi {
                    Some(CoordinateSystem::ECI)
                } else {
                    None
                }
            }
        };

        match next {
            Some(frame) => {
                info!(
                    "{} sphere of influence crossed at {}, now propagating in {}",
                    Body::Moon,
                    self.state.epoch,
                    frame
                );
                self.state =
                    convert(&self.state, frame, self.prop.dynamics.ephem).context(PropAstroSnafu)?;
                self.rectify();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn reference_vector(&self) -> Vector6<f64> {
        let mut v = Vector6::zeros();
        v.fixed_rows_mut::<3>(0).copy_from(&self.reference.radius_km);
        v.fixed_rows_mut::<3>(3).copy_from(&self.reference.velocity_km_s);
        v
    }

    fn total(&self, offset_s: f64, delta: &Vector6<f64>) -> Result<Vector6<f64>, PropagationError> {
        let (rho, vrho) =
            self.prop
                .dynamics
                .reference(&self.reference_vector(), self.state.body(), offset_s)?;
        let mut v = *delta;
        let mut r = v.fixed_rows_mut::<3>(0);
        r += rho;
        let mut dv = v.fixed_rows_mut::<3>(3);
        dv += vrho;
        Ok(v)
    }

    /// This method integrates the Encke deviation. Everything passed to this function is in **seconds**.
    ///
    /// This function returns the step sized used (as a Duration) and the new deviation.
    /// To get the integration details, check `self.latest_details`.
    fn derive(&mut self) -> Result<(Duration, Vector6<f64>), PropagationError> {
        let state_vec = self.delta;
        let primary = self.state.body();
        let reference = self.reference_vector();
        let rectified_at = self.reference.epoch;
        let offset = (self.state.epoch - rectified_at).to_seconds();
        let prop = self.prop;
        let dynamics = &prop.dynamics;
        let opts = &prop.opts;
        // Reset the number of attempts used (we don't reset the error because it's set before it's read)
        self.details.attempts = 1;
        // Convert the step size to seconds -- it's mutable because we may change it below
        let mut step_size = self.step_size.to_seconds();
        let sign = step_size.signum();
        loop {
            self.k[0] = dynamics.eom(primary, rectified_at, &reference, offset, &state_vec)?;
            let mut a_idx: usize = 0;
            for i in 0..(prop.stages - 1) {
                // Let's compute the c_i by summing the relevant items from the list of coefficients.
                // \sum_{j=1}^{i-1} a_ij  ∀ i ∈ [2, s]
                let mut ci: f64 = 0.0;
                // The wi stores the a_{s1} * k_1 + a_{s2} * k_2 + ... + a_{s, s-1} * k_{s-1} +
                let mut wi = Vector6::zeros();
                for kj in &self.k[0..i + 1] {
                    let a_ij = prop.a_coeffs[a_idx];
                    ci += a_ij;
                    wi += a_ij * kj;
                    a_idx += 1;
                }

                self.k[i + 1] = dynamics.eom(
                    primary,
                    rectified_at,
                    &reference,
                    offset + ci * step_size,
                    &(state_vec + step_size * wi),
                )?;
            }
            // Compute the next state and the error
            let mut next_state = state_vec;
            let mut error_est = Vector6::zeros();
            for (i, ki) in self.k.iter().enumerate() {
                let b_i = prop.b_coeffs[i];
                if !self.fixed_step {
                    let b_i_star = prop.b_coeffs[i + prop.stages];
                    error_est += step_size * (b_i - b_i_star) * ki;
                }
                next_state += step_size * b_i * ki;
            }

            if self.fixed_step {
                // Using a fixed step, no adaptive step necessary
                self.details.step = self.step_size;
                return Ok((self.details.step, next_state));
            }

            // The error is computed on the total states, not on the deviation
            let candidate = self.total(offset + step_size, &next_state)?;
            let current = self.total(offset, &state_vec)?;
            self.details.error = E::estimate(&error_est, &candidate, &current);

            let min_step = opts.min_step.to_seconds();
            let max_step = opts.max_step.to_seconds();
            if self.details.error <= opts.tolerance
                || step_size.abs() <= min_step
                || self.details.attempts >= opts.attempts
            {
                if self.details.attempts >= opts.attempts {
                    warn!(
                        "Could not further decrease step size: maximum number of attempts reached ({})",
                        self.details.attempts
                    );
                }

                self.details.step = step_size * Unit::Second;
                if self.details.error < opts.tolerance {
                    // Error is less than tolerance, let's attempt to increase the step for the next iteration.
                    let proposed_step = 0.9
                        * step_size.abs()
                        * (opts.tolerance / self.details.error)
                            .powf(1.0 / f64::from(prop.order));
                    step_size = sign * proposed_step.min(max_step);
                }
                // In all cases, let's update the step size to whatever was the adapted step size
                self.step_size = step_size * Unit::Second;
                return Ok((self.details.step, next_state));
            } else {
                // Error is too high and we aren't using the smallest step, and we haven't hit the max number of attempts.
                // So let's adapt the step size.
                self.details.attempts += 1;
                let proposed_step = 0.9
                    * step_size.abs()
                    * (opts.tolerance / self.details.error)
                        .powf(1.0 / f64::from(prop.order - 1));
                step_size = sign * proposed_step.max(min_step);
                // Note that we don't set self.step_size, that will be updated right before we return
            }
        }
    }

    /// Copy the details of the latest integration step.
    pub fn latest_details(&self) -> IntegrationDetails {
        self.details
    }
}
