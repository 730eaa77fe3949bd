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

use crate::linalg::{Vector3, Vector6};
use std::fmt;

// This determines when to take into consideration the magnitude of the state_delta -- prevents dividing by too small of a number.
const REL_ERR_THRESH: f64 = 0.1;

/// The Error Control trait manages how a propagator computes the error in the current step.
///
/// The states are the total (reconstructed) position and velocity, never the Encke deviation alone.
pub trait ErrorCtrl: Copy + Send + Sync + fmt::Debug {
    /// Computes the actual error of the current step.
    ///
    /// The `error_est` is the estimated error computed from the difference in the two stages of
    /// of the RK propagator. The `candidate` variable is the candidate state, and `cur_state` is
    /// the current state. This function must return the error.
    fn estimate(error_est: &Vector6<f64>, candidate: &Vector6<f64>, cur_state: &Vector6<f64>)
        -> f64;
}

/// An RSS step error control which effectively computes the L2 norm of the provided Vector of size 3
///
/// Note that this error controller should be preferrably be used only with slices of a state with the same units.
/// For example, one should probably use this for position independently of using it for the velocity.
/// (Source)[https://github.com/ChristopherRabotin/GMAT/blob/37201a6290e7f7b941bc98ee973a527a5857104b/src/base/forcemodel/ODEModel.cpp#L3045]
pub fn rss_step(prop_err: &Vector3<f64>, candidate: &Vector3<f64>, cur_state: &Vector3<f64>) -> f64 {
    let mag = (candidate - cur_state).norm();
    let err = prop_err.norm();
    if mag > REL_ERR_THRESH {
        err / mag
    } else {
        err
    }
}

/// An RSS state error control: when in doubt, use this error controller, especially for high accurracy.
///
/// This is a more stringent error control method than [`rss_step`].
/// (Source)[https://github.com/ChristopherRabotin/GMAT/blob/37201a6290e7f7b941bc98ee973a527a5857104b/src/base/forcemodel/ODEModel.cpp#L3004]
pub fn rss_state(prop_err: &Vector3<f64>, candidate: &Vector3<f64>, cur_state: &Vector3<f64>) -> f64 {
    let mag = 0.5 * (candidate + cur_state).norm();
    let err = prop_err.norm();
    if mag > REL_ERR_THRESH {
        err / mag
    } else {
        err
    }
}

/// Splits the position and velocity and returns the largest of both errors.
fn pos_vel<F>(prop_err: &Vector6<f64>, candidate: &Vector6<f64>, cur_state: &Vector6<f64>, f: F) -> f64
where
    F: Fn(&Vector3<f64>, &Vector3<f64>, &Vector3<f64>) -> f64,
{
    let err_radius = f(
        &prop_err.fixed_rows::<3>(0).into_owned(),
        &candidate.fixed_rows::<3>(0).into_owned(),
        &cur_state.fixed_rows::<3>(0).into_owned(),
    );
    let err_velocity = f(
        &prop_err.fixed_rows::<3>(3).into_owned(),
        &candidate.fixed_rows::<3>(3).into_owned(),
        &cur_state.fixed_rows::<3>(3).into_owned(),
    );
    err_radius.max(err_velocity)
}

/// An RSS step error control on the position and on the velocity separately.
#[derive(Clone, Copy, Debug, Default)]
pub struct RSSCartesianStep;

impl ErrorCtrl for RSSCartesianStep {
    fn estimate(
        error_est: &Vector6<f64>,
        candidate: &Vector6<f64>,
        cur_state: &Vector6<f64>,
    ) -> f64 {
        pos_vel(error_est, candidate, cur_state, rss_step)
    }
}

/// An RSS state error control on the position and on the velocity separately: the default.
#[derive(Clone, Copy, Debug, Default)]
pub struct RSSCartesianState;

impl ErrorCtrl for RSSCartesianState {
    fn estimate(
        error_est: &Vector6<f64>,
        candidate: &Vector6<f64>,
        cur_state: &Vector6<f64>,
    ) -> f64 {
        pos_vel(error_est, candidate, cur_state, rss_state)
    }
}
