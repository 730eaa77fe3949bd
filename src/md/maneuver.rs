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

use crate::cosmic::{StateVector, Thruster, Vehicle, VehicleConfig};
use crate::errors::{InvalidOptionSnafu, NotConvergedSnafu, TargetingError};
use crate::io::SystemParameters;
use crate::linalg::{SVector, Vector3};
use crate::propagators::{conic_after, RK4Fixed, RK};
use crate::time::{Epoch, Unit};
use crate::utils::unit;
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;

/// Largest integration step of a finite burn, in seconds
const BURN_STEP_S: f64 = 1.0;
/// Velocity mismatch at cutoff below which a finite burn matches its impulsive reference, km/s
const SLIP_VELOCITY_TOLERANCE_KM_S: f64 = 1e-5;

/// How the velocity change of a maneuver is delivered.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum EngineModel {
    #[default]
    Impulsive,
    /// Finite burn with constant thrust and specific impulse
    Thruster(Thruster),
}

/// A planned velocity change.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Maneuver {
    /// Time of ignition
    pub tig: Epoch,
    /// Velocity change in the LVLH frame of the pre-burn state at TIG
    pub dv_lvlh_km_s: Vector3<f64>,
    pub engine: EngineModel,
    pub mass_before_kg: f64,
    /// Mass after the burn, from the rocket equation (unchanged for impulsive maneuvers)
    pub mass_after_kg: f64,
}

impl Maneuver {
    pub fn new(tig: Epoch, dv_lvlh_km_s: Vector3<f64>, engine: EngineModel, mass_kg: f64) -> Self {
        let mass_after_kg = match engine {
            EngineModel::Impulsive => mass_kg,
            EngineModel::Thruster(thruster) => VehicleConfig {
                mass_kg,
                thruster,
            }
            .mass_after_kg(dv_lvlh_km_s.norm()),
        };
        Self {
            tig,
            dv_lvlh_km_s,
            engine,
            mass_before_kg: mass_kg,
            mass_after_kg,
        }
    }

    pub fn dv_km_s(&self) -> f64 {
        self.dv_lvlh_km_s.norm()
    }

    /// Duration of the burn, zero for impulsive maneuvers
    pub fn burn_duration_s(&self) -> f64 {
        match self.engine {
            EngineModel::Impulsive => 0.0,
            EngineModel::Thruster(thruster) => VehicleConfig {
                mass_kg: self.mass_before_kg,
                thruster,
            }
            .burn_duration_s(self.dv_km_s()),
        }
    }

    /// Returns the post-burn state of a state at the time of ignition
    pub fn apply(&self, state: &StateVector) -> Result<StateVector, TargetingError> {
        ensure!(
            (state.epoch - self.tig).abs() < 1.0 * Unit::Millisecond,
            InvalidOptionSnafu {
                msg: format!(
                    "maneuver at {} applied to a state at {}",
                    self.tig, state.epoch
                )
            }
        );
        Ok(state.apply_dv_lvlh(&self.dv_lvlh_km_s))
    }
}

impl fmt::Display for Maneuver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "TIG {}: dV = [{:.3}, {:.3}, {:.3}] m/s ({:.3} m/s, {:.1} s burn)",
            self.tig,
            self.dv_lvlh_km_s.x * 1e3,
            self.dv_lvlh_km_s.y * 1e3,
            self.dv_lvlh_km_s.z * 1e3,
            self.dv_km_s() * 1e3,
            self.burn_duration_s()
        )
    }
}

/// A finite burn equivalent to an impulsive maneuver.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FiniteBurn {
    /// Pre-burn state at ignition
    pub ignition: StateVector,
    pub cutoff: StateVector,
    /// Velocity to be gained, fixed in inertial space
    pub dv_inertial_km_s: Vector3<f64>,
    /// Ignition time minus the impulsive TIG, in seconds
    pub t_slip_s: f64,
    pub duration_s: f64,
    pub mass_after_kg: f64,
    pub iterations: usize,
}

type BurnState = SVector<f64, 7>;

/// One fixed step of an explicit Runge Kutta method described by its Butcher table.
fn rk_step<T: RK, F>(eom: F, y: &BurnState, h: f64) -> BurnState
where
    F: Fn(&BurnState) -> BurnState,
{
    let mut k: Vec<BurnState> = Vec::with_capacity(T::STAGES);
    let mut a_idx = 0;
    for _ in 0..T::STAGES {
        let mut wi = BurnState::zeros();
        for kj in &k {
            wi += T::A_COEFFS[a_idx] * kj;
            a_idx += 1;
        }
        k.push(eom(&(y + h * wi)));
    }
    let mut next = *y;
    for (i, ki) in k.iter().enumerate() {
        next += h * T::B_COEFFS[i] * ki;
    }
    next
}

/// Integrates a constant attitude burn of the provided duration, returns the cutoff state and mass.
pub fn integrate_burn(
    ignition: &StateVector,
    direction: &Vector3<f64>,
    duration_s: f64,
    vehicle: &dyn Vehicle,
    gm: f64,
) -> (StateVector, f64) {
    let u = unit(direction);
    let thrust_kn = vehicle.thrust_N() * 1e-3;
    let mass_flow_kg_s = thrust_kn / vehicle.exhaust_velocity_km_s();

    let eom = |y: &BurnState| {
        let r = y.fixed_rows::<3>(0);
        let rmag = r.norm();
        let accel = -gm / rmag.powi(3) * r + thrust_kn / y[6] * u;
        let mut dydt = BurnState::zeros();
        dydt.fixed_rows_mut::<3>(0).copy_from(&y.fixed_rows::<3>(3));
        dydt.fixed_rows_mut::<3>(3).copy_from(&accel);
        dydt[6] = -mass_flow_kg_s;
        dydt
    };

    let steps = (duration_s / BURN_STEP_S).ceil().max(1.0);
    let h = duration_s / steps;
    let mut y = BurnState::zeros();
    y.fixed_rows_mut::<3>(0).copy_from(&ignition.radius_km);
    y.fixed_rows_mut::<3>(3).copy_from(&ignition.velocity_km_s);
    y[6] = vehicle.mass_kg();
    for _ in 0..steps as usize {
        y = rk_step::<RK4Fixed, _>(&eom, &y, h);
    }

    let cutoff = StateVector::new(
        ignition.epoch + duration_s * Unit::Second,
        y.fixed_rows::<3>(0).into_owned(),
        y.fixed_rows::<3>(3).into_owned(),
        ignition.frame,
    );
    (cutoff, y[6])
}

/// Converts an impulsive velocity change at `state` into a finite burn of constant inertial
/// attitude.
///
/// Ignition is first centered on the impulsive TIG. The velocity to be gained is then corrected
/// by the velocity mismatch at cutoff, and the ignition time by the along-track position mismatch,
/// both with respect to the impulsive trajectory, until the ignition correction is below the
/// configured tolerance.
pub fn burn_slip(
    state: &StateVector,
    dv_inertial_km_s: &Vector3<f64>,
    vehicle: &dyn Vehicle,
    params: &SystemParameters,
) -> Result<FiniteBurn, TargetingError> {
    let gm = params.gm(state.body());
    let kep = params.solver.kepler_max_iterations;
    let max_iterations = params.solver.burn_slip_max_iterations;
    let impulsive = state.with_velocity(state.velocity_km_s + dv_inertial_km_s);

    let mut vgo = *dv_inertial_km_s;
    let mut t_slip_s = -0.5 * vehicle.burn_duration_s(vgo.norm());
    let mut correction_s = f64::INFINITY;
    for iteration in 0..max_iterations {
        let duration_s = vehicle.burn_duration_s(vgo.norm());
        let ignition = conic_after(state, t_slip_s, gm, kep)?;
        let (cutoff, mass_after_kg) = integrate_burn(&ignition, &vgo, duration_s, vehicle, gm);
        let reference = conic_after(&impulsive, t_slip_s + duration_s, gm, kep)?;

        let dv_err = reference.velocity_km_s - cutoff.velocity_km_s;
        let dr = reference.radius_km - cutoff.radius_km;
        correction_s = -dr.dot(&reference.velocity_km_s) / reference.velocity_km_s.norm_squared();
        debug!(
            "burn slip iteration {iteration}: t_slip = {t_slip_s:.3} s, correction = {correction_s:.4} s, dV error = {:.4} m/s",
            dv_err.norm() * 1e3
        );

        if correction_s.abs() < params.solver.burn_slip_tolerance_s
            && dv_err.norm() < SLIP_VELOCITY_TOLERANCE_KM_S
        {
            return Ok(FiniteBurn {
                ignition,
                cutoff,
                dv_inertial_km_s: vgo,
                t_slip_s,
                duration_s,
                mass_after_kg,
                iterations: iteration + 1,
            });
        }
        vgo += dv_err;
        t_slip_s += correction_s;
    }

    NotConvergedSnafu {
        solver: "burn slip",
        iterations: max_iterations,
        residual: correction_s,
    }
    .fail()
}
