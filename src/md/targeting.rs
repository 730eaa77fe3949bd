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

use super::maneuver::{burn_slip, EngineModel, FiniteBurn, Maneuver};
use super::MissionContext;
use crate::cosmic::{AstroError, StateVector, Thruster, Vehicle};
use crate::errors::{InvalidOptionSnafu, TargetingError};
use crate::linalg::Vector3;
use crate::propagators::PropModel;
use crate::time::{Duration, Epoch};
use crate::tools::lambert::{perturbed, x_axis, Transfer};
use crate::utils::{rotate_vector, unit};
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;
use typed_builder::TypedBuilder;

/// Components of the velocity change a Lambert solution may use.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisMode {
    #[default]
    ThreeAxis,
    /// Along-track only, for coplanar phasing burns
    XAxis,
}

/// Options of a Lambert targeting request.
#[derive(Clone, Debug, TypedBuilder)]
pub struct LambertOptions {
    /// Time of ignition (before any burn slip)
    pub tig: Epoch,
    /// Complete revolutions of the transfer
    #[builder(default)]
    pub revs: u32,
    #[builder(default = true)]
    pub prograde: bool,
    #[builder(default)]
    pub model: PropModel,
    #[builder(default)]
    pub axis: AxisMode,
    /// Offset of the aim point in the LVLH frame of the target at arrival
    #[builder(default = Vector3::zeros())]
    pub offset_km: Vector3<f64>,
    /// Phase angle of the aim point ahead of the target; when zero, the along-track offset
    /// divided by the target radius is used instead.
    #[builder(default)]
    pub phase_angle_rad: f64,
    #[builder(default = true)]
    pub impulsive: bool,
}

/// Result of a Lambert targeting request.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LambertSolution {
    pub maneuver: Maneuver,
    /// Inertial velocity right after an impulsive burn at the requested TIG
    pub velocity_to_be_achieved_km_s: Vector3<f64>,
    /// Impulsive post-burn state at the requested TIG
    pub post_burn: StateVector,
    pub aim_point_km: Vector3<f64>,
    pub arrival: Epoch,
    /// Finite burn details when the maneuver is not impulsive
    pub finite_burn: Option<FiniteBurn>,
}

impl fmt::Display for LambertSolution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Lambert {} arriving {}", self.maneuver, self.arrival)?;
        if let Some(burn) = self.finite_burn {
            write!(f, " (TIG slip {:.2} s)", burn.t_slip_s)?;
        }
        Ok(())
    }
}

/// Displaces the target position by the requested offset: out-of-plane and radial components in
/// the target LVLH frame, then a rotation ahead of the target about its orbit normal.
pub fn aim_point(target: &StateVector, offset_km: &Vector3<f64>, phase_angle_rad: f64) -> Vector3<f64> {
    let q = target.lvlh_dcm();
    let displaced = target.radius_km + q.transpose() * Vector3::new(0.0, offset_km.y, offset_km.z);
    let angle = if phase_angle_rad != 0.0 {
        phase_angle_rad
    } else {
        offset_km.x / target.rmag_km()
    };
    rotate_vector(&unit(&target.hvec()), angle, &displaced)
}

/// Solves for the maneuver at `opts.tig` which brings the chaser to the (offset) target position
/// after `transfer_time`.
///
/// The target is propagated to the arrival time and the chaser to TIG with the requested model.
/// With the precision model, three axis solutions use the perturbed Lambert solver. Non-impulsive
/// solutions slip the TIG to center the finite burn.
pub fn lambert_targeting(
    ctx: &MissionContext,
    chaser: &StateVector,
    target: &StateVector,
    transfer_time: Duration,
    opts: &LambertOptions,
    vehicle: &dyn Vehicle,
) -> Result<LambertSolution, TargetingError> {
    ensure!(
        transfer_time > Duration::ZERO,
        InvalidOptionSnafu {
            msg: format!("transfer time must be positive, got {transfer_time}")
        }
    );
    if chaser.body() != target.body() {
        return Err(AstroError::ReferenceBodyMismatch {
            action: "Lambert targeting",
            expected: chaser.body(),
            found: target.body(),
        }
        .into());
    }

    let origin = ctx.propagate_to(chaser, opts.tig, opts.model)?;
    let arrival = opts.tig + transfer_time;
    let target_at_arrival = ctx.convert(
        &ctx.propagate_to(target, arrival, opts.model)?,
        origin.frame,
    )?;
    let aim_km = aim_point(&target_at_arrival, &opts.offset_km, opts.phase_angle_rad);

    let transfer = Transfer {
        origin,
        aim_km,
        tof: transfer_time,
        revs: opts.revs,
        prograde: opts.prograde,
    };

    let v_required = match (opts.axis, opts.model) {
        (AxisMode::XAxis, model) => {
            x_axis(&transfer, model, &ctx.params, ctx.ephem())?.v_init
        }
        (AxisMode::ThreeAxis, PropModel::Conic) => transfer.conic(&ctx.params)?.v_init,
        (AxisMode::ThreeAxis, PropModel::Precision) => {
            perturbed(&transfer, &ctx.params, ctx.ephem())?.v_init
        }
    };
    let dv_inertial = v_required - origin.velocity_km_s;

    let (tig, mut dv_lvlh, engine, finite_burn) = if opts.impulsive {
        (
            opts.tig,
            origin.dv_lvlh_to(&v_required),
            EngineModel::Impulsive,
            None,
        )
    } else {
        let burn = burn_slip(&origin, &dv_inertial, vehicle, &ctx.params)?;
        let engine = EngineModel::Thruster(Thruster {
            thrust_N: vehicle.thrust_N(),
            isp_s: vehicle.isp_s(),
        });
        (
            burn.ignition.epoch,
            burn.ignition.lvlh_dcm() * burn.dv_inertial_km_s,
            engine,
            Some(burn),
        )
    };
    if opts.axis == AxisMode::XAxis {
        dv_lvlh.y = 0.0;
    }

    let solution = LambertSolution {
        maneuver: Maneuver::new(tig, dv_lvlh, engine, vehicle.mass_kg()),
        velocity_to_be_achieved_km_s: v_required,
        post_burn: origin.with_velocity(v_required),
        aim_point_km: aim_km,
        arrival,
        finite_burn,
    };
    info!("{solution}");
    Ok(solution)
}
