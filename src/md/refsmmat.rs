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

use super::ldpp::LdppSite;
use super::MissionContext;
use crate::cosmic::{
    body_pole, ecliptic_pole, pitch_yaw_roll, site_inertial_km, Body, CoordinateSystem,
    StateVector, Vehicle, ENTRY_INTERFACE_ALTITUDE_KM,
};
use crate::errors::{NoSolutionSnafu, TargetingError};
use crate::linalg::{Matrix3, Vector3};
use crate::propagators::{Crossing, PropModel, StopCondition};
use crate::time::{Epoch, Unit};
use crate::utils::{from_rows, is_orthonormal, unit};
use snafu::ensure;
use std::fmt;

/// Pitch trim of the service propulsion engine, in degrees
const PITCH_TRIM_DEG: f64 = 2.15;
/// Yaw trim of the service propulsion engine, in degrees
const YAW_TRIM_DEG: f64 = 0.95;
/// Longest coast searched for the entry interface
const ENTRY_SEARCH_DAYS: f64 = 10.0;

/// The platform alignments which can be computed.
#[derive(Copy, Clone, Debug)]
pub enum RefsmmatOption<'a> {
    /// Platform X axis along the thrust of the burn
    Preferred {
        state: &'a StateVector,
        tig: Epoch,
        dv_lvlh_km_s: Vector3<f64>,
        vehicle: &'a dyn Vehicle,
    },
    /// Platform X axis opposite the thrust, heads down for a retrofire
    Retrofire {
        state: &'a StateVector,
        tig: Epoch,
        dv_lvlh_km_s: Vector3<f64>,
        vehicle: &'a dyn Vehicle,
    },
    /// Local vertical frame of the vehicle at the epoch
    LocalVertical { state: &'a StateVector, epoch: Epoch },
    /// Local vertical frame of the vehicle at the entry interface
    EntryInterface { state: &'a StateVector },
    /// Up and downrange along the launch azimuth, at liftoff
    LaunchPad {
        lat_rad: f64,
        lng_rad: f64,
        azimuth_rad: f64,
        liftoff: Epoch,
    },
    /// Local horizontal at the lunar landing site at the landing time
    LandingSite {
        state: &'a StateVector,
        site: LdppSite,
        landing: Epoch,
    },
    /// Passive thermal control: X axis normal to the Earth-Moon line in the ecliptic, Z axis toward
    /// the south ecliptic pole
    PassiveThermalControl { epoch: Epoch },
}

/// Reference to stable member matrix: each row is a platform axis in the Earth centered
/// inertial axes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Refsmmat {
    pub matrix: Matrix3<f64>,
    /// Epoch of the geometry the platform was aligned on
    pub epoch: Epoch,
}

impl Refsmmat {
    /// Platform X, Y and Z axes
    pub fn axes(&self) -> [Vector3<f64>; 3] {
        [0, 1, 2].map(|i| self.matrix.row(i).transpose())
    }

    /// Pitch, yaw and roll (radians) of a body attitude, given as the rotation from the inertial
    /// axes to the body axes, relative to this platform.
    pub fn attitude(&self, inertial_to_body: &Matrix3<f64>) -> Vector3<f64> {
        pitch_yaw_roll(&(inertial_to_body * self.matrix.transpose()))
    }
}

impl fmt::Display for Refsmmat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "REFSMMAT @ {}:", self.epoch)?;
        for axis in self.axes() {
            write!(f, " [{:+.8} {:+.8} {:+.8}]", axis.x, axis.y, axis.z)?;
        }
        Ok(())
    }
}

/// Inertial state with the coast done by the precision propagator
fn coast(
    ctx: &MissionContext,
    state: &StateVector,
    epoch: Epoch,
) -> Result<StateVector, TargetingError> {
    let coasted = ctx.propagate_to(state, epoch, PropModel::Precision)?;
    Ok(ctx.convert(&coasted, coasted.frame.inertial())?)
}

/// Platform aligned on the thrust direction of the burn, trimmed for the engine offsets.
fn thrust_aligned(
    state: &StateVector,
    dv_lvlh_km_s: &Vector3<f64>,
    vehicle: &dyn Vehicle,
    retrofire: bool,
) -> Matrix3<f64> {
    let lvlh = state.lvlh_dcm();
    let (ux, uy, uz) = (
        lvlh.row(0).transpose(),
        lvlh.row(1).transpose(),
        lvlh.row(2).transpose(),
    );
    let dv_inplane = ux * dv_lvlh_km_s.x + uz * dv_lvlh_km_s.z;
    // The thrust vector turns with the vehicle during the burn: aim at the middle of the arc
    let velocity_to_gain = if dv_inplane.norm() > 0.0 {
        let h = state.hvec().norm();
        let turn_rad = h * dv_lvlh_km_s.norm() * vehicle.mass_kg() * 1e3
            / (state.rmag_km().powi(2) * vehicle.thrust_N());
        let (sin, cos) = (0.5 * turn_rad).sin_cos();
        (unit(&dv_inplane) * cos + unit(&dv_inplane.cross(&uy)) * sin) * dv_inplane.norm()
            + uy * dv_lvlh_km_s.y
    } else {
        lvlh.transpose() * dv_lvlh_km_s
    };

    let (x_b, pitch) = if retrofire {
        (-unit(&velocity_to_gain), PITCH_TRIM_DEG.to_radians())
    } else {
        (unit(&velocity_to_gain), -PITCH_TRIM_DEG.to_radians())
    };
    let r = state.radius_km;
    let y_b = unit(&x_b.cross(&r));
    let z_b = unit(&x_b.cross(&x_b.cross(&r)));
    let body = from_rows(&x_b, &y_b, &z_b);

    let (sp, cp) = pitch.sin_cos();
    let (sy, cy) = YAW_TRIM_DEG.to_radians().sin_cos();
    let trim = Matrix3::new(
        cy * cp,
        sy,
        -cy * sp,
        -sy * cp,
        cy,
        sy * sp,
        sp,
        0.0,
        cp,
    );
    (body.transpose() * trim).transpose()
}

/// Computes the platform alignment matrix of the option.
///
/// Every result is orthonormal and right handed, with its rows in the Earth centered inertial
/// axes (the inertial axes of the state's central body share the same orientation).
pub fn compute_refsmmat(
    option: RefsmmatOption,
    ctx: &MissionContext,
) -> Result<Refsmmat, TargetingError> {
    let (matrix, epoch) = match option {
        RefsmmatOption::Preferred {
            state,
            tig,
            dv_lvlh_km_s,
            vehicle,
        }
        | RefsmmatOption::Retrofire {
            state,
            tig,
            dv_lvlh_km_s,
            vehicle,
        } => {
            ensure!(
                dv_lvlh_km_s.norm() > 0.0,
                NoSolutionSnafu {
                    msg: "a thrust aligned platform needs a non zero delta-V"
                }
            );
            let at_tig = coast(ctx, state, tig)?;
            let retrofire = matches!(option, RefsmmatOption::Retrofire { .. });
            (
                thrust_aligned(&at_tig, &dv_lvlh_km_s, vehicle, retrofire),
                tig,
            )
        }
        RefsmmatOption::LocalVertical { state, epoch } => {
            (coast(ctx, state, epoch)?.lvlh_dcm(), epoch)
        }
        RefsmmatOption::EntryInterface { state } => {
            let earth = ctx.convert(state, CoordinateSystem::ECI)?;
            let ei = ctx.propagate_until(
                &earth,
                StopCondition::Radius {
                    radius_km: ctx.params.earth.radius_km + ENTRY_INTERFACE_ALTITUDE_KM,
                    crossing: Crossing::Decreasing,
                },
                ENTRY_SEARCH_DAYS * Unit::Day,
                PropModel::Precision,
            )?;
            (ei.lvlh_dcm(), ei.epoch)
        }
        RefsmmatOption::LaunchPad {
            lat_rad,
            lng_rad,
            azimuth_rad,
            liftoff,
        } => {
            let up = unit(&site_inertial_km(Body::Earth, lat_rad, lng_rad, 1.0, liftoff));
            let east = unit(&body_pole(Body::Earth, liftoff).cross(&up));
            let north = up.cross(&east);
            let (sin, cos) = azimuth_rad.sin_cos();
            let downrange = north * cos + east * sin;
            (from_rows(&up, &downrange.cross(&up), &downrange), liftoff)
        }
        RefsmmatOption::LandingSite {
            state,
            site,
            landing,
        } => {
            let at_landing = ctx.convert(&coast(ctx, state, landing)?, CoordinateSystem::MCI)?;
            let r_ls = site_inertial_km(Body::Moon, site.lat_rad, site.lng_rad, site.radius_km, landing);
            let x = unit(&r_ls);
            let z = unit(&at_landing.hvec().cross(&r_ls));
            ensure!(
                z.norm() > 0.0,
                NoSolutionSnafu {
                    msg: "the landing site is along the orbit normal"
                }
            );
            (from_rows(&x, &z.cross(&x), &z), landing)
        }
        RefsmmatOption::PassiveThermalControl { epoch } => {
            let moon = ctx.ephem().lunar_solar(epoch).map_err(|source| {
                TargetingError::TargetingEphemeris { source }
            })?;
            let pole = ecliptic_pole();
            let x = unit(&pole.cross(&(-moon.moon_radius_km)));
            let z = -pole;
            (from_rows(&x, &z.cross(&x), &z), epoch)
        }
    };

    ensure!(
        is_orthonormal(&matrix, 1e-9),
        NoSolutionSnafu {
            msg: "degenerate platform alignment geometry"
        }
    );
    let refsmmat = Refsmmat { matrix, epoch };
    info!("{refsmmat}");
    Ok(refsmmat)
}
