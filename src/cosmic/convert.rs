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

use super::ephem::EphemerisSource;
use super::rotations::body_fixed_rotation;
use super::{AstroError, Body, CoordinateSystem, EphemerisUnavailableSnafu, StateVector};
use crate::linalg::{Matrix3, Vector3};
use crate::time::Epoch;
use crate::utils::{from_rows, unit};
use snafu::ResultExt;

use CoordinateSystem::*;

/// Converts the state vector into the requested coordinate system.
///
/// Only ECI/ECT, ECI/MCI, MCI/MCT and MCI/EMP are converted directly; every other pair is composed
/// through the inertial frames. Converting into the current frame returns the state unchanged.
pub fn convert(
    state: &StateVector,
    to: CoordinateSystem,
    ephem: &dyn EphemerisSource,
) -> Result<StateVector, AstroError> {
    let mut converted = *state;
    for next in state.frame.route_to(to) {
        converted = convert_adjacent(&converted, next, ephem)?;
    }
    Ok(converted)
}

/// Converts a state into the inertial frame of its central body.
pub fn to_inertial(
    state: &StateVector,
    ephem: &dyn EphemerisSource,
) -> Result<StateVector, AstroError> {
    convert(state, state.frame.inertial(), ephem)
}

fn convert_adjacent(
    state: &StateVector,
    to: CoordinateSystem,
    ephem: &dyn EphemerisSource,
) -> Result<StateVector, AstroError> {
    let rotate = |dcm: Matrix3<f64>| {
        StateVector::new(
            state.epoch,
            dcm * state.radius_km,
            dcm * state.velocity_km_s,
            to,
        )
    };

    match (state.frame, to) {
        (ECI, ECT) | (MCI, MCT) => Ok(rotate(body_fixed_rotation(to.body(), state.epoch))),
        (ECT, ECI) | (MCT, MCI) => Ok(rotate(
            body_fixed_rotation(to.body(), state.epoch).transpose(),
        )),
        (ECI, MCI) | (MCI, ECI) => {
            let sign = if to == MCI { -1.0 } else { 1.0 };
            let moon = ephem
                .lunar_solar(state.epoch)
                .context(EphemerisUnavailableSnafu { epoch: state.epoch })?;
            Ok(StateVector::new(
                state.epoch,
                state.radius_km + sign * moon.moon_radius_km,
                state.velocity_km_s + sign * moon.moon_velocity_km_s,
                to,
            ))
        }
        (MCI, EMP) => Ok(rotate(earth_moon_plane_dcm(state.epoch, ephem)?)),
        (EMP, MCI) => Ok(rotate(earth_moon_plane_dcm(state.epoch, ephem)?.transpose())),
        _ => Err(AstroError::DegenerateGeometry {
            action: "converting between non-adjacent coordinate systems",
        }),
    }
}

/// Rotation from MCI to the Earth-Moon plane frame: X toward the Earth, Z along the lunar orbital
/// angular momentum.
pub fn earth_moon_plane_dcm(
    epoch: Epoch,
    ephem: &dyn EphemerisSource,
) -> Result<Matrix3<f64>, AstroError> {
    let moon = ephem
        .lunar_solar(epoch)
        .context(EphemerisUnavailableSnafu { epoch })?;
    let x = -unit(&moon.moon_radius_km);
    let z = unit(&moon.moon_radius_km.cross(&moon.moon_velocity_km_s));
    let y = z.cross(&x);
    Ok(from_rows(&x, &y, &z))
}

/// Unit vector in the body-fixed frame for the provided latitude and longitude, in radians.
pub fn latlong_to_unit(lat_rad: f64, lng_rad: f64) -> Vector3<f64> {
    let (slat, clat) = lat_rad.sin_cos();
    let (slng, clng) = lng_rad.sin_cos();
    Vector3::new(clat * clng, clat * slng, slat)
}

/// Latitude and longitude (radians) of a body-fixed vector; longitude in (-π, π].
pub fn unit_to_latlong(v: &Vector3<f64>) -> (f64, f64) {
    let u = unit(v);
    (u.z.clamp(-1.0, 1.0).asin(), u.y.atan2(u.x))
}

/// Inertial position of a surface site at the provided epoch.
pub fn site_inertial_km(
    body: Body,
    lat_rad: f64,
    lng_rad: f64,
    radius_km: f64,
    epoch: Epoch,
) -> Vector3<f64> {
    body_fixed_rotation(body, epoch).transpose() * (radius_km * latlong_to_unit(lat_rad, lng_rad))
}

/// Latitude, longitude (radians) and height above the provided reference radius of the point
/// directly below the vehicle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SubsatellitePoint {
    pub lat_rad: f64,
    pub lng_rad: f64,
    pub height_km: f64,
}

/// Computes the sub-satellite point of the state in the body-fixed frame of its central body.
pub fn subsatellite_point(
    state: &StateVector,
    body_radius_km: f64,
    ephem: &dyn EphemerisSource,
) -> Result<SubsatellitePoint, AstroError> {
    let fixed = convert(state, CoordinateSystem::body_fixed(state.body()), ephem)?;
    let (lat_rad, lng_rad) = unit_to_latlong(&fixed.radius_km);
    Ok(SubsatellitePoint {
        lat_rad,
        lng_rad,
        height_km: fixed.rmag_km() - body_radius_km,
    })
}
