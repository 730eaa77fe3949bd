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

use super::Body;
use crate::linalg::{Matrix3, Vector3};
use crate::time::Epoch;
use crate::utils::{r1, r2, r3};
use std::f64::consts::FRAC_PI_2;

/// Earth sidereal rotation rate, in radians per second
pub const EARTH_ROTATION_RATE_RAD_S: f64 = 7.292_115_146_7e-5;
/// Greenwich sidereal angle at J2000, in degrees
const GREENWICH_ANGLE_J2000_DEG: f64 = 280.460_618_37;
/// Lunar prime meridian rate, in degrees per day (IAU)
const MOON_MERIDIAN_RATE_DEG_DAY: f64 = 13.176_358_15;
/// Mean obliquity of the ecliptic at J2000, in degrees
pub const OBLIQUITY_J2000_DEG: f64 = 23.439_291;

const SECONDS_PER_DAY: f64 = 86_400.0;
const DAYS_PER_CENTURY: f64 = 36_525.0;

/// Days past J2000 in TDB, as used by the rotation and almanac models
pub fn days_since_j2000(epoch: Epoch) -> f64 {
    epoch.to_tdb_seconds() / SECONDS_PER_DAY
}

/// Defines an Euler rotation, angle must be in radians
#[derive(Clone, Copy, Debug)]
pub enum EulerRotation {
    R1(f64),
    R2(f64),
    R3(f64),
}

impl EulerRotation {
    pub fn r1_from_degrees(angle_deg: f64) -> Self {
        Self::R1(angle_deg.to_radians())
    }
    pub fn r2_from_degrees(angle_deg: f64) -> Self {
        Self::R2(angle_deg.to_radians())
    }
    pub fn r3_from_degrees(angle_deg: f64) -> Self {
        Self::R3(angle_deg.to_radians())
    }
    /// Get the DCM from this Euler rotation
    pub fn dcm(&self) -> Matrix3<f64> {
        match *self {
            Self::R1(angle) => r1(angle),
            Self::R2(angle) => r2(angle),
            Self::R3(angle) => r3(angle),
        }
    }
}

/// Seconds elapsed since J2000 (noon UTC, UT1 taken as UTC), uniform with the durations added
/// to epochs
fn elapsed_since_j2000_s(epoch: Epoch) -> f64 {
    (epoch - Epoch::from_gregorian_utc_hms(2000, 1, 1, 12, 0, 0)).to_seconds()
}

/// Rotation from ECI to ECT (Earth fixed) at the provided epoch: a rotation about the pole by the
/// Greenwich sidereal angle.
pub fn earth_rotation(epoch: Epoch) -> Matrix3<f64> {
    let angle = GREENWICH_ANGLE_J2000_DEG.to_radians()
        + EARTH_ROTATION_RATE_RAD_S * elapsed_since_j2000_s(epoch);
    EulerRotation::R3(angle).dcm()
}

/// Rotation from MCI to MCT (Moon fixed) at the provided epoch, from the IAU pole and prime
/// meridian of the Moon without the periodic libration terms.
pub fn moon_rotation(epoch: Epoch) -> Matrix3<f64> {
    let d = days_since_j2000(epoch);
    let t = d / DAYS_PER_CENTURY;
    let alpha0 = (269.9949 + 0.0031 * t).to_radians();
    let delta0 = (66.5392 + 0.0130 * t).to_radians();
    let w = (38.3213 + MOON_MERIDIAN_RATE_DEG_DAY * d).to_radians();
    r3(w) * r1(FRAC_PI_2 - delta0) * r3(FRAC_PI_2 + alpha0)
}

/// Rotation from the inertial frame of the body to its body-fixed frame
pub fn body_fixed_rotation(body: Body, epoch: Epoch) -> Matrix3<f64> {
    match body {
        Body::Earth => earth_rotation(epoch),
        Body::Moon => moon_rotation(epoch),
    }
}

/// Rotation pole of the body, in its inertial frame
pub fn body_pole(body: Body, epoch: Epoch) -> Vector3<f64> {
    body_fixed_rotation(body, epoch).transpose() * Vector3::z()
}

/// North pole of the ecliptic in the inertial (mean equator) axes
pub fn ecliptic_pole() -> Vector3<f64> {
    let (s, c) = OBLIQUITY_J2000_DEG.to_radians().sin_cos();
    Vector3::new(0.0, -s, c)
}

/// Rotation from the ecliptic axes to the equatorial axes
pub fn ecliptic_to_equatorial() -> Matrix3<f64> {
    EulerRotation::r1_from_degrees(-OBLIQUITY_J2000_DEG).dcm()
}

/// Builds the rotation from a reference frame to a body frame for a pitch (Y), yaw (Z), roll (X)
/// sequence of angles in radians.
pub fn pitch_yaw_roll_dcm(pitch: f64, yaw: f64, roll: f64) -> Matrix3<f64> {
    r1(roll) * r3(yaw) * r2(pitch)
}

/// Extracts the pitch, yaw and roll angles (radians) from a rotation built with [`pitch_yaw_roll_dcm`].
pub fn pitch_yaw_roll(dcm: &Matrix3<f64>) -> Vector3<f64> {
    let yaw = dcm[(0, 1)].clamp(-1.0, 1.0).asin();
    let pitch = (-dcm[(0, 2)]).atan2(dcm[(0, 0)]);
    let roll = (-dcm[(2, 1)]).atan2(dcm[(1, 1)]);
    Vector3::new(pitch, yaw, roll)
}
