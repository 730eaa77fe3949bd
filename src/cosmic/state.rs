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

use super::{AstroError, Body, CoordinateSystem, TimeTagged};
use crate::linalg::{Matrix3, Vector3};
use crate::time::{Duration, Epoch, Unit};
use crate::utils::{between_0_tau, from_rows, r1, r3, unit};
use snafu::ensure;
use std::f64::consts::TAU;
use std::fmt;

/// A position and velocity at an epoch, about a central body and in one of the RTCC coordinate systems.
///
/// State vectors are values: every operation returns a new state vector.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StateVector {
    pub epoch: Epoch,
    pub radius_km: Vector3<f64>,
    pub velocity_km_s: Vector3<f64>,
    pub frame: CoordinateSystem,
}

impl StateVector {
    pub fn new(
        epoch: Epoch,
        radius_km: Vector3<f64>,
        velocity_km_s: Vector3<f64>,
        frame: CoordinateSystem,
    ) -> Self {
        Self {
            epoch,
            radius_km,
            velocity_km_s,
            frame,
        }
    }

    /// Builds a state vector after checking that the reference body tag agrees with the coordinate system.
    pub fn try_new(
        epoch: Epoch,
        radius_km: Vector3<f64>,
        velocity_km_s: Vector3<f64>,
        body: Body,
        frame: CoordinateSystem,
    ) -> Result<Self, AstroError> {
        ensure!(
            frame.body() == body,
            super::ReferenceBodyMismatchSnafu {
                action: "building a state vector",
                expected: frame.body(),
                found: body
            }
        );
        Ok(Self::new(epoch, radius_km, velocity_km_s, frame))
    }

    /// Builds a state vector from Keplerian elements, angles in degrees.
    #[allow(clippy::too_many_arguments)]
    pub fn keplerian(
        sma_km: f64,
        ecc: f64,
        inc_deg: f64,
        raan_deg: f64,
        aop_deg: f64,
        ta_deg: f64,
        epoch: Epoch,
        frame: CoordinateSystem,
        gm_km3_s2: f64,
    ) -> Self {
        let p = sma_km * (1.0 - ecc.powi(2));
        let (sin_ta, cos_ta) = ta_deg.to_radians().sin_cos();
        let r_pqw = p / (1.0 + ecc * cos_ta) * Vector3::new(cos_ta, sin_ta, 0.0);
        let v_pqw = (gm_km3_s2 / p).sqrt() * Vector3::new(-sin_ta, ecc + cos_ta, 0.0);
        let dcm = r3(-raan_deg.to_radians()) * r1(-inc_deg.to_radians()) * r3(-aop_deg.to_radians());
        Self::new(epoch, dcm * r_pqw, dcm * v_pqw, frame)
    }

    /// The central body of this state
    pub fn body(&self) -> Body {
        self.frame.body()
    }

    /// Returns a copy of this state with a new position and velocity, same epoch and frame
    pub fn with_rv(&self, radius_km: Vector3<f64>, velocity_km_s: Vector3<f64>) -> Self {
        Self::new(self.epoch, radius_km, velocity_km_s, self.frame)
    }

    /// Returns a copy of this state with a new velocity
    pub fn with_velocity(&self, velocity_km_s: Vector3<f64>) -> Self {
        self.with_rv(self.radius_km, velocity_km_s)
    }

    /// Ensures that `other` is expressed in the same frame as `self`
    pub fn ensure_same_frame(&self, other: &Self, action: &'static str) -> Result<(), AstroError> {
        ensure!(
            self.frame == other.frame,
            super::FrameMismatchSnafu {
                action,
                frame1: self.frame,
                frame2: other.frame
            }
        );
        Ok(())
    }

    pub fn rmag_km(&self) -> f64 {
        self.radius_km.norm()
    }

    pub fn vmag_km_s(&self) -> f64 {
        self.velocity_km_s.norm()
    }

    /// Orbital angular momentum vector
    pub fn hvec(&self) -> Vector3<f64> {
        self.radius_km.cross(&self.velocity_km_s)
    }

    /// Radial velocity, positive when climbing
    pub fn radial_velocity_km_s(&self) -> f64 {
        self.radius_km.dot(&self.velocity_km_s) / self.rmag_km()
    }

    /// Flight path angle in radians, positive when climbing
    pub fn fpa_rad(&self) -> f64 {
        (self.radial_velocity_km_s() / self.vmag_km_s()).clamp(-1.0, 1.0).asin()
    }

    /// Specific mechanical energy
    pub fn energy_km2_s2(&self, gm_km3_s2: f64) -> f64 {
        0.5 * self.vmag_km_s().powi(2) - gm_km3_s2 / self.rmag_km()
    }

    /// Semi-major axis (negative for hyperbolic trajectories)
    pub fn sma_km(&self, gm_km3_s2: f64) -> f64 {
        -gm_km3_s2 / (2.0 * self.energy_km2_s2(gm_km3_s2))
    }

    /// Eccentricity vector, pointing toward the periapsis
    pub fn evec(&self, gm_km3_s2: f64) -> Vector3<f64> {
        let r = self.radius_km;
        let v = self.velocity_km_s;
        ((v.norm_squared() - gm_km3_s2 / r.norm()) * r - r.dot(&v) * v) / gm_km3_s2
    }

    pub fn ecc(&self, gm_km3_s2: f64) -> f64 {
        self.evec(gm_km3_s2).norm()
    }

    /// Orbital period, if this orbit is closed
    pub fn period(&self, gm_km3_s2: f64) -> Option<Duration> {
        let sma = self.sma_km(gm_km3_s2);
        if sma > 0.0 {
            Some(TAU * (sma.powi(3) / gm_km3_s2).sqrt() * Unit::Second)
        } else {
            None
        }
    }

    /// Mean motion in radians per second (of the circular orbit at this radius for open orbits)
    pub fn mean_motion_rad_s(&self, gm_km3_s2: f64) -> f64 {
        let sma = self.sma_km(gm_km3_s2);
        let a = if sma > 0.0 { sma } else { self.rmag_km() };
        (gm_km3_s2 / a.powi(3)).sqrt()
    }

    /// Apoapsis and periapsis radii (apoapsis is infinite for open orbits)
    pub fn apsides_km(&self, gm_km3_s2: f64) -> (f64, f64) {
        let sma = self.sma_km(gm_km3_s2);
        let ecc = self.ecc(gm_km3_s2);
        let rp = sma * (1.0 - ecc);
        if ecc < 1.0 {
            (sma * (1.0 + ecc), rp)
        } else {
            (f64::INFINITY, rp)
        }
    }

    /// True anomaly in radians, in [0, 2π)
    pub fn ta_rad(&self, gm_km3_s2: f64) -> f64 {
        let e = self.evec(gm_km3_s2);
        if e.norm() < 1e-10 {
            // Circular: measured from the current position
            return 0.0;
        }
        let h = self.hvec();
        between_0_tau(
            unit(&e)
                .cross(&unit(&self.radius_km))
                .dot(&unit(&h))
                .atan2(unit(&e).dot(&unit(&self.radius_km))),
        )
    }

    /// Argument of latitude in radians, in [0, 2π), measured from the ascending node on the plane
    /// normal to `pole` (e.g. the lunar equator).
    pub fn arg_latitude_rad(&self, pole: &Vector3<f64>) -> f64 {
        let h = unit(&self.hvec());
        let k = unit(pole);
        let mut node = k.cross(&h);
        if node.norm() < 1e-12 {
            // Equatorial orbit: use the reference X axis projected on the equator
            node = Vector3::x() - k * k.x;
            if node.norm() < 1e-12 {
                node = Vector3::y() - k * k.y;
            }
        }
        let node = unit(&node);
        let r = unit(&self.radius_km);
        between_0_tau(node.cross(&r).dot(&h).atan2(node.dot(&r)))
    }

    /// Inclination with respect to the plane normal to `pole`, in radians
    pub fn inclination_rad(&self, pole: &Vector3<f64>) -> f64 {
        unit(&self.hvec()).dot(&unit(pole)).clamp(-1.0, 1.0).acos()
    }

    /// Rotation matrix from this state's frame to its local vertical, local horizontal frame.
    ///
    /// The rows are X (along track, in the direction of motion), Y (opposite the orbital angular
    /// momentum) and Z (toward the center of the body).
    pub fn lvlh_dcm(&self) -> Matrix3<f64> {
        let k = -unit(&self.radius_km);
        let j = unit(&self.velocity_km_s.cross(&self.radius_km));
        let i = j.cross(&k);
        from_rows(&i, &j, &k)
    }

    /// Returns the state after an impulsive velocity change expressed in LVLH
    pub fn apply_dv_lvlh(&self, dv_lvlh_km_s: &Vector3<f64>) -> Self {
        self.with_velocity(self.velocity_km_s + self.lvlh_dcm().transpose() * dv_lvlh_km_s)
    }

    /// Returns the LVLH velocity change needed to go from this state's velocity to `new_velocity_km_s`
    pub fn dv_lvlh_to(&self, new_velocity_km_s: &Vector3<f64>) -> Vector3<f64> {
        self.lvlh_dcm() * (new_velocity_km_s - self.velocity_km_s)
    }
}

impl TimeTagged for StateVector {
    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn set_epoch(&mut self, epoch: Epoch) {
        self.epoch = epoch
    }
}

impl fmt::Display for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{} ({})] {}\tposition = [{:.6}, {:.6}, {:.6}] km\tvelocity = [{:.6}, {:.6}, {:.6}] km/s",
            self.frame,
            self.body(),
            self.epoch,
            self.radius_km.x,
            self.radius_km.y,
            self.radius_km.z,
            self.velocity_km_s.x,
            self.velocity_km_s.y,
            self.velocity_km_s.z
        )
    }
}
