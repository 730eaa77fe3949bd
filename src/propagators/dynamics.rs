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

use super::{kepler, PropEphemerisSnafu, PropagationError};
use crate::cosmic::ephem::EphemerisSource;
use crate::cosmic::{body_pole, Body};
use crate::io::{BodyConstants, SystemParameters};
use crate::linalg::{Vector3, Vector6};
use crate::time::{Epoch, Unit};
use crate::utils::unit;
use snafu::ResultExt;
use std::fmt;

/// The `AccelModel` trait handles immutable dynamics which return an acceleration. Those can be
/// added directly to the Encke deviation equations of motion.
pub trait AccelModel: fmt::Debug {
    /// Perturbing acceleration on a vehicle at `radius_km`, inertial about `primary`, at `epoch`.
    fn eom(
        &self,
        primary: Body,
        epoch: Epoch,
        radius_km: &Vector3<f64>,
    ) -> Result<Vector3<f64>, PropagationError>;
}

/// Zonal harmonics of the primary body: J2 to J4 for the Earth and J2 for the Moon with the
/// default constants.
#[derive(Clone, Debug)]
pub struct ZonalHarmonics {
    earth: BodyConstants,
    moon: BodyConstants,
}

impl ZonalHarmonics {
    pub fn new(params: &SystemParameters) -> Self {
        Self {
            earth: params.earth.clone(),
            moon: params.moon.clone(),
        }
    }
}

/// Acceleration of the zonal coefficients `zonals` (J2 first) about the unit `pole`.
pub fn zonal_acceleration(
    gm: f64,
    body_radius_km: f64,
    zonals: &[f64],
    pole: &Vector3<f64>,
    radius_km: &Vector3<f64>,
) -> Vector3<f64> {
    let r = radius_km.norm();
    let r_hat = radius_km / r;
    let s = r_hat.dot(pole);

    // Legendre polynomials and their derivatives, P0 and P1 first
    let mut p = vec![1.0, s];
    let mut dp = vec![0.0, 1.0];
    let mut accel = Vector3::zeros();
    for (idx, jn) in zonals.iter().enumerate() {
        let n = idx + 2;
        let nf = n as f64;
        p.push(((2.0 * nf - 1.0) * s * p[n - 1] - (nf - 1.0) * p[n - 2]) / nf);
        dp.push(dp[n - 2] + (2.0 * nf - 1.0) * p[n - 1]);
        let coeff = gm * jn * body_radius_km.powi(n as i32) / r.powi(n as i32 + 2);
        accel += coeff * (((nf + 1.0) * p[n] + s * dp[n]) * r_hat - dp[n] * pole);
    }
    accel
}

impl AccelModel for ZonalHarmonics {
    fn eom(
        &self,
        primary: Body,
        epoch: Epoch,
        radius_km: &Vector3<f64>,
    ) -> Result<Vector3<f64>, PropagationError> {
        let (consts, pole) = match primary {
            Body::Earth => (&self.earth, Vector3::z()),
            Body::Moon => (&self.moon, body_pole(Body::Moon, epoch)),
        };
        Ok(zonal_acceleration(
            consts.gm_km3_s2,
            consts.radius_km,
            &consts.zonals,
            &unit(&pole),
            radius_km,
        ))
    }
}

/// Point mass perturbations of the secondary body (Moon or Earth) and of the Sun.
pub struct PointMasses<'a> {
    ephem: &'a dyn EphemerisSource,
    earth_gm: f64,
    moon_gm: f64,
    sun_gm: f64,
}

impl<'a> PointMasses<'a> {
    pub fn new(params: &SystemParameters, ephem: &'a dyn EphemerisSource) -> Self {
        Self {
            ephem,
            earth_gm: params.earth.gm_km3_s2,
            moon_gm: params.moon.gm_km3_s2,
            sun_gm: params.sun_gm_km3_s2,
        }
    }
}

impl<'a> fmt::Debug for PointMasses<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "point masses of the secondary body and the Sun")
    }
}

impl<'a> AccelModel for PointMasses<'a> {
    fn eom(
        &self,
        primary: Body,
        epoch: Epoch,
        radius_km: &Vector3<f64>,
    ) -> Result<Vector3<f64>, PropagationError> {
        let lunar_solar = self
            .ephem
            .lunar_solar(epoch)
            .context(PropEphemerisSnafu)?;
        let r_moon = lunar_solar.moon_radius_km;
        let r_sun = lunar_solar.sun_radius_km;

        // Positions of the third bodies as seen from the primary
        let third_bodies = match primary {
            Body::Earth => [(self.moon_gm, r_moon), (self.sun_gm, r_sun)],
            Body::Moon => [(self.earth_gm, -r_moon), (self.sun_gm, r_sun - r_moon)],
        };

        let mut d_x = Vector3::zeros();
        for (gm, r_ij) in third_bodies {
            let r_ij3 = r_ij.norm().powi(3);
            let r_j = radius_km - r_ij; // vehicle as seen from the third body
            let r_j3 = r_j.norm().powi(3);
            d_x += -gm * (r_j / r_j3 + r_ij / r_ij3);
        }
        Ok(d_x)
    }
}

/// Encke's formulation: the motion is integrated as the deviation from an osculating reference
/// conic of the primary body, plus the perturbing accelerations.
#[derive(Debug)]
pub struct EnckeDynamics<'a> {
    pub params: &'a SystemParameters,
    pub ephem: &'a dyn EphemerisSource,
    accel_models: Vec<Box<dyn AccelModel + 'a>>,
}

impl<'a> EnckeDynamics<'a> {
    /// The full force model: zonal harmonics and point masses.
    pub fn new(params: &'a SystemParameters, ephem: &'a dyn EphemerisSource) -> Self {
        Self {
            params,
            ephem,
            accel_models: vec![
                Box::new(ZonalHarmonics::new(params)),
                Box::new(PointMasses::new(params, ephem)),
            ],
        }
    }

    /// No perturbation at all: the deviation stays null and the integration reproduces the conic.
    pub fn two_body(params: &'a SystemParameters, ephem: &'a dyn EphemerisSource) -> Self {
        Self {
            params,
            ephem,
            accel_models: Vec::new(),
        }
    }

    pub fn add_model(&mut self, accel_model: Box<dyn AccelModel + 'a>) {
        self.accel_models.push(accel_model);
    }

    /// Total perturbing acceleration
    pub fn perturbations(
        &self,
        primary: Body,
        epoch: Epoch,
        radius_km: &Vector3<f64>,
    ) -> Result<Vector3<f64>, PropagationError> {
        let mut accel = Vector3::zeros();
        for model in &self.accel_models {
            accel += model.eom(primary, epoch, radius_km)?;
        }
        Ok(accel)
    }

    /// Position and velocity of the reference conic `offset_s` seconds after its epoch.
    pub fn reference(
        &self,
        reference: &Vector6<f64>,
        primary: Body,
        offset_s: f64,
    ) -> Result<(Vector3<f64>, Vector3<f64>), PropagationError> {
        kepler(
            &reference.fixed_rows::<3>(0).into_owned(),
            &reference.fixed_rows::<3>(3).into_owned(),
            offset_s,
            self.params.gm(primary),
            self.params.solver.kepler_max_iterations,
        )
    }

    /// Derivative of the deviation (δ, δ') at `offset_s` seconds past the rectification epoch.
    pub fn eom(
        &self,
        primary: Body,
        rectified_at: Epoch,
        reference: &Vector6<f64>,
        offset_s: f64,
        delta: &Vector6<f64>,
    ) -> Result<Vector6<f64>, PropagationError> {
        let gm = self.params.gm(primary);
        let (rho, _) = self.reference(reference, primary, offset_s)?;
        let d_r = delta.fixed_rows::<3>(0).into_owned();
        let r = rho + d_r;

        let q = d_r.dot(&(d_r - 2.0 * r)) / r.norm_squared();
        let f_q = q * (3.0 + 3.0 * q + q * q) / (1.0 + (1.0 + q).powf(1.5));

        let accel = -gm / rho.norm().powi(3) * (d_r + f_q * r)
            + self.perturbations(primary, rectified_at + offset_s * Unit::Second, &r)?;

        let mut d_x = Vector6::zeros();
        d_x.fixed_rows_mut::<3>(0).copy_from(&delta.fixed_rows::<3>(3));
        d_x.fixed_rows_mut::<3>(3).copy_from(&accel);
        Ok(d_x)
    }
}
