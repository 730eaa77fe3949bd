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

use super::{KeplerNotConvergedSnafu, PropagationError, RadiusNotReachedSnafu};
use crate::cosmic::StateVector;
use crate::linalg::Vector3;
use crate::time::{Duration, Unit};
use crate::utils::between_0_tau;
use snafu::ensure;
use std::f64::consts::{PI, TAU};

/// Convergence threshold on the universal anomaly, in sqrt(km)
const CHI_TOLERANCE: f64 = 1e-10;
/// Below this magnitude of 1/a the orbit is handled as parabolic, in 1/km
const PARABOLIC_ALPHA: f64 = 1e-9;

/// Stumpff functions c2 and c3 of the provided ψ
pub fn stumpff(psi: f64) -> (f64, f64) {
    if psi > 1e-6 {
        let sqrt_psi = psi.sqrt();
        (
            (1.0 - sqrt_psi.cos()) / psi,
            (sqrt_psi - sqrt_psi.sin()) / (sqrt_psi * psi),
        )
    } else if psi < -1e-6 {
        let sqrt_psi = (-psi).sqrt();
        (
            (1.0 - sqrt_psi.cosh()) / psi,
            (sqrt_psi.sinh() - sqrt_psi) / (sqrt_psi * -psi),
        )
    } else {
        // Series expansion about zero
        (
            0.5 - psi / 24.0 + psi * psi / 720.0,
            1.0 / 6.0 - psi / 120.0 + psi * psi / 5040.0,
        )
    }
}

/// Two body propagation of a position and velocity by `dt_s` seconds, with the universal variable
/// formulation of Kepler's equation (Vallado, algorithm 8).
///
/// Elliptic arcs longer than one period are first reduced modulo the period.
pub fn kepler(
    r0: &Vector3<f64>,
    v0: &Vector3<f64>,
    dt_s: f64,
    gm: f64,
    max_iterations: usize,
) -> Result<(Vector3<f64>, Vector3<f64>), PropagationError> {
    if dt_s == 0.0 {
        return Ok((*r0, *v0));
    }
    let sqrt_mu = gm.sqrt();
    let r0mag = r0.norm();
    let rdotv = r0.dot(v0);
    let alpha = -v0.norm_squared() / gm + 2.0 / r0mag;

    let mut dt = dt_s;
    let mut chi = if alpha > PARABOLIC_ALPHA {
        let period = TAU / (sqrt_mu * alpha.powf(1.5));
        if dt.abs() > period {
            dt %= period;
        }
        sqrt_mu * dt * alpha
    } else if alpha < -PARABOLIC_ALPHA {
        let a = 1.0 / alpha;
        let sign = dt.signum();
        sign * (-a).sqrt()
            * ((-2.0 * gm * alpha * dt)
                / (rdotv + sign * (-gm * a).sqrt() * (1.0 - r0mag * alpha)))
                .ln()
    } else {
        let h = r0.cross(v0);
        let p = h.norm_squared() / gm;
        let s = 0.5 * (1.0 / (3.0 * (gm / p.powi(3)).sqrt() * dt)).atan();
        let w = s.tan().cbrt().atan();
        p.sqrt() * 2.0 / (2.0 * w).tan()
    };
    if !chi.is_finite() {
        chi = sqrt_mu * dt / r0mag;
    }

    let mut converged = false;
    let (mut psi, mut c2, mut c3, mut r) = (0.0, 0.5, 1.0 / 6.0, r0mag);
    for _ in 0..max_iterations {
        psi = chi * chi * alpha;
        (c2, c3) = stumpff(psi);
        r = chi * chi * c2 + rdotv / sqrt_mu * chi * (1.0 - psi * c3) + r0mag * (1.0 - psi * c2);
        let delta = (sqrt_mu * dt
            - chi.powi(3) * c3
            - rdotv / sqrt_mu * chi * chi * c2
            - r0mag * chi * (1.0 - psi * c3))
            / r;
        chi += delta;
        if delta.abs() < CHI_TOLERANCE * chi.abs().max(1.0) {
            psi = chi * chi * alpha;
            (c2, c3) = stumpff(psi);
            r = chi * chi * c2
                + rdotv / sqrt_mu * chi * (1.0 - psi * c3)
                + r0mag * (1.0 - psi * c2);
            converged = true;
            break;
        }
    }
    ensure!(
        converged,
        KeplerNotConvergedSnafu {
            iterations: max_iterations
        }
    );

    let f = 1.0 - chi * chi / r0mag * c2;
    let g = dt - chi.powi(3) / sqrt_mu * c3;
    let gdot = 1.0 - chi * chi / r * c2;
    let fdot = sqrt_mu / (r * r0mag) * chi * (psi * c3 - 1.0);

    Ok((f * r0 + g * v0, fdot * r0 + gdot * v0))
}

/// Conic propagation of a state vector about its central body.
///
/// The state must be in an inertial frame; the output is in the same frame.
pub fn conic_propagate(
    state: &StateVector,
    dt: Duration,
    gm: f64,
    max_iterations: usize,
) -> Result<StateVector, PropagationError> {
    let (r, v) = kepler(
        &state.radius_km,
        &state.velocity_km_s,
        dt.to_seconds(),
        gm,
        max_iterations,
    )?;
    Ok(StateVector::new(state.epoch + dt, r, v, state.frame))
}

/// Mean anomaly (elliptic) or hyperbolic mean anomaly of the true anomaly on an orbit of eccentricity `ecc`.
fn mean_anomaly(ta: f64, ecc: f64) -> f64 {
    if ecc < 1.0 {
        let ea = 2.0 * (((1.0 - ecc) / (1.0 + ecc)).sqrt() * (ta / 2.0).tan()).atan();
        ea - ecc * ea.sin()
    } else {
        let ha = 2.0 * (((ecc - 1.0) / (ecc + 1.0)).sqrt() * (ta / 2.0).tan()).atanh();
        ecc * ha.sinh() - ha
    }
}

/// Time of flight from the current true anomaly of the state to the provided true anomaly, going
/// forward, in seconds. `None` if an open orbit never reaches that anomaly.
pub fn time_to_true_anomaly(state: &StateVector, ta_rad: f64, gm: f64) -> Option<f64> {
    let sma = state.sma_km(gm);
    let ecc = state.ecc(gm);
    let ta0 = state.ta_rad(gm);
    let n = (gm / sma.abs().powi(3)).sqrt();
    if ecc < 1.0 {
        let dm = between_0_tau(mean_anomaly(ta_rad, ecc) - mean_anomaly(ta0, ecc));
        Some(dm / n)
    } else {
        // The asymptotes bound the reachable anomalies
        let ta_inf = (-1.0 / ecc).acos();
        let (ta0, ta1) = (
            ta0 - if ta0 > PI { TAU } else { 0.0 },
            ta_rad - if ta_rad > PI { TAU } else { 0.0 },
        );
        if ta1.abs() >= ta_inf || ta1 < ta0 {
            None
        } else {
            Some((mean_anomaly(ta1, ecc) - mean_anomaly(ta0, ecc)) / n)
        }
    }
}

/// Direction of a crossing in a stop condition
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Crossing {
    /// First crossing, whichever the direction
    Any,
    /// Crossing while the quantity increases (e.g. climbing through a radius)
    Increasing,
    /// Crossing while the quantity decreases
    Decreasing,
}

/// Conic time of flight until the provided radius is reached in the requested direction.
pub fn time_to_radius(
    state: &StateVector,
    radius_km: f64,
    direction: Crossing,
    gm: f64,
) -> Result<f64, PropagationError> {
    let sma = state.sma_km(gm);
    let ecc = state.ecc(gm);
    let p = sma * (1.0 - ecc * ecc);
    let cos_ta = (p / radius_km - 1.0) / ecc;
    ensure!(
        ecc > 1e-10 && cos_ta.abs() <= 1.0,
        RadiusNotReachedSnafu { radius_km }
    );
    let ascending = cos_ta.acos();
    let candidates = match direction {
        Crossing::Increasing => vec![ascending],
        Crossing::Decreasing => vec![TAU - ascending],
        Crossing::Any => vec![ascending, TAU - ascending],
    };
    candidates
        .into_iter()
        .filter_map(|ta| time_to_true_anomaly(state, ta, gm))
        .min_by(|a, b| a.total_cmp(b))
        .ok_or(PropagationError::RadiusNotReached { radius_km })
}

/// Conic time of flight to the next apoapsis (or periapsis when `apoapsis` is not set).
pub fn time_to_apsis(state: &StateVector, apoapsis: bool, gm: f64) -> Result<f64, PropagationError> {
    let target = if apoapsis { PI } else { 0.0 };
    time_to_true_anomaly(state, target, gm).ok_or(PropagationError::RadiusNotReached {
        radius_km: state.apsides_km(gm).0,
    })
}

/// Conic time of flight until the argument of latitude about `pole` equals `u_rad`.
pub fn time_to_arg_latitude(
    state: &StateVector,
    u_rad: f64,
    pole: &Vector3<f64>,
    gm: f64,
) -> Option<f64> {
    let du = between_0_tau(u_rad - state.arg_latitude_rad(pole));
    time_to_true_anomaly(state, between_0_tau(state.ta_rad(gm) + du), gm)
}

/// Conic time of flight until the flight path angle equals `fpa_rad` (in (-π/2, π/2)).
pub fn time_to_fpa(state: &StateVector, fpa_rad: f64, gm: f64) -> Option<f64> {
    let ecc = state.ecc(gm);
    let s = fpa_rad.sin() / ecc;
    if ecc < 1e-10 || s.abs() > 1.0 {
        return None;
    }
    // tan γ = e sin ν / (1 + e cos ν) has two roots per revolution
    [fpa_rad + s.asin(), fpa_rad + PI - s.asin()]
        .into_iter()
        .filter_map(|ta| time_to_true_anomaly(state, between_0_tau(ta), gm))
        .min_by(|a, b| a.total_cmp(b))
}

/// Returns the state `dt_s` seconds later, as a convenience for helpers which return times.
pub fn conic_after(
    state: &StateVector,
    dt_s: f64,
    gm: f64,
    max_iterations: usize,
) -> Result<StateVector, PropagationError> {
    conic_propagate(state, dt_s * Unit::Second, gm, max_iterations)
}
