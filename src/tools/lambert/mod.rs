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

use crate::errors::{InvalidOptionSnafu, NoSolutionSnafu, NotConvergedSnafu, TargetingError};
use crate::io::SolverConfig;
use crate::linalg::Vector3;
use crate::propagators::stumpff;
use snafu::ensure;
use std::f64::consts::{PI, TAU};

mod perturbed;
pub use perturbed::*;

const LAMBERT_EPSILON_RAD: f64 = (5e-5 / 180.0) * PI; // 0.00005 degrees
/// A time of flight within this many seconds is accepted once the bisection interval collapses
const LAMBERT_EPSILON_TIME_COLLAPSED: f64 = 1e-3;
/// Golden ratio conjugate, for the minimum time of flight search
const GOLDEN: f64 = 0.618_033_988_749_895;

/// The two positions, the time of flight and the direction of motion of a conic transfer.
#[derive(Copy, Clone, Debug)]
pub struct LambertInput {
    pub r_init: Vector3<f64>,
    /// Velocity before the transfer at `r_init`: it defines the direction of motion and selects
    /// the branch of multi-revolution solutions.
    pub v_init: Vector3<f64>,
    pub r_final: Vector3<f64>,
    pub tof_s: f64,
    pub gm: f64,
    /// Number of complete revolutions before arrival
    pub revs: u32,
    /// Set to move along the angular momentum of `v_init`, unset to move against it
    pub prograde: bool,
}

/// Velocities at both ends of a conic transfer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LambertArc {
    pub v_init: Vector3<f64>,
    pub v_final: Vector3<f64>,
    /// Square of the change in universal anomaly
    pub psi: f64,
    /// Transfer angle in the direction of motion, excluding the complete revolutions
    pub transfer_angle_rad: f64,
}

/// Solves the Lambert boundary problem with the universal variable formulation (Vallado, algorithm
/// 58), by bisection on ψ.
///
/// For `revs > 0`, ψ lies between (2πN)² and (2π(N+1))² where the time of flight is unbounded at
/// both ends. The minimum time of flight is found first, then both branches are solved and the one
/// whose departure velocity is closest to `v_init` is returned.
pub fn universal(input: &LambertInput, solver: &SolverConfig) -> Result<LambertArc, TargetingError> {
    ensure!(
        input.tof_s > 0.0,
        InvalidOptionSnafu {
            msg: format!("Lambert time of flight must be positive, got {} s", input.tof_s)
        }
    );
    let r_init_norm = input.r_init.norm();
    let r_final_norm = input.r_final.norm();
    let r_norm_product = r_init_norm * r_final_norm;
    let cos_dnu = (input.r_init.dot(&input.r_final) / r_norm_product).clamp(-1.0, 1.0);

    let mut h = input.r_init.cross(&input.v_init);
    if !input.prograde {
        h = -h;
    }
    let dnu = if input.r_init.cross(&input.r_final).dot(&h) >= 0.0 {
        cos_dnu.acos()
    } else {
        TAU - cos_dnu.acos()
    };

    ensure!(
        (dnu - PI).abs() > LAMBERT_EPSILON_RAD,
        NoSolutionSnafu {
            msg: "transfer angle of 180 degrees, the transfer plane is undefined"
        }
    );
    ensure!(
        input.revs > 0 || (dnu > LAMBERT_EPSILON_RAD && dnu < TAU - LAMBERT_EPSILON_RAD),
        NoSolutionSnafu {
            msg: "targets too close"
        }
    );

    let dm = if dnu < PI { 1.0 } else { -1.0 };
    let a = dm * (r_norm_product * (1.0 + cos_dnu)).sqrt();
    let sqrt_mu = input.gm.sqrt();

    // Time of flight and y at ψ, `None` where y is negative
    let tof_of = |psi: f64| -> Option<(f64, f64)> {
        let (c2, c3) = stumpff(psi);
        if c2 <= 0.0 {
            return None;
        }
        let y = r_init_norm + r_final_norm + a * (psi * c3 - 1.0) / c2.sqrt();
        if y < 0.0 {
            return None;
        }
        let chi = (y / c2).sqrt();
        Some(((chi.powi(3) * c3 + a * y.sqrt()) / sqrt_mu, y))
    };

    let arc = |y: f64, psi: f64| {
        let f = 1.0 - y / r_init_norm;
        let g_dot = 1.0 - y / r_final_norm;
        let g = a * (y / input.gm).sqrt();
        LambertArc {
            v_init: (input.r_final - f * input.r_init) / g,
            v_final: (1.0 / g) * (g_dot * input.r_final - input.r_init),
            psi,
            transfer_angle_rad: dnu,
        }
    };

    if input.revs == 0 {
        // Negative y only happens for the smallest ψ, i.e. the shortest times of flight
        let (psi, y) = bisect(
            |psi| tof_of(psi).unwrap_or((f64::NEG_INFINITY, 0.0)),
            -4.0 * PI * PI,
            4.0 * PI * PI,
            input.tof_s,
            true,
            solver,
        )?;
        return Ok(arc(y, psi));
    }

    let n = f64::from(input.revs);
    let lower = (TAU * n).powi(2);
    let upper = (TAU * (n + 1.0)).powi(2);
    let unbounded = |psi: f64| tof_of(psi).map(|(t, _)| t).unwrap_or(f64::INFINITY);

    // Golden section search of the minimum time of flight
    let (mut lo, mut hi) = (lower, upper);
    let mut x1 = hi - GOLDEN * (hi - lo);
    let mut x2 = lo + GOLDEN * (hi - lo);
    let (mut f1, mut f2) = (unbounded(x1), unbounded(x2));
    for _ in 0..solver.lambert_max_iterations {
        if hi - lo < 1e-12 * upper {
            break;
        }
        if f1 < f2 {
            hi = x2;
            x2 = x1;
            f2 = f1;
            x1 = hi - GOLDEN * (hi - lo);
            f1 = unbounded(x1);
        } else {
            lo = x1;
            x1 = x2;
            f1 = f2;
            x2 = lo + GOLDEN * (hi - lo);
            f2 = unbounded(x2);
        }
    }
    let psi_min = 0.5 * (lo + hi);
    let tof_min = unbounded(psi_min);
    ensure!(
        tof_min <= input.tof_s,
        NoSolutionSnafu {
            msg: format!(
                "minimum time of flight for {} revolutions is {tof_min:.3} s, more than the requested {:.3} s",
                input.revs, input.tof_s
            )
        }
    );
    debug!(
        "{}-rev Lambert: minimum time of flight of {tof_min:.3} s at psi = {psi_min:.6}",
        input.revs
    );

    let as_pair = |psi: f64| tof_of(psi).unwrap_or((f64::INFINITY, 0.0));
    let mut branches = Vec::with_capacity(2);
    for (lo, hi, increasing) in [(lower, psi_min, false), (psi_min, upper, true)] {
        match bisect(&as_pair, lo, hi, input.tof_s, increasing, solver) {
            Ok((psi, y)) => branches.push(arc(y, psi)),
            Err(e) => debug!("{}-rev Lambert branch discarded: {e}", input.revs),
        }
    }

    branches
        .into_iter()
        .min_by(|a, b| {
            (a.v_init - input.v_init)
                .norm()
                .total_cmp(&(b.v_init - input.v_init).norm())
        })
        .ok_or(TargetingError::NoSolution {
            msg: format!("no {}-revolution transfer found", input.revs),
        })
}

/// Bisection on ψ of a monotonic time of flight, returns ψ and y.
fn bisect<F>(
    tof_of: F,
    mut lower: f64,
    mut upper: f64,
    target_s: f64,
    increasing: bool,
    solver: &SolverConfig,
) -> Result<(f64, f64), TargetingError>
where
    F: Fn(f64) -> (f64, f64),
{
    let mut residual = f64::INFINITY;
    for _ in 0..solver.lambert_max_iterations {
        let psi = 0.5 * (lower + upper);
        let (tof, y) = tof_of(psi);
        residual = tof - target_s;
        if residual.abs() < solver.lambert_tof_tolerance_s {
            return Ok((psi, y));
        }
        if (upper - lower).abs() < 1e-14 * psi.abs().max(1.0) {
            if residual.abs() < LAMBERT_EPSILON_TIME_COLLAPSED {
                return Ok((psi, y));
            }
            break;
        }
        if (residual < 0.0) == increasing {
            lower = psi;
        } else {
            upper = psi;
        }
    }
    NotConvergedSnafu {
        solver: "Lambert",
        iterations: solver.lambert_max_iterations,
        residual,
    }
    .fail()
}
