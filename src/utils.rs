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

use crate::linalg::{Matrix3, Vector3};
use approx::abs_diff_eq;
use std::f64::consts::{PI, TAU};

/// Returns the unit vector of the provided vector, or the zero vector if its norm is zero.
pub fn unit(v: &Vector3<f64>) -> Vector3<f64> {
    let norm = v.norm();
    if norm > f64::EPSILON {
        v / norm
    } else {
        Vector3::zeros()
    }
}

/// Returns the rotation matrix of a rotation of angle `angle_rad` about the X axis
pub fn r1(angle_rad: f64) -> Matrix3<f64> {
    let (s, c) = angle_rad.sin_cos();
    Matrix3::new(1.0, 0.0, 0.0, 0.0, c, s, 0.0, -s, c)
}

/// Returns the rotation matrix of a rotation of angle `angle_rad` about the Y axis
pub fn r2(angle_rad: f64) -> Matrix3<f64> {
    let (s, c) = angle_rad.sin_cos();
    Matrix3::new(c, 0.0, -s, 0.0, 1.0, 0.0, s, 0.0, c)
}

/// Returns the rotation matrix of a rotation of angle `angle_rad` about the Z axis
pub fn r3(angle_rad: f64) -> Matrix3<f64> {
    let (s, c) = angle_rad.sin_cos();
    Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0)
}

/// Packs three vectors as the rows of a matrix
pub fn from_rows(x: &Vector3<f64>, y: &Vector3<f64>, z: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::from_rows(&[x.transpose(), y.transpose(), z.transpose()])
}

/// Returns the provided angle bounded between 0.0 and 2π
pub fn between_0_tau(angle: f64) -> f64 {
    let bounded = angle.rem_euclid(TAU);
    if bounded >= TAU {
        0.0
    } else {
        bounded
    }
}

/// Returns the provided angle bounded between -π (excluded) and +π
pub fn between_pm_pi(angle: f64) -> f64 {
    let bounded = between_0_tau(angle);
    if bounded > PI {
        bounded - TAU
    } else {
        bounded
    }
}

/// Lagrange basis polynomials of the provided nodes, evaluated at `x`
pub fn lagrange_weights(nodes: &[f64], x: f64) -> Vec<f64> {
    nodes
        .iter()
        .enumerate()
        .map(|(j, xj)| {
            nodes
                .iter()
                .enumerate()
                .filter(|(m, _)| *m != j)
                .fold(1.0, |acc, (_, xm)| acc * (x - xm) / (xj - xm))
        })
        .collect()
}

/// Rotates `v` by `angle_rad` about `axis`, right handed (Rodrigues' formula)
pub fn rotate_vector(axis: &Vector3<f64>, angle_rad: f64, v: &Vector3<f64>) -> Vector3<f64> {
    let k = unit(axis);
    let (sin, cos) = angle_rad.sin_cos();
    v * cos + k.cross(v) * sin + k * k.dot(v) * (1.0 - cos)
}

/// Returns whether the provided matrix is orthonormal within the provided tolerance
pub fn is_orthonormal(m: &Matrix3<f64>, tolerance: f64) -> bool {
    abs_diff_eq!(m * m.transpose(), Matrix3::identity(), epsilon = tolerance)
}
