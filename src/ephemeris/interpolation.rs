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

use super::{
    EphemerisTable, InterpolationError, InvalidOrderSnafu, OutOfRangeSnafu,
    ReferenceBodyMismatchSnafu, TooFewSamplesSnafu,
};
use crate::cosmic::{Body, StateVector};
use crate::linalg::Vector3;
use crate::time::{Duration, Epoch};
use crate::utils::lagrange_weights;
use snafu::ensure;

/// Highest supported interpolation order
pub const MAX_ORDER: usize = 8;

/// An interpolated state and how it was obtained.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Interpolation {
    pub state: StateVector,
    /// Order actually used, zero when the epoch matched a sample
    pub order: usize,
    /// Set when fewer samples than needed for the requested order were available
    pub order_reduced: bool,
    /// Set when the epoch was outside of the table but within the extrapolation margin
    pub extrapolated: bool,
    /// Set when the epoch is inside a maneuver window
    pub in_burn: bool,
    /// Set when the epoch is inside the lunar stay
    pub on_surface: bool,
    pub exact: bool,
    /// Sub-interval of the table the samples were restricted to
    pub bounds: (Epoch, Epoch),
}

/// Interpolates the state of the vehicle at the provided epoch with Lagrange polynomials of the
/// requested order (1 to 8).
///
/// Samples are never taken across a maneuver or across the lunar stay boundaries: the window is
/// restricted to the smooth sub-interval which contains the epoch. Inside a burn, the state is
/// linearly interpolated between the bracketing samples. A window which straddles a change of
/// central body is trimmed to the majority body. Epochs outside the table are extrapolated only
/// when `extrapolate` is set and they are within `margin` of the table ends.
pub fn interpolate(
    table: &EphemerisTable,
    epoch: Epoch,
    order: usize,
    extrapolate: bool,
    margin: Duration,
) -> Result<Interpolation, InterpolationError> {
    ensure!((1..=MAX_ORDER).contains(&order), InvalidOrderSnafu { order });

    let (start, end) = (table.start(), table.end());
    let extrapolated = epoch < start || epoch > end;
    if extrapolated {
        ensure!(
            extrapolate && epoch >= start - margin && epoch <= end + margin,
            OutOfRangeSnafu { epoch, start, end }
        );
    }

    // Smooth sub-interval containing the epoch
    let (mut lo, mut hi) = (start, end);
    let mut in_burn = false;
    for window in table.maneuvers() {
        if window.ignition < epoch && epoch < window.cutoff {
            in_burn = true;
            lo = window.ignition;
            hi = window.cutoff;
            break;
        }
        if window.cutoff <= epoch && window.cutoff > lo {
            lo = window.cutoff;
        }
        if window.ignition >= epoch && window.ignition < hi {
            hi = window.ignition;
        }
    }

    let mut on_surface = false;
    if let Some(stay) = table.lunar_stay() {
        if stay.landing < epoch && epoch < stay.liftoff {
            on_surface = true;
            lo = lo.max(stay.landing);
            hi = hi.min(stay.liftoff);
        } else {
            if stay.liftoff <= epoch && stay.liftoff > lo {
                lo = stay.liftoff;
            }
            if stay.landing >= epoch && stay.landing < hi {
                hi = stay.landing;
            }
        }
    }

    let available = table.fetch(lo, hi);

    if let Ok(idx) = available.binary_search_by(|s| s.epoch.cmp(&epoch)) {
        return Ok(Interpolation {
            state: available[idx],
            order: 0,
            order_reduced: false,
            extrapolated: false,
            in_burn,
            on_surface,
            exact: true,
            bounds: (lo, hi),
        });
    }

    ensure!(
        available.len() >= 2,
        TooFewSamplesSnafu {
            count: available.len()
        }
    );

    let requested = if in_burn { 1 } else { order };
    let mut used = requested.min(available.len() - 1);

    let mut window = select_window(available, epoch, used);

    // Never interpolate across a change of central body
    if window.iter().any(|s| s.frame != window[0].frame) {
        let body = majority_body(&window, epoch);
        window.retain(|s| s.body() == body);
        ensure!(
            window.len() >= 2 && window.iter().all(|s| s.frame == window[0].frame),
            ReferenceBodyMismatchSnafu { epoch }
        );
        used = window.len() - 1;
    }

    let order_reduced = used < requested;
    if order_reduced {
        warn!(
            "{} ephemeris: interpolation order reduced from {requested} to {used} at {epoch}",
            table.vehicle()
        );
    }
    if extrapolated {
        warn!(
            "{} ephemeris: extrapolating to {epoch} beyond [{start}; {end}]",
            table.vehicle()
        );
    }

    let origin = window[0].epoch;
    let nodes = window
        .iter()
        .map(|s| (s.epoch - origin).to_seconds())
        .collect::<Vec<f64>>();
    let weights = lagrange_weights(&nodes, (epoch - origin).to_seconds());

    let mut radius_km = Vector3::zeros();
    let mut velocity_km_s = Vector3::zeros();
    for (weight, sample) in weights.iter().zip(window.iter()) {
        radius_km += *weight * sample.radius_km;
        velocity_km_s += *weight * sample.velocity_km_s;
    }

    Ok(Interpolation {
        state: StateVector::new(epoch, radius_km, velocity_km_s, window[0].frame),
        order: used,
        order_reduced,
        extrapolated,
        in_burn,
        on_surface,
        exact: false,
        bounds: (lo, hi),
    })
}

/// Picks `order + 1` consecutive samples centered on the epoch, shifted inward at the ends.
fn select_window(samples: &[StateVector], epoch: Epoch, order: usize) -> Vec<StateVector> {
    let count = order + 1;
    let after = samples.partition_point(|s| s.epoch < epoch);
    // Even orders take the extra point before the epoch
    let before = count - count / 2;
    let first = after
        .saturating_sub(before)
        .min(samples.len().saturating_sub(count));
    samples[first..(first + count).min(samples.len())].to_vec()
}

/// The body most samples of the window are about, ties broken by the sample closest to the epoch.
fn majority_body(window: &[StateVector], epoch: Epoch) -> Body {
    let moon = window.iter().filter(|s| s.body() == Body::Moon).count();
    let earth = window.len() - moon;
    if moon > earth {
        Body::Moon
    } else if earth > moon {
        Body::Earth
    } else {
        window
            .iter()
            .min_by_key(|s| (s.epoch - epoch).abs())
            .map(|s| s.body())
            .unwrap_or(Body::Earth)
    }
}
