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
    interpolate, EphemerisTable, InterpolationError, LongitudeConversionSnafu,
    LongitudeNotConvergedSnafu, NoCrossingSnafu,
};
use crate::cosmic::ephem::EphemerisSource;
use crate::cosmic::{convert, unit_to_latlong, CoordinateSystem, StateVector};
use crate::time::{Duration, Epoch, Unit};
use crate::utils::between_pm_pi;
use snafu::{OptionExt, ResultExt};
use std::f64::consts::PI;

/// Settings of the longitude crossing search.
#[derive(Copy, Clone, Debug)]
pub struct LongitudeSearch {
    pub order: usize,
    pub max_iterations: usize,
    pub tolerance_rad: f64,
    pub margin: Duration,
}

/// Finds the first epoch after `after` at which the vehicle crosses the provided body-fixed
/// longitude of its central body.
///
/// The crossing is bracketed on the table samples, then refined by secant iterations on the
/// interpolated ephemeris.
pub fn longitude_crossing(
    table: &EphemerisTable,
    lng_rad: f64,
    after: Epoch,
    search: LongitudeSearch,
    ephem: &dyn EphemerisSource,
) -> Result<Epoch, InterpolationError> {
    let residual = |state: &StateVector| -> Result<f64, InterpolationError> {
        let fixed = convert(state, CoordinateSystem::body_fixed(state.body()), ephem)
            .context(LongitudeConversionSnafu)?;
        let (_, lng) = unit_to_latlong(&fixed.radius_km);
        Ok(between_pm_pi(lng - lng_rad))
    };

    // The scan starts at `after` itself, a crossing may precede the next sample
    let mut points = Vec::new();
    if after > table.start() && after < table.end() {
        let seed = interpolate(table, after, search.order, false, search.margin)?.state;
        points.push((after, residual(&seed)?));
    }
    for sample in table.fetch(after, table.end()) {
        if points.last().map_or(true, |(t, _)| sample.epoch > *t) {
            points.push((sample.epoch, residual(sample)?));
        }
    }

    let mut bracket = None;
    for pair in points.windows(2) {
        let ((e0, f0), (e1, f1)) = (pair[0], pair[1]);
        if f0 == 0.0 {
            return Ok(e0);
        }
        // A jump of about 2π is the wrap on the far side, not a crossing
        if f0 * f1 <= 0.0 && (f1 - f0).abs() < PI {
            bracket = Some(((e0, f0), (e1, f1)));
            break;
        }
    }

    let ((mut t0, mut f0), (mut t1, mut f1)) = bracket.context(NoCrossingSnafu { after })?;
    let (lo, hi) = (t0, t1);

    for iteration in 0..search.max_iterations {
        if f1.abs() < search.tolerance_rad {
            debug!(
                "longitude {:.4} deg crossed at {t1} after {iteration} iterations",
                lng_rad.to_degrees()
            );
            return Ok(t1);
        }
        let dt = (t1 - t0).to_seconds();
        if (f1 - f0).abs() < f64::EPSILON {
            break;
        }
        let mut next = t1 - f1 * dt / (f1 - f0) * Unit::Second;
        // Stay within the bracketing samples
        if next < lo || next > hi {
            next = lo + 0.5 * (hi - lo).to_seconds() * Unit::Second;
        }
        let state = interpolate(table, next, search.order, false, search.margin)?.state;
        t0 = t1;
        f0 = f1;
        t1 = next;
        f1 = residual(&state)?;
    }

    if f1.abs() < search.tolerance_rad {
        Ok(t1)
    } else {
        LongitudeNotConvergedSnafu {
            iterations: search.max_iterations,
        }
        .fail()
    }
}
