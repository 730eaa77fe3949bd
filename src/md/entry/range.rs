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

use crate::cosmic::{body_fixed_rotation, unit_to_latlong, Body, StateVector};
use crate::time::{Epoch, Unit};
use crate::utils::{rotate_vector, unit};

/// Entry speed and flight path angle pairs of the reentry target line, km/s and degrees.
/// Speeds outside of the table use its end points.
const TARGET_LINE: [(f64, f64); 4] = [(7.6, -1.45), (8.5, -2.2), (10.0, -5.0), (11.2, -6.5)];

/// Range at the reference entry conditions below, in nautical miles
const REFERENCE_RANGE_NM: f64 = 1_285.0;
const REFERENCE_SPEED_KM_S: f64 = 7.8;
const REFERENCE_FPA_DEG: f64 = -1.5;
/// Average ground speed during entry, as a fraction of the entry interface speed
const MEAN_SPEED_RATIO: f64 = 0.45;

/// Target flight path angle at the entry interface for the provided inertial speed, in radians.
pub fn reentry_target_line(speed_km_s: f64) -> f64 {
    let (first, last) = (TARGET_LINE[0], TARGET_LINE[TARGET_LINE.len() - 1]);
    let fpa_deg = if speed_km_s <= first.0 {
        first.1
    } else if speed_km_s >= last.0 {
        last.1
    } else {
        TARGET_LINE
            .windows(2)
            .find(|w| speed_km_s <= w[1].0)
            .map(|w| w[0].1 + (w[1].1 - w[0].1) * (speed_km_s - w[0].0) / (w[1].0 - w[0].0))
            .unwrap_or(last.1)
    };
    fpa_deg.to_radians()
}

/// Downrange angle and flight time from the entry interface to the landing point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EntryRange {
    pub range_rad: f64,
    pub flight_time_s: f64,
}

/// Empirical entry range: grows with the square of the entry speed and shrinks as the entry
/// steepens.
pub fn entry_range(speed_km_s: f64, fpa_rad: f64, body_radius_km: f64) -> EntryRange {
    let steepness = (REFERENCE_FPA_DEG / fpa_rad.to_degrees().min(-0.5)).sqrt();
    let range_km = REFERENCE_RANGE_NM
        * crate::cosmic::NAUTICAL_MILE_KM
        * (speed_km_s / REFERENCE_SPEED_KM_S).powi(2)
        * steepness;
    EntryRange {
        range_rad: range_km / body_radius_km,
        flight_time_s: range_km / (MEAN_SPEED_RATIO * speed_km_s),
    }
}

/// Predicted landing point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Landing {
    pub lat_rad: f64,
    pub lng_rad: f64,
    pub epoch: Epoch,
}

/// Predicts the landing point of an inertial state at the entry interface: the entry range is
/// flown in the plane of the entry trajectory, and the Earth rotates during the flight time.
pub fn landing_point(ei: &StateVector, body_radius_km: f64) -> Landing {
    let range = entry_range(ei.vmag_km_s(), ei.fpa_rad(), body_radius_km);
    let inertial = rotate_vector(&ei.hvec(), range.range_rad, &unit(&ei.radius_km));
    let epoch = ei.epoch + range.flight_time_s * Unit::Second;
    let (lat_rad, lng_rad) = unit_to_latlong(&(body_fixed_rotation(Body::Earth, epoch) * inertial));
    Landing {
        lat_rad,
        lng_rad,
        epoch,
    }
}
