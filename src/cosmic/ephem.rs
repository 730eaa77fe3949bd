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

use super::rotations::{days_since_j2000, ecliptic_to_equatorial, OBLIQUITY_J2000_DEG};
use super::AU;
use crate::errors::ErrorKind;
use crate::linalg::Vector3;
use crate::time::{Duration, Epoch, Unit};
use crate::utils::lagrange_weights;
use snafu::prelude::*;
use std::fmt;

/// Number of samples used by the tabulated lunar/solar ephemeris interpolation
const TABULATED_POINTS: usize = 6;

/// Central difference half-step for the analytical velocities, in seconds
const DIFF_STEP_S: f64 = 60.0;

#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EphemerisError {
    #[snafu(display("{epoch} is outside of the lunar/solar ephemeris span [{start}; {end}]"))]
    OutOfRange {
        epoch: Epoch,
        start: Epoch,
        end: Epoch,
    },
    #[snafu(display("lunar/solar ephemeris needs at least {needed} samples but has {count}"))]
    TooFewSamples { count: usize, needed: usize },
}

impl EphemerisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::TooFewSamples { .. } => ErrorKind::InvalidInput,
        }
    }
}

/// Moon and Sun states relative to the Earth, in ECI, at an epoch.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LunarSolarState {
    pub epoch: Epoch,
    pub moon_radius_km: Vector3<f64>,
    pub moon_velocity_km_s: Vector3<f64>,
    pub sun_radius_km: Vector3<f64>,
    pub sun_velocity_km_s: Vector3<f64>,
}

/// The external planetary ephemeris service, queried by epoch.
pub trait EphemerisSource: fmt::Debug + Send + Sync {
    /// Returns the Moon and Sun states relative to the Earth at the provided epoch
    fn lunar_solar(&self, epoch: Epoch) -> Result<LunarSolarState, EphemerisError>;
}

/// Low precision almanac series of the Moon (about 0.3 degrees) and of the Sun (about 0.01 degree).
///
/// An optional validity window makes this source behave like a bounded ephemeris service.
#[derive(Copy, Clone, Debug, Default)]
pub struct AnalyticEphemeris {
    pub validity: Option<(Epoch, Epoch)>,
}

impl AnalyticEphemeris {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bounded(start: Epoch, end: Epoch) -> Self {
        Self {
            validity: Some((start, end)),
        }
    }

    /// Geocentric position of the Moon in ECI
    pub fn moon_position_km(epoch: Epoch) -> Vector3<f64> {
        let t = days_since_j2000(epoch) / 36_525.0;
        let sind = |deg: f64| deg.to_radians().sin();
        let cosd = |deg: f64| deg.to_radians().cos();

        let lambda = 218.32 + 481_267.881 * t + 6.29 * sind(134.9 + 477_198.85 * t)
            - 1.27 * sind(259.2 - 413_335.38 * t)
            + 0.66 * sind(235.7 + 890_534.23 * t)
            + 0.21 * sind(269.9 + 954_397.70 * t)
            - 0.19 * sind(357.5 + 35_999.05 * t)
            - 0.11 * sind(186.6 + 966_404.05 * t);
        let beta = 5.13 * sind(93.3 + 483_202.03 * t) + 0.28 * sind(228.2 + 960_400.87 * t)
            - 0.28 * sind(318.3 + 6_003.18 * t)
            - 0.17 * sind(217.6 - 407_332.20 * t);
        let parallax = 0.9508
            + 0.0518 * cosd(134.9 + 477_198.85 * t)
            + 0.0095 * cosd(259.2 - 413_335.38 * t)
            + 0.0078 * cosd(235.7 + 890_534.23 * t)
            + 0.0028 * cosd(269.9 + 954_397.70 * t);
        let dist_km = 6_378.14 / sind(parallax);

        let ecliptic = dist_km
            * Vector3::new(
                cosd(beta) * cosd(lambda),
                cosd(beta) * sind(lambda),
                sind(beta),
            );
        ecliptic_to_equatorial() * ecliptic
    }

    /// Geocentric position of the Sun in ECI
    pub fn sun_position_km(epoch: Epoch) -> Vector3<f64> {
        let n = days_since_j2000(epoch);
        let mean_lng = 280.460 + 0.985_647_4 * n;
        let anomaly = (357.528 + 0.985_600_3 * n).to_radians();
        let lambda = (mean_lng + 1.915 * anomaly.sin() + 0.020 * (2.0 * anomaly).sin()).to_radians();
        let dist_km = (1.000_14 - 0.016_71 * anomaly.cos() - 0.000_14 * (2.0 * anomaly).cos()) * AU;
        let obliquity = (OBLIQUITY_J2000_DEG - 0.000_000_4 * n).to_radians();
        dist_km
            * Vector3::new(
                lambda.cos(),
                obliquity.cos() * lambda.sin(),
                obliquity.sin() * lambda.sin(),
            )
    }
}

impl EphemerisSource for AnalyticEphemeris {
    fn lunar_solar(&self, epoch: Epoch) -> Result<LunarSolarState, EphemerisError> {
        if let Some((start, end)) = self.validity {
            ensure!(
                epoch >= start && epoch <= end,
                OutOfRangeSnafu { epoch, start, end }
            );
        }
        let h = DIFF_STEP_S * Unit::Second;
        let moon_velocity_km_s = (Self::moon_position_km(epoch + h)
            - Self::moon_position_km(epoch - h))
            / (2.0 * DIFF_STEP_S);
        let sun_velocity_km_s =
            (Self::sun_position_km(epoch + h) - Self::sun_position_km(epoch - h)) / (2.0 * DIFF_STEP_S);

        Ok(LunarSolarState {
            epoch,
            moon_radius_km: Self::moon_position_km(epoch),
            moon_velocity_km_s,
            sun_radius_km: Self::sun_position_km(epoch),
            sun_velocity_km_s,
        })
    }
}

/// Lunar/solar ephemeris tabulated at a fixed spacing and interpolated with six-point Lagrange
/// polynomials, as the RTCC stored the Earth-Moon and Sun ephemeris every twelve hours.
#[derive(Clone, Debug)]
pub struct TabulatedEphemeris {
    start: Epoch,
    step: Duration,
    samples: Vec<LunarSolarState>,
    /// Allowed extrapolation beyond the ends of the table
    margin: Duration,
}

impl TabulatedEphemeris {
    /// Samples the provided source from `start` to at least `end` every `step`.
    pub fn sample(
        source: &dyn EphemerisSource,
        start: Epoch,
        end: Epoch,
        step: Duration,
    ) -> Result<Self, EphemerisError> {
        let mut samples = Vec::new();
        let mut epoch = start;
        loop {
            samples.push(source.lunar_solar(epoch)?);
            if epoch >= end {
                break;
            }
            epoch = epoch + step;
        }
        Self::from_samples(samples, step, Duration::ZERO)
    }

    /// Builds the table from evenly spaced samples, which must start at the first sample's epoch.
    pub fn from_samples(
        samples: Vec<LunarSolarState>,
        step: Duration,
        margin: Duration,
    ) -> Result<Self, EphemerisError> {
        ensure!(
            samples.len() >= TABULATED_POINTS,
            TooFewSamplesSnafu {
                count: samples.len(),
                needed: TABULATED_POINTS
            }
        );
        Ok(Self {
            start: samples[0].epoch,
            step,
            samples,
            margin,
        })
    }

    /// Sets the allowed extrapolation margin
    pub fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    pub fn start(&self) -> Epoch {
        self.start
    }

    pub fn end(&self) -> Epoch {
        self.samples[self.samples.len() - 1].epoch
    }
}

impl EphemerisSource for TabulatedEphemeris {
    fn lunar_solar(&self, epoch: Epoch) -> Result<LunarSolarState, EphemerisError> {
        ensure!(
            epoch >= self.start - self.margin && epoch <= self.end() + self.margin,
            OutOfRangeSnafu {
                epoch,
                start: self.start,
                end: self.end()
            }
        );
        let step_s = self.step.to_seconds();
        let t = (epoch - self.start).to_seconds() / step_s;
        // Two samples before and three after the requested epoch, slid inward at the edges
        let last_first = self.samples.len() - TABULATED_POINTS;
        let first = ((t.floor() as i64) - 2).clamp(0, last_first as i64) as usize;
        let window = &self.samples[first..first + TABULATED_POINTS];

        let nodes: Vec<f64> = window
            .iter()
            .map(|s| (s.epoch - self.start).to_seconds() / step_s)
            .collect();
        let weights = lagrange_weights(&nodes, t);

        let mut state = LunarSolarState {
            epoch,
            moon_radius_km: Vector3::zeros(),
            moon_velocity_km_s: Vector3::zeros(),
            sun_radius_km: Vector3::zeros(),
            sun_velocity_km_s: Vector3::zeros(),
        };
        for (w, sample) in weights.iter().zip(window) {
            state.moon_radius_km += *w * sample.moon_radius_km;
            state.moon_velocity_km_s += *w * sample.moon_velocity_km_s;
            state.sun_radius_km += *w * sample.sun_radius_km;
            state.sun_velocity_km_s += *w * sample.sun_velocity_km_s;
        }
        Ok(state)
    }
}
