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

use crate::errors::ErrorKind;
use crate::time::{Duration, Epoch};
use serde_derive::{Deserialize, Serialize};
use snafu::Snafu;
use std::fmt;

/// Lunar and solar ephemeris sources, as consumed by the frame converter and the precision propagator.
pub mod ephem;
use self::ephem::EphemerisError;

mod frames;
pub use self::frames::*;

mod state;
pub use self::state::*;

mod rotations;
pub use self::rotations::*;

mod convert;
pub use self::convert::*;

mod vehicle;
pub use self::vehicle::*;

/// A trait allowing for something to have an epoch
pub trait TimeTagged {
    /// Retrieve the Epoch
    fn epoch(&self) -> Epoch;
    /// Set the Epoch
    fn set_epoch(&mut self, epoch: Epoch);

    /// Shift this epoch by a duration (can be negative)
    fn shift_by(&mut self, duration: Duration) {
        self.set_epoch(self.epoch() + duration);
    }
}

/// The two central bodies of the RTCC.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Body {
    Earth,
    Moon,
}

impl Body {
    /// The other central body
    pub fn other(self) -> Self {
        match self {
            Self::Earth => Self::Moon,
            Self::Moon => Self::Earth,
        }
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Earth => write!(f, "Earth"),
            Self::Moon => write!(f, "Moon"),
        }
    }
}

/// From NIST special publication 330, 2008 edition, in meters per second squared
pub const STD_GRAVITY: f64 = 9.80665;

/// Astronomical unit, in kilometers, according to the [IAU](https://www.iau.org/public/themes/measuring/).
pub const AU: f64 = 149_597_870.700;

/// One international foot in kilometers
pub const FOOT_KM: f64 = 0.3048e-3;

/// One nautical mile in kilometers
pub const NAUTICAL_MILE_KM: f64 = 1.852;

/// Altitude of the entry interface (400,000 ft), in kilometers
pub const ENTRY_INTERFACE_ALTITUDE_KM: f64 = 400_000.0 * FOOT_KM;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AstroError {
    #[snafu(display("Earth-Moon ephemeris unavailable at {epoch}: {source}"))]
    EphemerisUnavailable {
        epoch: Epoch,
        source: EphemerisError,
    },
    #[snafu(display("{action} requires a state about the {expected} but got one about the {found}"))]
    ReferenceBodyMismatch {
        action: &'static str,
        expected: Body,
        found: Body,
    },
    #[snafu(display("{action} requires both states in the same frame, got {frame1} and {frame2}"))]
    FrameMismatch {
        action: &'static str,
        frame1: CoordinateSystem,
        frame2: CoordinateSystem,
    },
    #[snafu(display("degenerate geometry when {action}"))]
    DegenerateGeometry { action: &'static str },
}

impl AstroError {
    /// Maps this error onto the error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EphemerisUnavailable { .. } => ErrorKind::EphemerisUnavailable,
            Self::ReferenceBodyMismatch { .. } | Self::FrameMismatch { .. } => {
                ErrorKind::ReferenceBodyMismatch
            }
            Self::DegenerateGeometry { .. } => ErrorKind::NoSolution,
        }
    }
}
