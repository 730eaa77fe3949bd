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

use super::Body;
use enum_iterator::Sequence;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// The five RTCC coordinate systems.
///
/// The inertial systems share the axes of the mean Earth equator; the true-of-date systems are
/// the body-fixed rotating frames. EMP is centered on the Moon with its X axis toward the Earth
/// and its Z axis along the Moon's orbital angular momentum.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Sequence)]
pub enum CoordinateSystem {
    /// Earth-centered inertial
    ECI,
    /// Earth-centered true-of-date (Earth fixed)
    ECT,
    /// Moon-centered inertial
    MCI,
    /// Moon-centered true-of-date (Moon fixed)
    MCT,
    /// Earth-Moon plane
    EMP,
}

impl CoordinateSystem {
    /// The central body of this coordinate system
    pub const fn body(self) -> Body {
        match self {
            Self::ECI | Self::ECT => Body::Earth,
            Self::MCI | Self::MCT | Self::EMP => Body::Moon,
        }
    }

    pub const fn is_inertial(self) -> bool {
        matches!(self, Self::ECI | Self::MCI)
    }

    /// The inertial coordinate system centered on the same body
    pub const fn inertial(self) -> Self {
        Self::inertial_about(self.body())
    }

    /// The inertial coordinate system centered on the provided body
    pub const fn inertial_about(body: Body) -> Self {
        match body {
            Body::Earth => Self::ECI,
            Body::Moon => Self::MCI,
        }
    }

    /// The body-fixed coordinate system of the provided body
    pub const fn body_fixed(body: Body) -> Self {
        match body {
            Body::Earth => Self::ECT,
            Body::Moon => Self::MCT,
        }
    }

    /// Coordinate system indicator used in the ephemeris tables
    pub const fn code(self) -> u8 {
        match self {
            Self::ECI => 0,
            Self::ECT => 1,
            Self::MCI => 2,
            Self::MCT => 3,
            Self::EMP => 4,
        }
    }

    /// Returns the sequence of coordinate systems to go through, excluding `self`, to reach `to`.
    /// Conversions between body-fixed or Earth-Moon plane systems route through the inertial ones.
    pub fn route_to(self, to: Self) -> Vec<Self> {
        let mut path = Vec::with_capacity(4);
        if self == to {
            return path;
        }
        let mut cur = self;
        if !cur.is_inertial() {
            cur = cur.inertial();
            path.push(cur);
        }
        if cur != to.inertial() {
            cur = to.inertial();
            path.push(cur);
        }
        if cur != to {
            path.push(to);
        }
        path
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
