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

/*! # rtcc

Real-time computer complex (RTCC) trajectory toolkit: conic and precision state vector propagation
about the Earth and the Moon, Lambert rendezvous targeting, deorbit/entry targeting, lunar descent
planning (LDPP), REFSMMAT computation, multi-frame conversions and vehicle ephemeris interpolation.

Every solver is a pure, synchronous function of a [`md::MissionContext`] and its inputs: there is no
global mission state, and every iteration loop is capped.
*/

/// Provides the conic and precision (Encke) propagators.
pub mod propagators;

/// Provides the state vectors, bodies, reference frames and their conversions, and the lunar/solar ephemeris sources.
pub mod cosmic;

/// Vehicle ephemeris tables and their interpolation.
pub mod ephemeris;

/// Utility functions shared by different modules, and which may be useful to engineers.
pub mod utils;

mod errors;
/// The RTCC will never panic and functions which may fail will return an error.
pub use self::errors::{ErrorKind, TargetingError};

/// Configuration of the system parameters (body constants, solver caps and tolerances).
pub mod io;

/// All of the mission design tools: Lambert targeting, entry targeting, LDPP and REFSMMAT.
pub mod md;

/// Simple tools (e.g. Lambert solver)
pub mod tools;

#[macro_use]
extern crate log;
extern crate hifitime;
extern crate nalgebra as na;

/// Re-export of hifitime
pub mod time {
    pub use hifitime::*;
}

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}

/// Re-export some useful things
pub use self::cosmic::{Body, CoordinateSystem, StateVector, TimeTagged};
pub use self::md::MissionContext;
