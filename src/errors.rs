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

use crate::cosmic::ephem::EphemerisError;
use crate::cosmic::AstroError;
use crate::ephemeris::InterpolationError;
use crate::propagators::PropagationError;
use snafu::prelude::*;

/// The five failure families every solver reports, plus invalid caller input.
///
/// All of these are recoverable at the call site.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Epoch outside of an ephemeris or its extrapolation margin
    OutOfRange,
    /// The external lunar/solar ephemeris lookup failed
    EphemerisUnavailable,
    /// The geometry admits no feasible solution
    NoSolution,
    /// An iteration cap was exceeded
    NotConverged,
    /// Inconsistent central bodies or frames
    ReferenceBodyMismatch,
    /// The caller supplied an invalid option or table
    InvalidInput,
}

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TargetingError {
    #[snafu(display("no solution: {msg}"))]
    NoSolution { msg: String },
    #[snafu(display("{solver} did not converge after {iterations} iterations (residual {residual:.3e})"))]
    NotConverged {
        solver: &'static str,
        iterations: usize,
        residual: f64,
    },
    #[snafu(display("maneuver plan is limited to {max} maneuvers"))]
    TooManyManeuvers { max: usize },
    #[snafu(display("invalid option: {msg}"))]
    InvalidOption { msg: String },
    #[snafu(display("targeting failed because {source}"))]
    TargetingPropagation { source: PropagationError },
    #[snafu(display("targeting failed because {source}"))]
    TargetingAstro { source: AstroError },
    #[snafu(display("targeting failed because {source}"))]
    TargetingInterpolation { source: InterpolationError },
    #[snafu(display("targeting failed because {source}"))]
    TargetingEphemeris { source: EphemerisError },
}

impl TargetingError {
    /// Maps this error onto the error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSolution { .. } => ErrorKind::NoSolution,
            Self::NotConverged { .. } => ErrorKind::NotConverged,
            Self::TooManyManeuvers { .. } | Self::InvalidOption { .. } => ErrorKind::InvalidInput,
            Self::TargetingPropagation { source } => source.kind(),
            Self::TargetingAstro { source } => source.kind(),
            Self::TargetingInterpolation { source } => source.kind(),
            Self::TargetingEphemeris { source } => source.kind(),
        }
    }
}

impl From<PropagationError> for TargetingError {
    fn from(source: PropagationError) -> Self {
        Self::TargetingPropagation { source }
    }
}

impl From<AstroError> for TargetingError {
    fn from(source: AstroError) -> Self {
        Self::TargetingAstro { source }
    }
}

impl From<InterpolationError> for TargetingError {
    fn from(source: InterpolationError) -> Self {
        Self::TargetingInterpolation { source }
    }
}
