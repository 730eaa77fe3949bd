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

mod context;
pub use context::*;

/// Impulsive and finite maneuvers, and the burn time slip of finite burns.
pub mod maneuver;

/// Rendezvous targeting with the conic, perturbed and X-axis Lambert solvers.
pub mod targeting;

/// Deorbit targeting to a landing longitude.
pub mod entry;

/// Lunar descent planning processor.
pub mod ldpp;

pub mod refsmmat;

pub use entry::{entry_targeting, EntryOptions, EntrySolution};
pub use ldpp::{ldpp, LdppMode, LdppOptions, LdppSolution};
pub use maneuver::{EngineModel, Maneuver};
pub use refsmmat::{compute_refsmmat, Refsmmat, RefsmmatOption};
pub use targeting::{lambert_targeting, LambertOptions, LambertSolution};
