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

use crate::cosmic::{AstroError, StateVector};
use crate::errors::ErrorKind;
use crate::time::Epoch;
use snafu::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

mod interpolation;
pub use interpolation::*;

mod search;
pub use search::*;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InterpolationError {
    #[snafu(display("{epoch} is outside of the ephemeris [{start}; {end}] and its extrapolation margin"))]
    OutOfRange {
        epoch: Epoch,
        start: Epoch,
        end: Epoch,
    },
    #[snafu(display("interpolation order must be within 1 and 8, got {order}"))]
    InvalidOrder { order: usize },
    #[snafu(display("interpolation requires at least two samples, {count} available"))]
    TooFewSamples { count: usize },
    #[snafu(display("interpolation window at {epoch} spans inconsistent central bodies or frames"))]
    ReferenceBodyMismatch { epoch: Epoch },
    #[snafu(display("ephemeris samples must be strictly increasing in time, not at {epoch}"))]
    NonMonotonic { epoch: Epoch },
    #[snafu(display("invalid discontinuity window starting at {start}"))]
    InvalidWindow { start: Epoch },
    #[snafu(display("longitude crossing search did not converge after {iterations} iterations"))]
    LongitudeNotConverged { iterations: usize },
    #[snafu(display("no longitude crossing in the ephemeris after {after}"))]
    NoCrossing { after: Epoch },
    #[snafu(display("longitude crossing search failed because {source}"))]
    LongitudeConversion { source: AstroError },
}

impl InterpolationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::ReferenceBodyMismatch { .. } => ErrorKind::ReferenceBodyMismatch,
            Self::LongitudeNotConverged { .. } => ErrorKind::NotConverged,
            Self::NoCrossing { .. } => ErrorKind::NoSolution,
            Self::LongitudeConversion { source } => source.kind(),
            Self::InvalidOrder { .. }
            | Self::TooFewSamples { .. }
            | Self::NonMonotonic { .. }
            | Self::InvalidWindow { .. } => ErrorKind::InvalidInput,
        }
    }
}

/// Ignition and cutoff of a maneuver stored in an ephemeris: the trajectory is not smooth across it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ManeuverWindow {
    pub ignition: Epoch,
    pub cutoff: Epoch,
}

/// Time spent on the lunar surface, between landing and liftoff.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LunarStay {
    pub landing: Epoch,
    pub liftoff: Epoch,
}

/// Time ordered state vectors of one vehicle.
///
/// A table is immutable once built: the mission calculation layer replaces it wholesale through an
/// [`EphemerisStore`], which bumps its update number.
#[derive(Clone, Debug, PartialEq)]
pub struct EphemerisTable {
    vehicle: String,
    samples: Vec<StateVector>,
    maneuvers: Vec<ManeuverWindow>,
    lunar_stay: Option<LunarStay>,
    update: u32,
}

impl EphemerisTable {
    /// Builds a table from samples which must be strictly increasing in time.
    pub fn new(vehicle: &str, samples: Vec<StateVector>) -> Result<Self, InterpolationError> {
        ensure!(
            !samples.is_empty(),
            TooFewSamplesSnafu { count: 0_usize }
        );
        for pair in samples.windows(2) {
            ensure!(
                pair[1].epoch > pair[0].epoch,
                NonMonotonicSnafu {
                    epoch: pair[1].epoch
                }
            );
        }
        Ok(Self {
            vehicle: vehicle.to_string(),
            samples,
            maneuvers: Vec::new(),
            lunar_stay: None,
            update: 0,
        })
    }

    /// Adds the maneuver windows, which are sorted by ignition.
    pub fn with_maneuvers(mut self, mut windows: Vec<ManeuverWindow>) -> Result<Self, InterpolationError> {
        for window in &windows {
            ensure!(
                window.cutoff >= window.ignition,
                InvalidWindowSnafu {
                    start: window.ignition
                }
            );
        }
        windows.sort_by_key(|w| w.ignition);
        self.maneuvers = windows;
        Ok(self)
    }

    pub fn with_lunar_stay(mut self, stay: LunarStay) -> Result<Self, InterpolationError> {
        ensure!(
            stay.liftoff >= stay.landing,
            InvalidWindowSnafu {
                start: stay.landing
            }
        );
        self.lunar_stay = Some(stay);
        Ok(self)
    }

    pub fn vehicle(&self) -> &str {
        &self.vehicle
    }

    /// T_L, the epoch of the first sample
    pub fn start(&self) -> Epoch {
        self.samples[0].epoch
    }

    /// T_R, the epoch of the last sample
    pub fn end(&self) -> Epoch {
        self.samples[self.samples.len() - 1].epoch
    }

    pub fn samples(&self) -> &[StateVector] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn maneuvers(&self) -> &[ManeuverWindow] {
        &self.maneuvers
    }

    pub fn lunar_stay(&self) -> Option<LunarStay> {
        self.lunar_stay
    }

    /// Number of times this vehicle's ephemeris was replaced before this table
    pub fn update_number(&self) -> u32 {
        self.update
    }

    /// Returns the samples within [start; end], inclusive, found by binary search.
    pub fn fetch(&self, start: Epoch, end: Epoch) -> &[StateVector] {
        let first = self.samples.partition_point(|s| s.epoch < start);
        let last = self.samples.partition_point(|s| s.epoch <= end);
        if first >= last {
            &[]
        } else {
            &self.samples[first..last]
        }
    }
}

impl fmt::Display for EphemerisTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} ephemeris #{}: {} samples from {} to {}, {} maneuver(s)",
            self.vehicle,
            self.update,
            self.samples.len(),
            self.start(),
            self.end(),
            self.maneuvers.len()
        )
    }
}

/// Holds the current ephemeris of each vehicle and hands out immutable snapshots.
#[derive(Clone, Debug, Default)]
pub struct EphemerisStore {
    tables: HashMap<String, Arc<EphemerisTable>>,
}

impl EphemerisStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the table of its vehicle, returning the new update number.
    pub fn replace(&mut self, mut table: EphemerisTable) -> u32 {
        table.update = self
            .tables
            .get(&table.vehicle)
            .map(|prev| prev.update + 1)
            .unwrap_or(0);
        let update = table.update;
        debug!("replacing {}", table);
        self.tables.insert(table.vehicle.clone(), Arc::new(table));
        update
    }

    /// Returns the current table of the vehicle.
    pub fn snapshot(&self, vehicle: &str) -> Option<Arc<EphemerisTable>> {
        self.tables.get(vehicle).cloned()
    }

    /// Returns whether this snapshot is still the current table of its vehicle.
    pub fn is_current(&self, snapshot: &EphemerisTable) -> bool {
        self.tables
            .get(&snapshot.vehicle)
            .map(|cur| cur.update == snapshot.update)
            .unwrap_or(false)
    }
}
