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

use crate::cosmic::Body;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_derive::{Deserialize, Serialize};
use snafu::prelude::*;
use std::fmt::Debug;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("failed to read configuration file: {source}"))]
    ReadError { source: std::io::Error },
    #[snafu(display("failed to parse YAML configuration file: {source}"))]
    ParseError { source: serde_yaml::Error },
    #[snafu(display("invalid configuration: {msg}"))]
    InvalidConfig { msg: String },
}

impl PartialEq for ConfigError {
    /// No two configuration errors match
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

pub trait ConfigRepr: Debug + Sized + Serialize + DeserializeOwned {
    /// Builds the configuration representation from the path to a yaml
    fn load<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path).context(ReadSnafu)?;
        let reader = BufReader::new(file);

        serde_yaml::from_reader(reader).context(ParseSnafu)
    }

    /// Builds a sequence of "Selves" from the provided path to a yaml
    fn load_many<P>(path: P) -> Result<Vec<Self>, ConfigError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path).context(ReadSnafu)?;
        let reader = BufReader::new(file);

        serde_yaml::from_reader(reader).context(ParseSnafu)
    }

    /// Builds "Self" from the provided string of a yaml
    fn loads(data: &str) -> Result<Self, ConfigError> {
        debug!("Loading YAML:\n{data}");
        serde_yaml::from_str(data).context(ParseSnafu)
    }

    /// Builds a sequence of "Selves" from the provided string of a yaml
    fn loads_many(data: &str) -> Result<Vec<Self>, ConfigError> {
        debug!("Loading YAML:\n{data}");
        serde_yaml::from_str(data).context(ParseSnafu)
    }
}

/// Gravitational and rotational constants of a central body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodyConstants {
    pub gm_km3_s2: f64,
    /// Mean equatorial radius used for altitudes and for the zonal harmonics
    pub radius_km: f64,
    /// Zonal harmonics, starting at J2
    pub zonals: Vec<f64>,
    pub rotation_rate_rad_s: f64,
}

impl BodyConstants {
    pub fn earth() -> Self {
        Self {
            gm_km3_s2: 398_603.2,
            radius_km: 6_373.338,
            zonals: vec![1_082.6269e-6, -2.51e-6, -1.60e-6],
            rotation_rate_rad_s: 7.292_115_146_67e-5,
        }
    }

    pub fn moon() -> Self {
        Self {
            gm_km3_s2: 4_902.778,
            radius_km: 1_738.09,
            zonals: vec![207.108e-6],
            rotation_rate_rad_s: 2.661_699_489_7e-6,
        }
    }
}

/// Settings of the vehicle ephemeris interpolator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EphemerisConfig {
    /// How far beyond the ends of a table an extrapolation may go, in seconds
    pub extrapolation_margin_s: f64,
    /// Interpolation order used when a caller does not request one
    pub default_order: usize,
}

impl Default for EphemerisConfig {
    fn default() -> Self {
        Self {
            extrapolation_margin_s: 4.0 * 3600.0,
            default_order: 8,
        }
    }
}

/// Iteration caps and tolerances of every iterative solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub kepler_max_iterations: usize,
    pub lambert_max_iterations: usize,
    pub lambert_tof_tolerance_s: f64,
    pub perturbed_lambert_max_iterations: usize,
    pub perturbed_lambert_tolerance_km: f64,
    pub burn_slip_max_iterations: usize,
    pub burn_slip_tolerance_s: f64,
    pub stop_condition_max_iterations: usize,
    pub radius_tolerance_km: f64,
    pub entry_max_iterations: usize,
    pub entry_longitude_tolerance_deg: f64,
    pub ldpp_angle_tolerance_deg: f64,
    pub ldpp_time_tolerance_s: f64,
    pub ldpp_lltpr_max_iterations: usize,
    pub ldpp_max_iterations: usize,
    pub ldpp_max_transitions: usize,
    pub longitude_search_max_iterations: usize,
    pub longitude_search_tolerance_rad: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            kepler_max_iterations: 50,
            lambert_max_iterations: 200,
            lambert_tof_tolerance_s: 1e-6,
            perturbed_lambert_max_iterations: 20,
            perturbed_lambert_tolerance_km: 1e-4,
            burn_slip_max_iterations: 15,
            burn_slip_tolerance_s: 0.01,
            stop_condition_max_iterations: 20,
            radius_tolerance_km: 1e-4,
            entry_max_iterations: 20,
            entry_longitude_tolerance_deg: 0.001,
            ldpp_angle_tolerance_deg: 0.001,
            ldpp_time_tolerance_s: 0.01,
            ldpp_lltpr_max_iterations: 15,
            ldpp_max_iterations: 20,
            ldpp_max_transitions: 64,
            longitude_search_max_iterations: 30,
            longitude_search_tolerance_rad: 1e-4,
        }
    }
}

/// All of the constants and tunables shared by the solvers of one mission calculation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemParameters {
    pub earth: BodyConstants,
    pub moon: BodyConstants,
    pub sun_gm_km3_s2: f64,
    /// Radius of the lunar sphere of influence
    pub lunar_soi_km: f64,
    pub ephemeris: EphemerisConfig,
    pub solver: SolverConfig,
}

impl SystemParameters {
    /// Returns the constants of the provided body
    pub fn body(&self, body: Body) -> &BodyConstants {
        match body {
            Body::Earth => &self.earth,
            Body::Moon => &self.moon,
        }
    }

    /// Returns the gravitational parameter of the provided body
    pub fn gm(&self, body: Body) -> f64 {
        self.body(body).gm_km3_s2
    }

    /// Ensures that the parameters are physically meaningful
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, body) in [("earth", &self.earth), ("moon", &self.moon)] {
            ensure!(
                body.gm_km3_s2 > 0.0 && body.radius_km > 0.0,
                InvalidConfigSnafu {
                    msg: format!("{name} GM and radius must be positive")
                }
            );
        }
        ensure!(
            self.ephemeris.default_order >= 1 && self.ephemeris.default_order <= 8,
            InvalidConfigSnafu {
                msg: format!(
                    "interpolation order must be in 1..=8, got {}",
                    self.ephemeris.default_order
                )
            }
        );
        ensure!(
            self.ephemeris.extrapolation_margin_s >= 0.0,
            InvalidConfigSnafu {
                msg: "extrapolation margin must be positive".to_string()
            }
        );
        Ok(())
    }
}

impl Default for SystemParameters {
    fn default() -> Self {
        Self {
            earth: BodyConstants::earth(),
            moon: BodyConstants::moon(),
            sun_gm_km3_s2: 1.327_124_400_18e11,
            lunar_soi_km: 64_373.76,
            ephemeris: EphemerisConfig::default(),
            solver: SolverConfig::default(),
        }
    }
}

impl ConfigRepr for SystemParameters {}
