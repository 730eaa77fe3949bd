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

use super::STD_GRAVITY;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// The narrow view of a vehicle needed by the targeting solvers.
pub trait Vehicle: fmt::Debug {
    /// Current total mass, in kilograms
    fn mass_kg(&self) -> f64;
    /// Thrust of the engine used for the maneuver, in Newtons
    #[allow(non_snake_case)]
    fn thrust_N(&self) -> f64;
    /// Specific impulse of that engine, in seconds
    fn isp_s(&self) -> f64;

    /// Exhaust velocity in kilometers per second
    fn exhaust_velocity_km_s(&self) -> f64 {
        self.isp_s() * STD_GRAVITY * 1e-3
    }

    /// Thrust acceleration at the current mass, in kilometers per second squared
    fn acceleration_km_s2(&self) -> f64 {
        self.thrust_N() / self.mass_kg() * 1e-3
    }

    /// Finite burn duration for the provided velocity change, in seconds (rocket equation)
    fn burn_duration_s(&self, dv_km_s: f64) -> f64 {
        let ve = self.exhaust_velocity_km_s();
        let mass_flow_kg_s = self.thrust_N() * 1e-3 / ve;
        self.mass_kg() * (1.0 - (-dv_km_s.abs() / ve).exp()) / mass_flow_kg_s
    }

    /// Mass after the provided velocity change, in kilograms
    fn mass_after_kg(&self, dv_km_s: f64) -> f64 {
        self.mass_kg() * (-dv_km_s.abs() / self.exhaust_velocity_km_s()).exp()
    }
}

/// Defines a thruster with a maximum isp and a maximum thrust.
#[allow(non_snake_case)]
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thruster {
    /// The thrust is to be provided in Newtons
    pub thrust_N: f64,
    /// The Isp is to be provided in seconds
    pub isp_s: f64,
}

impl Thruster {
    /// Returns the exhaust velocity v_e in meters per second
    pub fn exhaust_velocity_m_s(&self) -> f64 {
        self.isp_s * STD_GRAVITY
    }

    /// Apollo service propulsion system
    pub fn sps() -> Self {
        Self {
            thrust_N: 91_188.5,
            isp_s: 314.0,
        }
    }

    /// Lunar module descent propulsion system at full throttle
    pub fn dps() -> Self {
        Self {
            thrust_N: 43_192.4,
            isp_s: 305.0,
        }
    }
}

/// A vehicle described by its mass and a single thruster.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleConfig {
    pub mass_kg: f64,
    pub thruster: Thruster,
}

impl Vehicle for VehicleConfig {
    fn mass_kg(&self) -> f64 {
        self.mass_kg
    }

    fn thrust_N(&self) -> f64 {
        self.thruster.thrust_N
    }

    fn isp_s(&self) -> f64 {
        self.thruster.isp_s
    }
}
