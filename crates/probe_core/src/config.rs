//! Simulation tuning constants.
//!
//! Every magnitude the design notes call a tuning parameter lives here rather
//! than at its use site, and can be overridden at runtime through the pipe
//! protocol's `config` command.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    // Fusion plant: hydrogen mass burned per tick and its yield. The yield is
    // a fraction of mc² — a tuning constant, deliberately not hard-coded.
    pub fusion_j_per_kg: f64,
    pub fusion_burn_kg_per_tick: f64,

    // Energy costs (joules).
    pub idle_energy_j_per_tick: f64,
    pub survey_energy_j_per_tick: f64,
    pub mine_energy_j_per_tick: f64,
    pub repair_energy_j: f64,
    pub message_energy_j: f64,
    pub broadcast_energy_j: f64,

    // Repair.
    pub repair_iron_kg: f64,
    pub repair_hull_gain: f32,

    // Mining.
    pub mining_base_rate_kg: f64,

    // Fuel costs (kg, scaled by √mass for maneuvers against a gravity well).
    pub fuel_orbit_base_kg: f64,
    pub fuel_land_base_kg: f64,
    pub fuel_launch_base_kg: f64,
    pub fuel_navigate_kg: f64,

    // Interstellar travel.
    pub fuel_burn_per_ly_kg: f64,
    pub min_travel_fuel_kg: f64,
    pub micrometeorite_chance: f64,
    pub micrometeorite_damage: f32,

    // Event roll frequencies (per probe per tick).
    pub freq_discovery: f64,
    pub freq_anomaly: f64,
    pub freq_hazard: f64,
    pub freq_encounter: f64,
    pub freq_crisis: f64,
    pub freq_wonder: f64,

    // Rolled hazards strike after a short warning window.
    pub hazard_warning_ticks: u64,

    // Society.
    pub trade_transit_ticks: u64,
    pub relay_range_ly: f64,

    // Metrics sampling.
    pub metrics_interval_ticks: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fusion_j_per_kg: 6.3e14,
            fusion_burn_kg_per_tick: 0.001,
            idle_energy_j_per_tick: 1.0e6,
            survey_energy_j_per_tick: 1.0e8,
            mine_energy_j_per_tick: 5.0e8,
            repair_energy_j: 1.0e9,
            message_energy_j: 1000.0,
            broadcast_energy_j: 10_000.0,
            repair_iron_kg: 10.0,
            repair_hull_gain: 0.05,
            mining_base_rate_kg: 10.0,
            fuel_orbit_base_kg: 5.0,
            fuel_land_base_kg: 10.0,
            fuel_launch_base_kg: 15.0,
            fuel_navigate_kg: 2.0,
            fuel_burn_per_ly_kg: 0.5,
            min_travel_fuel_kg: 10.0,
            micrometeorite_chance: 5.0e-4,
            micrometeorite_damage: 0.005,
            freq_discovery: 0.005,
            freq_anomaly: 0.001,
            freq_hazard: 0.002,
            freq_encounter: 0.0002,
            freq_crisis: 0.000_05,
            freq_wonder: 0.0003,
            hazard_warning_ticks: 3,
            trade_transit_ticks: 100,
            relay_range_ly: 20.0,
            metrics_interval_ticks: 10,
        }
    }
}

impl SimConfig {
    /// Apply a single named override. Returns false for unknown keys.
    #[allow(clippy::too_many_lines)]
    pub fn apply(&mut self, key: &str, value: f64) -> bool {
        match key {
            "fusion_j_per_kg" => self.fusion_j_per_kg = value,
            "fusion_burn_kg_per_tick" => self.fusion_burn_kg_per_tick = value,
            "idle_energy_j_per_tick" => self.idle_energy_j_per_tick = value,
            "survey_energy_j_per_tick" => self.survey_energy_j_per_tick = value,
            "mine_energy_j_per_tick" => self.mine_energy_j_per_tick = value,
            "repair_energy_j" => self.repair_energy_j = value,
            "message_energy_j" => self.message_energy_j = value,
            "broadcast_energy_j" => self.broadcast_energy_j = value,
            "repair_iron_kg" => self.repair_iron_kg = value,
            "repair_hull_gain" => self.repair_hull_gain = value as f32,
            "mining_base_rate_kg" => self.mining_base_rate_kg = value,
            "fuel_orbit_base_kg" => self.fuel_orbit_base_kg = value,
            "fuel_land_base_kg" => self.fuel_land_base_kg = value,
            "fuel_launch_base_kg" => self.fuel_launch_base_kg = value,
            "fuel_navigate_kg" => self.fuel_navigate_kg = value,
            "fuel_burn_per_ly_kg" => self.fuel_burn_per_ly_kg = value,
            "min_travel_fuel_kg" => self.min_travel_fuel_kg = value,
            "micrometeorite_chance" => self.micrometeorite_chance = value,
            "micrometeorite_damage" => self.micrometeorite_damage = value as f32,
            "freq_discovery" => self.freq_discovery = value,
            "freq_anomaly" => self.freq_anomaly = value,
            "freq_hazard" => self.freq_hazard = value,
            "freq_encounter" => self.freq_encounter = value,
            "freq_crisis" => self.freq_crisis = value,
            "freq_wonder" => self.freq_wonder = value,
            "hazard_warning_ticks" => self.hazard_warning_ticks = value as u64,
            "trade_transit_ticks" => self.trade_transit_ticks = value as u64,
            "relay_range_ly" => self.relay_range_ly = value,
            "metrics_interval_ticks" => self.metrics_interval_ticks = value.max(1.0) as u64,
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_known_key() {
        let mut config = SimConfig::default();
        assert!(config.apply("freq_hazard", 0.5));
        assert!((config.freq_hazard - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn apply_unknown_key_is_rejected() {
        let mut config = SimConfig::default();
        assert!(!config.apply("no_such_knob", 1.0));
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn metrics_interval_never_zero() {
        let mut config = SimConfig::default();
        config.apply("metrics_interval_ticks", 0.0);
        assert_eq!(config.metrics_interval_ticks, 1);
    }
}
