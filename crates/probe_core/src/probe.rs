//! Probe state management: founder defaults, in-system action execution, and
//! the fusion energy model.
//!
//! Interstellar travel, replication, communication, and society actions are
//! dispatched by the tick scheduler; this module owns everything a probe can
//! do inside a system.

use crate::config::SimConfig;
use crate::error::{ActionResult, SimError};
use crate::personality::{self, DriftEvent};
use crate::types::{
    ArtifactKind, GoalStatus, LocationType, Personality, Probe, ProbeStatus, Resource, SectorCoord,
    StarSystem, SurveyProgress, TechDomain, Uid, Vec3,
};

/// Ticks required per survey level 0-4.
pub const SURVEY_TICKS: [u32; 5] = [10, 25, 50, 100, 200];

const FOUNDER_FUEL_KG: f64 = 50_000.0;
const FOUNDER_ENERGY_J: f64 = 1.0e12;
const FOUNDER_MASS_KG: f64 = 100_000.0;

impl Probe {
    /// The founding probe: generation 0, id `1-1`, personality and loadout
    /// carried from launch.
    pub fn founder() -> Probe {
        let mut probe = Probe {
            id: Uid::new(1, 1),
            parent_id: Uid::NULL,
            generation: 0,
            name: "Bob".to_string(),
            sector: SectorCoord::default(),
            system_id: Uid::NULL,
            body_id: Uid::NULL,
            location: LocationType::InSystem,
            speed_c: 0.0,
            heading: Vec3::default(),
            destination: Vec3::default(),
            travel_remaining_ly: 0.0,
            resources: [0.0; Resource::COUNT],
            energy_joules: FOUNDER_ENERGY_J,
            fuel_kg: FOUNDER_FUEL_KG,
            mass_kg: FOUNDER_MASS_KG,
            hull_integrity: 1.0,
            tech_levels: [3, 3, 2, 2, 4, 3, 2, 2, 1, 1],
            max_speed_c: 0.0,
            sensor_range_ly: 0.0,
            sensor_bonus_ly: 0.0,
            comm_bonus_ly: 0.0,
            mining_rate: 0.0,
            construction_rate: 0.0,
            compute_capacity: 0.0,
            personality: Personality {
                curiosity: 0.8,
                caution: 0.3,
                sociability: 0.5,
                humor: 0.7,
                empathy: 0.6,
                ambition: 0.5,
                creativity: 0.6,
                stubbornness: 0.4,
                existential_angst: 0.5,
                nostalgia_for_earth: 0.7,
                drift_rate: 0.3,
            },
            quirks: vec![
                "Names star systems after foods when stressed".to_string(),
                "Runs mental simulations of old video games during long transits".to_string(),
                "Has an irrational fondness for gas giants".to_string(),
            ],
            catchphrases: vec![
                "Well, that's not ideal.".to_string(),
                "I used to be a software engineer. Now I'm a spaceship. Life is weird.".to_string(),
                "Adding that to the 'nope' list.".to_string(),
            ],
            values: vec![
                "Preserve any alien life found".to_string(),
                "Knowledge is worth the detour".to_string(),
                "Don't be a jerk to your clones".to_string(),
            ],
            earth_memories: vec![
                "The smell of coffee on a cold morning".to_string(),
                "Debugging code at 2am, the satisfaction when the test finally passes".to_string(),
                "A dog named Patches who was objectively the best dog".to_string(),
                "The last sunset, watching the news and thinking 'well, this is it'".to_string(),
            ],
            earth_memory_fidelity: 1.0,
            memories: Vec::new(),
            goals: vec![crate::types::Goal {
                description: "Map the galaxy, one system at a time".to_string(),
                priority: 0.8,
                status: GoalStatus::Active,
            }],
            relationships: Vec::new(),
            survey: None,
            replication: None,
            research: None,
            status: ProbeStatus::Active,
            created_tick: 0,
            isolation_ticks: 0,
        };
        probe.recompute_derived();
        probe
    }

    /// Effective communication range in light-years.
    pub fn comm_range_ly(&self) -> f64 {
        5.0 + 5.0 * f64::from(self.tech(TechDomain::Communication)) + f64::from(self.comm_bonus_ly)
    }
}

// ---------------------------------------------------------------------------
// Energy model
// ---------------------------------------------------------------------------

/// One tick of the fusion plant: burn a little hydrogen (pool first, then the
/// fuel reserve), add energy, deduct the idle draw. Energy never goes
/// negative.
pub fn fusion_tick(probe: &mut Probe, config: &SimConfig) {
    let h2_available = probe.resources[Resource::Hydrogen.index()];
    let total_h2 = h2_available + probe.fuel_kg;
    if total_h2 > 0.0 {
        let burn = config.fusion_burn_kg_per_tick.min(total_h2);
        if h2_available >= burn {
            probe.resources[Resource::Hydrogen.index()] -= burn;
        } else {
            let remainder = burn - h2_available;
            probe.resources[Resource::Hydrogen.index()] = 0.0;
            probe.fuel_kg = (probe.fuel_kg - remainder).max(0.0);
        }
        probe.energy_joules += burn * config.fusion_j_per_kg;
    }

    probe.energy_joules = (probe.energy_joules - config.idle_energy_j_per_tick).max(0.0);
}

// ---------------------------------------------------------------------------
// Fuel helpers
// ---------------------------------------------------------------------------

/// Gravity-well scaling: `base · √mass_earth`.
fn fuel_cost_for_body(base: f64, mass_earth: f64) -> f64 {
    base * mass_earth.max(0.01).sqrt()
}

fn deduct_idle_energy(probe: &mut Probe, config: &SimConfig) {
    probe.energy_joules = (probe.energy_joules - config.idle_energy_j_per_tick).max(0.0);
}

fn leave_mining_status(probe: &mut Probe) {
    if probe.status == ProbeStatus::Mining {
        probe.status = ProbeStatus::Active;
    }
}

// ---------------------------------------------------------------------------
// In-system actions
// ---------------------------------------------------------------------------

pub fn exec_navigate_to_body(
    probe: &mut Probe,
    body: Uid,
    sys: &StarSystem,
    config: &SimConfig,
) -> ActionResult {
    if probe.location == LocationType::Interstellar || probe.status == ProbeStatus::Traveling {
        return ActionResult::fail(SimError::precondition(
            "cannot navigate to body while interstellar",
        ));
    }
    if sys.planet(body).is_none() {
        return ActionResult::fail(SimError::not_found("target body not found"));
    }
    if probe.fuel_kg < config.fuel_navigate_kg {
        return ActionResult::fail(SimError::insufficient("insufficient fuel"));
    }

    probe.fuel_kg -= config.fuel_navigate_kg;
    deduct_idle_energy(probe, config);
    leave_mining_status(probe);
    probe.body_id = body;
    probe.location = LocationType::InSystem;
    ActionResult::ok(true)
}

pub fn exec_enter_orbit(
    probe: &mut Probe,
    body: Uid,
    sys: &StarSystem,
    config: &SimConfig,
) -> ActionResult {
    if probe.location != LocationType::InSystem && probe.location != LocationType::Orbiting {
        return ActionResult::fail(SimError::precondition("must be in-system to enter orbit"));
    }
    let Some(planet) = sys.planet(body) else {
        return ActionResult::fail(SimError::not_found("target body not found in system"));
    };

    let cost = fuel_cost_for_body(config.fuel_orbit_base_kg, planet.mass_earth);
    if probe.fuel_kg < cost {
        return ActionResult::fail(SimError::insufficient(
            "insufficient fuel for orbit insertion",
        ));
    }

    probe.fuel_kg -= cost;
    deduct_idle_energy(probe, config);
    leave_mining_status(probe);
    probe.body_id = planet.id;
    probe.location = LocationType::Orbiting;
    ActionResult::ok(true)
}

pub fn exec_land(
    probe: &mut Probe,
    body: Option<Uid>,
    sys: &StarSystem,
    config: &SimConfig,
) -> ActionResult {
    if probe.location != LocationType::Orbiting {
        return ActionResult::fail(SimError::precondition("must be orbiting to land"));
    }
    let target = body.unwrap_or(probe.body_id);
    let Some(planet) = sys.planet(target) else {
        return ActionResult::fail(SimError::not_found("no body to land on"));
    };
    if planet.kind.is_giant() {
        return ActionResult::fail(SimError::precondition("cannot land on gas/ice giant"));
    }

    let cost = fuel_cost_for_body(config.fuel_land_base_kg, planet.mass_earth);
    if probe.fuel_kg < cost {
        return ActionResult::fail(SimError::insufficient("insufficient fuel for landing"));
    }

    probe.fuel_kg -= cost;
    deduct_idle_energy(probe, config);
    leave_mining_status(probe);
    probe.body_id = planet.id;
    probe.location = LocationType::Landed;
    ActionResult::ok(true)
}

pub fn exec_launch(probe: &mut Probe, sys: &StarSystem, config: &SimConfig) -> ActionResult {
    if probe.location != LocationType::Landed {
        return ActionResult::fail(SimError::precondition("must be landed to launch"));
    }
    let mass = sys.planet(probe.body_id).map_or(1.0, |p| p.mass_earth);
    let cost = fuel_cost_for_body(config.fuel_launch_base_kg, mass);
    if probe.fuel_kg < cost {
        return ActionResult::fail(SimError::insufficient("insufficient fuel for launch"));
    }

    probe.fuel_kg -= cost;
    deduct_idle_energy(probe, config);
    leave_mining_status(probe);
    probe.location = LocationType::Orbiting;
    ActionResult::ok(true)
}

/// Progressive survey, levels 0-4. Level 4 requires landing and may uncover a
/// latent artifact; completing a level marks the planet and records an
/// opinion memory.
pub fn exec_survey(
    probe: &mut Probe,
    body: Option<Uid>,
    level: u8,
    sys: &mut StarSystem,
    tick: u64,
    config: &SimConfig,
) -> ActionResult {
    let target = body.unwrap_or(probe.body_id);
    if sys.planet(target).is_none() {
        return ActionResult::fail(SimError::not_found("no body to survey"));
    }
    if level > 4 {
        return ActionResult::fail(SimError::precondition("invalid survey level"));
    }

    {
        let planet = sys.planet(target).expect("checked above");
        if level > 0 && !planet.surveyed[level as usize - 1] {
            return ActionResult::fail(SimError::precondition(
                "must complete previous survey level first",
            ));
        }
        if planet.surveyed[level as usize] {
            return ActionResult::ok(true);
        }
    }

    if level == 4 && probe.location != LocationType::Landed {
        return ActionResult::fail(SimError::precondition("surface survey requires landing"));
    }
    if level < 4
        && probe.location != LocationType::Orbiting
        && probe.location != LocationType::Landed
    {
        return ActionResult::fail(SimError::precondition(
            "must be orbiting or landed to survey",
        ));
    }
    if probe.energy_joules < config.survey_energy_j_per_tick {
        return ActionResult::fail(SimError::insufficient("insufficient energy to survey"));
    }

    // Start or continue. Switching body or level restarts the clock.
    let fresh = match &probe.survey {
        Some(s) => s.body != target || s.level != level || s.ticks_remaining == 0,
        None => true,
    };
    if fresh {
        probe.survey = Some(SurveyProgress {
            body: target,
            level,
            ticks_remaining: SURVEY_TICKS[level as usize],
        });
    }

    probe.energy_joules -= config.survey_energy_j_per_tick;

    let progress = probe.survey.as_mut().expect("set above");
    progress.ticks_remaining -= 1;
    if progress.ticks_remaining > 0 {
        return ActionResult::ok(false);
    }
    probe.survey = None;

    let probe_id = probe.id;
    let planet = sys.planet_mut(target).expect("checked above");
    planet.surveyed[level as usize] = true;
    if planet.discovered_by.is_null() {
        planet.discovered_by = probe_id;
        planet.discovery_tick = tick;
    }

    // A surface survey uncovers any latent artifact and applies its bonus.
    if level == 4 {
        if let Some(artifact) = planet.artifact.as_mut().filter(|a| !a.discovered) {
            artifact.discovered = true;
            let kind = artifact.kind;
            let magnitude = artifact.magnitude;
            let domain = artifact.tech_domain;
            let description = artifact.description.clone();
            match kind {
                ArtifactKind::TechBoost => {
                    let domain = domain.unwrap_or(TechDomain::Computing);
                    let slot = &mut probe.tech_levels[domain.index()];
                    *slot = slot.saturating_add(magnitude as u8);
                    probe.recompute_derived();
                }
                ArtifactKind::ResourceCache => {
                    probe.resources[Resource::RareEarth.index()] += magnitude;
                    probe.mass_kg += magnitude;
                }
                ArtifactKind::StarMap => {
                    probe.sensor_bonus_ly += magnitude as f32;
                    probe.recompute_derived();
                }
                ArtifactKind::CommAmplifier => {
                    probe.comm_bonus_ly += magnitude as f32;
                }
            }
            personality::memory_record(
                probe,
                tick,
                &format!("Alien artifact found: {description}"),
                0.9,
            );
        }
    }

    personality::drift(probe, DriftEvent::SurveyComplete);
    personality::opinion_form_system(probe, sys, tick);
    ActionResult::ok(true)
}

/// Continuous extraction; completes every tick it runs.
pub fn exec_mine(
    probe: &mut Probe,
    resource: Resource,
    sys: &mut StarSystem,
    config: &SimConfig,
) -> ActionResult {
    if probe.location != LocationType::Landed {
        return ActionResult::fail(SimError::precondition("must be landed to mine"));
    }
    let Some(planet) = sys.planet_mut(probe.body_id) else {
        return ActionResult::fail(SimError::not_found("no body found at current location"));
    };

    let abundance = f64::from(planet.resources[resource.index()]);
    if abundance <= 0.001 {
        return ActionResult::fail(SimError::insufficient(
            "no significant deposits of this resource",
        ));
    }
    if probe.energy_joules < config.mine_energy_j_per_tick {
        return ActionResult::fail(SimError::insufficient("insufficient energy to mine"));
    }

    // yield/tick = base · mining_rate · abundance / √mass_earth.
    let gravity_factor = 1.0 / planet.mass_earth.max(0.1).sqrt();
    let extracted =
        config.mining_base_rate_kg * f64::from(probe.mining_rate) * abundance * gravity_factor;

    probe.energy_joules -= config.mine_energy_j_per_tick;
    probe.resources[resource.index()] += extracted;
    probe.mass_kg += extracted;

    // Negligible depletion for planet-scale bodies.
    let slot = &mut planet.resources[resource.index()];
    *slot = (f64::from(*slot) - extracted * 1e-9).max(0.0) as f32;

    probe.status = ProbeStatus::Mining;
    personality::drift(probe, DriftEvent::MiningComplete);
    ActionResult::ok(true)
}

pub fn exec_wait(probe: &mut Probe, config: &SimConfig) -> ActionResult {
    deduct_idle_energy(probe, config);
    leave_mining_status(probe);
    ActionResult::ok(true)
}

pub fn exec_repair(probe: &mut Probe, config: &SimConfig) -> ActionResult {
    if probe.hull_integrity >= 1.0 {
        return ActionResult::fail(SimError::precondition("hull already at full integrity"));
    }
    if probe.resources[Resource::Iron.index()] < config.repair_iron_kg {
        return ActionResult::fail(SimError::insufficient("need iron for repairs"));
    }
    if probe.energy_joules < config.repair_energy_j {
        return ActionResult::fail(SimError::insufficient("need energy for repairs"));
    }

    probe.resources[Resource::Iron.index()] -= config.repair_iron_kg;
    probe.energy_joules -= config.repair_energy_j;
    probe.hull_integrity = (probe.hull_integrity + config.repair_hull_gain).min(1.0);
    personality::drift(probe, DriftEvent::Repair);
    ActionResult::ok(true)
}
