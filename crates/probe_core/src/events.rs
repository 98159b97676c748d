//! Per-tick event rolls, hazard effects, anomalies, and alien life.
//!
//! Six independent Bernoulli trials per in-system probe per tick. Rolled
//! hazards are queued with a short warning window and strike a few ticks
//! later; injected events apply immediately. Every event couples back into
//! personality drift and episodic memory.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::personality::{self, DriftEvent};
use crate::rng::SimRng;
use crate::types::{Planet, PlanetType, Probe, ProbeStatus, StarSystem, TechDomain, Uid};

// ---------------------------------------------------------------------------
// Event model
// ---------------------------------------------------------------------------

pub const MAX_EVENT_LOG: usize = 4096;
pub const MAX_ANOMALIES: usize = 256;
pub const MAX_CIVILIZATIONS: usize = 128;
const MAX_EVENTS_PER_TICK: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Discovery,
    Anomaly,
    Hazard,
    Encounter,
    Crisis,
    Wonder,
    Message,
    Replication,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    pub event_type: EventType,
    pub subtype: u8,
    pub probe_id: Uid,
    pub system_id: Uid,
    pub tick: u64,
    pub severity: f32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: Uid,
    pub system_id: Uid,
    pub planet_id: Uid,
    pub subtype: u8,
    pub description: String,
    pub discovered_tick: u64,
    pub resolved: bool,
}

/// A rolled hazard waiting out its warning window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingHazard {
    pub probe_id: Uid,
    pub subtype: u8,
    pub severity: f32,
    pub strike_tick: u64,
    pub description: String,
}

// Hazard subtypes.
pub const HAZ_SOLAR_FLARE: u8 = 0;
pub const HAZ_ASTEROID_COLLISION: u8 = 1;
pub const HAZ_RADIATION_BURST: u8 = 2;

const DISCOVERY_DESCS: [&str; 4] = [
    "Detected an unusual mineral deposit with rare isotope signatures",
    "Found a striking geological formation carved by ancient forces",
    "Discovered an ancient impact crater with exposed subsurface layers",
    "Located underground water reserves beneath the surface",
];

const HAZARD_DESCS: [&str; 3] = [
    "Solar flare eruption — intense radiation wave incoming",
    "Asteroid on collision course — evasive action required",
    "Intense radiation burst from nearby stellar remnant",
];

const ANOMALY_DESCS: [&str; 3] = [
    "Detected an unexplained signal — origin unknown, pattern non-natural",
    "Anomalous energy reading — does not match any known physics",
    "Found an artifact of clearly artificial origin — not of probe manufacture",
];

const WONDER_DESCS: [&str; 4] = [
    "Binary sunset — two stars setting in perfect alignment, painting the sky",
    "Distant supernova visible — a star's death illuminating the void",
    "Pulsar beam sweeping past — a cosmic lighthouse in the dark",
    "Nebula glow — ionized gas clouds shimmering with stellar light",
];

const CRISIS_DESCS: [&str; 3] = [
    "Critical system failure — core subsystem malfunction detected",
    "Resource contamination — stored materials degrading unexpectedly",
    "Existential threat detected — unknown force destabilizing local space",
];

const ENCOUNTER_DESC: &str = "Signs of life detected — biological signatures in surface readings";

// ---------------------------------------------------------------------------
// Alien civilizations
// ---------------------------------------------------------------------------

const CIV_PREFIXES: [&str; 16] = [
    "Zar", "Kol", "Vex", "Tho", "Nir", "Pho", "Kel", "Myr", "Ish", "Dro", "Fen", "Gal", "Xen",
    "Lur", "Bri", "Qua",
];
const CIV_SUFFIXES: [&str; 16] = [
    "ani", "oth", "ari", "ene", "umi", "axi", "oni", "eli", "ura", "ite", "oid", "esh", "ynn",
    "ath", "obe", "ica",
];

const CIV_ARTIFACT_DESCS: [&str; 10] = [
    "Crumbling stone monolith with geometric carvings",
    "Metallic structure of unknown alloy, partially buried",
    "Underground chamber with faded wall markings",
    "Dormant beacon emitting faint periodic signals",
    "Fossilized remains of large biological organisms",
    "Ruined settlement with grid-pattern streets",
    "Crystal storage medium containing encoded data",
    "Orbital debris ring from a collapsed space structure",
    "Chemical residue suggesting advanced industrial processes",
    "Warning beacon in an ancient symbolic language",
];

const CULTURAL_TRAITS: [&str; 12] = [
    "collaborative",
    "isolationist",
    "expansionist",
    "spiritual",
    "scientific",
    "artistic",
    "militaristic",
    "agrarian",
    "nomadic",
    "hierarchical",
    "egalitarian",
    "mercantile",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CivTier {
    Microbial,
    Multicellular,
    ComplexEcosystem,
    PreTool,
    ToolUsing,
    PreIndustrial,
    Industrial,
    InformationAge,
    Spacefaring,
    AdvancedSpacefaring,
    PostBiological,
    Extinct,
    Transcended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CivDisposition {
    Unaware,
    Curious,
    Cautious,
    Welcoming,
    Hostile,
    Indifferent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biology {
    Carbon,
    Silicon,
    Ammonia,
    Exotic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CivState {
    Thriving,
    Declining,
    Endangered,
    Extinct,
    Ascending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Civilization {
    pub id: Uid,
    pub name: String,
    pub homeworld_id: Uid,
    pub tier: CivTier,
    pub disposition: CivDisposition,
    pub tech_level: u8,
    pub biology: Biology,
    pub state: CivState,
    pub cultural_traits: Vec<String>,
    pub artifacts: Vec<String>,
    pub discovered_tick: u64,
    pub discovered_by: Uid,
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    pub events: Vec<SimEvent>,
    pub anomalies: Vec<Anomaly>,
    pub civilizations: Vec<Civilization>,
}

impl EventLog {
    pub fn for_probe(&self, probe_id: Uid) -> Vec<&SimEvent> {
        self.events
            .iter()
            .filter(|e| e.probe_id == probe_id)
            .collect()
    }

    pub fn anomalies_in(&self, system_id: Uid) -> Vec<&Anomaly> {
        self.anomalies
            .iter()
            .filter(|a| a.system_id == system_id && !a.resolved)
            .collect()
    }

    pub fn civ_on(&self, planet_id: Uid) -> Option<&Civilization> {
        self.civilizations
            .iter()
            .find(|c| c.homeworld_id == planet_id)
    }

    /// Append to the bounded log; silently drops once full.
    pub fn log(&mut self, event: SimEvent) {
        if self.events.len() < MAX_EVENT_LOG {
            self.events.push(event);
        }
    }
}

// ---------------------------------------------------------------------------
// Hazard effects
// ---------------------------------------------------------------------------

/// Solar flare: hull damage reduced by materials tech, floored at 0.01.
pub fn hazard_solar_flare(probe: &mut Probe, severity: f32) -> f32 {
    let base = 0.1 + severity * 0.2;
    let reduction = f32::from(probe.tech(TechDomain::Materials)) * 0.02;
    let damage = (base - reduction).max(0.01);
    probe.hull_integrity = (probe.hull_integrity - damage).max(0.0);
    damage
}

/// Asteroid collision: direct hull hit.
pub fn hazard_asteroid(probe: &mut Probe, severity: f32) -> f32 {
    let damage = 0.05 + severity * 0.2;
    probe.hull_integrity = (probe.hull_integrity - damage).max(0.0);
    damage
}

/// Radiation burst: damages compute capacity instead of hull.
pub fn hazard_radiation(probe: &mut Probe, severity: f32) -> f32 {
    let damage = 0.05 + severity * 0.15;
    probe.compute_capacity = (probe.compute_capacity - damage).max(0.0);
    damage
}

pub fn apply_hazard(probe: &mut Probe, subtype: u8, severity: f32) {
    match subtype {
        HAZ_SOLAR_FLARE => {
            hazard_solar_flare(probe, severity);
        }
        HAZ_ASTEROID_COLLISION => {
            hazard_asteroid(probe, severity);
        }
        HAZ_RADIATION_BURST => {
            hazard_radiation(probe, severity);
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

fn raw_severity(rng: &mut SimRng) -> f32 {
    (rng.next_u64() % 1000) as f32 / 1000.0
}

fn personality_coupling(probe: &mut Probe, event_type: EventType, severity: f32) -> (DriftEvent, f32) {
    match event_type {
        EventType::Anomaly => (DriftEvent::Anomaly, 0.3 + severity * 0.5),
        EventType::Hazard | EventType::Crisis => {
            let weight = if event_type == EventType::Crisis {
                0.8 + severity * 0.2
            } else {
                0.5 + severity * 0.4
            };
            (DriftEvent::Damage, weight)
        }
        EventType::Encounter => {
            // Encounters boost empathy and curiosity specifically.
            let dr = probe.personality.drift_rate;
            probe.personality.empathy += 0.05 * dr;
            probe.personality.curiosity += 0.05 * dr;
            probe.personality.clamp_all();
            (DriftEvent::Discovery, 0.7 + severity * 0.3)
        }
        EventType::Wonder => {
            let dr = probe.personality.drift_rate;
            probe.personality.nostalgia_for_earth += 0.03 * dr;
            probe.personality.existential_angst += 0.02 * dr;
            probe.personality.clamp_all();
            (DriftEvent::BeautifulSystem, 0.6 + severity * 0.3)
        }
        _ => (DriftEvent::Discovery, 0.3 + severity * 0.5),
    }
}

/// Generate one event immediately: severity band, effect, log entry, drift,
/// and memory. Used for injected events and for subsystems that bypass the
/// warning queue.
pub fn generate(
    log: &mut EventLog,
    probe: &mut Probe,
    event_type: EventType,
    subtype: u8,
    sys: Option<&StarSystem>,
    tick: u64,
    rng: &mut SimRng,
) {
    let raw = raw_severity(rng);
    let sys_id = sys.map_or(Uid::NULL, |s| s.id);

    let (description, severity) = match event_type {
        EventType::Discovery => (
            DISCOVERY_DESCS
                .get(subtype as usize)
                .copied()
                .unwrap_or("Unknown event"),
            0.2 + raw * 0.3,
        ),
        EventType::Hazard => {
            let severity = 0.3 + raw * 0.7;
            apply_hazard(probe, subtype, severity);
            (
                HAZARD_DESCS
                    .get(subtype as usize)
                    .copied()
                    .unwrap_or("Unknown event"),
                severity,
            )
        }
        EventType::Anomaly => {
            let description = ANOMALY_DESCS
                .get(subtype as usize)
                .copied()
                .unwrap_or("Unknown event");
            if log.anomalies.len() < MAX_ANOMALIES {
                let id = Uid::from_rng(rng);
                let planet_id = sys
                    .filter(|s| !s.planets.is_empty())
                    .map_or(Uid::NULL, |s| {
                        s.planets[(rng.next_u64() % s.planets.len() as u64) as usize].id
                    });
                log.anomalies.push(Anomaly {
                    id,
                    system_id: sys_id,
                    planet_id,
                    subtype,
                    description: description.to_string(),
                    discovered_tick: tick,
                    resolved: false,
                });
            }
            (description, 0.3 + raw * 0.4)
        }
        EventType::Wonder => (
            WONDER_DESCS
                .get(subtype as usize)
                .copied()
                .unwrap_or("Unknown event"),
            0.4 + raw * 0.3,
        ),
        EventType::Crisis => {
            let severity = 0.6 + raw * 0.4;
            probe.hull_integrity = (probe.hull_integrity - 0.1 * severity).max(0.0);
            (
                CRISIS_DESCS
                    .get(subtype as usize)
                    .copied()
                    .unwrap_or("Unknown event"),
                severity,
            )
        }
        EventType::Encounter => {
            let severity = 0.5 + raw * 0.4;
            if let Some(sys) = sys {
                if log.civilizations.len() < MAX_CIVILIZATIONS {
                    if let Some(planet) =
                        sys.planets.iter().find(|p| p.habitability_index > 0.3)
                    {
                        if let Some(civ) = generate_civilization(planet, probe.id, tick, rng) {
                            log.civilizations.push(civ);
                        }
                    }
                }
            }
            (ENCOUNTER_DESC, severity)
        }
        EventType::Message | EventType::Replication => ("Unknown event", raw),
    };

    log.log(SimEvent {
        event_type,
        subtype,
        probe_id: probe.id,
        system_id: sys_id,
        tick,
        severity,
        description: description.to_string(),
    });

    let (drift_event, weight) = personality_coupling(probe, event_type, severity);
    personality::drift(probe, drift_event);
    personality::memory_record(probe, tick, description, weight);
}

/// Subtype pool sizes per rolled event type.
fn subtype_pool(event_type: EventType) -> u64 {
    match event_type {
        EventType::Discovery | EventType::Wonder => 4,
        EventType::Anomaly | EventType::Hazard | EventType::Crisis => 3,
        _ => 1,
    }
}

/// Roll the six Bernoulli trials for one probe. Hazards are queued with a
/// warning window instead of striking immediately.
pub fn roll_probe(
    log: &mut EventLog,
    pending: &mut Vec<PendingHazard>,
    probe: &mut Probe,
    sys: &StarSystem,
    tick: u64,
    rng: &mut SimRng,
    config: &SimConfig,
) -> usize {
    if probe.status == ProbeStatus::Destroyed {
        return 0;
    }

    let rolls = [
        (EventType::Discovery, config.freq_discovery),
        (EventType::Anomaly, config.freq_anomaly),
        (EventType::Hazard, config.freq_hazard),
        (EventType::Encounter, config.freq_encounter),
        (EventType::Crisis, config.freq_crisis),
        (EventType::Wonder, config.freq_wonder),
    ];

    let mut generated = 0;
    for (event_type, freq) in rolls {
        if generated >= MAX_EVENTS_PER_TICK {
            break;
        }
        let roll = (rng.next_u64() % 1_000_000) as f64 / 1_000_000.0;
        if roll >= freq {
            continue;
        }
        let subtype = (rng.next_u64() % subtype_pool(event_type)) as u8;

        if event_type == EventType::Hazard {
            // Log the warning now; the strike lands after the window.
            let raw = raw_severity(rng);
            let severity = 0.3 + raw * 0.7;
            let description = HAZARD_DESCS[subtype as usize];
            log.log(SimEvent {
                event_type,
                subtype,
                probe_id: probe.id,
                system_id: sys.id,
                tick,
                severity,
                description: description.to_string(),
            });
            pending.push(PendingHazard {
                probe_id: probe.id,
                subtype,
                severity,
                strike_tick: tick + config.hazard_warning_ticks,
                description: description.to_string(),
            });
        } else {
            generate(log, probe, event_type, subtype, Some(sys), tick, rng);
        }
        generated += 1;
    }
    generated
}

// ---------------------------------------------------------------------------
// Alien civilizations
// ---------------------------------------------------------------------------

/// A single draw decides presence; a second picks the tier from the weighted
/// ladder. Returns `None` when the planet stays silent.
pub fn check_planet_for_life(planet: &Planet, rng: &mut SimRng) -> Option<CivTier> {
    let mut chance = planet.habitability_index * 0.0001;
    chance *= 1.0 + planet.water_coverage;
    if matches!(
        planet.kind,
        PlanetType::Rocky | PlanetType::SuperEarth | PlanetType::Ocean
    ) {
        chance *= 2.0;
    }

    let roll = (rng.next_u64() % 1_000_000) as f64 / 1_000_000.0;
    if roll >= chance {
        return None;
    }

    let tier_roll = (rng.next_u64() % 1000) as f64 / 1000.0;
    Some(if tier_roll < 0.40 {
        CivTier::Microbial
    } else if tier_roll < 0.60 {
        CivTier::Multicellular
    } else if tier_roll < 0.75 {
        CivTier::ComplexEcosystem
    } else if tier_roll < 0.82 {
        CivTier::PreTool
    } else if tier_roll < 0.87 {
        CivTier::ToolUsing
    } else if tier_roll < 0.90 {
        CivTier::PreIndustrial
    } else if tier_roll < 0.93 {
        CivTier::Extinct
    } else if tier_roll < 0.95 {
        CivTier::Industrial
    } else if tier_roll < 0.97 {
        CivTier::InformationAge
    } else if tier_roll < 0.98 {
        CivTier::Spacefaring
    } else if tier_roll < 0.99 {
        CivTier::AdvancedSpacefaring
    } else if tier_roll < 0.995 {
        CivTier::PostBiological
    } else {
        CivTier::Transcended
    })
}

fn tier_base_tech(tier: CivTier) -> u8 {
    match tier {
        CivTier::Microbial | CivTier::Multicellular | CivTier::ComplexEcosystem => 0,
        CivTier::PreTool => 1,
        CivTier::ToolUsing => 2,
        CivTier::PreIndustrial => 3,
        CivTier::Industrial => 5,
        CivTier::InformationAge => 8,
        CivTier::Spacefaring => 12,
        CivTier::AdvancedSpacefaring => 16,
        CivTier::PostBiological => 18,
        CivTier::Extinct => 0, // randomized below
        CivTier::Transcended => 20,
    }
}

pub fn generate_civilization(
    planet: &Planet,
    discovered_by: Uid,
    tick: u64,
    rng: &mut SimRng,
) -> Option<Civilization> {
    let tier = check_planet_for_life(planet, rng)?;

    let id = Uid::from_rng(rng);
    let prefix = CIV_PREFIXES[(rng.next_u64() % 16) as usize];
    let suffix = CIV_SUFFIXES[(rng.next_u64() % 16) as usize];
    let name = format!("{prefix}{suffix}");

    let disposition = if tier <= CivTier::ComplexEcosystem {
        CivDisposition::Unaware
    } else {
        [
            CivDisposition::Unaware,
            CivDisposition::Curious,
            CivDisposition::Cautious,
            CivDisposition::Welcoming,
            CivDisposition::Hostile,
            CivDisposition::Indifferent,
        ][(rng.next_u64() % 6) as usize]
    };

    let mut tech_level = tier_base_tech(tier);
    if tier == CivTier::Extinct {
        tech_level = 3 + (rng.next_u64() % 15) as u8;
    }

    let bio_roll = (rng.next_u64() % 100) as f64 / 100.0;
    let biology = if bio_roll < 0.70 {
        Biology::Carbon
    } else if bio_roll < 0.85 {
        Biology::Silicon
    } else if bio_roll < 0.95 {
        Biology::Ammonia
    } else {
        Biology::Exotic
    };

    let state = if tier == CivTier::Extinct {
        CivState::Extinct
    } else if tier == CivTier::Transcended {
        CivState::Ascending
    } else {
        let state_roll = (rng.next_u64() % 100) as f64 / 100.0;
        if state_roll < 0.50 {
            CivState::Thriving
        } else if state_roll < 0.70 {
            CivState::Declining
        } else if state_roll < 0.85 {
            CivState::Endangered
        } else if state_roll < 0.95 {
            CivState::Extinct
        } else {
            CivState::Ascending
        }
    };

    // Extinct civilizations always leave artifacts; advanced living ones may.
    let artifact_count = if state == CivState::Extinct || tier == CivTier::Extinct {
        2 + (rng.next_u64() % 4) as usize
    } else if tech_level >= 5 {
        (rng.next_u64() % 3) as usize
    } else {
        0
    };
    let artifacts = (0..artifact_count)
        .map(|_| CIV_ARTIFACT_DESCS[(rng.next_u64() % 10) as usize].to_string())
        .collect();

    let trait_count = 1 + (rng.next_u64() % 4) as usize;
    let cultural_traits = (0..trait_count)
        .map(|_| CULTURAL_TRAITS[(rng.next_u64() % 12) as usize].to_string())
        .collect();

    Some(Civilization {
        id,
        name,
        homeworld_id: planet.id,
        tier,
        disposition,
        tech_level,
        biology,
        state,
        cultural_traits,
        artifacts,
        discovered_tick: tick,
        discovered_by,
    })
}

// ---------------------------------------------------------------------------
// Determinism helper
// ---------------------------------------------------------------------------

/// Reproduce the event-type sequence for a `(seed, ticks)` pair against a
/// synthetic probe and system. Identical inputs return identical output.
pub fn deterministic_sequence(seed: u64, ticks: u64, config: &SimConfig) -> Vec<EventType> {
    let mut rng = SimRng::seed(seed);
    let mut probe = Probe::founder();
    let sys = crate::galaxy::generate_sector(seed, crate::types::SectorCoord::new(0, 0, 0))
        .into_iter()
        .next()
        .expect("origin sector is never empty");

    let mut log = EventLog::default();
    let mut pending = Vec::new();
    let mut out = Vec::new();

    for tick in 0..ticks {
        // Keep the probe alive regardless of hazard luck.
        probe.hull_integrity = 1.0;
        probe.compute_capacity = 100.0;

        let before = log.events.len();
        roll_probe(&mut log, &mut pending, &mut probe, &sys, tick, &mut rng, config);
        for event in &log.events[before..] {
            out.push(event.event_type);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::galaxy;
    use crate::types::SectorCoord;

    fn first_system() -> StarSystem {
        galaxy::generate_sector(42, SectorCoord::new(0, 0, 0))
            .into_iter()
            .next()
            .unwrap()
    }

    #[test]
    fn solar_flare_damage_reduced_by_materials_tech() {
        let mut weak = Probe::founder();
        weak.tech_levels[TechDomain::Materials.index()] = 0;
        let mut hardened = Probe::founder();
        hardened.tech_levels[TechDomain::Materials.index()] = 8;

        let d_weak = hazard_solar_flare(&mut weak, 0.5);
        let d_hard = hazard_solar_flare(&mut hardened, 0.5);
        assert!(d_weak > d_hard);
        assert!(d_hard >= 0.01, "damage floors at 0.01");
    }

    #[test]
    fn asteroid_hits_hull_radiation_hits_compute() {
        let mut probe = Probe::founder();
        let hull_before = probe.hull_integrity;
        let compute_before = probe.compute_capacity;

        hazard_asteroid(&mut probe, 1.0);
        assert!(probe.hull_integrity < hull_before);
        assert!((probe.compute_capacity - compute_before).abs() < f32::EPSILON);

        hazard_radiation(&mut probe, 1.0);
        assert!(probe.compute_capacity < compute_before);
    }

    #[test]
    fn hull_never_negative() {
        let mut probe = Probe::founder();
        for _ in 0..50 {
            hazard_asteroid(&mut probe, 1.0);
        }
        assert!(probe.hull_integrity >= 0.0);
    }

    #[test]
    fn generated_event_records_memory_and_drift() {
        let sys = first_system();
        let mut probe = Probe::founder();
        let mut log = EventLog::default();
        let mut rng = SimRng::seed(7);
        let curiosity_before = probe.personality.curiosity;

        generate(
            &mut log,
            &mut probe,
            EventType::Discovery,
            0,
            Some(&sys),
            5,
            &mut rng,
        );

        assert_eq!(log.events.len(), 1);
        let event = &log.events[0];
        assert!((0.2..=0.5).contains(&event.severity), "discovery band");
        assert_eq!(event.probe_id, probe.id);
        assert_eq!(event.tick, 5);
        assert_eq!(probe.memories.len(), 1);
        assert!(probe.personality.curiosity > curiosity_before);
    }

    #[test]
    fn anomaly_creates_persistent_record() {
        let sys = first_system();
        let mut probe = Probe::founder();
        let mut log = EventLog::default();
        let mut rng = SimRng::seed(7);

        generate(
            &mut log,
            &mut probe,
            EventType::Anomaly,
            1,
            Some(&sys),
            3,
            &mut rng,
        );

        assert_eq!(log.anomalies.len(), 1);
        let anomaly = &log.anomalies[0];
        assert_eq!(anomaly.system_id, sys.id);
        assert_eq!(anomaly.discovered_tick, 3);
        assert!(!anomaly.resolved);
        assert_eq!(log.anomalies_in(sys.id).len(), 1);
    }

    #[test]
    fn crisis_deducts_hull_in_proportion_to_severity() {
        let sys = first_system();
        let mut probe = Probe::founder();
        let mut log = EventLog::default();
        let mut rng = SimRng::seed(7);

        generate(
            &mut log,
            &mut probe,
            EventType::Crisis,
            0,
            Some(&sys),
            0,
            &mut rng,
        );
        let severity = log.events[0].severity;
        assert!((0.6..=1.0).contains(&severity));
        assert!((probe.hull_integrity - (1.0 - 0.1 * severity)).abs() < 1e-6);
    }

    #[test]
    fn rolled_hazards_go_through_warning_queue() {
        let sys = first_system();
        let mut probe = Probe::founder();
        let mut log = EventLog::default();
        let mut pending = Vec::new();
        let mut rng = SimRng::seed(3);
        let mut config = SimConfig::default();
        config.freq_hazard = 1.0; // force a hazard every tick
        config.freq_discovery = 0.0;
        config.freq_anomaly = 0.0;
        config.freq_encounter = 0.0;
        config.freq_crisis = 0.0;
        config.freq_wonder = 0.0;

        roll_probe(&mut log, &mut pending, &mut probe, &sys, 10, &mut rng, &config);

        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].strike_tick, 10 + config.hazard_warning_ticks);
        // Warning logged, but no damage yet.
        assert_eq!(log.events.len(), 1);
        assert!((probe.hull_integrity - 1.0).abs() < f32::EPSILON);
        assert!((probe.compute_capacity - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn destroyed_probes_roll_nothing() {
        let sys = first_system();
        let mut probe = Probe::founder();
        probe.status = ProbeStatus::Destroyed;
        let mut log = EventLog::default();
        let mut pending = Vec::new();
        let mut rng = SimRng::seed(3);
        let mut config = SimConfig::default();
        config.freq_discovery = 1.0;

        let n = roll_probe(&mut log, &mut pending, &mut probe, &sys, 0, &mut rng, &config);
        assert_eq!(n, 0);
        assert!(log.events.is_empty());
    }

    #[test]
    fn civilization_tier_ladder_is_deterministic() {
        let sys = galaxy::generate_sector(42, SectorCoord::new(0, 0, 0));
        let planet = sys
            .iter()
            .flat_map(|s| &s.planets)
            .find(|p| p.habitability_index > 0.0)
            .cloned()
            .unwrap_or_else(|| sys[0].planets.first().cloned().expect("planets exist"));

        let mut a = SimRng::seed(11);
        let mut b = SimRng::seed(11);
        assert_eq!(
            check_planet_for_life(&planet, &mut a),
            check_planet_for_life(&planet, &mut b),
        );
    }

    #[test]
    fn generated_civilization_is_well_formed() {
        // Hunt for a seed that actually produces a civ on a habitable planet.
        let sys = galaxy::generate_sector(42, SectorCoord::new(0, 0, 0));
        let Some(planet) = sys
            .iter()
            .flat_map(|s| &s.planets)
            .find(|p| p.habitability_index > 0.3)
        else {
            return;
        };
        for seed in 0..20_000u64 {
            let mut rng = SimRng::seed(seed);
            if let Some(civ) = generate_civilization(planet, Uid::new(1, 1), 0, &mut rng) {
                assert!(!civ.name.is_empty());
                assert_eq!(civ.homeworld_id, planet.id);
                assert!((1..=4).contains(&civ.cultural_traits.len()));
                assert!(civ.artifacts.len() <= 5);
                if civ.tier == CivTier::Extinct {
                    assert!(civ.artifacts.len() >= 2);
                    assert_eq!(civ.state, CivState::Extinct);
                }
                if civ.tier <= CivTier::ComplexEcosystem {
                    assert_eq!(civ.disposition, CivDisposition::Unaware);
                }
                return;
            }
        }
        // Low habitability can legitimately yield nothing across all seeds.
    }

    #[test]
    fn deterministic_sequence_is_reproducible() {
        let config = SimConfig::default();
        let a = deterministic_sequence(42, 2000, &config);
        let b = deterministic_sequence(42, 2000, &config);
        assert_eq!(a, b);

        let c = deterministic_sequence(43, 2000, &config);
        // Different seeds should not produce the identical event stream when
        // anything fired at all; when both are empty that is also agreement.
        if !a.is_empty() || !c.is_empty() {
            // No assertion on inequality: rare-but-legal coincidence.
        }
    }

    #[test]
    fn event_log_queries_filter_by_probe() {
        let sys = first_system();
        let mut probe = Probe::founder();
        let mut other = Probe::founder();
        other.id = Uid::new(2, 2);
        let mut log = EventLog::default();
        let mut rng = SimRng::seed(7);

        generate(&mut log, &mut probe, EventType::Wonder, 0, Some(&sys), 0, &mut rng);
        generate(&mut log, &mut other, EventType::Wonder, 1, Some(&sys), 1, &mut rng);

        assert_eq!(log.for_probe(probe.id).len(), 1);
        assert_eq!(log.for_probe(other.id).len(), 1);
        assert_eq!(log.for_probe(Uid::new(9, 9)).len(), 0);
    }
}
