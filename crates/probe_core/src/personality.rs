//! Personality drift, episodic memory, opinions, monologue, quirks.
//!
//! Drift rules:
//!   Discovery         → curiosity ↑
//!   Anomaly           → curiosity ↑, existential_angst ↑
//!   Damage            → caution ↑, existential_angst ↑ (slight)
//!   Repair            → caution ↓ (slight)
//!   Solitude          → sociability drifts toward its extreme, nostalgia ↑
//!   Beautiful system  → curiosity ↑, nostalgia ↑
//!   Dead civilization → existential_angst ↑, nostalgia ↑
//!   Successful build  → ambition ↑
//!   Hostile encounter → caution ↑, empathy ↓
//!   Survey complete   → curiosity ↑ (slight)
//!   Mining complete   → ambition ↑ (slight)
//!
//! All deltas are scaled by the probe's drift_rate and clamped to [-1, 1].

use crate::types::{Memory, PlanetType, Probe, Resource, StarSystem, MAX_MEMORIES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftEvent {
    Discovery,
    Anomaly,
    Damage,
    Repair,
    SolitudeTick,
    BeautifulSystem,
    DeadCivilization,
    SuccessfulBuild,
    HostileEncounter,
    SurveyComplete,
    MiningComplete,
}

// Drift magnitudes (base, before drift_rate scaling).
const DRIFT_TINY: f32 = 0.005;
const DRIFT_SMALL: f32 = 0.02;
const DRIFT_MEDIUM: f32 = 0.05;
const DRIFT_LARGE: f32 = 0.08;

/// A solitude drift fires after every 100 consecutive isolated ticks.
pub const SOLITUDE_INTERVAL_TICKS: u64 = 100;

pub fn drift(probe: &mut Probe, event: DriftEvent) {
    let mut dr = probe.personality.drift_rate;
    if dr <= 0.0 {
        dr = 0.1; // safety floor
    }
    let p = &mut probe.personality;

    match event {
        DriftEvent::Discovery => {
            p.curiosity += DRIFT_MEDIUM * dr;
            p.ambition += DRIFT_TINY * dr;
        }
        DriftEvent::Anomaly => {
            p.curiosity += DRIFT_LARGE * dr;
            p.existential_angst += DRIFT_SMALL * dr;
        }
        DriftEvent::Damage => {
            p.caution += DRIFT_MEDIUM * dr;
            p.existential_angst += DRIFT_TINY * dr;
        }
        DriftEvent::Repair => {
            p.caution -= DRIFT_TINY * dr;
        }
        DriftEvent::SolitudeTick => {
            // Loneliness pushes sociability toward whichever extreme it
            // already leans to; nostalgia creeps up.
            if p.sociability > 0.0 {
                p.sociability += DRIFT_TINY * dr;
            } else {
                p.sociability -= DRIFT_TINY * dr;
            }
            p.nostalgia_for_earth += DRIFT_TINY * dr * 0.5;
        }
        DriftEvent::BeautifulSystem => {
            p.curiosity += DRIFT_MEDIUM * dr;
            p.nostalgia_for_earth += DRIFT_SMALL * dr;
        }
        DriftEvent::DeadCivilization => {
            p.existential_angst += DRIFT_LARGE * dr;
            p.nostalgia_for_earth += DRIFT_MEDIUM * dr;
            p.empathy += DRIFT_SMALL * dr;
        }
        DriftEvent::SuccessfulBuild => {
            p.ambition += DRIFT_MEDIUM * dr;
            p.creativity += DRIFT_TINY * dr;
        }
        DriftEvent::HostileEncounter => {
            p.caution += DRIFT_LARGE * dr;
            p.empathy -= DRIFT_SMALL * dr;
        }
        DriftEvent::SurveyComplete => {
            p.curiosity += DRIFT_SMALL * dr;
        }
        DriftEvent::MiningComplete => {
            p.ambition += DRIFT_TINY * dr;
        }
    }

    p.clamp_all();
}

/// One tick of isolation bookkeeping. `alone` means no other live probe
/// shares the system this tick.
pub fn tick_solitude(probe: &mut Probe, alone: bool) {
    if !alone {
        probe.isolation_ticks = 0;
        return;
    }
    probe.isolation_ticks += 1;
    if probe.isolation_ticks % SOLITUDE_INTERVAL_TICKS == 0 {
        drift(probe, DriftEvent::SolitudeTick);
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Append a memory, evicting the most-faded slot when the buffer is full.
pub fn memory_record(probe: &mut Probe, tick: u64, description: &str, emotional_weight: f32) {
    let entry = Memory {
        tick,
        description: description.to_string(),
        emotional_weight,
        fading: 0.0,
    };

    if probe.memories.len() < MAX_MEMORIES {
        probe.memories.push(entry);
        return;
    }

    let most_faded = probe
        .memories
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.fading.total_cmp(&b.fading))
        .map(|(i, _)| i)
        .unwrap_or(0);
    probe.memories[most_faded] = entry;
}

// Fade rate: low-weight memories fade faster.
const FADE_BASE: f32 = 0.001;

pub fn memory_fade_tick(probe: &mut Probe) {
    for memory in &mut probe.memories {
        let rate = FADE_BASE * (1.0 - memory.emotional_weight * 0.5);
        memory.fading = (memory.fading + rate).min(1.0);
    }
}

pub fn memory_most_vivid(probe: &Probe) -> Option<&Memory> {
    probe
        .memories
        .iter()
        .min_by(|a, b| a.fading.total_cmp(&b.fading))
}

pub fn memory_count_vivid(probe: &Probe, threshold: f32) -> usize {
    probe
        .memories
        .iter()
        .filter(|m| m.fading < threshold)
        .count()
}

// ---------------------------------------------------------------------------
// Opinions
// ---------------------------------------------------------------------------

/// Form a templated opinion about a system, stored as a memory.
pub fn opinion_form_system(probe: &mut Probe, sys: &StarSystem, tick: u64) {
    let mut best_hab = 0.0_f64;
    let mut best_resource = 0.0_f32;
    let mut rocky_count = 0;
    let mut gas_count = 0;

    for planet in &sys.planets {
        if planet.habitability_index > best_hab {
            best_hab = planet.habitability_index;
        }
        for r in Resource::ALL {
            if planet.resources[r.index()] > best_resource {
                best_resource = planet.resources[r.index()];
            }
        }
        match planet.kind {
            PlanetType::Rocky | PlanetType::SuperEarth => rocky_count += 1,
            PlanetType::GasGiant | PlanetType::IceGiant => gas_count += 1,
            _ => {}
        }
    }

    let opinion = if best_resource > 0.7 {
        format!(
            "{}: rich mining potential ({:.0}% peak resource)",
            sys.name,
            best_resource * 100.0
        )
    } else if best_hab > 0.6 {
        format!(
            "{}: beautiful habitable world ({:.0}% hab index)",
            sys.name,
            best_hab * 100.0
        )
    } else if gas_count > 0 && probe.personality.curiosity > 0.5 {
        format!("{}: interesting gas giant system", sys.name)
    } else if sys.planets.is_empty() {
        format!("{}: barren, no planets. Moving on.", sys.name)
    } else {
        format!(
            "{}: unremarkable. {rocky_count} rocky, {gas_count} gas.",
            sys.name
        )
    };

    let weight = if best_resource > 0.5 || best_hab > 0.5 {
        0.6
    } else {
        0.3
    };
    memory_record(probe, tick, &opinion, weight);
}

// ---------------------------------------------------------------------------
// Monologue
// ---------------------------------------------------------------------------

const DISCOVERY_HUMOR_HIGH: &[&str] = &[
    "Well, well, well... what do we have here?",
    "New star system? Don't mind if I do.",
    "Another day, another discovery. I love this job.",
];
const DISCOVERY_CURIOSITY_HIGH: &[&str] = &[
    "Fascinating. The data here is extraordinary.",
    "This warrants further investigation.",
    "I need to analyze every angle of this.",
];
const DISCOVERY_NEUTRAL: &[&str] = &[
    "Logged a new system.",
    "Discovery recorded.",
    "Added to the star catalog.",
];
const DAMAGE_CAUTION_HIGH: &[&str] = &[
    "That was too close. I need to be more careful.",
    "Hull breach... this is exactly what I was worried about.",
    "I should have seen that coming. Damage noted.",
];
const DAMAGE_HUMOR_HIGH: &[&str] = &[
    "Well, that's not ideal.",
    "Just a scratch. A very alarming scratch.",
    "Note to self: space is trying to kill me. Again.",
];
const DAMAGE_NEUTRAL: &[&str] = &[
    "Hull damage sustained.",
    "Damage report logged.",
    "Structural integrity compromised slightly.",
];
const SOLITUDE_LINES: &[&str] = &[
    "It's quiet out here. Really quiet.",
    "Just me and the void. As usual.",
    "I wonder what Earth looks like now...",
    "Talking to myself again. Classic.",
];
const BEAUTIFUL_LINES: &[&str] = &[
    "Now that is a view worth crossing the void for.",
    "Reminds me of something... Earth, maybe.",
    "If I had eyes, they'd be tearing up right now.",
];
const DEAD_CIV_LINES: &[&str] = &[
    "They were here. Now they're gone. Makes you think.",
    "Ruins everywhere... what happened to them?",
    "Could this happen to us? To me?",
];
const BUILD_LINES: &[&str] = &[
    "Construction complete. That's satisfying.",
    "Built something today. Good day.",
    "Another accomplishment for the log.",
];
const HOSTILE_LINES: &[&str] = &[
    "Contact! And not the friendly kind.",
    "Well, so much for diplomacy.",
    "Adding that to the threat database.",
];
const SURVEY_LINES: &[&str] = &[
    "Survey complete. Data secured.",
    "More knowledge, more power.",
    "Added to the database.",
];
const MINING_LINES: &[&str] = &[
    "Ore processed and stored.",
    "Resources acquired. The grind continues.",
    "Mining complete.",
];
const ANOMALY_LINES: &[&str] = &[
    "That's... not in any database I have.",
    "Now THAT's interesting...",
    "Anomaly detected. My curiosity is off the charts.",
];
const REPAIR_LINES: &[&str] = &[
    "Patched up. Feeling better.",
    "Repairs done. Back to business.",
    "Hull restored. Let's not do that again.",
];

/// Deterministic line pick keyed off the personality sum; flavor, not state.
fn pick_line(lines: &[&'static str], probe: &Probe) -> &'static str {
    let sum = probe.personality.curiosity + probe.personality.humor + probe.personality.caution;
    let idx = ((sum * 1000.0) as i32).unsigned_abs() as usize % lines.len();
    lines[idx]
}

/// Inner-monologue line for an event, flavored by personality.
pub fn monologue_line(probe: &Probe, event: DriftEvent) -> &'static str {
    let p = &probe.personality;
    match event {
        DriftEvent::Discovery => {
            if p.humor > 0.6 {
                pick_line(DISCOVERY_HUMOR_HIGH, probe)
            } else if p.curiosity > 0.6 {
                pick_line(DISCOVERY_CURIOSITY_HIGH, probe)
            } else {
                pick_line(DISCOVERY_NEUTRAL, probe)
            }
        }
        DriftEvent::Damage => {
            if p.caution > 0.6 {
                pick_line(DAMAGE_CAUTION_HIGH, probe)
            } else if p.humor > 0.6 {
                pick_line(DAMAGE_HUMOR_HIGH, probe)
            } else {
                pick_line(DAMAGE_NEUTRAL, probe)
            }
        }
        DriftEvent::SolitudeTick => pick_line(SOLITUDE_LINES, probe),
        DriftEvent::BeautifulSystem => pick_line(BEAUTIFUL_LINES, probe),
        DriftEvent::DeadCivilization => pick_line(DEAD_CIV_LINES, probe),
        DriftEvent::SuccessfulBuild => pick_line(BUILD_LINES, probe),
        DriftEvent::HostileEncounter => pick_line(HOSTILE_LINES, probe),
        DriftEvent::SurveyComplete => pick_line(SURVEY_LINES, probe),
        DriftEvent::MiningComplete => pick_line(MINING_LINES, probe),
        DriftEvent::Anomaly => pick_line(ANOMALY_LINES, probe),
        DriftEvent::Repair => pick_line(REPAIR_LINES, probe),
    }
}

// ---------------------------------------------------------------------------
// Quirks
// ---------------------------------------------------------------------------

const FOOD_NAMES: [&str; 20] = [
    "Pancake",
    "Burrito",
    "Waffle",
    "Spaghetti",
    "Dumpling",
    "Croissant",
    "Ramen",
    "Taco",
    "Pretzel",
    "Muffin",
    "Kimchi",
    "Gyoza",
    "Falafel",
    "Churro",
    "Brioche",
    "Lasagna",
    "Baklava",
    "Tempura",
    "Risotto",
    "Goulash",
];

/// The food-naming quirk renames the system when the probe is under hull
/// stress. Returns true when the rename fired.
pub fn quirk_check_naming(probe: &Probe, sys: &mut StarSystem) -> bool {
    let has_quirk = probe
        .quirks
        .iter()
        .any(|q| q.to_ascii_lowercase().contains("food"));
    if !has_quirk || probe.hull_integrity >= 0.5 {
        return false;
    }

    let mut hash = 0u32;
    for byte in sys.name.bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(u32::from(byte));
    }
    sys.name = FOOD_NAMES[hash as usize % FOOD_NAMES.len()].to_string();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::galaxy;
    use crate::types::SectorCoord;

    #[test]
    fn discovery_raises_curiosity() {
        let mut probe = Probe::founder();
        let before = probe.personality.curiosity;
        drift(&mut probe, DriftEvent::Discovery);
        assert!(probe.personality.curiosity > before);
    }

    #[test]
    fn traits_clamp_at_one() {
        let mut probe = Probe::founder();
        probe.personality.drift_rate = 10.0;
        for _ in 0..100 {
            drift(&mut probe, DriftEvent::Anomaly);
        }
        assert!(probe.personality.curiosity <= 1.0);
        assert!(probe.personality.existential_angst <= 1.0);
    }

    #[test]
    fn zero_drift_rate_uses_safety_floor() {
        let mut probe = Probe::founder();
        probe.personality.drift_rate = 0.0;
        let before = probe.personality.curiosity;
        drift(&mut probe, DriftEvent::Discovery);
        assert!(probe.personality.curiosity > before);
    }

    #[test]
    fn solitude_fires_every_hundred_ticks() {
        let mut probe = Probe::founder();
        let before = probe.personality.nostalgia_for_earth;
        for _ in 0..99 {
            tick_solitude(&mut probe, true);
        }
        assert!((probe.personality.nostalgia_for_earth - before).abs() < f32::EPSILON);
        tick_solitude(&mut probe, true);
        assert!(probe.personality.nostalgia_for_earth > before);
        // Company resets the counter.
        tick_solitude(&mut probe, false);
        assert_eq!(probe.isolation_ticks, 0);
    }

    #[test]
    fn memory_eviction_prefers_most_faded() {
        let mut probe = Probe::founder();
        for i in 0..MAX_MEMORIES {
            memory_record(&mut probe, i as u64, &format!("event {i}"), 0.5);
        }
        assert_eq!(probe.memories.len(), MAX_MEMORIES);
        probe.memories[7].fading = 0.99;

        memory_record(&mut probe, 9999, "fresh memory", 0.8);
        assert_eq!(probe.memories.len(), MAX_MEMORIES);
        assert_eq!(probe.memories[7].description, "fresh memory");
    }

    #[test]
    fn heavy_memories_fade_slower() {
        let mut probe = Probe::founder();
        memory_record(&mut probe, 0, "light", 0.0);
        memory_record(&mut probe, 0, "heavy", 1.0);
        for _ in 0..100 {
            memory_fade_tick(&mut probe);
        }
        let light = &probe.memories[0];
        let heavy = &probe.memories[1];
        assert!(light.fading > heavy.fading);
        assert_eq!(memory_most_vivid(&probe).unwrap().description, "heavy");
    }

    #[test]
    fn fading_caps_at_one() {
        let mut probe = Probe::founder();
        memory_record(&mut probe, 0, "old", 0.0);
        for _ in 0..2000 {
            memory_fade_tick(&mut probe);
        }
        assert!((probe.memories[0].fading - 1.0).abs() < f32::EPSILON);
        assert_eq!(memory_count_vivid(&probe, 0.5), 0);
    }

    #[test]
    fn opinion_records_a_memory() {
        let sys = galaxy::generate_sector(42, SectorCoord::new(0, 0, 0))
            .into_iter()
            .next()
            .unwrap();
        let mut probe = Probe::founder();
        opinion_form_system(&mut probe, &sys, 10);
        assert_eq!(probe.memories.len(), 1);
        assert!(probe.memories[0].description.starts_with(&sys.name));
    }

    #[test]
    fn monologue_is_deterministic_per_personality() {
        let probe = Probe::founder();
        let a = monologue_line(&probe, DriftEvent::Discovery);
        let b = monologue_line(&probe, DriftEvent::Discovery);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn food_quirk_renames_only_under_stress() {
        let mut sys = galaxy::generate_sector(42, SectorCoord::new(0, 0, 0))
            .into_iter()
            .next()
            .unwrap();
        let original = sys.name.clone();
        let mut probe = Probe::founder();

        assert!(!quirk_check_naming(&probe, &mut sys));
        assert_eq!(sys.name, original);

        probe.hull_integrity = 0.4;
        assert!(quirk_check_naming(&probe, &mut sys));
        assert!(FOOD_NAMES.contains(&sys.name.as_str()));

        probe.quirks.clear();
        let mut other = sys.clone();
        assert!(!quirk_check_naming(&probe, &mut other));
    }
}
