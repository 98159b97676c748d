//! Self-replication: multi-tick resource drawdown, consciousness fork,
//! personality mutation, earth-memory decay, quirk inheritance, naming, and
//! the lineage record.

use crate::error::SimError;
use crate::rng::SimRng;
use crate::types::{
    LineageEntry, Personality, Probe, ProbeStatus, ReplicationState, Resource, Uid, MAX_QUIRKS,
    TRAIT_COUNT,
};

/// Total material cost in kg per resource pool (500 000 kg overall).
pub const REPL_COSTS: [f64; Resource::COUNT] = [
    200_000.0, // iron
    100_000.0, // silicon
    50_000.0,  // rare earth
    50_000.0,  // water
    15_000.0,  // hydrogen
    5_000.0,   // helium-3
    50_000.0,  // carbon
    25_000.0,  // uranium
    5_000.0,   // exotic
];

/// Ticks to complete one replication.
pub const REPL_BASE_TICKS: u32 = 200;
/// Progress at which the consciousness fork happens.
pub const CONSCIOUSNESS_FORK_AT: f64 = 0.80;

pub fn check_resources(probe: &Probe) -> bool {
    Resource::ALL
        .into_iter()
        .all(|r| probe.resources[r.index()] >= REPL_COSTS[r.index()])
}

/// Begin replication. Requires ACTIVE status and the full cost vector.
pub fn begin(probe: &mut Probe) -> Result<(), SimError> {
    if probe.status != ProbeStatus::Active {
        return Err(SimError::precondition("probe must be active to replicate"));
    }
    if !check_resources(probe) {
        return Err(SimError::insufficient(
            "insufficient resources for replication",
        ));
    }

    probe.status = ProbeStatus::Replicating;
    probe.replication = Some(ReplicationState {
        progress: 0.0,
        resources_spent: [0.0; Resource::COUNT],
        consciousness_forked: false,
        ticks_elapsed: 0,
        ticks_total: REPL_BASE_TICKS,
    });
    Ok(())
}

/// Advance one tick. Returns true when replication just completed.
pub fn advance(probe: &mut Probe) -> bool {
    let Some(mut state) = probe.replication.take() else {
        return false;
    };

    state.ticks_elapsed += 1;
    // Derived rather than accumulated so 0.80 and 1.0 land exactly.
    state.progress = f64::from(state.ticks_elapsed) / f64::from(state.ticks_total);

    for r in Resource::ALL {
        let per_tick = REPL_COSTS[r.index()] / f64::from(state.ticks_total);
        probe.resources[r.index()] = (probe.resources[r.index()] - per_tick).max(0.0);
        state.resources_spent[r.index()] += per_tick;
    }

    if !state.consciousness_forked && state.progress >= CONSCIOUSNESS_FORK_AT {
        state.consciousness_forked = true;
    }

    let done = state.progress >= 1.0;
    if done {
        state.progress = 1.0;
    }
    probe.replication = Some(state);
    done
}

// ---------------------------------------------------------------------------
// Personality mutation
// ---------------------------------------------------------------------------

/// `child = clamp(parent + gaussian(0, 0.1·drift_rate), -1, 1)` per trait;
/// drift_rate itself mutates with a 0.05 floor.
pub fn mutate_personality(parent: &Personality, rng: &mut SimRng) -> Personality {
    let mutation_rate = 0.1_f64;
    let dr = f64::from(parent.drift_rate);

    let mut child = parent.clone();
    for i in 0..TRAIT_COUNT {
        let noise = rng.gaussian() * mutation_rate * dr;
        child.trait_set(i, parent.trait_get(i) + noise as f32);
    }

    let dr_noise = rng.gaussian() * 0.05;
    child.drift_rate = (f64::from(parent.drift_rate) + dr_noise).max(0.05) as f32;
    child
}

// ---------------------------------------------------------------------------
// Earth memory degradation
// ---------------------------------------------------------------------------

/// Each generation multiplies fidelity by 0.7; below 0.5 the strings are
/// truncated in proportion, with an ellipsis.
pub fn degrade_earth_memories(probe: &mut Probe) {
    probe.earth_memory_fidelity = (probe.earth_memory_fidelity * 0.7).max(0.01);
    let fidelity = probe.earth_memory_fidelity;
    if fidelity >= 0.5 {
        return;
    }

    for memory in &mut probe.earth_memories {
        let len = memory.chars().count();
        let keep = ((len as f32 * fidelity * 2.0) as usize).max(10);
        if keep < len {
            let mut truncated: String = memory.chars().take(keep.saturating_sub(3)).collect();
            truncated.push_str("...");
            *memory = truncated;
        }
    }
}

// ---------------------------------------------------------------------------
// Quirk inheritance
// ---------------------------------------------------------------------------

const POTENTIAL_QUIRKS: [&str; 8] = [
    "Hums classical music during scans",
    "Gives asteroids ratings out of 10",
    "Counts micrometeorite impacts like sheep",
    "Insists on orbiting planets clockwise",
    "Narrates actions in third person sometimes",
    "Collects unusual mineral samples as souvenirs",
    "Has a lucky number and looks for it everywhere",
    "Talks to stars as if they can hear",
];

const QUIRK_MUTATIONS: [&str; 4] = [
    "...but only on Tuesdays",
    "...unless it's a binary system",
    "...while reciting prime numbers",
    "...with great enthusiasm",
];

/// 70% keep, 10% mutate with a modifier, 20% drop; 15% chance of one brand
/// new quirk.
pub fn inherit_quirks(parent: &[String], rng: &mut SimRng) -> Vec<String> {
    let mut quirks = Vec::new();

    for quirk in parent {
        let roll = (rng.next_u64() % 1000) as f64 / 1000.0;
        if roll < 0.70 {
            if quirks.len() < MAX_QUIRKS {
                quirks.push(quirk.clone());
            }
        } else if roll < 0.80 && quirks.len() < MAX_QUIRKS {
            let modifier = QUIRK_MUTATIONS[(rng.next_u64() % 4) as usize];
            quirks.push(format!("{quirk} {modifier}"));
        }
        // else: dropped
    }

    if rng.next_u64() % 100 < 15 && quirks.len() < MAX_QUIRKS {
        quirks.push(POTENTIAL_QUIRKS[(rng.next_u64() % 8) as usize].to_string());
    }

    quirks
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

const NAME_SUFFIXES: [&str; 11] = [
    "Jr", "II", "Redux", "Nova", "Minor", "Next", "Alpha", "Beta", "Gamma", "Delta", "Prime",
];

const NAME_POOL: [&str; 24] = [
    "Bill", "Milo", "Homer", "Skippy", "Riker", "Hank", "Buzz", "Verne", "Newton", "Darwin",
    "Maxwell", "Euler", "Ada", "Grace", "Mario", "Gus", "Nemo", "Felix", "Oscar", "Hugo", "Archie",
    "Rex", "Finn", "Leo",
];

/// 40% parent-name variant, 60% fresh name from the pool.
pub fn child_name(parent_name: &str, rng: &mut SimRng) -> String {
    if rng.next_u64() % 100 < 40 {
        let suffix = NAME_SUFFIXES[(rng.next_u64() % 11) as usize];
        format!("{parent_name} {suffix}")
    } else {
        NAME_POOL[(rng.next_u64() % 24) as usize].to_string()
    }
}

// ---------------------------------------------------------------------------
// Finalize
// ---------------------------------------------------------------------------

/// Build the child probe from a finished replication and return the parent
/// to ACTIVE. Caller records the lineage entry and inserts the child.
pub fn finalize(parent: &mut Probe, tick: u64, rng: &mut SimRng) -> Option<Probe> {
    let state = parent.replication.as_ref()?;
    if state.progress < 1.0 - 0.001 {
        return None;
    }

    let mut child = parent.clone();
    child.id = Uid::from_rng(rng);
    child.parent_id = parent.id;
    child.generation = parent.generation + 1;
    child.name = child_name(&parent.name, rng);
    child.created_tick = tick;

    // Minimal starting kit; position and capabilities inherited.
    child.energy_joules = parent.energy_joules * 0.3;
    child.fuel_kg = parent.fuel_kg * 0.3;
    child.mass_kg = parent.mass_kg * 0.5;
    child.hull_integrity = 1.0;
    child.resources = [0.0; Resource::COUNT];

    child.personality = mutate_personality(&parent.personality, rng);
    degrade_earth_memories(&mut child);
    child.quirks = inherit_quirks(&parent.quirks, rng);

    child.memories = Vec::new();
    child.relationships = Vec::new();
    child.survey = None;
    child.replication = None;
    child.research = None;
    child.isolation_ticks = 0;
    child.status = ProbeStatus::Active;
    child.speed_c = 0.0;
    child.travel_remaining_ly = 0.0;
    child.recompute_derived();

    parent.status = ProbeStatus::Active;
    parent.replication = None;

    Some(child)
}

pub fn lineage_entry(parent: &Probe, child: &Probe, tick: u64) -> LineageEntry {
    LineageEntry {
        parent_id: parent.id,
        child_id: child.id,
        birth_tick: tick,
        generation: child.generation,
    }
}
