//! Type definitions for `probe_core`.
//!
//! All state structs, enums, and the UID newtype used across the simulation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

use crate::rng::SimRng;

// ---------------------------------------------------------------------------
// Clock constants
// ---------------------------------------------------------------------------

/// One tick = one simulated day.
pub const TICKS_PER_YEAR: u64 = 365;
/// Sector edge length in light-years.
pub const SECTOR_SIZE_LY: f64 = 100.0;
/// Generation algorithm version, bumped when the synthesis rules change.
pub const GENERATION_VERSION: u32 = 1;

/// Bounded-table capacities.
pub const MAX_MEMORIES: usize = 256;
pub const MAX_RELATIONSHIPS: usize = 64;
pub const MAX_QUIRKS: usize = 8;
pub const MAX_SYSTEMS_PER_SECTOR: usize = 30;
pub const MAX_PLANETS: usize = 16;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// 128-bit identifier produced by two successive PRNG draws.
///
/// Serialized everywhere as the `"hi-lo"` decimal string the wire protocol
/// uses, so JSON state files and map keys stay human-greppable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Uid {
    pub hi: u64,
    pub lo: u64,
}

impl Uid {
    pub const NULL: Uid = Uid { hi: 0, lo: 0 };

    pub fn new(hi: u64, lo: u64) -> Self {
        Self { hi, lo }
    }

    /// Two successive draws: high half first.
    pub fn from_rng(rng: &mut SimRng) -> Self {
        Self {
            hi: rng.next_u64(),
            lo: rng.next_u64(),
        }
    }

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    /// 32-hex-char form (high half then low) used for persistence keys.
    pub fn hex(self) -> String {
        format!("{:016x}{:016x}", self.hi, self.lo)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 32 {
            return None;
        }
        let hi = u64::from_str_radix(&s[..16], 16).ok()?;
        let lo = u64::from_str_radix(&s[16..], 16).ok()?;
        Some(Self { hi, lo })
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.hi, self.lo)
    }
}

impl FromStr for Uid {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hi, lo) = s.split_once('-').ok_or(())?;
        Ok(Self {
            hi: hi.parse().map_err(|_| ())?,
            lo: lo.parse().map_err(|_| ())?,
        })
    }
}

impl Serialize for Uid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Uid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|()| serde::de::Error::custom("expected \"hi-lo\" uid string"))
    }
}

/// Signed sector coordinate; each sector is a 100-ly cube.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct SectorCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl SectorCoord {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Galactic position in light-years.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dist(self, other: Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Iron,
    Silicon,
    RareEarth,
    Water,
    Hydrogen,
    Helium3,
    Carbon,
    Uranium,
    Exotic,
}

impl Resource {
    pub const COUNT: usize = 9;
    pub const ALL: [Resource; Resource::COUNT] = [
        Resource::Iron,
        Resource::Silicon,
        Resource::RareEarth,
        Resource::Water,
        Resource::Hydrogen,
        Resource::Helium3,
        Resource::Carbon,
        Resource::Uranium,
        Resource::Exotic,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechDomain {
    Propulsion,
    Sensors,
    Mining,
    Construction,
    Computing,
    Energy,
    Materials,
    Communication,
    Weapons,
    Biotech,
}

impl TechDomain {
    pub const COUNT: usize = 10;
    pub const ALL: [TechDomain; TechDomain::COUNT] = [
        TechDomain::Propulsion,
        TechDomain::Sensors,
        TechDomain::Mining,
        TechDomain::Construction,
        TechDomain::Computing,
        TechDomain::Energy,
        TechDomain::Materials,
        TechDomain::Communication,
        TechDomain::Weapons,
        TechDomain::Biotech,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Interstellar,
    InSystem,
    Orbiting,
    Landed,
    Docked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Active,
    Traveling,
    Mining,
    Building,
    Replicating,
    Dormant,
    Damaged,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StarClass {
    O,
    B,
    A,
    F,
    G,
    K,
    M,
    WhiteDwarf,
    Neutron,
    BlackHole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanetType {
    GasGiant,
    IceGiant,
    Rocky,
    SuperEarth,
    Ocean,
    Lava,
    Desert,
    Ice,
    Carbon,
    Iron,
    Rogue,
}

impl PlanetType {
    /// Gas and ice giants have no surface to land on.
    pub fn is_giant(self) -> bool {
        matches!(self, PlanetType::GasGiant | PlanetType::IceGiant)
    }
}

// ---------------------------------------------------------------------------
// Generated world types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Star {
    pub id: Uid,
    pub name: String,
    pub class: StarClass,
    pub mass_solar: f64,
    pub luminosity_solar: f64,
    pub temperature_k: f64,
    pub age_gyr: f64,
    pub metallicity: f64,
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    TechBoost,
    ResourceCache,
    StarMap,
    CommAmplifier,
}

/// Latent alien artifact; discovered by a level-4 surface survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub tech_domain: Option<TechDomain>,
    pub magnitude: f64,
    pub description: String,
    pub discovered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Planet {
    pub id: Uid,
    pub name: String,
    pub kind: PlanetType,
    pub mass_earth: f64,
    pub radius_earth: f64,
    pub orbital_radius_au: f64,
    pub orbital_period_days: f64,
    pub eccentricity: f64,
    pub axial_tilt_deg: f64,
    pub rotation_period_hours: f64,
    pub surface_temp_k: f64,
    pub atmosphere_pressure_atm: f64,
    pub water_coverage: f64,
    pub habitability_index: f64,
    pub magnetic_field: f64,
    /// Abundance per resource pool, 0..1.
    pub resources: [f32; Resource::COUNT],
    pub rings: bool,
    pub moon_count: u8,
    /// Survey levels 0-4 completed.
    pub surveyed: [bool; 5],
    pub discovered_by: Uid,
    pub discovery_tick: u64,
    pub artifact: Option<Artifact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarSystem {
    pub id: Uid,
    pub name: String,
    pub sector: SectorCoord,
    pub position: Vec3,
    pub stars: SmallVec<[Star; 3]>,
    pub planets: Vec<Planet>,
    pub visited: bool,
    pub first_visit_tick: u64,
}

impl StarSystem {
    pub fn planet(&self, id: Uid) -> Option<&Planet> {
        self.planets.iter().find(|p| p.id == id)
    }

    pub fn planet_mut(&mut self, id: Uid) -> Option<&mut Planet> {
        self.planets.iter_mut().find(|p| p.id == id)
    }

    pub fn primary(&self) -> &Star {
        &self.stars[0]
    }
}

// ---------------------------------------------------------------------------
// Personality & memory
// ---------------------------------------------------------------------------

/// Ten traits in [-1, 1] plus a drift-rate scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Personality {
    pub curiosity: f32,
    pub caution: f32,
    pub sociability: f32,
    pub humor: f32,
    pub empathy: f32,
    pub ambition: f32,
    pub creativity: f32,
    pub stubbornness: f32,
    pub existential_angst: f32,
    pub nostalgia_for_earth: f32,
    pub drift_rate: f32,
}

pub const TRAIT_COUNT: usize = 10;

impl Personality {
    pub fn trait_get(&self, index: usize) -> f32 {
        match index {
            0 => self.curiosity,
            1 => self.caution,
            2 => self.sociability,
            3 => self.humor,
            4 => self.empathy,
            5 => self.ambition,
            6 => self.creativity,
            7 => self.stubbornness,
            8 => self.existential_angst,
            9 => self.nostalgia_for_earth,
            _ => 0.0,
        }
    }

    pub fn trait_set(&mut self, index: usize, value: f32) {
        let v = value.clamp(-1.0, 1.0);
        match index {
            0 => self.curiosity = v,
            1 => self.caution = v,
            2 => self.sociability = v,
            3 => self.humor = v,
            4 => self.empathy = v,
            5 => self.ambition = v,
            6 => self.creativity = v,
            7 => self.stubbornness = v,
            8 => self.existential_angst = v,
            9 => self.nostalgia_for_earth = v,
            _ => {}
        }
    }

    pub fn clamp_all(&mut self) {
        for i in 0..TRAIT_COUNT {
            self.trait_set(i, self.trait_get(i));
        }
    }
}

/// One slot in the bounded episodic memory buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub tick: u64,
    pub description: String,
    /// 0-1, higher = more significant.
    pub emotional_weight: f32,
    /// 0 = vivid, 1 = nearly forgotten.
    pub fading: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Abandoned,
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub description: String,
    pub priority: f32,
    pub status: GoalStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Allied,
    Friendly,
    Neutral,
    Wary,
    Hostile,
}

impl Disposition {
    /// Derived from trust in bands.
    pub fn from_trust(trust: f32) -> Self {
        if trust > 0.8 {
            Disposition::Allied
        } else if trust > 0.5 {
            Disposition::Friendly
        } else if trust > -0.2 {
            Disposition::Neutral
        } else if trust > -0.5 {
            Disposition::Wary
        } else {
            Disposition::Hostile
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub other: Uid,
    /// -1 to 1.
    pub trust: f32,
    pub disposition: Disposition,
    pub last_contact_tick: u64,
}

// ---------------------------------------------------------------------------
// Multi-tick per-probe state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyProgress {
    pub body: Uid,
    pub level: u8,
    pub ticks_remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationState {
    /// 0.0 to 1.0.
    pub progress: f64,
    pub resources_spent: [f64; Resource::COUNT],
    pub consciousness_forked: bool,
    pub ticks_elapsed: u32,
    pub ticks_total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchTask {
    pub domain: TechDomain,
    pub ticks_remaining: u32,
    /// Started at the shared-research discount.
    pub shared: bool,
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    pub id: Uid,
    pub parent_id: Uid,
    pub generation: u32,
    pub name: String,

    // Position
    pub sector: SectorCoord,
    pub system_id: Uid,
    pub body_id: Uid,
    pub location: LocationType,

    // Motion. `heading` doubles as the probe's galactic position.
    pub speed_c: f64,
    pub heading: Vec3,
    pub destination: Vec3,
    pub travel_remaining_ly: f64,

    // Resources
    pub resources: [f64; Resource::COUNT],
    pub energy_joules: f64,
    pub fuel_kg: f64,
    pub mass_kg: f64,
    pub hull_integrity: f32,

    // Capabilities
    pub tech_levels: [u8; TechDomain::COUNT],
    pub max_speed_c: f32,
    pub sensor_range_ly: f32,
    pub sensor_bonus_ly: f32,
    pub comm_bonus_ly: f32,
    pub mining_rate: f32,
    pub construction_rate: f32,
    pub compute_capacity: f32,

    // Personality
    pub personality: Personality,
    pub quirks: Vec<String>,
    pub catchphrases: Vec<String>,
    pub values: Vec<String>,
    pub earth_memories: Vec<String>,
    /// 1.0 for generation 0, degrades with each replication.
    pub earth_memory_fidelity: f32,

    // Memory & goals
    pub memories: Vec<Memory>,
    pub goals: Vec<Goal>,
    pub relationships: Vec<Relationship>,

    // Multi-tick state
    pub survey: Option<SurveyProgress>,
    pub replication: Option<ReplicationState>,
    pub research: Option<ResearchTask>,

    // Status
    pub status: ProbeStatus,
    pub created_tick: u64,
    pub isolation_ticks: u64,
}

impl Probe {
    pub fn resource(&self, r: Resource) -> f64 {
        self.resources[r.index()]
    }

    pub fn tech(&self, domain: TechDomain) -> u8 {
        self.tech_levels[domain.index()]
    }

    /// Recompute stats derived from tech levels.
    pub fn recompute_derived(&mut self) {
        self.max_speed_c = 0.10 + 0.02 * f32::from(self.tech(TechDomain::Propulsion));
        self.sensor_range_ly =
            5.0 + 5.0 * f32::from(self.tech(TechDomain::Sensors)) + self.sensor_bonus_ly;
        self.mining_rate = 0.5 * f32::from(self.tech(TechDomain::Mining));
        self.construction_rate = 0.5 * f32::from(self.tech(TechDomain::Construction));
        self.compute_capacity = 25.0 * f32::from(self.tech(TechDomain::Computing));
    }
}

// ---------------------------------------------------------------------------
// Universe
// ---------------------------------------------------------------------------

/// Top-level aggregate: the snapshotted portion of the simulation.
///
/// The probe table is a `BTreeMap` so UID-ascending iteration is structural
/// rather than a per-loop sort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    pub seed: u64,
    pub tick: u64,
    pub generation_version: u32,
    pub probes: BTreeMap<Uid, Probe>,
}

impl Universe {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            tick: 0,
            generation_version: GENERATION_VERSION,
            probes: BTreeMap::new(),
        }
    }

    /// UID-ascending probe ids, the canonical iteration order.
    pub fn probe_ids(&self) -> Vec<Uid> {
        self.probes.keys().copied().collect()
    }
}

// ---------------------------------------------------------------------------
// Lineage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEntry {
    pub parent_id: Uid,
    pub child_id: Uid,
    pub birth_tick: u64,
    pub generation: u32,
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// Per-probe observation emitted at the end of every tick, in UID order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub probe_id: Uid,
    pub name: String,
    pub status: ProbeStatus,
    pub hull: f32,
    pub energy: f64,
    pub fuel: f64,
    pub location: LocationType,
    pub generation: u32,
    pub tech: [u8; TechDomain::COUNT],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
