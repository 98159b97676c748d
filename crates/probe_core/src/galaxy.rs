//! Procedural galaxy generation.
//!
//! Stars follow real HR-diagram frequencies; planets come out of a simplified
//! accretion model with a Titius–Bode-like spacing. Everything is a pure
//! function of `(seed, sector)` through a derived RNG, so regeneration is
//! idempotent and byte-identical across runs and hosts.

use smallvec::SmallVec;

use crate::rng::SimRng;
use crate::types::{
    Artifact, ArtifactKind, Planet, PlanetType, Resource, SectorCoord, Star, StarClass, StarSystem,
    TechDomain, Uid, Vec3, MAX_PLANETS, MAX_SYSTEMS_PER_SECTOR, SECTOR_SIZE_LY,
};

// ---------------------------------------------------------------------------
// Star class distribution (cumulative)
// ---------------------------------------------------------------------------

// Frequency: M 76.5%, K 12.1%, G 7.6%, F 3%, A 0.6%, B 0.13%, O trace,
// plus a small tail for stellar remnants.
struct StarRow {
    class: StarClass,
    cumulative: f64,
    temp: (f64, f64),
    mass: (f64, f64),
    lum: (f64, f64),
}

#[rustfmt::skip]
const STAR_TABLE: [StarRow; 10] = [
    StarRow { class: StarClass::M,          cumulative: 0.7650,  temp: (2400.0, 3700.0),  mass: (0.08, 0.45), lum: (0.0001, 0.08) },
    StarRow { class: StarClass::K,          cumulative: 0.8860,  temp: (3700.0, 5200.0),  mass: (0.45, 0.80), lum: (0.08, 0.60) },
    StarRow { class: StarClass::G,          cumulative: 0.9620,  temp: (5200.0, 6000.0),  mass: (0.80, 1.04), lum: (0.60, 1.50) },
    StarRow { class: StarClass::F,          cumulative: 0.9920,  temp: (6000.0, 7500.0),  mass: (1.04, 1.40), lum: (1.50, 5.00) },
    StarRow { class: StarClass::A,          cumulative: 0.9980,  temp: (7500.0, 10_000.0), mass: (1.40, 2.10), lum: (5.00, 25.00) },
    StarRow { class: StarClass::B,          cumulative: 0.9993,  temp: (10_000.0, 30_000.0), mass: (2.10, 16.0), lum: (25.00, 30_000.0) },
    StarRow { class: StarClass::O,          cumulative: 0.99933, temp: (30_000.0, 50_000.0), mass: (16.0, 90.0), lum: (30_000.0, 1_000_000.0) },
    StarRow { class: StarClass::WhiteDwarf, cumulative: 0.9998,  temp: (4000.0, 40_000.0), mass: (0.17, 1.33), lum: (0.0001, 0.10) },
    StarRow { class: StarClass::Neutron,    cumulative: 0.99998, temp: (0.0, 0.0),        mass: (1.10, 2.16), lum: (0.0, 0.0) },
    StarRow { class: StarClass::BlackHole,  cumulative: 1.0000,  temp: (0.0, 0.0),        mass: (3.0, 100.0), lum: (0.0, 0.0) },
];

// ---------------------------------------------------------------------------
// Name syllables
// ---------------------------------------------------------------------------

const NAME_PREFIX: [&str; 40] = [
    "Al", "Be", "Ca", "De", "El", "Fa", "Ga", "He", "In", "Jo", "Ka", "Le", "Ma", "Ne", "Or", "Pa",
    "Qu", "Re", "Sa", "Te", "Um", "Ve", "Wa", "Xe", "Ya", "Ze", "Ar", "Bo", "Cy", "Di", "Et", "Fi",
    "Gi", "Ha", "Ix", "Ju", "Ko", "Li", "Mi", "No",
];
const NAME_MIDDLE: [&str; 30] = [
    "ra", "le", "ni", "ta", "so", "mu", "ka", "ri", "do", "ve", "na", "li", "pe", "tu", "go", "sa",
    "mi", "fe", "ba", "lo", "ne", "si", "ru", "wa", "ke", "di", "mo", "pa", "ti", "xu",
];
const NAME_SUFFIX: [&str; 20] = [
    "x", "n", "s", "r", "th", "m", "l", "d", "k", "ph", "ris", "nus", "tis", "lon", "sar", "mir",
    "dex", "vos", "pis", "tar",
];

const ARTIFACT_DESCS: [&str; 4] = [
    "Dormant data core of alien manufacture, still warm to sensors",
    "Sealed cache vault stocked with refined materials",
    "Etched navigation tablet mapping stars no catalog lists",
    "Antenna lattice that resonates with any carrier signal",
];

/// Per-planet chance of carrying a latent artifact.
const ARTIFACT_CHANCE: f64 = 0.02;

// ---------------------------------------------------------------------------
// Spiral arm model
// ---------------------------------------------------------------------------

/// Four-arm logarithmic spiral density at a galactic (x, y) position, 0-1.
fn spiral_arm_density(gx: f64, gy: f64) -> f64 {
    let r = (gx * gx + gy * gy).sqrt();
    if r < 100.0 {
        return 1.0; // dense core
    }

    let theta = gy.atan2(gx);
    let mut best = 0.0_f64;

    // Four arms offset by pi/2; pitch angle ~12.6 degrees.
    for arm in 0..4 {
        let arm_offset = f64::from(arm) * (std::f64::consts::PI / 2.0);
        let pitch = 0.22;
        let arm_theta = pitch * (r / 1000.0).ln() + arm_offset;

        // Angular distance wrapped to [-pi, pi].
        let mut diff = theta - arm_theta;
        diff = (diff + 3.0 * std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI)
            - std::f64::consts::PI;

        let arm_width = 0.4_f64;
        let density = (-(diff * diff) / (2.0 * arm_width * arm_width)).exp();
        if density > best {
            best = density;
        }
    }

    let base = 0.15;
    let radial_falloff = (-r / 40_000.0).exp();
    (base + (1.0 - base) * best) * radial_falloff
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn generate_name(rng: &mut SimRng) -> String {
    let pre = NAME_PREFIX[rng.range(NAME_PREFIX.len() as u64) as usize];
    let mid = NAME_MIDDLE[rng.range(NAME_MIDDLE.len() as u64) as usize];
    let suf = NAME_SUFFIX[rng.range(NAME_SUFFIX.len() as u64) as usize];
    let has_middle = rng.double() < 0.6;
    if has_middle {
        format!("{pre}{mid}{suf}")
    } else {
        format!("{pre}{suf}")
    }
}

// ---------------------------------------------------------------------------
// Star generation
// ---------------------------------------------------------------------------

fn generate_star(rng: &mut SimRng, position: Vec3) -> Star {
    let id = Uid::from_rng(rng);
    let name = generate_name(rng);

    let roll = rng.double();
    let row = STAR_TABLE
        .iter()
        .find(|row| roll <= row.cumulative)
        .unwrap_or(&STAR_TABLE[STAR_TABLE.len() - 1]);

    // One interpolation parameter so mass, temperature, and luminosity co-vary.
    let t = rng.double();
    let temperature_k = lerp(row.temp.0, row.temp.1, t);
    let mass_solar = lerp(row.mass.0, row.mass.1, t);
    let luminosity_solar = lerp(row.lum.0, row.lum.1, t);

    let age_gyr = lerp(0.1, 13.0, rng.double());
    let metallicity = rng.gaussian() * 0.3;

    Star {
        id,
        name,
        class: row.class,
        mass_solar,
        luminosity_solar,
        temperature_k,
        age_gyr,
        metallicity,
        position,
    }
}

/// Habitable zone boundaries in AU for a star of solar luminosity `l`.
pub fn habitable_zone(luminosity_solar: f64) -> (f64, f64) {
    let sqrt_l = luminosity_solar.sqrt();
    (sqrt_l * 0.95, sqrt_l * 1.37)
}

// ---------------------------------------------------------------------------
// Planet generation
// ---------------------------------------------------------------------------

fn pick_planet_type(rng: &mut SimRng, orbital_au: f64, hz_inner: f64, hz_outer: f64) -> PlanetType {
    let r = rng.double();

    if orbital_au < hz_inner * 0.5 {
        // Very close — hot zone.
        if r < 0.3 {
            PlanetType::Lava
        } else if r < 0.6 {
            PlanetType::Iron
        } else if r < 0.8 {
            PlanetType::Rocky
        } else {
            PlanetType::Desert
        }
    } else if orbital_au >= hz_inner && orbital_au <= hz_outer {
        // Habitable zone.
        if r < 0.25 {
            PlanetType::Rocky
        } else if r < 0.45 {
            PlanetType::Ocean
        } else if r < 0.60 {
            PlanetType::SuperEarth
        } else if r < 0.75 {
            PlanetType::Desert
        } else if r < 0.85 {
            PlanetType::Carbon
        } else {
            PlanetType::Ice
        }
    } else if orbital_au < hz_inner {
        // Warm zone.
        if r < 0.35 {
            PlanetType::Rocky
        } else if r < 0.55 {
            PlanetType::Desert
        } else if r < 0.70 {
            PlanetType::SuperEarth
        } else if r < 0.85 {
            PlanetType::Lava
        } else {
            PlanetType::Iron
        }
    } else if orbital_au < hz_outer * 5.0 {
        // Cold zone — giants more likely.
        if r < 0.35 {
            PlanetType::GasGiant
        } else if r < 0.55 {
            PlanetType::IceGiant
        } else if r < 0.70 {
            PlanetType::Ice
        } else if r < 0.85 {
            PlanetType::Rocky
        } else {
            PlanetType::SuperEarth
        }
    } else {
        // Far outer — ice and gas.
        if r < 0.40 {
            PlanetType::IceGiant
        } else if r < 0.65 {
            PlanetType::GasGiant
        } else if r < 0.80 {
            PlanetType::Ice
        } else if r < 0.95 {
            PlanetType::Rogue
        } else {
            PlanetType::Carbon
        }
    }
}

/// Mass range in Earth masses per planet type.
fn planet_mass_range(kind: PlanetType) -> (f64, f64) {
    match kind {
        PlanetType::GasGiant => (10.0, 4000.0),
        PlanetType::IceGiant => (5.0, 50.0),
        PlanetType::Rocky => (0.01, 2.0),
        PlanetType::SuperEarth => (1.5, 10.0),
        PlanetType::Ocean | PlanetType::Carbon => (0.5, 8.0),
        PlanetType::Lava => (0.1, 3.0),
        PlanetType::Desert => (0.1, 5.0),
        PlanetType::Ice => (0.01, 5.0),
        PlanetType::Iron => (0.1, 4.0),
        PlanetType::Rogue => (0.001, 15.0),
    }
}

/// Radius from mass: slow power law for giants, m^0.27 for rocky bodies.
fn planet_radius(kind: PlanetType, mass_earth: f64) -> f64 {
    match kind {
        PlanetType::GasGiant => mass_earth.powf(0.06) * 11.0,
        PlanetType::IceGiant => mass_earth.powf(0.06) * 4.0,
        _ => mass_earth.powf(0.27),
    }
}

fn generate_resources(rng: &mut SimRng, kind: PlanetType) -> [f32; Resource::COUNT] {
    let mut res = [0.0_f32; Resource::COUNT];
    let mut set = |slot: Resource, base: f64, spread: f64, rng: &mut SimRng| {
        res[slot.index()] = (base + spread * rng.double()) as f32;
    };

    match kind {
        PlanetType::Rocky | PlanetType::Desert => {
            set(Resource::Iron, 0.3, 0.5, rng);
            set(Resource::Silicon, 0.3, 0.5, rng);
            set(Resource::RareEarth, 0.05, 0.15, rng);
            set(Resource::Carbon, 0.05, 0.1, rng);
            set(Resource::Uranium, 0.01, 0.05, rng);
        }
        PlanetType::Iron => {
            set(Resource::Iron, 0.6, 0.4, rng);
            set(Resource::Silicon, 0.1, 0.2, rng);
            set(Resource::RareEarth, 0.1, 0.3, rng);
            set(Resource::Uranium, 0.03, 0.1, rng);
        }
        PlanetType::Ocean => {
            set(Resource::Water, 0.7, 0.3, rng);
            set(Resource::Silicon, 0.1, 0.2, rng);
            set(Resource::Iron, 0.05, 0.15, rng);
        }
        PlanetType::Ice => {
            set(Resource::Water, 0.5, 0.5, rng);
            set(Resource::Hydrogen, 0.1, 0.2, rng);
            set(Resource::Helium3, 0.01, 0.05, rng);
        }
        PlanetType::GasGiant => {
            set(Resource::Hydrogen, 0.7, 0.3, rng);
            set(Resource::Helium3, 0.1, 0.3, rng);
        }
        PlanetType::IceGiant => {
            set(Resource::Hydrogen, 0.3, 0.3, rng);
            set(Resource::Water, 0.3, 0.3, rng);
            set(Resource::Helium3, 0.05, 0.15, rng);
        }
        PlanetType::Carbon => {
            set(Resource::Carbon, 0.6, 0.4, rng);
            set(Resource::Silicon, 0.1, 0.2, rng);
            set(Resource::RareEarth, 0.05, 0.1, rng);
        }
        PlanetType::Lava => {
            set(Resource::Iron, 0.4, 0.4, rng);
            set(Resource::Silicon, 0.2, 0.3, rng);
            set(Resource::RareEarth, 0.1, 0.2, rng);
        }
        PlanetType::SuperEarth => {
            set(Resource::Iron, 0.2, 0.4, rng);
            set(Resource::Silicon, 0.2, 0.4, rng);
            set(Resource::Water, 0.1, 0.3, rng);
            set(Resource::RareEarth, 0.05, 0.15, rng);
            set(Resource::Carbon, 0.05, 0.15, rng);
        }
        PlanetType::Rogue => {
            set(Resource::Water, 0.1, 0.3, rng);
            set(Resource::Iron, 0.1, 0.2, rng);
        }
    }

    // Exotic matter: very low chance on any planet.
    if rng.double() < 0.005 {
        set(Resource::Exotic, 0.01, 0.05, rng);
    }

    res
}

fn generate_artifact(rng: &mut SimRng) -> Option<Artifact> {
    if rng.double() >= ARTIFACT_CHANCE {
        return None;
    }
    let pick = rng.range(4) as usize;
    let kind = [
        ArtifactKind::TechBoost,
        ArtifactKind::ResourceCache,
        ArtifactKind::StarMap,
        ArtifactKind::CommAmplifier,
    ][pick];
    let (tech_domain, magnitude) = match kind {
        ArtifactKind::TechBoost => {
            let domain = TechDomain::ALL[rng.range(TechDomain::COUNT as u64) as usize];
            (Some(domain), 1.0 + rng.range(3) as f64)
        }
        ArtifactKind::ResourceCache => (None, 10_000.0 + rng.double() * 90_000.0),
        ArtifactKind::StarMap | ArtifactKind::CommAmplifier => (None, 5.0 + rng.double() * 10.0),
    };
    Some(Artifact {
        kind,
        tech_domain,
        magnitude,
        description: ARTIFACT_DESCS[pick].to_string(),
        discovered: false,
    })
}

#[allow(clippy::too_many_lines)]
fn generate_planet(rng: &mut SimRng, index: usize, star: &Star) -> Planet {
    let id = Uid::from_rng(rng);

    // Planet name: star name + letter suffix, planets from 'b'.
    let letter = (b'b' + index as u8) as char;
    let name = format!("{} {letter}", star.name);

    // Orbital radius: Titius-Bode-ish spacing, each planet 1.4-2.2x further out.
    let base_au = if index == 0 {
        0.1 + 0.3 * rng.double()
    } else {
        (0.2 + 0.2 * rng.double()) * (1.4 + 0.8 * rng.double()).powi(index as i32)
    };
    let orbital_radius_au = base_au * star.luminosity_solar.max(0.01).sqrt();

    let (hz_inner, hz_outer) = habitable_zone(star.luminosity_solar);
    let kind = pick_planet_type(rng, orbital_radius_au, hz_inner, hz_outer);

    let (m_lo, m_hi) = planet_mass_range(kind);
    let mass_earth = lerp(m_lo, m_hi, rng.double());
    let radius_earth = planet_radius(kind, mass_earth);

    // Kepler's third law in solar units: P² = a³ / M⋆.
    let a3 = orbital_radius_au.powi(3);
    let period_years = (a3 / star.mass_solar.max(0.01)).sqrt();
    let orbital_period_days = period_years * 365.25;

    let mut eccentricity = rng.double() * 0.3;
    if rng.double() < 0.05 {
        eccentricity = 0.3 + rng.double() * 0.5;
    }
    let mut axial_tilt_deg = rng.double() * 45.0;
    if rng.double() < 0.1 {
        axial_tilt_deg = 45.0 + rng.double() * 135.0;
    }
    let mut rotation_period_hours = 5.0 + rng.double() * 200.0;
    if kind.is_giant() {
        rotation_period_hours = 8.0 + rng.double() * 20.0;
    }

    // Equilibrium temperature, Earth-normalized to 278 K at 1 AU / 1 L☉.
    let flux = star.luminosity_solar / (orbital_radius_au * orbital_radius_au);
    let mut surface_temp_k = 278.0 * flux.powf(0.25);

    let atmosphere_pressure_atm = match kind {
        PlanetType::GasGiant | PlanetType::IceGiant => 100.0 + rng.double() * 900.0,
        PlanetType::Rocky | PlanetType::Desert | PlanetType::Iron => rng.double() * 2.0,
        PlanetType::SuperEarth | PlanetType::Ocean => 0.5 + rng.double() * 5.0,
        PlanetType::Lava => 0.1 + rng.double() * 10.0,
        PlanetType::Ice | PlanetType::Rogue => rng.double() * 0.5,
        PlanetType::Carbon => 0.5 + rng.double() * 3.0,
    };

    // Greenhouse multiplier grows with pressure; giants excluded.
    if atmosphere_pressure_atm > 0.1 && !kind.is_giant() {
        surface_temp_k *= 1.0 + 0.1 * (1.0 + atmosphere_pressure_atm).ln();
    }

    let mut water_coverage = 0.0;
    if kind == PlanetType::Ocean {
        water_coverage = 0.6 + rng.double() * 0.4;
    } else if matches!(kind, PlanetType::SuperEarth | PlanetType::Rocky)
        && surface_temp_k > 200.0
        && surface_temp_k < 400.0
        && atmosphere_pressure_atm > 0.01
    {
        water_coverage = rng.double() * 0.8;
    }

    let magnetic_field = if kind == PlanetType::GasGiant {
        5.0 + rng.double() * 15.0
    } else if mass_earth > 0.5 && rotation_period_hours < 48.0 {
        0.1 + rng.double() * 2.0
    } else {
        rng.double() * 0.1
    };

    // Habitability: weighted composite of temperature, atmosphere, water,
    // magnetic field, and mass, clamped to [0, 1].
    let mut habitability_index = 0.0;
    if surface_temp_k > 200.0 && surface_temp_k < 340.0 {
        let temp_score = (1.0 - (surface_temp_k - 288.0).abs() / 100.0).max(0.0);
        let atm_score = if atmosphere_pressure_atm > 0.1 && atmosphere_pressure_atm < 5.0 {
            1.0
        } else {
            0.2
        };
        let water_score = water_coverage;
        let mag_score = if magnetic_field > 0.1 { 1.0 } else { 0.3 };
        let mass_score = if mass_earth > 0.3 && mass_earth < 5.0 {
            1.0
        } else {
            0.2
        };
        habitability_index = (temp_score * 0.3
            + atm_score * 0.2
            + water_score * 0.2
            + mag_score * 0.15
            + mass_score * 0.15)
            .min(1.0);
    }

    let rings = match kind {
        PlanetType::GasGiant => rng.double() < 0.4,
        PlanetType::IceGiant => rng.double() < 0.2,
        _ => false,
    };

    let moon_count = match kind {
        PlanetType::GasGiant => rng.range(8) as u8 + 2,
        PlanetType::IceGiant => rng.range(5) as u8 + 1,
        _ if mass_earth > 0.1 => rng.range(3) as u8,
        _ => 0,
    };

    let resources = generate_resources(rng, kind);
    let artifact = generate_artifact(rng);

    Planet {
        id,
        name,
        kind,
        mass_earth,
        radius_earth,
        orbital_radius_au,
        orbital_period_days,
        eccentricity,
        axial_tilt_deg,
        rotation_period_hours,
        surface_temp_k,
        atmosphere_pressure_atm,
        water_coverage,
        habitability_index,
        magnetic_field,
        resources,
        rings,
        moon_count,
        surveyed: [false; 5],
        discovered_by: Uid::NULL,
        discovery_tick: 0,
        artifact,
    }
}

// ---------------------------------------------------------------------------
// System generation
// ---------------------------------------------------------------------------

pub fn generate_system(rng: &mut SimRng, galactic_pos: Vec3, sector: SectorCoord) -> StarSystem {
    let id = Uid::from_rng(rng);

    // Most systems have one star, some binaries/triples.
    let r = rng.double();
    let star_count = if r < 0.70 {
        1
    } else if r < 0.95 {
        2
    } else {
        3
    };

    let mut stars: SmallVec<[Star; 3]> = SmallVec::new();
    for i in 0..star_count {
        let mut star_pos = galactic_pos;
        if i > 0 {
            star_pos.x += (rng.double() - 0.5) * 0.001;
            star_pos.y += (rng.double() - 0.5) * 0.001;
        }
        stars.push(generate_star(rng, star_pos));
    }

    let name = stars[0].name.clone();

    // Planet count depends on primary class and metallicity.
    let primary = &stars[0];
    let mut base_planets = match primary.class {
        StarClass::Neutron | StarClass::BlackHole => rng.range(3) as i64,
        StarClass::O | StarClass::B => 1 + rng.range(4) as i64,
        _ => 2 + rng.range(10) as i64,
    };
    if primary.metallicity > 0.1 {
        base_planets += 1 + rng.range(2) as i64;
    }
    if star_count > 1 {
        base_planets = base_planets * 2 / 3;
    }
    let planet_count = base_planets.clamp(0, MAX_PLANETS as i64) as usize;

    let primary = stars[0].clone();
    let mut planets = Vec::with_capacity(planet_count);
    for i in 0..planet_count {
        planets.push(generate_planet(rng, i, &primary));
    }

    StarSystem {
        id,
        name,
        sector,
        position: galactic_pos,
        stars,
        planets,
        visited: false,
        first_visit_tick: 0,
    }
}

// ---------------------------------------------------------------------------
// Sector generation
// ---------------------------------------------------------------------------

/// How many systems a sector at this position should hold.
///
/// `clamp(density·12 + jitter, 0, 30)` where density combines the spiral-arm
/// model with a thin-disk vertical falloff (scale height ~500 ly).
pub fn sector_star_count(rng: &mut SimRng, coord: SectorCoord) -> usize {
    let gx = f64::from(coord.x) * SECTOR_SIZE_LY;
    let gy = f64::from(coord.y) * SECTOR_SIZE_LY;
    let gz = f64::from(coord.z) * SECTOR_SIZE_LY;

    let z_density = (-(gz * gz) / (2.0 * 500.0 * 500.0)).exp();
    let arm = spiral_arm_density(gx, gy);

    let density = arm * z_density;
    let base = (density * 12.0) as i64;
    let jitter = rng.range((base / 2 + 1) as u64) as i64;
    (base + jitter).clamp(0, MAX_SYSTEMS_PER_SECTOR as i64) as usize
}

/// Deterministically generate every system in a sector.
///
/// Identical `(seed, coord)` yields a byte-identical system array.
pub fn generate_sector(galaxy_seed: u64, coord: SectorCoord) -> Vec<StarSystem> {
    let mut rng = SimRng::derive(galaxy_seed, coord.x, coord.y, coord.z);

    let count = sector_star_count(&mut rng, coord);

    let base_x = f64::from(coord.x) * SECTOR_SIZE_LY;
    let base_y = f64::from(coord.y) * SECTOR_SIZE_LY;
    let base_z = f64::from(coord.z) * SECTOR_SIZE_LY;

    let mut systems = Vec::with_capacity(count);
    for _ in 0..count {
        let pos = Vec3::new(
            base_x + rng.double() * SECTOR_SIZE_LY,
            base_y + rng.double() * SECTOR_SIZE_LY,
            base_z + rng.double() * SECTOR_SIZE_LY,
        );
        systems.push(generate_system(&mut rng, pos, coord));
    }

    systems
}
