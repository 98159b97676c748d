//! Interstellar travel: initiation, per-tick advance, hazards, arrival, and
//! the long-range sensor sweep.
//!
//! State machine: `IDLE → TRAVELING → IDLE` on arrival, or `TRAVELING →
//! DORMANT` on fuel exhaustion. A probe whose fuel cannot cover this tick's
//! burn goes dormant before the arrival check, so fuel hitting exactly zero
//! never counts as arriving.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::error::SimError;
use crate::rng::SimRng;
use crate::types::{
    LocationType, Probe, ProbeStatus, SectorCoord, StarClass, StarSystem, Uid, Vec3, TICKS_PER_YEAR,
};

/// Probes closer than this are the scanning probe itself.
const SELF_EPSILON_LY: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelOutcome {
    EnRoute,
    Arrived,
    FuelExhausted,
}

/// Relativistic factor for an observable; input clamped just below c.
pub fn lorentz_factor(speed_c: f64) -> f64 {
    if speed_c <= 0.0 {
        return 1.0;
    }
    let v = speed_c.min(0.999_999_999);
    1.0 / (1.0 - v * v).sqrt()
}

/// Begin interstellar transit toward `target_pos`.
///
/// Returns the estimated tick count, or an error when the probe is already
/// traveling or cannot cover a minimum of the journey.
pub fn initiate(
    probe: &mut Probe,
    target_system: Uid,
    target_sector: SectorCoord,
    target_pos: Vec3,
    config: &SimConfig,
) -> Result<u64, SimError> {
    if probe.status == ProbeStatus::Traveling {
        return Err(SimError::precondition("already traveling"));
    }

    let dist = probe.heading.dist(target_pos);
    if dist < SELF_EPSILON_LY {
        return Ok(0); // already there
    }

    let fuel_needed = dist * config.fuel_burn_per_ly_kg;
    if probe.fuel_kg < config.min_travel_fuel_kg && fuel_needed > probe.fuel_kg {
        return Err(SimError::insufficient("insufficient fuel for transit"));
    }

    probe.status = ProbeStatus::Traveling;
    probe.location = LocationType::Interstellar;
    probe.speed_c = f64::from(probe.max_speed_c);
    probe.travel_remaining_ly = dist;
    probe.destination = target_pos;
    probe.system_id = target_system;
    probe.sector = target_sector;
    probe.body_id = Uid::NULL;

    let travel_years = dist / probe.speed_c;
    Ok((travel_years * 365.25) as u64)
}

/// Advance one tick of transit: burn fuel, advance position, roll the
/// micrometeorite hazard, detect arrival.
pub fn travel_tick(probe: &mut Probe, rng: &mut SimRng, config: &SimConfig) -> TravelOutcome {
    if probe.status != ProbeStatus::Traveling {
        return TravelOutcome::EnRoute;
    }

    let ly_this_tick = probe.speed_c / TICKS_PER_YEAR as f64;
    let fuel_cost = ly_this_tick * config.fuel_burn_per_ly_kg;

    // Fuel reaching exactly zero is exhaustion, not arrival.
    if probe.fuel_kg <= fuel_cost {
        probe.fuel_kg = 0.0;
        probe.speed_c = 0.0;
        probe.status = ProbeStatus::Dormant;
        return TravelOutcome::FuelExhausted;
    }
    probe.fuel_kg -= fuel_cost;

    probe.travel_remaining_ly -= ly_this_tick;

    // Interpolate position toward the destination by the fraction advanced.
    if probe.travel_remaining_ly > 0.0 {
        let total = probe.heading.dist(probe.destination);
        if total > SELF_EPSILON_LY {
            let frac = (ly_this_tick / total).min(1.0);
            probe.heading.x += (probe.destination.x - probe.heading.x) * frac;
            probe.heading.y += (probe.destination.y - probe.heading.y) * frac;
            probe.heading.z += (probe.destination.z - probe.heading.z) * frac;
        }
    }

    // Single uniform draw per tick for the micrometeorite hazard.
    if rng.double() < config.micrometeorite_chance {
        probe.hull_integrity = (probe.hull_integrity - config.micrometeorite_damage).max(0.0);
    }

    if probe.travel_remaining_ly <= 0.0 {
        probe.travel_remaining_ly = 0.0;
        probe.status = ProbeStatus::Active;
        probe.location = LocationType::InSystem;
        probe.heading = probe.destination;
        probe.speed_c = 0.0;
        return TravelOutcome::Arrived;
    }

    TravelOutcome::EnRoute
}

// ---------------------------------------------------------------------------
// Long-range sensor scan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanHit {
    pub system_id: Uid,
    pub name: String,
    pub star_class: StarClass,
    pub distance_ly: f64,
    pub position: Vec3,
    pub sector: SectorCoord,
}

/// Every candidate system within sensor range, sorted ascending by distance.
/// Distances are measured from the probe's heading vector (its position
/// proxy); the probe's own system (distance ≈ 0) is excluded.
pub fn scan(probe: &Probe, systems: &[StarSystem]) -> Vec<ScanHit> {
    let range = f64::from(probe.sensor_range_ly);
    let mut hits: Vec<ScanHit> = systems
        .iter()
        .filter_map(|sys| {
            let dist = probe.heading.dist(sys.position);
            if dist < SELF_EPSILON_LY || dist > range {
                return None;
            }
            Some(ScanHit {
                system_id: sys.id,
                name: sys.name.clone(),
                star_class: sys.primary().class,
                distance_ly: dist,
                position: sys.position,
                sector: sys.sector,
            })
        })
        .collect();
    hits.sort_by(|a, b| a.distance_ly.total_cmp(&b.distance_ly));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::galaxy;

    fn traveling_probe(dist_ly: f64) -> Probe {
        let mut probe = Probe::founder();
        let config = SimConfig::default();
        initiate(
            &mut probe,
            Uid::new(9, 9),
            SectorCoord::new(1, 0, 0),
            Vec3::new(dist_ly, 0.0, 0.0),
            &config,
        )
        .unwrap();
        probe
    }

    #[test]
    fn initiate_sets_travel_state() {
        let probe = traveling_probe(10.0);
        assert_eq!(probe.status, ProbeStatus::Traveling);
        assert_eq!(probe.location, LocationType::Interstellar);
        assert!((probe.travel_remaining_ly - 10.0).abs() < 1e-9);
        assert!((probe.speed_c - 0.16).abs() < 1e-6);
    }

    #[test]
    fn initiate_estimates_ticks() {
        let mut probe = Probe::founder();
        let config = SimConfig::default();
        let est = initiate(
            &mut probe,
            Uid::new(9, 9),
            SectorCoord::new(1, 0, 0),
            Vec3::new(16.0, 0.0, 0.0),
            &config,
        )
        .unwrap();
        // 16 ly at 0.16c = 100 years ≈ 36525 ticks.
        assert_eq!(est, 36_525);
    }

    #[test]
    fn initiate_rejects_double_start() {
        let mut probe = traveling_probe(10.0);
        let config = SimConfig::default();
        let err = initiate(
            &mut probe,
            Uid::new(9, 9),
            SectorCoord::new(1, 0, 0),
            Vec3::new(20.0, 0.0, 0.0),
            &config,
        )
        .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidPrecondition);
    }

    #[test]
    fn initiate_rejects_empty_tank() {
        let mut probe = Probe::founder();
        probe.fuel_kg = 0.5; // below minimum and below the trip cost
        let config = SimConfig::default();
        let err = initiate(
            &mut probe,
            Uid::new(9, 9),
            SectorCoord::new(1, 0, 0),
            Vec3::new(50.0, 0.0, 0.0),
            &config,
        )
        .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InsufficientResource);
    }

    #[test]
    fn travel_advances_monotonically_and_arrives() {
        let config = SimConfig::default();
        let mut probe = traveling_probe(0.01);
        let mut rng = SimRng::seed(1);

        let mut last_remaining = probe.travel_remaining_ly;
        let mut arrived = false;
        for _ in 0..100 {
            match travel_tick(&mut probe, &mut rng, &config) {
                TravelOutcome::Arrived => {
                    arrived = true;
                    break;
                }
                TravelOutcome::EnRoute => {
                    assert!(probe.travel_remaining_ly < last_remaining);
                    last_remaining = probe.travel_remaining_ly;
                }
                TravelOutcome::FuelExhausted => panic!("should not run dry"),
            }
        }
        assert!(arrived);
        assert_eq!(probe.status, ProbeStatus::Active);
        assert_eq!(probe.location, LocationType::InSystem);
        assert!((probe.heading.x - probe.destination.x).abs() < 1e-12);
        assert!((probe.speed_c - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn exact_fuel_exhaustion_is_dormant_not_arrival() {
        let config = SimConfig::default();
        let mut probe = traveling_probe(10.0);
        // Exactly one tick's burn remaining.
        probe.fuel_kg = probe.speed_c / TICKS_PER_YEAR as f64 * config.fuel_burn_per_ly_kg;
        let mut rng = SimRng::seed(1);

        let outcome = travel_tick(&mut probe, &mut rng, &config);
        assert_eq!(outcome, TravelOutcome::FuelExhausted);
        assert_eq!(probe.status, ProbeStatus::Dormant);
        assert!((probe.fuel_kg - 0.0).abs() < f64::EPSILON);
        assert!((probe.speed_c - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn lorentz_factor_bounds() {
        assert!((lorentz_factor(0.0) - 1.0).abs() < 1e-12);
        assert!((lorentz_factor(-1.0) - 1.0).abs() < 1e-12);
        let gamma_half = lorentz_factor(0.5);
        assert!((gamma_half - 1.0 / (0.75_f64).sqrt()).abs() < 1e-12);
        // Clamped just below c: huge but finite.
        assert!(lorentz_factor(1.0).is_finite());
        assert!(lorentz_factor(2.0) > 1.0e4);
    }

    #[test]
    fn scan_sorts_and_excludes_self() {
        let systems = galaxy::generate_sector(42, SectorCoord::new(0, 0, 0));
        let mut probe = Probe::founder();
        probe.heading = systems[0].position;
        probe.sensor_range_ly = 200.0; // whole sector

        let hits = scan(&probe, &systems);
        assert!(hits.iter().all(|h| h.system_id != systems[0].id));
        for pair in hits.windows(2) {
            assert!(pair[0].distance_ly <= pair[1].distance_ly);
        }
        assert_eq!(hits.len(), systems.len() - 1);
    }

    #[test]
    fn scan_respects_range() {
        let systems = galaxy::generate_sector(42, SectorCoord::new(0, 0, 0));
        let mut probe = Probe::founder();
        probe.heading = systems[0].position;
        probe.sensor_range_ly = 0.000_1;
        assert!(scan(&probe, &systems).is_empty());
    }

    #[test]
    fn micrometeorite_damage_statistics() {
        // Twenty independent ~12k-tick trips with fresh travel RNGs: the
        // count of damaged arrivals must exceed 1 (expected ≈ all of them at
        // p = 5e-4 per tick).
        let config = SimConfig::default();
        let mut damaged_trips = 0;
        for trip in 0..20u64 {
            let mut probe = Probe::founder();
            probe.fuel_kg = 1.0e9;
            initiate(
                &mut probe,
                Uid::new(9, trip),
                SectorCoord::new(1, 0, 0),
                // ~12000 ticks at 0.16c: 0.16/365*12000 ≈ 5.26 ly.
                Vec3::new(5.26, 0.0, 0.0),
                &config,
            )
            .unwrap();
            let mut rng = SimRng::seed(1000 + trip);
            for _ in 0..13_000 {
                if travel_tick(&mut probe, &mut rng, &config) != TravelOutcome::EnRoute {
                    break;
                }
            }
            if probe.hull_integrity < 1.0 {
                damaged_trips += 1;
            }
        }
        assert!(damaged_trips > 1, "only {damaged_trips} trips damaged");
    }
}
