//! Headless run loop: fallback-pilot actions, periodic saves, clean
//! signal-driven shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use tracing::{info, warn};

use probe_core::{Core, SimConfig, SimError};
use probe_control::{decide_all, FallbackPilot};
use probe_persist::{load_universe, save_universe, FileStore};

use crate::Args;

const LOG_EVERY_TICKS: u64 = 1000;

/// TERM/INT set a stop flag; the loop finishes the current tick and shuts
/// down cleanly. No cancellation mid-tick. The handler is installed once per
/// process.
fn stop_flag() -> Arc<AtomicBool> {
    static FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();
    FLAG.get_or_init(|| {
        let flag = Arc::new(AtomicBool::new(true));
        let handler_flag = Arc::clone(&flag);
        if let Err(err) = ctrlc::set_handler(move || {
            handler_flag.store(false, Ordering::SeqCst);
        }) {
            warn!("signal handler unavailable: {err}");
        }
        flag
    })
    .clone()
}

pub fn run(args: &Args) -> Result<()> {
    if args.visual {
        warn!("built without a renderer; falling back to headless mode");
    }

    // Persistence faults are the one fatal path: they surface as the
    // taxonomy's Storage kind and exit non-zero.
    let mut store = FileStore::open(&args.db)
        .map_err(|err| SimError::storage(format!("opening database {}: {err:#}", args.db)))?;

    let mut core = if args.resume && store.get("meta").is_some() {
        let universe = load_universe(&store)
            .map_err(|err| SimError::storage(format!("resuming from {}: {err:#}", args.db)))?;
        info!(
            seed = universe.seed,
            tick = universe.tick,
            probes = universe.probes.len(),
            "resumed"
        );
        Core::from_universe(universe, SimConfig::default())
    } else {
        if args.resume {
            warn!("no existing state found, starting fresh");
        }
        Core::new(args.seed, SimConfig::default())
    };

    let running = stop_flag();

    info!(
        seed = core.universe.seed,
        probes = core.universe.probes.len(),
        target_ticks = args.ticks,
        "starting simulation"
    );
    if args.visual {
        info!(
            sim_years = args.sim_years,
            hours = args.hours,
            "pacing hints apply only to visual sessions"
        );
    }

    let mut pilot = FallbackPilot;
    while running.load(Ordering::SeqCst) && (args.ticks == 0 || core.universe.tick < args.ticks) {
        let actions = decide_all(
            &mut pilot,
            core.universe.probes.values(),
            &core.config,
            core.universe.tick,
        );
        core.tick(&actions);

        let tick = core.universe.tick;
        if tick % args.save_interval == 0 {
            save_universe(&mut store, &core.universe)
                .map_err(|err| SimError::storage(format!("periodic save: {err:#}")))?;
        }
        if tick % LOG_EVERY_TICKS == 0 {
            let probes = core.universe.probes.len();
            let explored = core.systems_explored();
            info!(tick, probes, explored, "progress");
        }
    }

    save_universe(&mut store, &core.universe)
        .map_err(|err| SimError::storage(format!("final save: {err:#}")))?;
    info!(tick = core.universe.tick, "shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_args(db: &str, ticks: u64) -> Args {
        Args {
            seed: 42,
            ticks,
            headless: true,
            visual: false,
            pipe: false,
            db: db.to_string(),
            save_interval: 10,
            resume: false,
            sim_years: 24.0,
            hours: 3.0,
        }
    }

    #[test]
    fn run_saves_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("universe.db");
        let db_str = db.to_str().unwrap();

        let args = test_args(db_str, 25);
        run(&args).unwrap();

        let store = FileStore::open(db_str).unwrap();
        let universe = load_universe(&store).unwrap();
        assert_eq!(universe.tick, 25);
        assert_eq!(universe.seed, 42);

        // Resume and run further.
        let mut args = test_args(db_str, 40);
        args.resume = true;
        run(&args).unwrap();

        let store = FileStore::open(db_str).unwrap();
        let universe = load_universe(&store).unwrap();
        assert_eq!(universe.tick, 40);
    }

    #[test]
    fn storage_failure_is_fatal_with_storage_kind() {
        // The db directory does not exist, so the final save fails; the
        // process-level error models it as the taxonomy's Storage kind.
        let args = test_args("/nonexistent_dir_for_sure/universe.db", 5);
        let err = run(&args).unwrap_err();
        let sim_err = err
            .downcast_ref::<SimError>()
            .expect("fatal persistence faults carry a SimError");
        assert_eq!(sim_err.kind, probe_core::ErrorKind::Storage);
    }

    #[test]
    fn resumed_runs_are_deterministic() {
        let dir = tempfile::tempdir().unwrap();

        // One leg to tick 30, then resume the same state twice.
        let db_a = dir.path().join("a.db");
        run(&test_args(db_a.to_str().unwrap(), 30)).unwrap();
        let db_b = dir.path().join("b.db");
        std::fs::copy(&db_a, &db_b).unwrap();

        let mut leg_a = test_args(db_a.to_str().unwrap(), 90);
        leg_a.resume = true;
        run(&leg_a).unwrap();

        let mut leg_b = test_args(db_b.to_str().unwrap(), 90);
        leg_b.resume = true;
        run(&leg_b).unwrap();

        let a = load_universe(&FileStore::open(db_a.to_str().unwrap()).unwrap()).unwrap();
        let b = load_universe(&FileStore::open(db_b.to_str().unwrap()).unwrap()).unwrap();
        assert_eq!(a.tick, 90);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
