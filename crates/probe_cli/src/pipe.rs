//! Line-oriented JSON command server on stdin/stdout.
//!
//! One JSON document per line in, one response per command out. Every
//! failure is modeled as a `SimError` from the core taxonomy — malformed
//! input, lookup misses, storage faults — and emerges on the wire as
//! `{"ok":false,"error":"..."}`; the server stays responsive. Responses are
//! assembled in a per-command arena region before being written out.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use probe_core::{
    Action, Arena, Core, InjectedEvent, ScheduledEvent, SimConfig, SimError, Snapshot, Uid,
};
use probe_persist::{load_universe, save_universe, FileStore};

use crate::Args;

/// Response assembly buffer (256 KiB).
const RESP_BUF: usize = 256 * 1024;
/// Snapshot slots held in memory.
const MAX_SNAPSHOT_SLOTS: usize = 2;

pub fn run(args: &Args) -> Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let mut core = Core::new(args.seed, SimConfig::default());
    let mut arena = Arena::with_capacity(RESP_BUF);
    let mut snapshots: Vec<Snapshot> = Vec::new();

    emit(
        &mut arena,
        &mut out,
        &json!({"ok": true, "ready": true, "seed": args.seed, "tick": 0}),
    )?;

    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let parsed: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(_) => {
                emit_error(&mut arena, &mut out, &SimError::malformed("unparseable JSON"))?;
                continue;
            }
        };
        let Some(cmd) = parsed.get("cmd").and_then(Value::as_str) else {
            emit_error(&mut arena, &mut out, &SimError::malformed("missing cmd"))?;
            continue;
        };

        let quit = cmd == "quit";
        let response = dispatch(cmd, &parsed, &mut core, &mut snapshots);
        match response {
            Ok(value) => emit(&mut arena, &mut out, &value)?,
            Err(error) => emit_error(&mut arena, &mut out, &error)?,
        }
        if quit {
            break;
        }
    }

    Ok(())
}

fn emit(arena: &mut Arena, out: &mut impl Write, value: &Value) -> Result<()> {
    arena.reset();
    let span = arena.alloc(RESP_BUF).context("response arena exhausted")?;
    let mut cursor = std::io::Cursor::new(arena.bytes_mut(span.clone()));

    if serde_json::to_writer(&mut cursor, value).is_err() {
        writeln!(out, "{{\"ok\":false,\"error\":\"response too large\"}}")?;
        out.flush()?;
        return Ok(());
    }
    let len = cursor.position() as usize;
    out.write_all(arena.bytes(span.start..span.start + len))?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

fn emit_error(arena: &mut Arena, out: &mut impl Write, error: &SimError) -> Result<()> {
    emit(arena, out, &json!({"ok": false, "error": error.message}))
}

fn parse_uid(value: Option<&Value>) -> Result<Uid, SimError> {
    let s = value
        .and_then(Value::as_str)
        .ok_or_else(|| SimError::malformed("missing probe_id"))?;
    Uid::from_str(s).map_err(|()| SimError::malformed(format!("bad uid: {s}")))
}

/// Handle one command. The `SimError` carries the short message for the
/// `{"ok":false}` reply and the taxonomy kind for callers that care.
#[allow(clippy::too_many_lines)]
fn dispatch(
    cmd: &str,
    parsed: &Value,
    core: &mut Core,
    snapshots: &mut Vec<Snapshot>,
) -> Result<Value, SimError> {
    match cmd {
        "quit" => Ok(json!({"ok": true})),

        "tick" => {
            let mut actions: BTreeMap<Uid, Action> = BTreeMap::new();
            if let Some(table) = parsed.get("actions").and_then(Value::as_object) {
                for (uid_str, action_value) in table {
                    let Ok(uid) = Uid::from_str(uid_str) else {
                        return Err(SimError::malformed(format!("bad uid: {uid_str}")));
                    };
                    let action: Action =
                        serde_json::from_value(action_value.clone()).map_err(|err| {
                            SimError::malformed(format!("bad action for {uid_str}: {err}"))
                        })?;
                    actions.insert(uid, action);
                }
            }
            let observations = core.tick(&actions);
            Ok(json!({
                "ok": true,
                "tick": core.universe.tick,
                "observations": observations,
            }))
        }

        "status" => {
            let probes: Vec<Value> = core
                .universe
                .probes
                .values()
                .map(|p| {
                    json!({
                        "id": p.id,
                        "name": p.name,
                        "status": p.status,
                        "location": p.location,
                        "generation": p.generation,
                    })
                })
                .collect();
            Ok(json!({"ok": true, "tick": core.universe.tick, "probes": probes}))
        }

        "metrics" => {
            let snapshot = probe_core::compute_metrics(
                &core.universe,
                &core.events,
                &core.lineage,
                core.systems_explored(),
            );
            Ok(json!({
                "ok": true,
                "tick": snapshot.tick,
                "probes_spawned": snapshot.probes_spawned,
                "avg_tech": snapshot.avg_tech,
                "avg_trust": snapshot.avg_trust,
                "systems_explored": snapshot.systems_explored,
                "total_discoveries": snapshot.total_discoveries,
                "total_hazards_survived": snapshot.total_hazards_survived,
            }))
        }

        "inject" => {
            let event_value = parsed
                .get("event")
                .ok_or_else(|| SimError::malformed("missing event"))?;
            let event: InjectedEvent = serde_json::from_value(event_value.clone())
                .map_err(|err| SimError::malformed(format!("invalid event JSON: {err}")))?;
            let queued = core.injections.push(event)?;
            Ok(json!({"ok": true, "queued": queued}))
        }

        "snapshot" => {
            let tag = parsed
                .get("tag")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| SimError::malformed("missing tag"))?;
            let snap = core.snapshot(tag);
            if let Some(slot) = snapshots.iter_mut().find(|s| s.tag == tag) {
                *slot = snap;
            } else if snapshots.len() < MAX_SNAPSHOT_SLOTS {
                snapshots.push(snap);
            } else {
                snapshots[0] = snap;
            }
            Ok(json!({"ok": true, "snapshot": tag, "tick": core.universe.tick}))
        }

        "restore" => {
            let tag = parsed
                .get("tag")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| SimError::malformed("missing tag"))?;
            let Some(snap) = snapshots.iter().find(|s| s.tag == tag) else {
                return Err(SimError::not_found("snapshot not found"));
            };
            let snap = snap.clone();
            core.restore(&snap);
            Ok(json!({"ok": true, "restored": tag, "tick": core.universe.tick}))
        }

        "config" => {
            let data = parsed
                .get("data")
                .and_then(Value::as_object)
                .ok_or_else(|| SimError::malformed("missing data"))?;
            let mut applied = 0;
            for (key, value) in data {
                if let Some(number) = value.as_f64() {
                    if core.config.apply(key, number) {
                        applied += 1;
                    }
                }
            }
            Ok(json!({"ok": true, "entries": applied}))
        }

        "save" => {
            let path = parsed
                .get("path")
                .and_then(Value::as_str)
                .ok_or_else(|| SimError::malformed("missing path"))?;
            let mut store = FileStore::open(path)
                .map_err(|err| SimError::storage(format!("opening {path}: {err:#}")))?;
            save_universe(&mut store, &core.universe)
                .map_err(|err| SimError::storage(format!("saving {path}: {err:#}")))?;
            Ok(json!({
                "ok": true,
                "saved": path,
                "tick": core.universe.tick,
                "probes": core.universe.probes.len(),
            }))
        }

        "load" => {
            let path = parsed
                .get("path")
                .and_then(Value::as_str)
                .ok_or_else(|| SimError::malformed("missing path"))?;
            let store = FileStore::open(path)
                .map_err(|err| SimError::storage(format!("opening {path}: {err:#}")))?;
            let universe = load_universe(&store)
                .map_err(|err| SimError::storage(format!("loading {path}: {err:#}")))?;
            let probes = universe.probes.len();
            let tick = universe.tick;
            *core = Core::from_universe(universe, core.config.clone());
            Ok(json!({"ok": true, "loaded": path, "tick": tick, "probes": probes}))
        }

        "scan" => {
            let probe_id = parse_uid(parsed.get("probe_id"))?;
            let hits = core.long_range_scan(probe_id)?;
            let systems: Vec<Value> = hits
                .iter()
                .map(|hit| {
                    json!({
                        "system_id": hit.system_id,
                        "name": hit.name,
                        "star_class": hit.star_class,
                        "distance_ly": hit.distance_ly,
                        "estimated_travel_ticks":
                            core.estimate_travel_ticks(probe_id, hit.distance_ly),
                        "position": hit.position,
                        "sector": hit.sector,
                    })
                })
                .collect();
            Ok(json!({"ok": true, "probe_id": probe_id, "systems": systems}))
        }

        "scenario" => match parsed.get("events").and_then(Value::as_array) {
            Some(raw_events) => {
                let mut events = Vec::with_capacity(raw_events.len());
                for raw in raw_events {
                    let event: ScheduledEvent = serde_json::from_value(raw.clone())
                        .map_err(|err| {
                            SimError::malformed(format!("invalid scenario event: {err}"))
                        })?;
                    events.push(event);
                }
                let loaded = events.len();
                core.scenario = events;
                Ok(json!({"ok": true, "loaded": loaded}))
            }
            None => Ok(json!({"ok": true, "events": core.scenario})),
        },

        "lineage" => Ok(json!({"ok": true, "entries": core.lineage})),

        "history" => {
            let probe_id = parse_uid(parsed.get("probe_id"))?;
            let events: Vec<Value> = core
                .events
                .for_probe(probe_id)
                .into_iter()
                .map(|e| {
                    json!({
                        "type": e.event_type,
                        "subtype": e.subtype,
                        "tick": e.tick,
                        "severity": e.severity,
                        "description": e.description,
                        "system_id": e.system_id,
                    })
                })
                .collect();
            Ok(json!({"ok": true, "events": events}))
        }

        _ => Err(SimError::malformed("unknown command")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::{ErrorKind, Resource};

    fn fresh() -> (Core, Vec<Snapshot>) {
        (Core::new(42, SimConfig::default()), Vec::new())
    }

    fn call(
        core: &mut Core,
        snapshots: &mut Vec<Snapshot>,
        line: &str,
    ) -> Result<Value, SimError> {
        let parsed: Value = serde_json::from_str(line).unwrap();
        let cmd = parsed.get("cmd").and_then(Value::as_str).unwrap().to_string();
        dispatch(&cmd, &parsed, core, snapshots)
    }

    #[test]
    fn status_shows_the_founder() {
        let (mut core, mut snaps) = fresh();
        let response = call(&mut core, &mut snaps, r#"{"cmd":"status"}"#).unwrap();
        assert_eq!(response["ok"], json!(true));
        assert_eq!(response["tick"], json!(0));
        let probes = response["probes"].as_array().unwrap();
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0]["name"], json!("Bob"));
        assert_eq!(probes[0]["status"], json!("active"));
        assert_eq!(probes[0]["location"], json!("in_system"));
        assert_eq!(probes[0]["id"], json!("1-1"));
    }

    #[test]
    fn tick_with_wait_action_advances() {
        let (mut core, mut snaps) = fresh();
        let response = call(
            &mut core,
            &mut snaps,
            r#"{"cmd":"tick","actions":{"1-1":{"action":"wait"}}}"#,
        )
        .unwrap();
        assert_eq!(response["tick"], json!(1));
        let observations = response["observations"].as_array().unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0]["probe_id"], json!("1-1"));
        assert!(observations[0].get("error").is_none());
    }

    #[test]
    fn tick_with_bad_action_is_rejected_whole() {
        let (mut core, mut snaps) = fresh();
        let err = call(
            &mut core,
            &mut snaps,
            r#"{"cmd":"tick","actions":{"1-1":{"action":"explode"}}}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedInput);
        assert!(err.message.contains("bad action"));
        assert_eq!(core.universe.tick, 0, "rejected commands do not tick");
    }

    #[test]
    fn failed_action_surfaces_in_observation() {
        let (mut core, mut snaps) = fresh();
        let response = call(
            &mut core,
            &mut snaps,
            r#"{"cmd":"tick","actions":{"1-1":{"action":"mine","resource":"iron"}}}"#,
        )
        .unwrap();
        let observations = response["observations"].as_array().unwrap();
        assert!(observations[0]["error"].is_string());
    }

    #[test]
    fn protocol_errors_carry_taxonomy_kinds() {
        let (mut core, mut snaps) = fresh();
        let err = call(&mut core, &mut snaps, r#"{"cmd":"warp"}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedInput);
        assert_eq!(err.message, "unknown command");

        let err = call(&mut core, &mut snaps, r#"{"cmd":"snapshot"}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedInput);

        let err = call(&mut core, &mut snaps, r#"{"cmd":"inject"}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedInput);

        let err = call(&mut core, &mut snaps, r#"{"cmd":"scan"}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedInput);

        let err = call(
            &mut core,
            &mut snaps,
            r#"{"cmd":"scan","probe_id":"9-9"}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        let err = call(
            &mut core,
            &mut snaps,
            r#"{"cmd":"restore","tag":"nope"}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn storage_failures_are_storage_kind() {
        let (mut core, mut snaps) = fresh();
        // Loading a store that does not exist fails before any universe
        // rebuild happens.
        let err = call(
            &mut core,
            &mut snaps,
            r#"{"cmd":"load","path":"/nonexistent/dir/universe.db"}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Storage);

        // Saving into a nonexistent directory fails on commit.
        let err = call(
            &mut core,
            &mut snaps,
            r#"{"cmd":"save","path":"/nonexistent/dir/universe.db"}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Storage);
        assert_eq!(core.universe.tick, 0, "server stays responsive");
    }

    #[test]
    fn snapshot_restore_cycle() {
        let (mut core, mut snaps) = fresh();
        for _ in 0..5 {
            call(&mut core, &mut snaps, r#"{"cmd":"tick"}"#).unwrap();
        }
        let response = call(
            &mut core,
            &mut snaps,
            r#"{"cmd":"snapshot","tag":"five"}"#,
        )
        .unwrap();
        assert_eq!(response["tick"], json!(5));

        for _ in 0..5 {
            call(&mut core, &mut snaps, r#"{"cmd":"tick"}"#).unwrap();
        }
        assert_eq!(core.universe.tick, 10);

        let response = call(
            &mut core,
            &mut snaps,
            r#"{"cmd":"restore","tag":"five"}"#,
        )
        .unwrap();
        assert_eq!(response["tick"], json!(5));
        assert_eq!(core.universe.tick, 5);
    }

    #[test]
    fn snapshot_slots_are_bounded() {
        let (mut core, mut snaps) = fresh();
        call(&mut core, &mut snaps, r#"{"cmd":"snapshot","tag":"a"}"#).unwrap();
        call(&mut core, &mut snaps, r#"{"cmd":"snapshot","tag":"b"}"#).unwrap();
        call(&mut core, &mut snaps, r#"{"cmd":"snapshot","tag":"c"}"#).unwrap();
        assert_eq!(snaps.len(), MAX_SNAPSHOT_SLOTS);
        assert!(snaps.iter().any(|s| s.tag == "c"), "oldest slot recycled");
    }

    #[test]
    fn metrics_shape() {
        let (mut core, mut snaps) = fresh();
        let response = call(&mut core, &mut snaps, r#"{"cmd":"metrics"}"#).unwrap();
        assert_eq!(response["probes_spawned"], json!(1));
        assert_eq!(response["systems_explored"], json!(1));
        assert!(response["avg_tech"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn inject_queues_and_applies() {
        let (mut core, mut snaps) = fresh();
        let response = call(
            &mut core,
            &mut snaps,
            r#"{"cmd":"inject","event":{"type":"hazard","subtype":1,"description":"rock","severity":0.9,"probe":"1-1"}}"#,
        )
        .unwrap();
        assert_eq!(response["queued"], json!(1));

        call(&mut core, &mut snaps, r#"{"cmd":"tick"}"#).unwrap();
        let bob = &core.universe.probes[&Uid::new(1, 1)];
        assert!(bob.hull_integrity < 1.0);

        let history = call(
            &mut core,
            &mut snaps,
            r#"{"cmd":"history","probe_id":"1-1"}"#,
        )
        .unwrap();
        let events = history["events"].as_array().unwrap();
        assert!(events.iter().any(|e| e["type"] == json!("hazard")));
    }

    #[test]
    fn config_applies_numeric_entries() {
        let (mut core, mut snaps) = fresh();
        let response = call(
            &mut core,
            &mut snaps,
            r#"{"cmd":"config","data":{"freq_hazard":0.5,"bogus_knob":1.0}}"#,
        )
        .unwrap();
        assert_eq!(response["entries"], json!(1));
        assert!((core.config.freq_hazard - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn scan_reports_neighbor_systems() {
        let (mut core, mut snaps) = fresh();
        let response = call(
            &mut core,
            &mut snaps,
            r#"{"cmd":"scan","probe_id":"1-1"}"#,
        )
        .unwrap();
        assert_eq!(response["probe_id"], json!("1-1"));
        let systems = response["systems"].as_array().unwrap();
        for sys in systems {
            assert!(sys["distance_ly"].as_f64().unwrap() <= 20.0 + 1e-9);
            assert!(sys["estimated_travel_ticks"].as_u64().is_some());
            assert!(sys["sector"].get("x").is_some());
        }
    }

    #[test]
    fn scenario_load_and_list() {
        let (mut core, mut snaps) = fresh();
        let response = call(
            &mut core,
            &mut snaps,
            r#"{"cmd":"scenario","events":[{"at_tick":2,"type":"wonder"}]}"#,
        )
        .unwrap();
        assert_eq!(response["loaded"], json!(1));

        call(&mut core, &mut snaps, r#"{"cmd":"tick"}"#).unwrap();
        call(&mut core, &mut snaps, r#"{"cmd":"tick"}"#).unwrap();

        let listing = call(&mut core, &mut snaps, r#"{"cmd":"scenario"}"#).unwrap();
        let events = listing["events"].as_array().unwrap();
        assert_eq!(events[0]["fired"], json!(true));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipe.db");
        let line = format!(
            r#"{{"cmd":"save","path":"{}"}}"#,
            path.to_str().unwrap().replace('\\', "/")
        );

        let (mut core, mut snaps) = fresh();
        for _ in 0..7 {
            call(&mut core, &mut snaps, r#"{"cmd":"tick"}"#).unwrap();
        }
        let response = call(&mut core, &mut snaps, &line).unwrap();
        assert_eq!(response["tick"], json!(7));
        assert_eq!(response["probes"], json!(1));

        // Load into a fresh server.
        let (mut other, mut other_snaps) = fresh();
        let line = format!(
            r#"{{"cmd":"load","path":"{}"}}"#,
            path.to_str().unwrap().replace('\\', "/")
        );
        let response = call(&mut other, &mut other_snaps, &line).unwrap();
        assert_eq!(response["tick"], json!(7));
        assert_eq!(
            serde_json::to_string(&other.universe).unwrap(),
            serde_json::to_string(&core.universe).unwrap()
        );
    }

    #[test]
    fn lineage_lists_births() {
        let (mut core, mut snaps) = fresh();
        {
            let bob = core.universe.probes.get_mut(&Uid::new(1, 1)).unwrap();
            bob.resources = probe_core::replicate::REPL_COSTS;
            bob.resources[Resource::Iron.index()] += 1.0;
        }
        call(
            &mut core,
            &mut snaps,
            r#"{"cmd":"tick","actions":{"1-1":{"action":"replicate"}}}"#,
        )
        .unwrap();
        for _ in 0..200 {
            call(&mut core, &mut snaps, r#"{"cmd":"tick"}"#).unwrap();
        }
        let response = call(&mut core, &mut snaps, r#"{"cmd":"lineage"}"#).unwrap();
        let entries = response["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["parent_id"], json!("1-1"));
        assert_eq!(entries[0]["generation"], json!(1));
    }
}
