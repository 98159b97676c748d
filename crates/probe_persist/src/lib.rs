//! Ordered key-value persistence for the simulation.
//!
//! The store is a sorted string-keyed map of JSON values, written as a single
//! self-describing document via temp-file-and-rename so a commit is atomic.
//! Key schema:
//!
//! - `meta` — seed, tick, generation version, probe count
//! - `probe:{32-hex uid}` — one probe blob per live probe
//! - `sector:{x}:{y}:{z}` — system-count header for a persisted sector
//! - `system:{32-hex uid}` — one system blob
//!
//! Restore order: open the store, read `meta`, then iterate `probe:` keys in
//! sorted order to refill the probe table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use probe_core::{Probe, SectorCoord, StarSystem, Uid, Universe};

/// Bumped when the on-disk layout changes shape.
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    format_version: u32,
    written_at: String,
    entries: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetaRecord {
    seed: u64,
    tick: u64,
    generation_version: u32,
    probe_count: u32,
}

/// File-backed ordered KV store with staged transactional writes.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl FileStore {
    /// Open an existing store or start an empty one at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<FileStore> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading store file: {}", path.display()))?;
            let file: StoreFile = serde_json::from_str(&raw)
                .with_context(|| format!("parsing store file: {}", path.display()))?;
            if file.format_version > FORMAT_VERSION {
                bail!(
                    "store {} has format version {} (supported: {FORMAT_VERSION})",
                    path.display(),
                    file.format_version
                );
            }
            file.entries
        } else {
            BTreeMap::new()
        };
        Ok(FileStore { path, entries })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Keys with the given prefix, in sorted order.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<&str> {
        self.entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Begin a staged transaction. Nothing touches the store until `commit`.
    pub fn transaction(&mut self) -> Transaction<'_> {
        Transaction {
            store: self,
            staged: BTreeMap::new(),
        }
    }

    /// Write the whole store to disk atomically (temp file + rename).
    fn flush(&self) -> Result<()> {
        let file = StoreFile {
            format_version: FORMAT_VERSION,
            written_at: chrono::Utc::now().to_rfc3339(),
            entries: self.entries.clone(),
        };
        let json = serde_json::to_string(&file).context("serializing store")?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("writing temp store: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("committing store: {}", self.path.display()))?;
        Ok(())
    }
}

/// Staged writes; merged and flushed on commit, discarded on drop.
pub struct Transaction<'a> {
    store: &'a mut FileStore,
    staged: BTreeMap<String, Option<Value>>,
}

impl Transaction<'_> {
    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        self.staged.insert(key.into(), Some(value));
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.staged.insert(key.into(), None);
    }

    pub fn commit(self) -> Result<()> {
        for (key, value) in self.staged {
            match value {
                Some(v) => {
                    self.store.entries.insert(key, v);
                }
                None => {
                    self.store.entries.remove(&key);
                }
            }
        }
        self.store.flush()
    }
}

// ---------------------------------------------------------------------------
// Universe save/load
// ---------------------------------------------------------------------------

pub fn probe_key(id: Uid) -> String {
    format!("probe:{}", id.hex())
}

pub fn sector_key(coord: SectorCoord) -> String {
    format!("sector:{}:{}:{}", coord.x, coord.y, coord.z)
}

pub fn system_key(id: Uid) -> String {
    format!("system:{}", id.hex())
}

/// Persist meta and the full probe table in one transaction. Stale probe
/// keys (destroyed-and-removed probes from an earlier save) are dropped.
pub fn save_universe(store: &mut FileStore, universe: &Universe) -> Result<()> {
    let stale: Vec<String> = store
        .keys_with_prefix("probe:")
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut txn = store.transaction();
    for key in stale {
        txn.delete(key);
    }
    txn.put(
        "meta",
        serde_json::to_value(MetaRecord {
            seed: universe.seed,
            tick: universe.tick,
            generation_version: universe.generation_version,
            probe_count: universe.probes.len() as u32,
        })
        .context("serializing meta")?,
    );
    for (id, probe) in &universe.probes {
        txn.put(
            probe_key(*id),
            serde_json::to_value(probe).context("serializing probe")?,
        );
    }
    txn.commit()
}

/// Persist one generated sector: a count header plus one blob per system.
pub fn save_sector(
    store: &mut FileStore,
    coord: SectorCoord,
    systems: &[StarSystem],
) -> Result<()> {
    let mut txn = store.transaction();
    txn.put(
        sector_key(coord),
        serde_json::json!({ "count": systems.len() }),
    );
    for system in systems {
        txn.put(
            system_key(system.id),
            serde_json::to_value(system).context("serializing system")?,
        );
    }
    txn.commit()
}

/// Number of systems recorded for a sector, if it was ever persisted.
pub fn sector_count(store: &FileStore, coord: SectorCoord) -> Option<u64> {
    store
        .get(&sector_key(coord))
        .and_then(|v| v.get("count"))
        .and_then(Value::as_u64)
}

/// Rebuild the universe: meta first, then probes in sorted key order.
pub fn load_universe(store: &FileStore) -> Result<Universe> {
    let meta_value = store
        .get("meta")
        .context("store has no meta record")?
        .clone();
    let meta: MetaRecord = serde_json::from_value(meta_value).context("parsing meta record")?;

    let mut universe = Universe::new(meta.seed);
    universe.tick = meta.tick;
    universe.generation_version = meta.generation_version;

    for key in store.keys_with_prefix("probe:") {
        let value = store.get(key).expect("key just listed").clone();
        let probe: Probe =
            serde_json::from_value(value).with_context(|| format!("parsing {key}"))?;
        universe.probes.insert(probe.id, probe);
    }

    if universe.probes.len() as u32 != meta.probe_count {
        bail!(
            "probe count mismatch: meta says {}, found {}",
            meta.probe_count,
            universe.probes.len()
        );
    }
    Ok(universe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::{galaxy, Core, SimConfig};

    fn temp_store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("universe.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn save_load_round_trips_byte_exact() {
        let (_dir, mut store) = temp_store();
        let core = Core::new(42, SimConfig::default());

        save_universe(&mut store, &core.universe).unwrap();

        let reopened = FileStore::open(store.path.clone()).unwrap();
        let loaded = load_universe(&reopened).unwrap();

        assert_eq!(
            serde_json::to_string(&core.universe).unwrap(),
            serde_json::to_string(&loaded).unwrap()
        );
    }

    #[test]
    fn keys_are_sorted_and_prefixed() {
        let (_dir, mut store) = temp_store();
        let mut universe = Universe::new(7);
        let mut a = probe_core::Probe::founder();
        a.id = Uid::new(2, 0);
        let mut b = probe_core::Probe::founder();
        b.id = Uid::new(1, 0);
        universe.probes.insert(a.id, a);
        universe.probes.insert(b.id, b);
        save_universe(&mut store, &universe).unwrap();

        let keys = store.keys_with_prefix("probe:");
        assert_eq!(keys.len(), 2);
        assert!(keys[0] < keys[1], "sorted iteration");
        assert!(keys.iter().all(|k| k.len() == "probe:".len() + 32));
    }

    #[test]
    fn save_drops_stale_probe_keys() {
        let (_dir, mut store) = temp_store();
        let mut universe = Universe::new(7);
        let probe = probe_core::Probe::founder();
        universe.probes.insert(probe.id, probe);
        save_universe(&mut store, &universe).unwrap();

        universe.probes.clear();
        let mut replacement = probe_core::Probe::founder();
        replacement.id = Uid::new(3, 3);
        universe.probes.insert(replacement.id, replacement);
        save_universe(&mut store, &universe).unwrap();

        let loaded = load_universe(&store).unwrap();
        assert_eq!(loaded.probes.len(), 1);
        assert!(loaded.probes.contains_key(&Uid::new(3, 3)));
    }

    #[test]
    fn sector_header_and_system_blobs() {
        let (_dir, mut store) = temp_store();
        let coord = SectorCoord::new(0, 0, 0);
        let systems = galaxy::generate_sector(42, coord);
        save_sector(&mut store, coord, &systems).unwrap();

        assert_eq!(sector_count(&store, coord), Some(systems.len() as u64));
        assert_eq!(sector_count(&store, SectorCoord::new(5, 5, 5)), None);

        let first = store.get(&system_key(systems[0].id)).unwrap().clone();
        let parsed: StarSystem = serde_json::from_value(first).unwrap();
        assert_eq!(parsed, systems[0]);
    }

    #[test]
    fn uncommitted_transaction_leaves_store_untouched() {
        let (_dir, mut store) = temp_store();
        {
            let mut txn = store.transaction();
            txn.put("meta", serde_json::json!({"seed": 1}));
            // dropped without commit
        }
        assert!(store.get("meta").is_none());
        assert!(load_universe(&store).is_err());
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.db");
        std::fs::write(&path, "not json at all").unwrap();
        assert!(FileStore::open(&path).is_err());
    }

    #[test]
    fn future_format_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.db");
        std::fs::write(
            &path,
            serde_json::json!({
                "format_version": FORMAT_VERSION + 1,
                "written_at": "2300-01-01T00:00:00Z",
                "entries": {}
            })
            .to_string(),
        )
        .unwrap();
        assert!(FileStore::open(&path).is_err());
    }

    #[test]
    fn load_detects_probe_count_mismatch() {
        let (_dir, mut store) = temp_store();
        let mut universe = Universe::new(7);
        let probe = probe_core::Probe::founder();
        universe.probes.insert(probe.id, probe);
        save_universe(&mut store, &universe).unwrap();

        // Tamper: remove the probe but keep the meta count.
        let key = store.keys_with_prefix("probe:")[0].to_string();
        let mut txn = store.transaction();
        txn.delete(key);
        txn.commit().unwrap();

        assert!(load_universe(&store).is_err());
    }
}
