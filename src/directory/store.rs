//! Arena persistence

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::game::ArenaGeometry;
use crate::regen::BlockSnapshot;

/// Persisted form of one arena
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaRecord {
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub geometry: ArenaGeometry,
    /// On save, `None` leaves any stored snapshot as it is
    #[serde(skip)]
    pub snapshot: Option<Arc<BlockSnapshot>>,
    pub saved_at: DateTime<Utc>,
}

pub trait ArenaStore: Send + Sync {
    /// Write the record, and its snapshot when it carries one
    fn save(&self, record: &ArenaRecord) -> Result<(), StoreError>;
    fn mark_disabled(&self, name: &str) -> Result<(), StoreError>;
    fn load_all(&self) -> Result<Vec<ArenaRecord>, StoreError>;
    fn delete(&self, name: &str) -> Result<(), StoreError>;
}

/// One `<name>.json` file per arena, with the block snapshot (FULL mode
/// only) kept beside it in `<name>.snapshot`
pub struct JsonArenaStore {
    dir: PathBuf,
}

impl JsonArenaStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name.to_lowercase()))
    }

    fn snapshot_path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.snapshot", name.to_lowercase()))
    }

    fn read(&self, path: &Path) -> Result<ArenaRecord, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn read_snapshot(&self, name: &str) -> Result<Option<BlockSnapshot>, StoreError> {
        let path = self.snapshot_path_for(name);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read(path)?;
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn write(&self, record: &ArenaRecord) -> Result<(), StoreError> {
        if let Some(snapshot) = &record.snapshot {
            let path = self.snapshot_path_for(&record.name);
            Self::write_atomic(&path, &serde_json::to_vec(snapshot.as_ref())?)?;
            debug!(arena = %record.name, blocks = snapshot.len(), "Snapshot saved");
        }
        Self::write_atomic(&self.path_for(&record.name), &serde_json::to_vec(record)?)
    }
}

impl ArenaStore for JsonArenaStore {
    fn save(&self, record: &ArenaRecord) -> Result<(), StoreError> {
        self.write(record)?;
        debug!(arena = %record.name, "Arena saved");
        Ok(())
    }

    fn mark_disabled(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        let mut record = self.read(&path)?;
        record.enabled = false;
        record.saved_at = Utc::now();
        self.write(&record)?;
        info!(arena = name, "Arena marked disabled");
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<ArenaRecord>, StoreError> {
        let mut records = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let mut record = match self.read(&path) {
                Ok(record) => record,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable arena file");
                    continue;
                }
            };
            match self.read_snapshot(&record.name) {
                Ok(snapshot) => record.snapshot = snapshot.map(Arc::new),
                Err(e) => warn!(arena = %record.name, error = %e, "Ignoring unreadable snapshot"),
            }
            records.push(record);
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        for path in [self.path_for(name), self.snapshot_path_for(name)] {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

/// Volatile store for headless runs
#[derive(Debug, Default)]
pub struct MemoryArenaStore {
    records: DashMap<String, ArenaRecord>,
}

impl MemoryArenaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<ArenaRecord> {
        self.records.get(&name.to_lowercase()).map(|r| r.clone())
    }
}

impl ArenaStore for MemoryArenaStore {
    fn save(&self, record: &ArenaRecord) -> Result<(), StoreError> {
        let mut record = record.clone();
        let key = record.name.to_lowercase();
        if record.snapshot.is_none() {
            record.snapshot = self.records.get(&key).and_then(|old| old.snapshot.clone());
        }
        self.records.insert(key, record);
        Ok(())
    }

    fn mark_disabled(&self, name: &str) -> Result<(), StoreError> {
        match self.records.get_mut(&name.to_lowercase()) {
            Some(mut record) => {
                record.enabled = false;
                record.saved_at = Utc::now();
                Ok(())
            }
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }

    fn load_all(&self) -> Result<Vec<ArenaRecord>, StoreError> {
        let mut records: Vec<ArenaRecord> = self.records.iter().map(|r| r.clone()).collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.records.remove(&name.to_lowercase());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{BlockPos, Bounds, MemoryWorld, Position};
    use uuid::Uuid;

    fn record(name: &str) -> ArenaRecord {
        ArenaRecord {
            name: name.to_string(),
            enabled: true,
            geometry: ArenaGeometry {
                lobby_spawn: Some(Position::new("sky", 0.5, 80.0, 0.5)),
                ..Default::default()
            },
            snapshot: None,
            saved_at: Utc::now(),
        }
    }

    fn temp_store() -> JsonArenaStore {
        let dir = std::env::temp_dir().join(format!("skyarena-store-{}", Uuid::new_v4()));
        JsonArenaStore::new(dir).unwrap()
    }

    #[test]
    fn test_json_save_load_and_disable() {
        let store = temp_store();
        store.save(&record("Alpha")).unwrap();
        store.save(&record("beta")).unwrap();

        store.mark_disabled("alpha").unwrap();
        let records = store.load_all().unwrap();
        assert_eq!(records.len(), 2);
        let alpha = records.iter().find(|r| r.name == "Alpha").unwrap();
        assert!(!alpha.enabled);
        assert_eq!(alpha.geometry.lobby_spawn, record("Alpha").geometry.lobby_spawn);

        store.delete("beta").unwrap();
        assert_eq!(store.load_all().unwrap().len(), 1);
        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_json_keeps_snapshot() {
        let store = temp_store();
        let world = MemoryWorld::with_world("sky");
        let bounds = Bounds::from_corners(BlockPos::new(0, 0, 0), BlockPos::new(2, 2, 2));
        let mut rec = record("gamma");
        rec.snapshot = Some(Arc::new(BlockSnapshot::capture(&world, "sky", bounds, 1_000).unwrap()));
        store.save(&rec).unwrap();

        // later saves without a snapshot keep the stored one
        let mut plain = rec.clone();
        plain.snapshot = None;
        plain.enabled = false;
        store.save(&plain).unwrap();
        store.mark_disabled("gamma").unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(!loaded[0].enabled);
        assert_eq!(loaded[0].snapshot.as_ref().map(|s| s.len()), Some(27));

        store.delete("gamma").unwrap();
        assert!(store.load_all().unwrap().is_empty());
        assert!(!store.snapshot_path_for("gamma").exists());
        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_memory_store_keeps_snapshot_across_plain_saves() {
        let store = MemoryArenaStore::new();
        let world = MemoryWorld::with_world("sky");
        let bounds = Bounds::from_corners(BlockPos::new(0, 0, 0), BlockPos::new(1, 1, 1));
        let mut rec = record("delta");
        rec.snapshot = Some(Arc::new(BlockSnapshot::capture(&world, "sky", bounds, 1_000).unwrap()));
        store.save(&rec).unwrap();

        rec.snapshot = None;
        store.save(&rec).unwrap();
        assert_eq!(store.get("delta").unwrap().snapshot.map(|s| s.len()), Some(8));
    }

    #[test]
    fn test_mark_disabled_unknown_arena() {
        let store = MemoryArenaStore::new();
        assert!(matches!(
            store.mark_disabled("ghost"),
            Err(StoreError::NotFound(_))
        ));
        store.save(&record("Ghost")).unwrap();
        store.mark_disabled("ghost").unwrap();
        assert!(!store.get("GHOST").unwrap().enabled);
    }
}
