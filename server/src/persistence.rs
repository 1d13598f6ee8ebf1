//! Mount persistence - disk I/O for per-mount riding state
//!
//! Saves each mount's stamina attribute subtree and last dismount time, plus the world
//! calendar, using bincode serialization. Uses atomic writes (temp file + rename) to
//! prevent corruption.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use shared::{AttributeTree, Mount, Rideable, StaminaState, WorldCalendar, FIXED_TIMESTEP_HZ};

/// Bump when the record layout changes.
pub const MOUNT_RECORD_VERSION: u32 = 1;

/// How often to save all mounts (seconds)
pub const AUTO_SAVE_INTERVAL: f32 = 30.0;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MountRecord {
    pub version: u32,
    pub mount_id: u64,
    pub species: String,
    /// Attribute tree holding the namespaced stamina subtree.
    pub attributes: AttributeTree,
    pub last_dismount_total_hours: Option<f64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WorldRecord {
    pub version: u32,
    pub total_hours: f64,
}

/// Resource managing mount persistence
#[derive(Resource)]
pub struct MountStore {
    /// Records loaded at startup, keyed by mount id.
    pub records: HashMap<u64, MountRecord>,
    pub world: Option<WorldRecord>,
    /// Directory where record files are stored
    pub storage_dir: PathBuf,
    pub save_timer: Timer,
}

impl MountStore {
    /// Open the store and load whatever is on disk. Unreadable files are skipped.
    pub fn open(storage_dir: PathBuf) -> Self {
        if let Err(e) = std::fs::create_dir_all(&storage_dir) {
            error!("Failed to create mount storage directory {:?}: {}", storage_dir, e);
        }
        info!("Mount state will be saved to: {:?}", storage_dir);

        let mut store = Self {
            records: HashMap::new(),
            world: None,
            storage_dir,
            save_timer: Timer::from_seconds(AUTO_SAVE_INTERVAL, TimerMode::Repeating),
        };
        store.load_all();
        store
    }

    fn mount_path(&self, mount_id: u64) -> PathBuf {
        self.storage_dir.join(format!("mount-{}.bin", mount_id))
    }

    fn world_path(&self) -> PathBuf {
        self.storage_dir.join("world.bin")
    }

    fn load_all(&mut self) {
        let entries = match std::fs::read_dir(&self.storage_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not list {:?}: {}", self.storage_dir, e);
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_mount = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("mount-") && n.ends_with(".bin"));
            if !is_mount {
                continue;
            }
            match read_record::<MountRecord>(&path) {
                Ok(record) if record.version == MOUNT_RECORD_VERSION => {
                    self.records.insert(record.mount_id, record);
                }
                Ok(record) => warn!(
                    "Skipping {:?}: version mismatch (found v{}, expected v{})",
                    path, record.version, MOUNT_RECORD_VERSION
                ),
                Err(e) => warn!("Skipping {}", e),
            }
        }

        let world_path = self.world_path();
        if world_path.exists() {
            match read_record::<WorldRecord>(&world_path) {
                Ok(world) => self.world = Some(world),
                Err(e) => warn!("Skipping {}", e),
            }
        }
        info!("Loaded {} mount records", self.records.len());
    }

    pub fn record(&self, mount_id: u64) -> Option<&MountRecord> {
        self.records.get(&mount_id)
    }

    /// Save a mount record to disk (atomic write via temp file)
    pub fn save_mount(&mut self, record: MountRecord) -> Result<(), String> {
        let path = self.mount_path(record.mount_id);
        write_record(&path, &record)?;
        self.records.insert(record.mount_id, record);
        Ok(())
    }

    pub fn save_world(&mut self, total_hours: f64) -> Result<(), String> {
        let record = WorldRecord {
            version: MOUNT_RECORD_VERSION,
            total_hours,
        };
        write_record(&self.world_path(), &record)?;
        self.world = Some(record);
        Ok(())
    }
}

/// Periodically save every mount and the calendar
pub fn autosave_mounts(
    mut store: ResMut<MountStore>,
    mounts: Query<(&Mount, &StaminaState, &Rideable)>,
    calendar: Query<&WorldCalendar>,
) {
    let dt = 1.0 / FIXED_TIMESTEP_HZ as f32;
    if !store.save_timer.tick(Duration::from_secs_f32(dt)).just_finished() {
        return;
    }

    let mut saved = 0;
    for (mount, stamina, rideable) in mounts.iter() {
        let mut attributes = store
            .record(mount.id)
            .map(|r| r.attributes.clone())
            .unwrap_or_default();
        stamina.to_attributes(&mut attributes);
        let record = MountRecord {
            version: MOUNT_RECORD_VERSION,
            mount_id: mount.id,
            species: mount.species.clone(),
            attributes,
            last_dismount_total_hours: rideable.last_dismount_total_hours,
        };
        match store.save_mount(record) {
            Ok(()) => saved += 1,
            Err(e) => error!("Failed to save mount {}: {}", mount.id, e),
        }
    }
    if let Some(calendar) = calendar.iter().next() {
        if let Err(e) = store.save_world(calendar.total_hours) {
            error!("Failed to save world calendar: {}", e);
        }
    }
    debug!("Auto-saved {} mounts", saved);
}

fn read_record<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, String> {
    let bytes =
        std::fs::read(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    bincode::deserialize(&bytes)
        .map_err(|e| format!("Failed to deserialize {}: {}", path.display(), e))
}

fn write_record<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    let temp_path = path.with_extension("tmp");
    let bytes = bincode::serialize(value).map_err(|e| format!("Serialize error: {}", e))?;
    std::fs::write(&temp_path, &bytes).map_err(|e| format!("Write temp file error: {}", e))?;
    // Atomic rename (this is atomic on most filesystems)
    std::fs::rename(&temp_path, path).map_err(|e| format!("Rename error: {}", e))?;
    debug!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{StaminaDefaults, StaminaState};

    fn temp_store(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hoofbeat-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_mount_record_survives_reopen() {
        let dir = temp_store("reopen");
        let mut stamina = StaminaState::new(&StaminaDefaults::default());
        stamina.set_stamina(42.5);
        stamina.sprinting = true;
        let mut attributes = AttributeTree::new();
        stamina.to_attributes(&mut attributes);

        let mut store = MountStore::open(dir.clone());
        store
            .save_mount(MountRecord {
                version: MOUNT_RECORD_VERSION,
                mount_id: 3,
                species: "horse".into(),
                attributes,
                last_dismount_total_hours: Some(12.5),
            })
            .expect("save");
        store.save_world(30.0).expect("save world");

        let reopened = MountStore::open(dir.clone());
        let record = reopened.record(3).expect("record loaded");
        assert_eq!(record.last_dismount_total_hours, Some(12.5));
        let restored =
            StaminaState::from_attributes(&StaminaDefaults::default(), Some(&record.attributes), 1.0);
        assert_eq!(restored.stamina(), 42.5);
        assert!(restored.sprinting);
        assert_eq!(reopened.world.as_ref().map(|w| w.total_hours), Some(30.0));
        assert!(!dir.join("mount-3.tmp").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_corrupt_record_is_skipped() {
        let dir = temp_store("corrupt");
        std::fs::create_dir_all(&dir).expect("dir");
        std::fs::write(dir.join("mount-9.bin"), b"not bincode").expect("write");

        let store = MountStore::open(dir.clone());
        assert!(store.record(9).is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
