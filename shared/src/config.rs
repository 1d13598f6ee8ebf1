//! Riding configuration
//!
//! Loaded from RON on startup (defaults are written back so new fields show up in the
//! file), then polled for changes and hot-reloaded. The core only reads it.

use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Default location of the user config file.
pub const CONFIG_PATH: &str = "config/hoofbeat.ron";

/// File changes closer together than this are treated as one change.
pub const RELOAD_DEBOUNCE: Duration = Duration::from_millis(200);

/// How often the config file's modification time is checked (seconds).
pub const RELOAD_POLL_INTERVAL: f32 = 1.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("config serialize error: {0}")]
    Serialize(#[from] ron::Error),
}

/// Where the stamina bar sits relative to the health bar.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StaminaBarLocation {
    #[default]
    AboveHealth,
    BelowHealth,
}

#[derive(Resource, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RidingConfig {
    // Stamina
    pub enable_stamina: bool,
    pub global_max_stamina_multiplier: f32,
    pub global_stamina_regen_multiplier: f32,

    // Stamina costs
    pub global_swim_stamina_cost_multiplier: f32,
    pub global_sprint_stamina_cost_multiplier: f32,

    // Hud
    pub hide_stamina_on_full: bool,
    pub stamina_bar_location: StaminaBarLocation,
    pub stamina_bar_width_multiplier: f32,
    pub stamina_bar_x_offset: f32,
    pub stamina_bar_y_offset: f32,
    pub show_gait_icon: bool,
    pub icon_offset_x: f32,
    pub icon_offset_y: f32,
    pub icon_size: f32,

    // Debugging
    pub debug_mode: bool,
}

impl Default for RidingConfig {
    fn default() -> Self {
        Self {
            enable_stamina: true,
            global_max_stamina_multiplier: 1.0,
            global_stamina_regen_multiplier: 1.0,
            global_swim_stamina_cost_multiplier: 1.0,
            global_sprint_stamina_cost_multiplier: 1.0,
            hide_stamina_on_full: false,
            stamina_bar_location: StaminaBarLocation::AboveHealth,
            stamina_bar_width_multiplier: 1.0,
            stamina_bar_x_offset: 0.0,
            stamina_bar_y_offset: 0.0,
            show_gait_icon: true,
            icon_offset_x: -400.0,
            icon_offset_y: -99.0,
            icon_size: 42.0,
            debug_mode: false,
        }
    }
}

/// Read a RON file. `Ok(None)` means the file does not exist.
pub fn read_ron<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)?;
    Ok(Some(ron::de::from_str(&text)?))
}

/// Write a value as pretty RON, creating parent directories.
pub fn write_ron<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let text = ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())?;
    std::fs::write(path, text)?;
    Ok(())
}

impl RidingConfig {
    /// Load the user config, falling back to defaults. The result is stored back so any
    /// fields added since the file was written get persisted.
    pub fn load_or_default(path: &Path) -> Self {
        let config = match read_ron::<RidingConfig>(path) {
            Ok(Some(config)) => config,
            Ok(None) => {
                warn!("Missing config at {:?}! Using default.", path);
                RidingConfig::default()
            }
            Err(e) => {
                error!("Could not load config {:?}: {}", path, e);
                return RidingConfig::default();
            }
        };

        if let Err(e) = write_ron(path, &config) {
            warn!("Could not store config {:?}: {}", path, e);
        }
        config
    }
}

/// Polls the config file and decides when a reload is due.
#[derive(Resource)]
pub struct ConfigWatcher {
    pub path: PathBuf,
    pub last_modified: Option<SystemTime>,
    pub last_change: Option<Duration>,
    pub poll_timer: Timer,
    pub reload_count: u32,
}

impl ConfigWatcher {
    pub fn new(path: PathBuf) -> Self {
        let last_modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        Self {
            path,
            last_modified,
            last_change: None,
            poll_timer: Timer::from_seconds(RELOAD_POLL_INTERVAL, TimerMode::Repeating),
            reload_count: 0,
        }
    }

    /// Record an observed modification time at app time `now`; true when it should
    /// trigger a reload.
    pub fn observe(&mut self, modified: Option<SystemTime>, now: Duration) -> bool {
        if modified.is_none() || modified == self.last_modified {
            return false;
        }
        self.last_modified = modified;

        if let Some(last) = self.last_change {
            if now.saturating_sub(last) < RELOAD_DEBOUNCE {
                return false;
            }
        }
        self.last_change = Some(now);
        true
    }
}

/// Installs `RidingConfig` and the polling reload system.
pub struct RidingConfigPlugin {
    pub path: PathBuf,
}

impl Default for RidingConfigPlugin {
    fn default() -> Self {
        Self {
            path: PathBuf::from(CONFIG_PATH),
        }
    }
}

impl Plugin for RidingConfigPlugin {
    fn build(&self, app: &mut App) {
        let config = RidingConfig::load_or_default(&self.path);
        info!("Riding config loaded (debug_mode: {})", config.debug_mode);
        app.insert_resource(config)
            .insert_resource(ConfigWatcher::new(self.path.clone()))
            .add_systems(Update, poll_config_changes);
    }
}

/// Reload the config when its file changed on disk. A broken file keeps the previous
/// config.
pub fn poll_config_changes(
    time: Res<Time>,
    mut watcher: ResMut<ConfigWatcher>,
    mut config: ResMut<RidingConfig>,
) {
    if !watcher.poll_timer.tick(time.delta()).just_finished() {
        return;
    }

    let modified = std::fs::metadata(&watcher.path)
        .and_then(|m| m.modified())
        .ok();
    if !watcher.observe(modified, time.elapsed()) {
        return;
    }

    match read_ron::<RidingConfig>(&watcher.path) {
        Ok(Some(reloaded)) => {
            watcher.reload_count += 1;
            info!("Riding config reloaded ({} reloads)", watcher.reload_count);
            *config = reloaded;
        }
        Ok(None) => warn!("Config file {:?} disappeared; keeping current config", watcher.path),
        Err(e) => error!("Config reload failed, keeping current config: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RidingConfig =
            ron::de::from_str("(debug_mode: true, global_stamina_regen_multiplier: 2.0)")
                .expect("partial config parses");
        assert!(config.debug_mode);
        assert_eq!(config.global_stamina_regen_multiplier, 2.0);
        assert!(config.enable_stamina);
        assert_eq!(config.icon_size, 42.0);
    }

    #[test]
    fn test_watcher_debounces_changes() {
        let mut watcher = ConfigWatcher::new(PathBuf::from("does/not/exist.ron"));
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let t1 = t0 + Duration::from_secs(1);
        let t2 = t1 + Duration::from_secs(1);

        // Missing file never triggers
        assert!(!watcher.observe(None, Duration::from_secs(1)));

        assert!(watcher.observe(Some(t0), Duration::from_millis(1000)));
        // Same mtime again is not a change
        assert!(!watcher.observe(Some(t0), Duration::from_millis(2000)));
        // New mtime within the debounce window is swallowed
        assert!(!watcher.observe(Some(t1), Duration::from_millis(1100)));
        // Later change goes through
        assert!(watcher.observe(Some(t2), Duration::from_millis(3000)));
    }

    #[test]
    fn test_load_or_default_writes_file() {
        let dir = std::env::temp_dir().join(format!("hoofbeat-config-{}", std::process::id()));
        let path = dir.join("hoofbeat.ron");
        let _ = std::fs::remove_file(&path);

        let config = RidingConfig::load_or_default(&path);
        assert_eq!(config, RidingConfig::default());
        assert!(path.exists());

        let reread: Option<RidingConfig> = read_ron(&path).expect("written config parses");
        assert_eq!(reread, Some(RidingConfig::default()));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
