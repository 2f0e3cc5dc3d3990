//! JSON-backed configuration store
//!
//! The store keeps the whole [`HeartbeatConfig`] in memory and rewrites the
//! file on every change. Readers poll [`ConfigStore::config`] instead of
//! subscribing to changes; the overlay reads it once per animation tick.
//!
//! I/O problems are logged and swallowed. The in-memory values always win, and
//! the next `set` simply tries to write again.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use heartbeat_types::{HeartbeatConfig, Setting, SettingKey};
use serde::Serialize;
use serde_json::Value;

use crate::error::ConfigError;

/// Directory name under the platform config dir (`%APPDATA%` on Windows)
pub const APP_DIR_NAME: &str = "Heartbeat";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Per-user application directory, holding the config file and logs.
///
/// Falls back to the executable's directory when the platform has no config
/// dir.
pub fn app_dir() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join(APP_DIR_NAME))
        .or_else(|| {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
        })
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_config_path() -> PathBuf {
    app_dir().join(CONFIG_FILE_NAME)
}

pub struct ConfigStore {
    path: PathBuf,
    config: HeartbeatConfig,
    /// Modification time of the file as of our last read or write
    disk_modified: Option<SystemTime>,
}

impl ConfigStore {
    /// Open the store at `path`, loading it (or creating it with defaults).
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self {
            path: path.into(),
            config: HeartbeatConfig::default(),
            disk_modified: None,
        };
        store.load();
        store
    }

    /// Open the store at the per-user default location.
    pub fn open_default() -> Self {
        Self::open(default_config_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Borrow the current configuration.
    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    pub fn get(&self, key: SettingKey) -> Setting {
        self.config.get(key)
    }

    /// Change one setting and persist immediately.
    pub fn set(&mut self, setting: Setting) {
        tracing::debug!(key = setting.key().as_str(), value = ?setting, "config set");
        self.config.apply(setting);
        self.save();
    }

    /// Change several settings with a single write.
    pub fn update(&mut self, edit: impl FnOnce(&mut HeartbeatConfig)) {
        edit(&mut self.config);
        self.save();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    /// Merge the file over defaults. Creates the file when it does not exist.
    pub fn load(&mut self) {
        match self.try_load() {
            Ok(Some(config)) => {
                self.config = config;
                self.disk_modified = modified_time(&self.path);
                tracing::info!(path = ?self.path, "config loaded");
            }
            Ok(None) => {
                tracing::info!(path = ?self.path, "no config file, writing defaults");
                self.config = HeartbeatConfig::default();
                self.save();
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load config, keeping current values");
            }
        }
    }

    /// Write the full configuration to disk.
    pub fn save(&mut self) {
        match self.try_save() {
            Ok(()) => self.disk_modified = modified_time(&self.path),
            Err(e) => tracing::warn!(error = %e, "failed to save config"),
        }
    }

    /// Reload when the file was changed by someone else since our last
    /// read or write. Returns true if any value changed.
    pub fn reload_if_modified(&mut self) -> bool {
        let current = modified_time(&self.path);
        if current.is_none() || current == self.disk_modified {
            return false;
        }
        self.disk_modified = current;

        let before = self.config.clone();
        self.load();
        let changed = self.config != before;
        if changed {
            tracing::info!(path = ?self.path, "config changed on disk");
        }
        changed
    }

    fn try_load(&self) -> Result<Option<HeartbeatConfig>, ConfigError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let persisted: Value =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })?;

        Ok(Some(merge_over_defaults(persisted)))
    }

    fn try_save(&self) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut contents = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut contents, formatter);
        self.config
            .serialize(&mut serializer)
            .map_err(|source| ConfigError::Serialize {
                path: self.path.clone(),
                source,
            })?;

        fs::write(&self.path, contents).map_err(io_err)
    }
}

/// Apply every recognised key of `persisted` on top of the defaults.
///
/// Unknown keys are ignored and a value of the wrong type leaves that one key
/// at its default.
fn merge_over_defaults(persisted: Value) -> HeartbeatConfig {
    let mut merged = HeartbeatConfig::default();

    let Value::Object(entries) = persisted else {
        tracing::warn!("config root is not a JSON object, using defaults");
        return merged;
    };

    for (name, value) in entries {
        let Some(key) = SettingKey::from_name(&name) else {
            tracing::debug!(key = %name, "ignoring unknown config key");
            continue;
        };
        match parse_setting(key, value) {
            Ok(setting) => merged.apply(setting),
            Err(e) => tracing::warn!(key = %name, error = %e, "invalid config value, using default"),
        }
    }

    merged
}

fn parse_setting(key: SettingKey, value: Value) -> Result<Setting, serde_json::Error> {
    use serde_json::from_value;

    Ok(match key {
        SettingKey::DotColor => Setting::DotColor(from_value(value)?),
        SettingKey::DotSize => Setting::DotSize(from_value(value)?),
        SettingKey::OpacityMax => Setting::OpacityMax(from_value(value)?),
        SettingKey::OpacityMin => Setting::OpacityMin(from_value(value)?),
        SettingKey::PulseSpeedMs => Setting::PulseSpeedMs(from_value(value)?),
        SettingKey::AlwaysOnTop => Setting::AlwaysOnTop(from_value(value)?),
        SettingKey::WindowX => Setting::WindowX(from_value(value)?),
        SettingKey::WindowY => Setting::WindowY(from_value(value)?),
        SettingKey::Language => Setting::Language(from_value(value)?),
        SettingKey::AutoStart => Setting::AutoStart(from_value(value)?),
    })
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use heartbeat_types::Rgb;

    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> ConfigStore {
        ConfigStore::open(dir.path().join("nested").join(CONFIG_FILE_NAME))
    }

    #[test]
    fn first_open_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(store.path().exists());
        assert_eq!(store.config(), &HeartbeatConfig::default());

        let written: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(written["dot_color"], "#00FFFF");
        assert!(written["window_x"].is_null());
    }

    #[test]
    fn file_is_pretty_printed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let text = fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("\n    \"dot_size\": 16"));
    }

    #[test]
    fn set_then_get_returns_value() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        store.set(Setting::DotSize(32));
        store.set(Setting::DotColor(Rgb::new(255, 0, 0)));

        assert_eq!(store.get(SettingKey::DotSize), Setting::DotSize(32));
        assert_eq!(store.get(SettingKey::DotColor), Setting::DotColor(Rgb::new(255, 0, 0)));
    }

    #[test]
    fn values_survive_a_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.set(Setting::WindowX(Some(120)));
        store.set(Setting::WindowY(Some(-15)));
        store.set(Setting::OpacityMin(0.25));
        store.set(Setting::Language("zh".to_string()));
        store.set(Setting::WindowX(None));

        let reopened = ConfigStore::open(store.path());
        assert_eq!(reopened.config(), store.config());
        assert_eq!(reopened.get(SettingKey::WindowX), Setting::WindowX(None));
        assert_eq!(reopened.get(SettingKey::WindowY), Setting::WindowY(Some(-15)));
    }

    #[test]
    fn load_keeps_defaults_for_missing_and_invalid_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r##"{"dot_size": 40, "dot_color": "not a color", "pulse_speed_ms": "fast", "extra": true}"##,
        )
        .unwrap();

        let store = ConfigStore::open(&path);
        assert_eq!(store.config().dot_size, 40);
        assert_eq!(store.config().dot_color, Rgb::CYAN);
        assert_eq!(store.config().pulse_speed_ms, 50);
        assert!(store.config().always_on_top);
    }

    #[test]
    fn corrupt_file_keeps_in_memory_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.set(Setting::DotSize(20));

        fs::write(store.path(), "{ this is not json").unwrap();
        store.load();
        assert_eq!(store.config().dot_size, 20);
    }

    #[test]
    fn unwritable_location_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        // Parent "directory" is a regular file, so every write fails.
        let mut store = ConfigStore::open(blocker.join(CONFIG_FILE_NAME));
        store.set(Setting::DotSize(9));
        assert_eq!(store.get(SettingKey::DotSize), Setting::DotSize(9));
    }

    #[test]
    fn reload_picks_up_external_edits_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.set(Setting::DotSize(20));
        assert!(!store.reload_if_modified());

        let mut edited = store.config().clone();
        edited.dot_size = 48;
        fs::write(store.path(), serde_json::to_string(&edited).unwrap()).unwrap();
        let file = fs::File::options().write(true).open(store.path()).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(10)).unwrap();

        assert!(store.reload_if_modified());
        assert_eq!(store.config().dot_size, 48);
        assert!(!store.reload_if_modified());
    }
}
