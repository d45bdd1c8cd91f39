use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::settings::{
    FeedbackMode, MatchSettings, DEFAULT_DIFFICULTY, DEFAULT_PORT, DEFAULT_ROUND_SECS,
};

/// Persisted defaults; command-line flags override each field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub rounds: u32,
    pub round_secs: u32,
    pub difficulty: u8,
    pub mode: FeedbackMode,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rounds: 1,
            round_secs: DEFAULT_ROUND_SECS,
            difficulty: DEFAULT_DIFFICULTY,
            mode: FeedbackMode::default(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    pub fn match_settings(&self) -> MatchSettings {
        MatchSettings::new(self.rounds, self.round_secs, self.difficulty, self.mode)
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "typeduel") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("typeduel_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    /// Missing or unreadable files fall back to defaults.
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(err) => {
                    tracing::warn!(%err, path = %self.path.display(), "ignoring invalid config")
                }
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            rounds: 3,
            round_secs: 30,
            difficulty: 8,
            mode: FeedbackMode::Hard,
            port: 6000,
        };
        store.save(&cfg).unwrap();
        assert_eq!(store.load(), cfg);
    }

    #[test]
    fn partial_and_corrupt_files_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{"difficulty": 9}"#).unwrap();
        let store = FileConfigStore::with_path(&path);
        let loaded = store.load();
        assert_eq!(loaded.difficulty, 9);
        assert_eq!(loaded.port, DEFAULT_PORT);

        fs::write(&path, b"not json").unwrap();
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn match_settings_are_clamped() {
        let cfg = Config {
            rounds: 0,
            difficulty: 99,
            ..Config::default()
        };
        let settings = cfg.match_settings();
        assert_eq!(settings.rounds, 1);
        assert_eq!(settings.difficulty, 10);
    }
}
