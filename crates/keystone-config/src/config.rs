//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name of the persisted configuration inside the config directory.
const CONFIG_FILE: &str = "config.ron";

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Multiblock lifecycle settings (ticking, autosave, random ticks).
    pub multiblock: MultiblockConfig,
    /// Instance persistence settings.
    pub storage: StorageConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Multiblock lifecycle configuration.
///
/// All periods are measured in server ticks (20 per second on a vanilla host).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MultiblockConfig {
    /// Period of the instance tick job. `1` ticks every instance every server tick.
    pub tick_period_ticks: u64,
    /// Delay before the first autosave pass.
    pub autosave_delay_ticks: u64,
    /// Period between autosave passes.
    pub autosave_period_ticks: u64,
    /// Probability (0.0 - 1.0) that a tickable instance receives a random tick
    /// on any given server tick.
    pub random_tick_chance: f64,
    /// Seed for the random-tick generator.
    pub rng_seed: u64,
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file, relative to the data directory unless absolute.
    pub database_file: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "debug", "info", "warn,keystone_multiblock=debug").
    pub log_level: String,
    /// Also write JSON logs to a file in debug builds.
    pub json_file: bool,
}

// --- Default implementations ---

impl Default for MultiblockConfig {
    fn default() -> Self {
        Self {
            tick_period_ticks: 1,
            autosave_delay_ticks: 20 * 60 * 2,
            autosave_period_ticks: 20 * 60 * 5,
            random_tick_chance: 0.001,
            rng_seed: 0x6b65_7973_746f_6e65,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: PathBuf::from("multiblocks.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_file: true,
        }
    }
}

impl StorageConfig {
    /// Resolves the database path against `data_dir` when it is relative.
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        if self.database_file.is_absolute() {
            self.database_file.clone()
        } else {
            data_dir.join(&self.database_file)
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Platform data directory for Keystone (e.g. `~/.local/share/keystone`).
    ///
    /// Falls back to the working directory when the platform has none.
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .map(|dir| dir.join("keystone"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Loads `config.ron` from `config_dir`, or writes and returns the
    /// defaults if the file does not exist yet.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let config = Self::read(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Writes the config to `config_dir/config.ron`, creating the directory.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::Write {
            path: config_path,
            source,
        })
    }

    /// Re-reads the file. Returns `Some` only if it differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = Self::read(&config_dir.join(CONFIG_FILE))?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let multiblock = &self.multiblock;
        if multiblock.tick_period_ticks == 0 {
            return Err(ConfigError::Invalid {
                field: "multiblock.tick_period_ticks",
                reason: "must be at least 1".to_string(),
            });
        }
        if multiblock.autosave_period_ticks == 0 {
            return Err(ConfigError::Invalid {
                field: "multiblock.autosave_period_ticks",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&multiblock.random_tick_chance) {
            return Err(ConfigError::Invalid {
                field: "multiblock.random_tick_chance",
                reason: format!("{} is not a probability", multiblock.random_tick_chance),
            });
        }
        if self.storage.database_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "storage.database_file",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = ron::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }
}
