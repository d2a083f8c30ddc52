use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artnet::packet::{ARTNET_PORT, DMX_CHANNELS};
use crate::artnet::transmitter::DEFAULT_MAX_UNIVERSE;
use crate::patch::UniverseLayout;

/// Runtime settings for the grid and its Art-Net output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Output
    pub refresh_interval_ms: u64,
    pub artnet_port: u16,
    pub broadcast: bool,
    pub destination_ip: String,
    /// Per-universe destination overrides. Universes not listed go to `destination_ip`.
    pub universe_routes: HashMap<u16, String>,
    pub universe_count: u16,
    pub max_universe: u16,

    // Patch
    pub universe_layout: UniverseLayout,
    pub grid_width: u32,
    pub grid_height: u32,
    pub start_address: u32,
    pub fixture_profile: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 33,
            artnet_port: ARTNET_PORT,
            broadcast: false,
            destination_ip: "192.168.1.200".to_string(),
            universe_routes: HashMap::new(),
            universe_count: 1,
            max_universe: DEFAULT_MAX_UNIVERSE,

            universe_layout: UniverseLayout::default(),
            grid_width: 30,
            grid_height: 4,
            start_address: 1,
            fixture_profile: "generic-rgb".to_string(),
        }
    }
}

impl Settings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

/// Loads and saves [`Settings`] as `config.json` next to the binary's working directory unless
/// another path is given.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
    created_at: Option<String>,
}

/// Available configuration options with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub output: OutputConfigSchema,
    pub patch: PatchConfigSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfigSchema {
    pub refresh_interval_ms: ConfigOption<u64>,
    pub artnet_port: ConfigOption<u16>,
    pub broadcast: ConfigOption<bool>,
    pub destination_ip: ConfigOption<String>,
    pub universe_count: ConfigOption<u16>,
    pub max_universe: ConfigOption<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchConfigSchema {
    pub universe_layout: ConfigOption<UniverseLayout>,
    pub grid_width: ConfigOption<u32>,
    pub grid_height: ConfigOption<u32>,
    pub start_address: ConfigOption<u32>,
    pub fixture_profile: ConfigOption<String>,
}

/// Configuration option with validation and available choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub valid_choices: Option<Vec<T>>,
    pub description: String,
    pub requires_restart: bool,
}

impl<T: PartialOrd + std::fmt::Debug> ConfigOption<T> {
    fn check(&self, name: &str, value: &T, errors: &mut Vec<String>) {
        if let Some((min, max)) = &self.valid_range {
            if value < min || value > max {
                errors.push(format!("{} must be between {:?} and {:?}", name, min, max));
            }
        }
        if let Some(choices) = &self.valid_choices {
            if !choices.contains(value) {
                errors.push(format!("{} must be one of: {:?}", name, choices));
            }
        }
    }
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(String),

    #[error("Failed to write config file: {0}")]
    Write(String),

    #[error("Failed to parse config file: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Config validation errors: {}", .0.join(", "))]
    Validation(Vec<String>),
}

impl ConfigManager {
    /// Defaults to `config.json` in the current working directory.
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(|| PathBuf::from("config.json"));

        Self {
            config_path,
            settings: Settings::default(),
            created_at: None,
        }
    }

    /// Load settings from the configuration file, writing a default file first if none exists.
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            log::info!(
                "No config file at {}, writing defaults",
                self.config_path.display()
            );
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::Read(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        log::info!("Loaded configuration from {}", self.config_path.display());
        self.settings = config_file.settings;
        self.created_at = Some(config_file.created_at);
        Ok(self.settings.clone())
    }

    pub fn save(&mut self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::Write(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let created_at = self.created_at.get_or_insert_with(|| now.clone()).clone();
        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at,
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(&self.config_path, content).map_err(|e| ConfigError::Write(e.to_string()))?;

        Ok(())
    }

    /// Validate, then replace the current settings and save them.
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::Validation)?;
        self.settings = settings;
        self.save()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn schema() -> ConfigSchema {
        let defaults = Settings::default();

        ConfigSchema {
            output: OutputConfigSchema {
                refresh_interval_ms: ConfigOption {
                    default: defaults.refresh_interval_ms,
                    valid_range: Some((5, 1000)),
                    valid_choices: None,
                    description: "Milliseconds between Art-Net frames".to_string(),
                    requires_restart: true,
                },
                artnet_port: ConfigOption {
                    default: defaults.artnet_port,
                    valid_range: Some((1024, 65535)),
                    valid_choices: None,
                    description: "UDP port for Art-Net output".to_string(),
                    requires_restart: true,
                },
                broadcast: ConfigOption {
                    default: defaults.broadcast,
                    valid_range: None,
                    valid_choices: None,
                    description: "Use broadcast mode for Art-Net (vs unicast)".to_string(),
                    requires_restart: true,
                },
                destination_ip: ConfigOption {
                    default: defaults.destination_ip,
                    valid_range: None,
                    valid_choices: None,
                    description: "Destination IP address for Art-Net unicast".to_string(),
                    requires_restart: true,
                },
                universe_count: ConfigOption {
                    default: defaults.universe_count,
                    valid_range: Some((1, 256)),
                    valid_choices: None,
                    description: "Number of universes to transmit, starting at 0".to_string(),
                    requires_restart: true,
                },
                max_universe: ConfigOption {
                    default: defaults.max_universe,
                    valid_range: None,
                    valid_choices: Some(vec![254, 255]),
                    description: "Highest universe a transmitter accepts".to_string(),
                    requires_restart: true,
                },
            },
            patch: PatchConfigSchema {
                universe_layout: ConfigOption {
                    default: defaults.universe_layout,
                    valid_range: None,
                    valid_choices: None,
                    description: "How fixtures are bucketed into universes".to_string(),
                    requires_restart: true,
                },
                grid_width: ConfigOption {
                    default: defaults.grid_width,
                    valid_range: Some((1, 1024)),
                    valid_choices: None,
                    description: "Fixtures per row".to_string(),
                    requires_restart: true,
                },
                grid_height: ConfigOption {
                    default: defaults.grid_height,
                    valid_range: Some((1, 1024)),
                    valid_choices: None,
                    description: "Number of rows".to_string(),
                    requires_restart: true,
                },
                start_address: ConfigOption {
                    default: defaults.start_address,
                    valid_range: Some((1, u16::MAX as u32 * DMX_CHANNELS as u32)),
                    valid_choices: None,
                    description: "DMX address of the first fixture".to_string(),
                    requires_restart: true,
                },
                fixture_profile: ConfigOption {
                    default: defaults.fixture_profile,
                    valid_range: None,
                    valid_choices: None, // Built-ins plus anything loaded into the library
                    description: "Fixture library id used for every pixel".to_string(),
                    requires_restart: true,
                },
            },
        }
    }

    /// Check every field against the schema, collecting all violations.
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        let output = &schema.output;
        output
            .refresh_interval_ms
            .check("refresh_interval_ms", &settings.refresh_interval_ms, &mut errors);
        output
            .artnet_port
            .check("artnet_port", &settings.artnet_port, &mut errors);
        output
            .universe_count
            .check("universe_count", &settings.universe_count, &mut errors);
        output
            .max_universe
            .check("max_universe", &settings.max_universe, &mut errors);

        if settings.universe_count > 0 && settings.universe_count - 1 > settings.max_universe {
            errors.push(format!(
                "universe_count {} exceeds max_universe {}",
                settings.universe_count, settings.max_universe
            ));
        }

        if settings.destination_ip.parse::<IpAddr>().is_err() {
            errors.push(format!(
                "destination_ip '{}' is not an IP address",
                settings.destination_ip
            ));
        }

        for (universe, ip) in &settings.universe_routes {
            if *universe > settings.max_universe {
                errors.push(format!(
                    "universe_routes: universe {} exceeds max_universe {}",
                    universe, settings.max_universe
                ));
            }
            if ip.parse::<IpAddr>().is_err() {
                errors.push(format!(
                    "universe_routes: '{}' for universe {} is not an IP address",
                    ip, universe
                ));
            }
        }

        let patch = &schema.patch;
        patch
            .grid_width
            .check("grid_width", &settings.grid_width, &mut errors);
        patch
            .grid_height
            .check("grid_height", &settings.grid_height, &mut errors);
        patch
            .start_address
            .check("start_address", &settings.start_address, &mut errors);

        if settings.fixture_profile.trim().is_empty() {
            errors.push("fixture_profile must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.settings = Settings::default();
        self.save()
    }
}
