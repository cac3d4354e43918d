//! Harness configuration
//!
//! Every value has a built-in default matching the constants the harness has
//! always shipped with. A JSON override can be baked in at build time by
//! pointing `BRINGUP_CONFIG` at a file; there are no command-line flags.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ErrorCode, HarnessError};

/// Complete harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Route the log stream to stdout (`true`) or discard it (`false`)
    pub verbose: bool,
    /// CPU clock requested by the capability probe on physical hardware
    pub target_cpu_mhz: u32,
    pub timing: TimingConfig,
    pub rng: RngConfig,
    pub alloc: AllocConfig,
    pub media: MediaConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            verbose: true,
            target_cpu_mhz: 900,
            timing: TimingConfig::default(),
            rng: RngConfig::default(),
            alloc: AllocConfig::default(),
            media: MediaConfig::default(),
        }
    }
}

/// Timer and sleep check parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub sleep_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self { sleep_ms: 100 }
    }
}

/// Randomness check parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RngConfig {
    /// Bytes per draw
    pub sample_size: usize,
    /// Draws printed to the console
    pub samples_logged: usize,
    /// Draws timed for throughput
    pub throughput_draws: usize,
}

impl Default for RngConfig {
    fn default() -> Self {
        Self {
            sample_size: 32,
            samples_logged: 10,
            throughput_draws: 1000,
        }
    }
}

/// Memory allocation stress parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocConfig {
    pub runs: usize,
    pub chunks_max: usize,
    /// Bytes allocated per run, split evenly across the drawn chunk count
    pub fill_bytes: usize,
    /// Fixed seed for the chunk-count draw; entropy-seeded when absent
    pub seed: Option<u64>,
}

impl Default for AllocConfig {
    fn default() -> Self {
        Self {
            runs: 9,
            chunks_max: 50,
            fill_bytes: 160 * 1024 * 1024,
            seed: None,
        }
    }
}

/// Storage media check parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Bytes read from each target
    pub byte_count: usize,
    /// Read chunk before the USB stack claims its share of on-chip RAM
    pub pre_device_mode_read_chunk: usize,
    /// Read chunk when re-run from device mode
    pub post_device_mode_read_chunk: usize,
    /// Configured media, tested in declaration order
    pub targets: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            byte_count: 10 * 1024 * 1024,
            pre_device_mode_read_chunk: 0x7fff,
            post_device_mode_read_chunk: 0x20000 - 512,
            targets: vec!["usdhc1".to_string(), "usdhc2".to_string()],
        }
    }
}

/// Result of resolving the build-time configuration.
///
/// Loading happens before the log sink exists, so the outcome is kept and
/// reported with [`ConfigLoad::log`] once logging is up.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLoad {
    pub config: HarnessConfig,
    /// File the configuration was read from, if any
    pub path: Option<PathBuf>,
    /// Why the file was rejected in favor of the defaults
    pub fallback: Option<HarnessError>,
}

impl ConfigLoad {
    /// Built-in defaults, no file involved.
    pub fn builtin() -> Self {
        Self {
            config: HarnessConfig::default(),
            path: None,
            fallback: None,
        }
    }

    /// Read `path`, keeping the defaults if it cannot be used.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        match HarnessConfig::try_load_from_file(&path) {
            Ok(config) => Self {
                config,
                path: Some(path),
                fallback: None,
            },
            Err(err) => Self {
                config: HarnessConfig::default(),
                path: Some(path),
                fallback: Some(err),
            },
        }
    }

    pub fn log(&self) {
        match (&self.path, &self.fallback) {
            (Some(path), Some(err)) => log::warn!(
                "[Config] Failed to load {:?}: {}. Using defaults.",
                path,
                err.message()
            ),
            (Some(path), None) => log::info!("[Config] Loaded configuration from {:?}", path),
            (None, _) => log::debug!("[Config] Using built-in defaults"),
        }
    }
}

impl HarnessConfig {
    /// Read, parse and validate a JSON configuration file.
    pub fn try_load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| HarnessError::InvalidConfig {
            reason: format!("failed to read {:?}: {}", path, err),
        })?;

        let config: Self =
            serde_json::from_str(&contents).map_err(|err| HarnessError::InvalidConfig {
                reason: format!("failed to parse JSON from {:?}: {}", path, err),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing, is not
    /// valid JSON, or fails [`HarnessConfig::validate`].
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let load = ConfigLoad::from_file(path);
        load.log();
        load.config
    }

    /// Resolve the configuration selected at build time.
    ///
    /// Does not log; call [`ConfigLoad::log`] after the sink is installed.
    pub fn load() -> ConfigLoad {
        match option_env!("BRINGUP_CONFIG") {
            Some(path) if !path.is_empty() => ConfigLoad::from_file(path),
            _ => ConfigLoad::builtin(),
        }
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        let invalid = |reason: &str| {
            Err(HarnessError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        if self.alloc.runs == 0 {
            return invalid("alloc.runs must be at least 1");
        }
        if self.alloc.chunks_max == 0 {
            return invalid("alloc.chunks_max must be at least 1");
        }
        if self.alloc.fill_bytes < self.alloc.chunks_max {
            return invalid("alloc.fill_bytes must cover one byte per chunk");
        }
        if self.media.pre_device_mode_read_chunk == 0 || self.media.post_device_mode_read_chunk == 0
        {
            return invalid("media read chunks must be non-zero");
        }
        if self.rng.sample_size == 0 {
            return invalid("rng.sample_size must be non-zero");
        }
        Ok(())
    }
}
