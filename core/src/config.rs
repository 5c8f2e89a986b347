//! Tunables for a framecheck run.
//!
//! Values come from a TOML file when one is found, otherwise the built-in
//! defaults apply. Command-line flags are layered on top by the binary.

use crate::blur::{BlurEffect, DEFAULT_BLUR_WINDOW};
use crate::loader::BLANK_THRESHOLD;
use crate::metrics::{MetricEngine, ThreadingMode, ZeroVariance};
use crate::scanner::{ScanConfig, DEFAULT_MARKER};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "framecheck.toml";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Substring a file name must contain to be picked up.
    pub marker: String,
    /// First-row mean below which an image is treated as blank.
    pub blank_threshold: f64,
    /// Signal-noise ratio reported for images with zero variance.
    pub zero_variance: ZeroVariance,
    /// Width of the re-blur box filter.
    pub blur_window: usize,
    /// Walk sub-directories as well.
    pub recursive: bool,
    /// Directory receiving reports; beside each input directory when unset.
    pub report_dir: Option<PathBuf>,
    pub threading: ThreadingMode,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            blank_threshold: BLANK_THRESHOLD,
            zero_variance: ZeroVariance::default(),
            blur_window: DEFAULT_BLUR_WINDOW,
            recursive: false,
            report_dir: None,
            threading: ThreadingMode::default(),
        }
    }
}

impl QualityConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            source,
            path: path.to_path_buf(),
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            source,
            path: path.to_path_buf(),
        })
    }

    /// Load configuration from the working directory or the user config
    /// directory, falling back to defaults.
    pub fn load_or_default() -> Self {
        for candidate in default_locations() {
            if !candidate.exists() {
                continue;
            }
            match Self::load(&candidate) {
                Ok(config) => return config,
                Err(error) => warn!("ignoring configuration: {}", error),
            }
        }
        Self::default()
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            source,
            path: path.to_path_buf(),
        })
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig::new(self.marker.clone()).with_recursive(self.recursive)
    }

    pub fn metric_engine(&self) -> MetricEngine {
        MetricEngine::new(BlurEffect::new(self.blur_window))
            .with_zero_variance(self.zero_variance)
            .with_threading(self.threading)
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
    if let Some(mut dir) = dirs::config_dir() {
        dir.push("framecheck");
        dir.push(DEFAULT_CONFIG_FILE);
        locations.push(dir);
    }
    locations
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    Parse {
        source: toml::de::Error,
        path: PathBuf,
    },
    Serialize(toml::ser::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { source, path } => write!(f, "io error for {}: {}", path.display(), source),
            Self::Parse { source, path } => {
                write!(f, "invalid config TOML in {}: {}", path.display(), source)
            }
            Self::Serialize(error) => write!(f, "failed to serialize config: {}", error),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Serialize(error) => Some(error),
        }
    }
}
