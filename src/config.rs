//! Service configuration.
//!
//! Loaded from an optional `config.toml` passed with `--config`. Without a
//! file the stock defaults apply.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! bind = "127.0.0.1:3000"       # Listen address
//! max_body_bytes = 104857600    # Largest accepted upload (100 MiB)
//!
//! [conversion]
//! default_quality = 80          # Used when a request sends no usable quality
//! max_workers = 4               # Parallel encoders, all requests (omit for auto = CPU cores)
//! max_files = 500               # Largest batch accepted (omit for unlimited)
//! max_decode_alloc_mb = 512     # Decoder allocation ceiling per image
//!
//! [archive]
//! file_name = "converted-images.zip"
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; override just the values you want:
//!
//! ```toml
//! [conversion]
//! default_quality = 70
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::codec::{DecodeLimits, Quality};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Service configuration loaded from `config.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Listener settings.
    pub server: ServerConfig,
    /// Batch conversion settings.
    pub conversion: ConversionConfig,
    /// Combined archive settings.
    pub archive: ArchiveConfig,
}

impl ServiceConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "server.bind is not a socket address: {}",
                self.server.bind
            )));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Validation(
                "server.max_body_bytes must be non-zero".into(),
            ));
        }
        let quality = self.conversion.default_quality;
        if !(Quality::MIN..=Quality::MAX).contains(&quality) {
            return Err(ConfigError::Validation(
                "conversion.default_quality must be 1-100".into(),
            ));
        }
        if self.conversion.max_workers == Some(0) {
            return Err(ConfigError::Validation(
                "conversion.max_workers must be non-zero (omit for auto)".into(),
            ));
        }
        if self.conversion.max_files == Some(0) {
            return Err(ConfigError::Validation(
                "conversion.max_files must be non-zero (omit for unlimited)".into(),
            ));
        }
        if self.conversion.max_decode_alloc_mb == 0 {
            return Err(ConfigError::Validation(
                "conversion.max_decode_alloc_mb must be non-zero".into(),
            ));
        }
        if !self.archive.file_name.ends_with(".zip") || self.archive.file_name.len() <= 4 {
            return Err(ConfigError::Validation(
                "archive.file_name must be a non-empty name ending in .zip".into(),
            ));
        }
        Ok(())
    }
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            max_body_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Batch conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversionConfig {
    /// Quality applied when a request's quality field is absent or not a number.
    pub default_quality: u8,
    /// Maximum parallel encoders, shared by all requests.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_workers: Option<usize>,
    /// Maximum number of images per request. When absent, unlimited.
    pub max_files: Option<usize>,
    /// Per-image decoder allocation ceiling in MiB.
    pub max_decode_alloc_mb: u64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            default_quality: Quality::DEFAULT,
            max_workers: None,
            max_files: None,
            max_decode_alloc_mb: 512,
        }
    }
}

impl ConversionConfig {
    pub fn default_quality(&self) -> Quality {
        Quality::new(i64::from(self.default_quality))
    }

    pub fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits::from_megabytes(self.max_decode_alloc_mb)
    }
}

/// Combined archive settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Download name advertised for the archive.
    pub file_name: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            file_name: "converted-images.zip".to_string(),
        }
    }
}

/// Resolve the effective encoder count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_workers(config: &ConversionConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_workers
        .map(|n| n.min(cores))
        .unwrap_or(cores)
        .max(1)
}

/// Load and validate a config file, or the stock defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ServiceConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// A documented config file with every option at its default.
pub fn stock_config_toml() -> &'static str {
    r##"# webp-batch configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# HTTP listener
# ---------------------------------------------------------------------------
[server]
# Address to listen on. --bind on the command line overrides this.
bind = "127.0.0.1:3000"

# Largest accepted request body in bytes (the whole multipart upload).
max_body_bytes = 104857600

# ---------------------------------------------------------------------------
# Batch conversion
# ---------------------------------------------------------------------------
[conversion]
# WebP quality (1 = smallest, 100 = best) used when a request sends no
# quality field or a value that is not a number. Numbers outside 1-100
# are clamped, never rejected.
default_quality = 80

# Maximum images encoded in parallel across all requests.
# Omit to use every CPU core; larger values are clamped to the core count.
# max_workers = 4

# Maximum images per request. Omit for no limit.
# max_files = 500

# Decoder allocation ceiling per image, in MiB. Larger images fail with
# "image too large" instead of exhausting memory.
max_decode_alloc_mb = 512

# ---------------------------------------------------------------------------
# Combined archive
# ---------------------------------------------------------------------------
[archive]
# Download name advertised for the ZIP of all converted images.
file_name = "converted-images.zip"
"##
}
