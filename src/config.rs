// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration loading from environment variables or a TOML file.
//!
//! Environment values are read from `VESTA_*` variables with sensible
//! defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `VESTA_ROOT` | `.` | Local root or network mount |
//! | `VESTA_BACKEND` | `local` | `local`, `network`, `object` or `memory` |
//! | `VESTA_NETWORK_TIMEOUT_MS` | 5000 | Per-operation network timeout |
//! | `VESTA_OBJECT_URL` | `s3://vesta-models` | Bucket and key prefix |
//! | `VESTA_OBJECT_ENDPOINT` | `http://127.0.0.1:9000` | Object store endpoint |
//! | `VESTA_OBJECT_TOKEN` | unset | Bearer token |
//! | `VESTA_OBJECT_TIMEOUT_MS` | 10000 | Object store request timeout |
//! | `VESTA_RELOAD_INTERVAL_SECS` | 0 | Default reload period (0 = off) |
//! | `VESTA_LITE_PREFIX` | `lite` | Key prefix for signed lite objects |
//! | `VESTA_LITE_SECRET` | unset | Signing secret for lite objects |
//! | `VESTA_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `VESTA_LOG_LEVEL` | `info` | Log filter directive |

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::storage::{
    HttpObjectStore, LocalFilesystemBackend, MemoryObjectStore, NetworkFilesystemBackend,
    ObjectLocation, ObjectStorageBackend, StorageBackend, StorageError,
};
use crate::telemetry::{LogConfig, LogFormat};

const DEFAULT_ROOT: &str = ".";
const DEFAULT_NETWORK_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_OBJECT_URL: &str = "s3://vesta-models";
const DEFAULT_OBJECT_ENDPOINT: &str = "http://127.0.0.1:9000";
const DEFAULT_OBJECT_TIMEOUT_MS: u64 = 10_000;
const MIN_TIMEOUT_MS: u64 = 100; // floor for all I/O timeouts
const DEFAULT_LITE_PREFIX: &str = "lite";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which storage backend variant to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Network,
    Object,
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Network => "network",
            Self::Object => "object",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "network" => Ok(Self::Network),
            "object" | "s3" => Ok(Self::Object),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Invalid(format!("unknown backend '{}'", other))),
        }
    }
}

/// Object store connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectConfig {
    pub url: String,
    pub endpoint: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_OBJECT_URL.to_string(),
            endpoint: DEFAULT_OBJECT_ENDPOINT.to_string(),
            token: None,
            timeout: Duration::from_millis(DEFAULT_OBJECT_TIMEOUT_MS),
        }
    }
}

/// Everything needed to construct a `StorageBackend`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub root: PathBuf,
    pub network_timeout: Duration,
    pub object: ObjectConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            root: PathBuf::from(DEFAULT_ROOT),
            network_timeout: Duration::from_millis(DEFAULT_NETWORK_TIMEOUT_MS),
            object: ObjectConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Construct the configured backend.
    ///
    /// Local roots are created if missing; network mounts must already
    /// exist; object locations must be `s3://bucket[/prefix]`.
    pub async fn build(&self) -> Result<Arc<dyn StorageBackend>, StorageError> {
        let backend: Arc<dyn StorageBackend> = match self.backend {
            BackendKind::Local => Arc::new(LocalFilesystemBackend::open(self.root.clone()).await?),
            BackendKind::Network => Arc::new(
                NetworkFilesystemBackend::connect(self.root.clone(), self.network_timeout).await?,
            ),
            BackendKind::Object => {
                let location = ObjectLocation::parse(&self.object.url)?;
                let client = HttpObjectStore::new(
                    &self.object.endpoint,
                    self.object.token.clone(),
                    self.object.timeout,
                )?;
                Arc::new(ObjectStorageBackend::new(client, location))
            }
            BackendKind::Memory => {
                let location = ObjectLocation::parse(&self.object.url)?;
                Arc::new(ObjectStorageBackend::new(MemoryObjectStore::new(), location))
            }
        };
        tracing::debug!(backend = backend.kind(), "Storage backend ready");
        Ok(backend)
    }
}

/// All runtime configuration.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub storage: StorageConfig,
    /// Default period for scheduled reloads; `None` disables them.
    pub reload_interval: Option<Duration>,
    pub lite: LiteConfig,
    pub log_format: LogFormat,
    pub log_level: String,
}

/// Signed lite object settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteConfig {
    pub prefix: String,
    /// `None` signs with the built-in default secret.
    pub secret: Option<String>,
}

impl Default for LiteConfig {
    fn default() -> Self {
        Self { prefix: DEFAULT_LITE_PREFIX.to_string(), secret: None }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            reload_interval: None,
            lite: LiteConfig::default(),
            log_format: LogFormat::Json,
            log_level: "info".to_string(),
        }
    }
}

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveConfig {
    pub root: String,
    pub backend: BackendKind,
    pub network_timeout_ms: u64,
    pub object_url: String,
    pub object_endpoint: String,
    pub object_token_set: bool,
    pub object_timeout_ms: u64,
    pub reload_interval_secs: u64,
    pub lite_prefix: String,
    pub lite_secret_set: bool,
    pub log_format: String,
    pub log_level: String,
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Read a string env var, treating empty values as unset.
fn parse_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn timeout_ms(ms: u64) -> Duration {
    Duration::from_millis(ms.max(MIN_TIMEOUT_MS))
}

fn reload_interval(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn load_root() -> PathBuf {
    match parse_string("VESTA_ROOT") {
        Some(root) => PathBuf::from(root),
        None => {
            warn!(default = DEFAULT_ROOT, "VESTA_ROOT not set, using the current directory");
            PathBuf::from(DEFAULT_ROOT)
        }
    }
}

fn load_backend_kind() -> BackendKind {
    match parse_string("VESTA_BACKEND") {
        Some(raw) => raw.parse::<BackendKind>().unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to local backend");
            BackendKind::Local
        }),
        None => BackendKind::Local,
    }
}

fn load_object_config() -> ObjectConfig {
    ObjectConfig {
        url: parse_string("VESTA_OBJECT_URL").unwrap_or_else(|| DEFAULT_OBJECT_URL.to_string()),
        endpoint: parse_string("VESTA_OBJECT_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_OBJECT_ENDPOINT.to_string()),
        token: parse_string("VESTA_OBJECT_TOKEN"),
        timeout: timeout_ms(parse_u64("VESTA_OBJECT_TIMEOUT_MS", DEFAULT_OBJECT_TIMEOUT_MS)),
    }
}

fn load_log_format() -> LogFormat {
    parse_string("VESTA_LOG_FORMAT")
        .and_then(|raw| raw.parse::<LogFormat>().ok())
        .unwrap_or_default()
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let network_ms = parse_u64("VESTA_NETWORK_TIMEOUT_MS", DEFAULT_NETWORK_TIMEOUT_MS);

    EnvConfig {
        storage: StorageConfig {
            backend: load_backend_kind(),
            root: load_root(),
            network_timeout: timeout_ms(network_ms),
            object: load_object_config(),
        },
        reload_interval: reload_interval(parse_u64("VESTA_RELOAD_INTERVAL_SECS", 0)),
        lite: LiteConfig {
            prefix: parse_string("VESTA_LITE_PREFIX").unwrap_or_else(|| DEFAULT_LITE_PREFIX.to_string()),
            secret: parse_string("VESTA_LITE_SECRET"),
        },
        log_format: load_log_format(),
        log_level: parse_string("VESTA_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    root: Option<PathBuf>,
    backend: BackendKind,
    reload_interval_secs: u64,
    network: NetworkSection,
    object: ObjectSection,
    lite: LiteSection,
    log: LogSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LiteSection {
    prefix: Option<String>,
    secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct NetworkSection {
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ObjectSection {
    url: Option<String>,
    endpoint: Option<String>,
    token: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LogSection {
    format: Option<String>,
    level: Option<String>,
}

/// Load configuration from a TOML file.
///
/// Unlike [`load`], a file that names an unknown backend, log format or
/// field is rejected rather than silently defaulted.
pub fn load_file(path: impl AsRef<Path>) -> Result<EnvConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let file: FileConfig = toml::from_str(&text)
        .map_err(|e| ConfigError::Parse { path: path.to_path_buf(), reason: e.to_string() })?;

    let log_format = match file.log.format {
        Some(raw) => raw
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?,
        None => LogFormat::default(),
    };

    let config = EnvConfig {
        storage: StorageConfig {
            backend: file.backend,
            root: file.root.unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT)),
            network_timeout: timeout_ms(file.network.timeout_ms.unwrap_or(DEFAULT_NETWORK_TIMEOUT_MS)),
            object: ObjectConfig {
                url: file.object.url.unwrap_or_else(|| DEFAULT_OBJECT_URL.to_string()),
                endpoint: file
                    .object
                    .endpoint
                    .unwrap_or_else(|| DEFAULT_OBJECT_ENDPOINT.to_string()),
                token: file.object.token.filter(|t| !t.is_empty()),
                timeout: timeout_ms(file.object.timeout_ms.unwrap_or(DEFAULT_OBJECT_TIMEOUT_MS)),
            },
        },
        reload_interval: reload_interval(file.reload_interval_secs),
        lite: LiteConfig {
            prefix: file.lite.prefix.unwrap_or_else(|| DEFAULT_LITE_PREFIX.to_string()),
            secret: file.lite.secret.filter(|s| !s.is_empty()),
        },
        log_format,
        log_level: file.log.level.unwrap_or_else(|| "info".to_string()),
    };
    config.validate()?;
    Ok(config)
}

impl EnvConfig {
    /// Check values that can only be judged as a whole.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(self.storage.backend, BackendKind::Object | BackendKind::Memory) {
            ObjectLocation::parse(&self.storage.object.url)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        if self.storage.backend == BackendKind::Object {
            reqwest::Url::parse(&self.storage.object.endpoint).map_err(|e| {
                ConfigError::Invalid(format!(
                    "object endpoint '{}': {}",
                    self.storage.object.endpoint, e
                ))
            })?;
        }
        let lite_prefix = self.lite.prefix.trim_matches('/');
        if !lite_prefix.is_empty() {
            crate::storage::validate_key(lite_prefix)
                .map_err(|e| ConfigError::Invalid(format!("lite prefix: {}", e)))?;
        }
        tracing_subscriber::EnvFilter::try_new(&self.log_level)
            .map_err(|e| ConfigError::Invalid(format!("log level '{}': {}", self.log_level, e)))?;
        Ok(())
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            format: self.log_format,
            level: self.log_level.clone(),
            output_path: None,
        }
    }

    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            root: self.storage.root.display().to_string(),
            backend: self.storage.backend,
            network_timeout_ms: self.storage.network_timeout.as_millis() as u64,
            object_url: self.storage.object.url.clone(),
            object_endpoint: self.storage.object.endpoint.clone(),
            object_token_set: self.storage.object.token.is_some(),
            object_timeout_ms: self.storage.object.timeout.as_millis() as u64,
            reload_interval_secs: self.reload_interval.map_or(0, |d| d.as_secs()),
            lite_prefix: self.lite.prefix.clone(),
            lite_secret_set: self.lite.secret.is_some(),
            log_format: match self.log_format {
                LogFormat::Json => "json".to_string(),
                LogFormat::Pretty => "pretty".to_string(),
            },
            log_level: self.log_level.clone(),
        }
    }
}
