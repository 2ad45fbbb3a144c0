use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Pre-compiled regex for hostname validation (compiled once at first use)
static HOSTNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][-a-zA-Z0-9\.]*[a-zA-Z0-9]$").unwrap());

/// 10 MiB, the per-image upload ceiling.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
/// Largest artifact accepted from an engine.
pub const DEFAULT_MAX_ARTIFACT_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub storage: Option<StorageSection>,
    #[serde(default)]
    pub uploads: Option<UploadsSection>,
    #[serde(default)]
    pub jobs: Option<JobsSection>,
    #[serde(default)]
    pub engine: Option<EngineSection>,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct StorageSection {
    #[serde(default)]
    pub backend: Option<StorageBackend>,
    #[serde(default)]
    pub directory: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadsSection {
    #[serde(default)]
    pub max_image_bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct JobsSection {
    #[serde(default)]
    pub max_jobs: Option<usize>,
    #[serde(default)]
    pub retention_secs: Option<u64>,
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub mode: Option<ProcessingMode>,
}

#[derive(Debug, Deserialize)]
pub struct EngineSection {
    #[serde(default)]
    pub kind: Option<EngineKind>,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub simulated_latency_ms: Option<u64>,
    #[serde(default)]
    pub max_artifact_bytes: Option<usize>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Where uploaded images and artifacts are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Filesystem,
}

/// How `process` requests are served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    /// The request waits for the engine and returns the terminal job.
    Inline,
    /// The request returns once the job is accepted; clients poll.
    Background,
}

/// Which inference engine backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Composite,
    Remote,
}

macro_rules! lowercase_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok(Self::$variant),)+
                    other => Err(format!(
                        "unknown value '{}', expected one of: {}",
                        other,
                        [$($name),+].join(", ")
                    )),
                }
            }
        }
    };
}

lowercase_enum!(StorageBackend { Memory => "memory", Filesystem => "filesystem" });
lowercase_enum!(ProcessingMode { Inline => "inline", Background => "background" });
lowercase_enum!(EngineKind { Composite => "composite", Remote => "remote" });

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

/// Parse configuration from a string with optional format hint
#[inline]
fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

/// Try to parse config by attempting each enabled format
#[inline]
fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse config as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        let _ = s;
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Concrete application configuration with defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub uploads: UploadsConfig,
    pub jobs: JobsConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub directory: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadsConfig {
    pub max_image_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobsConfig {
    pub max_jobs: usize,
    pub retention_secs: Option<u64>,
    pub sweep_interval_secs: u64,
    pub workers: usize,
    pub mode: ProcessingMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineConfig {
    pub kind: EngineKind,
    pub remote_url: Option<String>,
    pub timeout_secs: u64,
    pub simulated_latency_ms: u64,
    pub max_artifact_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5080,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                directory: "./blobs".to_string(),
            },
            uploads: UploadsConfig {
                max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            },
            jobs: JobsConfig {
                max_jobs: 1000,
                retention_secs: None,
                sweep_interval_secs: 60,
                workers: 4,
                mode: ProcessingMode::Inline,
            },
            engine: EngineConfig {
                kind: EngineKind::Composite,
                remote_url: None,
                timeout_secs: 120,
                simulated_latency_ms: 0,
                max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
            },
        }
    }
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    let bytes = s.as_bytes();
    match bytes {
        b"1" | b"true" | b"TRUE" | b"True" | b"yes" | b"YES" | b"Yes" | b"y" | b"Y" => Ok(true),
        b"0" | b"false" | b"FALSE" | b"False" | b"no" | b"NO" | b"No" | b"n" | b"N" => Ok(false),
        _ => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" => Ok(true),
            "false" | "no" | "n" => Ok(false),
            _ => Err(()),
        },
    }
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
    ($target:expr, $source:expr, wrap) => {
        if let Some(v) = $source {
            $target = Some(v);
        }
    };
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = path {
        let raw = load_raw_from_file(p)?;
        if let Some(server) = raw.server {
            apply_opt!(cfg.server.host, server.host);
            apply_opt!(cfg.server.port, server.port);
        }
        if let Some(logging) = raw.logging {
            apply_opt!(cfg.logging.level, logging.level);
            apply_opt!(cfg.logging.json, logging.json);
        }
        if let Some(storage) = raw.storage {
            apply_opt!(cfg.storage.backend, storage.backend);
            apply_opt!(cfg.storage.directory, storage.directory);
        }
        if let Some(uploads) = raw.uploads {
            apply_opt!(cfg.uploads.max_image_bytes, uploads.max_image_bytes);
        }
        if let Some(jobs) = raw.jobs {
            apply_opt!(cfg.jobs.max_jobs, jobs.max_jobs);
            apply_opt!(cfg.jobs.retention_secs, jobs.retention_secs, wrap);
            apply_opt!(cfg.jobs.sweep_interval_secs, jobs.sweep_interval_secs);
            apply_opt!(cfg.jobs.workers, jobs.workers);
            apply_opt!(cfg.jobs.mode, jobs.mode);
        }
        if let Some(engine) = raw.engine {
            apply_opt!(cfg.engine.kind, engine.kind);
            apply_opt!(cfg.engine.remote_url, engine.remote_url, wrap);
            apply_opt!(cfg.engine.timeout_secs, engine.timeout_secs);
            apply_opt!(cfg.engine.simulated_latency_ms, engine.simulated_latency_ms);
            apply_opt!(cfg.engine.max_artifact_bytes, engine.max_artifact_bytes);
        }
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

/// Helper to parse env var as a specific type
#[inline]
fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Helper to parse env var as bool
#[inline]
fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(v) => parse_bool(&v)
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("invalid {}", key))),
        Err(_) => Ok(None),
    }
}

/// Helper to get env var as string
#[inline]
fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Apply all environment variable overrides to config
fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    // Server
    if let Some(v) = env_str("VASTRA_SERVER_HOST") {
        cfg.server.host = v;
    }
    if let Some(v) = env_parse::<u16>("VASTRA_SERVER_PORT")? {
        cfg.server.port = v;
    }

    // Logging
    if let Some(v) = env_str("VASTRA_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = env_bool("VASTRA_LOG_JSON")? {
        cfg.logging.json = v;
    }

    // Storage
    if let Some(v) = env_parse::<StorageBackend>("VASTRA_STORAGE_BACKEND")? {
        cfg.storage.backend = v;
    }
    if let Some(v) = env_str("VASTRA_STORAGE_DIRECTORY") {
        cfg.storage.directory = v;
    }

    // Uploads
    if let Some(v) = env_parse::<usize>("VASTRA_UPLOADS_MAX_IMAGE_BYTES")? {
        cfg.uploads.max_image_bytes = v;
    }

    // Jobs
    if let Some(v) = env_parse::<usize>("VASTRA_JOBS_MAX_JOBS")? {
        cfg.jobs.max_jobs = v;
    }
    if let Some(v) = env_parse::<u64>("VASTRA_JOBS_RETENTION_SECS")? {
        cfg.jobs.retention_secs = Some(v);
    }
    if let Some(v) = env_parse::<u64>("VASTRA_JOBS_SWEEP_INTERVAL_SECS")? {
        cfg.jobs.sweep_interval_secs = v;
    }
    if let Some(v) = env_parse::<usize>("VASTRA_JOBS_WORKERS")? {
        cfg.jobs.workers = v;
    }
    if let Some(v) = env_parse::<ProcessingMode>("VASTRA_JOBS_MODE")? {
        cfg.jobs.mode = v;
    }

    // Engine
    if let Some(v) = env_parse::<EngineKind>("VASTRA_ENGINE_KIND")? {
        cfg.engine.kind = v;
    }
    if let Some(v) = env_str("VASTRA_ENGINE_REMOTE_URL") {
        cfg.engine.remote_url = Some(v);
    } else if let Some(v) = env_str("PYTHON_SERVICE_URL") {
        // Name used by the older Node deployment
        cfg.engine.remote_url = Some(v);
    }
    if let Some(v) = env_parse::<u64>("VASTRA_ENGINE_TIMEOUT_SECS")? {
        cfg.engine.timeout_secs = v;
    }
    if let Some(v) = env_parse::<u64>("VASTRA_ENGINE_SIMULATED_LATENCY_MS")? {
        cfg.engine.simulated_latency_ms = v;
    }
    if let Some(v) = env_parse::<usize>("VASTRA_ENGINE_MAX_ARTIFACT_BYTES")? {
        cfg.engine.max_artifact_bytes = v;
    }

    Ok(())
}

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.server.port == 0 {
        return Err(ConfigError::Validation("server.port must be > 0".into()));
    }
    // validate server.host: allow IPs or simple hostname pattern
    let host_ok = cfg.server.host.parse::<std::net::IpAddr>().is_ok()
        || HOSTNAME_REGEX.is_match(&cfg.server.host);
    if !host_ok {
        return Err(ConfigError::Validation(format!(
            "invalid server.host: {}",
            cfg.server.host
        )));
    }

    if cfg.storage.backend == StorageBackend::Filesystem && cfg.storage.directory.trim().is_empty()
    {
        return Err(ConfigError::Validation(
            "storage.directory must be set for the filesystem backend".into(),
        ));
    }

    if cfg.uploads.max_image_bytes == 0 {
        return Err(ConfigError::Validation(
            "uploads.max_image_bytes must be > 0".into(),
        ));
    }

    if cfg.jobs.max_jobs == 0 {
        return Err(ConfigError::Validation("jobs.max_jobs must be >= 1".into()));
    }
    if cfg.jobs.workers == 0 {
        return Err(ConfigError::Validation("jobs.workers must be >= 1".into()));
    }
    if cfg.jobs.retention_secs.is_some() && cfg.jobs.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "jobs.sweep_interval_secs must be > 0 when retention is enabled".into(),
        ));
    }

    if cfg.engine.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "engine.timeout_secs must be > 0".into(),
        ));
    }
    if cfg.engine.max_artifact_bytes == 0 {
        return Err(ConfigError::Validation(
            "engine.max_artifact_bytes must be > 0".into(),
        ));
    }
    if cfg.engine.kind == EngineKind::Remote {
        let Some(remote) = cfg.engine.remote_url.as_deref().filter(|s| !s.is_empty()) else {
            return Err(ConfigError::Validation(
                "engine.remote_url must be set for the remote engine".into(),
            ));
        };
        match url::Url::parse(remote) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            Ok(_) => {
                return Err(ConfigError::Validation(format!(
                    "engine.remote_url must be http or https: {}",
                    remote
                )))
            }
            Err(_) => {
                return Err(ConfigError::Validation(format!(
                    "invalid engine.remote_url: {}",
                    remote
                )))
            }
        }
    }
    Ok(())
}
