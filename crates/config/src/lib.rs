//! Layered configuration.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults,
//! 2. `config.toml` / `config.yaml` / `config.json` in the platform config
//!    directory,
//! 3. an explicit file (usually from `--config`),
//! 4. `COMICBACK_*` environment variables, with `__` between nested keys
//!    (`COMICBACK_SCAN__CONCURRENCY=4`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "COMICBACK_";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "comic-back")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite catalog location; defaults to the platform data directory.
    pub database: Option<PathBuf>,
    pub log: LogConfig,
    pub thumbnails: ThumbnailConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// An `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    pub enabled: bool,
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality, 1 to 100.
    pub quality: u8,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self { enabled: true, max_width: 400, max_height: 400, quality: 85 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Files resolved concurrently within one directory.
    pub concurrency: usize,
    /// Purge records of vanished files after a full scan.
    pub purge: bool,
    /// Directory names skipped in addition to the built-in blacklist.
    pub ignored_directories: Vec<String>,
    /// Deepest directory level visited below the scan root.
    pub max_depth: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { concurrency: 8, purge: true, ignored_directories: Vec::new(), max_depth: 64 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            log: LogConfig::default(),
            thumbnails: ThumbnailConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from every source, optionally including an explicit
    /// file, then validate it.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(dirs) = project_dirs() {
            let dir = dirs.config_dir();
            figment = figment
                .merge(Toml::file(dir.join("config.toml")))
                .merge(Yaml::file(dir.join("config.yaml")))
                .merge(Json::file(dir.join("config.json")));
        }
        if let Some(path) = explicit {
            figment = Self::merge_file(figment, path)?;
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
        if !path.is_file() {
            exn::bail!(ErrorKind::Invalid(format!("config file not found: {}", path.display())));
        }
        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        Ok(match extension.as_deref() {
            Some("toml") => figment.merge(Toml::file_exact(path)),
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
            Some("json") => figment.merge(Json::file_exact(path)),
            _ => exn::bail!(ErrorKind::Invalid(format!("unsupported config format: {}", path.display()))),
        })
    }

    /// Extract and validate a configuration from an assembled [`Figment`].
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(?config, "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let thumbnails = &self.thumbnails;
        if thumbnails.max_width == 0 || thumbnails.max_height == 0 {
            exn::bail!(ErrorKind::Invalid("thumbnail size must be non-zero".to_string()));
        }
        if !(1..=100).contains(&thumbnails.quality) {
            exn::bail!(ErrorKind::Invalid(format!("thumbnail quality {} is not within 1..=100", thumbnails.quality)));
        }
        if self.scan.concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("scan concurrency must be at least 1".to_string()));
        }
        if self.scan.max_depth == 0 {
            exn::bail!(ErrorKind::Invalid("scan max_depth must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Catalog path: the configured one, else `catalog.sqlite` in the
    /// platform data directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database {
            return Ok(path.clone());
        }
        let dirs = project_dirs().ok_or_else(|| exn::Exn::from(ErrorKind::NoHomeDirectory))?;
        Ok(dirs.data_dir().join("catalog.sqlite"))
    }
}
