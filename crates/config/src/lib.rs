//! Layered configuration.
//!
//! Values are resolved from, in increasing priority:
//! 1. built-in defaults,
//! 2. a configuration file (TOML, YAML or JSON, by extension),
//! 3. environment variables prefixed `CURATOR_`, with nested keys separated
//!    by a double underscore (`CURATOR_REFRESH__CEILING_SECS=120`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "CURATOR_";
const CONFIG_FILENAME: &str = "curator.toml";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "curator", "curator")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub library: LibraryConfig,
    pub refresh: RefreshConfig,
    pub database: DatabaseConfig,
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Root of the content tree. Every path the indexes store is relative
    /// to it.
    pub content_dir: PathBuf,
    /// Descriptor file names, most preferred first.
    pub meta_filenames: Vec<String>,
}

/// Delays of the reconciliation loop, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Delay after a pass that saw changes.
    pub base_secs: u64,
    /// Added to the delay after every quiet pass.
    pub step_secs: u64,
    pub ceiling_secs: u64,
}

impl RefreshConfig {
    pub fn base(&self) -> Duration {
        Duration::from_secs(self.base_secs)
    }

    pub fn step(&self) -> Duration {
        Duration::from_secs(self.step_secs)
    }

    pub fn ceiling(&self) -> Duration {
        Duration::from_secs(self.ceiling_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    /// Throwaway in-memory databases, rebuilt on every start.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub content: PathBuf,
    pub facets: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Location of `ffprobe`; looked up on `PATH` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffprobe: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir =
            project_dirs().map(|dirs| dirs.data_dir().to_path_buf()).unwrap_or_else(|| PathBuf::from("/var/lib/curator"));
        Self {
            library: LibraryConfig {
                content_dir: PathBuf::from("/srv/content"),
                meta_filenames: vec![".contentinfo".to_string(), "info.json".to_string()],
            },
            refresh: RefreshConfig { base_secs: 3, step_secs: 5, ceiling_secs: 60 },
            database: DatabaseConfig {
                backend: DatabaseBackend::Sqlite,
                content: data_dir.join("content.sqlite"),
                facets: data_dir.join("facets.sqlite"),
            },
            probe: ProbeConfig { ffprobe: None, timeout_secs: 5 },
        }
    }
}

impl Config {
    /// Where the configuration file is looked for when none is given.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
    }

    /// The provider stack, without extracting or validating it.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let figment = match path {
            None => figment,
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::MissingFile(path.to_path_buf())),
            Some(path) => match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file_exact(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
                Some("json") => figment.merge(Json::file_exact(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            },
        };
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load and validate the configuration.
    ///
    /// Without an explicit path, the file at [`default_path`](Self::default_path)
    /// is used if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fallback = match path {
            Some(_) => None,
            None => Self::default_path().filter(|path| path.is_file()),
        };
        let path = path.or(fallback.as_deref());
        match path {
            Some(path) => tracing::debug!(path = %path.display(), "Loading configuration file"),
            None => tracing::debug!("No configuration file, using defaults"),
        }
        let config: Config = Self::figment(path)?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.library.meta_filenames.is_empty() {
            exn::bail!(ErrorKind::Invalid { key: "library.meta_filenames", reason: "must not be empty" });
        }
        if !self.library.content_dir.is_absolute() {
            exn::bail!(ErrorKind::Invalid { key: "library.content_dir", reason: "must be an absolute path" });
        }
        if self.refresh.base_secs > self.refresh.ceiling_secs {
            exn::bail!(ErrorKind::Invalid { key: "refresh.base_secs", reason: "must not exceed refresh.ceiling_secs" });
        }
        if self.probe.timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid { key: "probe.timeout_secs", reason: "must be greater than zero" });
        }
        Ok(())
    }
}
