//! Backend configuration: where the project lives and which keys to present.
//!
//! Every value is resolved through a chain, first hit wins:
//!
//! 1. Process environment (`SUPABASE_URL`, `SUPABASE_ANON_KEY`, `SUPABASE_SERVICE_ROLE_KEY`)
//! 2. `.env` in the working directory
//! 3. `~/.pipectl/config.toml` (`base-url`, `anon-key`, `service-role-key`)
//!
//! The `.env` file is read as data; it never modifies the process environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

use serde::Deserialize;

pub const URL_VAR: &str = "SUPABASE_URL";
pub const ANON_KEY_VAR: &str = "SUPABASE_ANON_KEY";
pub const SERVICE_ROLE_KEY_VAR: &str = "SUPABASE_SERVICE_ROLE_KEY";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} not set\nSet it with: export {var}='...' (or add it to .env)")]
    Missing { var: &'static str },

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config at {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid .env at {path}: {source}")]
    DotEnv {
        path: PathBuf,
        source: dotenvy::Error,
    },
}

/// On-disk shape of `~/.pipectl/config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct FileConfig {
    base_url: Option<String>,
    anon_key: Option<String>,
    service_role_key: Option<String>,
}

/// Resolved configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub base_url: Option<String>,
    pub anon_key: Option<String>,
    pub service_role_key: Option<String>,
}

impl Config {
    /// Load configuration from the environment, `./.env`, and `~/.pipectl/config.toml`.
    pub fn load() -> Result<Self, ConfigError> {
        let dotenv = read_dotenv(Path::new(".env"))?;
        let file = match Self::path() {
            Some(path) => read_file_config(&path)?,
            None => FileConfig::default(),
        };
        Ok(Self::resolve(|var| env::var(var).ok(), &dotenv, file))
    }

    /// The config file path: `~/.pipectl/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".pipectl").join("config.toml"))
    }

    /// Apply the resolution chain. `lookup` stands in for the process environment.
    fn resolve(
        lookup: impl Fn(&str) -> Option<String>,
        dotenv: &HashMap<String, String>,
        file: FileConfig,
    ) -> Self {
        let pick = |var: &str, fallback: Option<String>| {
            lookup(var)
                .or_else(|| dotenv.get(var).cloned())
                .or(fallback)
                .filter(|v| !v.trim().is_empty())
        };

        Self {
            base_url: pick(URL_VAR, file.base_url).map(|u| u.trim_end_matches('/').to_string()),
            anon_key: pick(ANON_KEY_VAR, file.anon_key),
            service_role_key: pick(SERVICE_ROLE_KEY_VAR, file.service_role_key),
        }
    }

    /// The project base URL. Every command needs it.
    pub fn require_base_url(&self) -> Result<&str, ConfigError> {
        self.base_url
            .as_deref()
            .ok_or(ConfigError::Missing { var: URL_VAR })
    }

    /// The service-role key, needed for table access and job submission.
    pub fn require_service_role_key(&self) -> Result<&str, ConfigError> {
        self.service_role_key
            .as_deref()
            .ok_or(ConfigError::Missing {
                var: SERVICE_ROLE_KEY_VAR,
            })
    }

    /// The bearer token for remote function calls: service role, then anon, then none.
    pub fn function_token(&self) -> Option<&str> {
        self.service_role_key
            .as_deref()
            .or(self.anon_key.as_deref())
    }
}

/// Read `.env` into a map. A missing file is an empty map.
fn read_dotenv(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(dotenvy::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(HashMap::new());
        }
        Err(source) => {
            return Err(ConfigError::DotEnv {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    iter.collect::<Result<HashMap<_, _>, _>>()
        .map_err(|source| ConfigError::DotEnv {
            path: path.to_path_buf(),
            source,
        })
}

/// Read the TOML config file. A missing file is an empty config.
fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(FileConfig::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    toml::from_str(&contents).map_err(|source| ConfigError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}
