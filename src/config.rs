//! Configuration manager for Roster.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_NAME: &str = "roster";
const DEFAULT_URL: &str = "http://localhost:8080/";
const DEFAULT_ADDRESS: &str = "0.0.0.0:8080";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Errors that may occur during the configuration loading process.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("URL is invalid: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to deserialize configuration: {0}")]
    Deserialize(#[from] serde_yaml::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Public URL of the instance, used to build `Location` headers.
    pub url: String,
    /// Socket address the HTTP server binds to.
    pub address: String,
    #[serde(skip_deserializing)]
    pub version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to PostgreSQL configuration. Users are kept in memory when
    /// absent.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            url: DEFAULT_URL.to_owned(),
            address: DEFAULT_ADDRESS.to_owned(),
            version: VERSION.to_owned(),
            path: PathBuf::new(),
            postgres: None,
        }
    }
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Reads the configuration file from the specified path or the default
    /// location.
    ///
    /// A missing file yields the default configuration.
    pub fn read(self) -> Result<Arc<Self>, Error> {
        let file_path = if self.path.is_file() {
            self.path.clone()
        } else {
            Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        let file = match File::open(&file_path) {
            Ok(file) => file,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    path = %file_path.display(),
                    "configuration file not found, using defaults"
                );
                return Ok(Arc::new(Self::default()));
            },
        };

        Self::parse(file).map(Arc::new)
    }

    fn parse(reader: impl std::io::Read) -> Result<Self, Error> {
        let mut config: Configuration = serde_yaml::from_reader(reader)?;

        // set app version.
        config.version = VERSION.to_owned();
        config.url = normalize_url(&config.url)?;

        Ok(config)
    }
}

/// Normalizes a URL string by ensuring it starts with a valid scheme
/// (`http` or `https`) and its path ends with `/`.
fn normalize_url(url: &str) -> Result<String, url::ParseError> {
    let url_with_scheme = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    };

    let mut parsed_url = Url::parse(&url_with_scheme)?;
    // relative joins must append to the base path, not replace it.
    if !parsed_url.path().ends_with('/') {
        let path = format!("{}/", parsed_url.path());
        parsed_url.set_path(&path);
    }

    Ok(parsed_url.to_string())
}
