use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::Args;
use log::debug;
use serde::Deserialize;

use crate::error_handling::types::ConfigError;
use crate::storage::file_storage::DEFAULT_MAX_UPLOAD_BYTES;

/// Runtime parameters of the recordings backend.
///
/// Every field can be given on the command line, through the environment
/// variable named in its `env` attribute, or in a TOML file loaded with
/// [`ServerConfig::from_file`].
///
/// # Examples
///
/// ```
/// use screenrec::configuration::ServerConfig;
///
/// let config = ServerConfig::default();
/// assert_eq!(config.port, 4000);
/// assert!(config.database_url.is_none());
/// ```
#[derive(Args, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Database connection string
    ///
    /// When absent the server falls back to the SQLite file given by
    /// `sqlite_storage`.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// SQLite file used when no `database_url` is configured
    #[arg(long, env = "SQLITE_STORAGE", default_value = "./data.sqlite")]
    pub sqlite_storage: PathBuf,

    /// IP address the HTTP server binds to
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// TCP port of the HTTP server
    #[arg(long, env = "PORT", default_value_t = 4000)]
    pub port: u16,

    /// Origin of the browser client allowed by CORS
    #[arg(long, env = "CORS_ORIGIN", default_value = "http://localhost:5173")]
    pub cors_origin: String,

    /// Directory holding the uploaded files, served under `/uploads`
    #[arg(long, env = "UPLOADS_DIR", default_value = "./uploads")]
    pub uploads_dir: PathBuf,

    /// Largest accepted upload in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: u64,

    /// Absolute base URL used in stored recording URLs
    ///
    /// Without it the URL is rebuilt from the request's `Host` and
    /// `X-Forwarded-Proto` headers.
    #[arg(long, env = "PUBLIC_URL")]
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            sqlite_storage: PathBuf::from("./data.sqlite"),
            bind_address: "0.0.0.0".to_string(),
            port: 4000,
            cors_origin: "http://localhost:5173".to_string(),
            uploads_dir: PathBuf::from("./uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            public_url: None,
        }
    }
}

/// Where the metadata store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Url(String),
    Sqlite(PathBuf),
}

impl ServerConfig {
    /// Load a TOML file. Missing keys keep their default value.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: ServerConfig =
            toml::from_str(&raw).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_address
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::BadAddress(self.bind_address.clone()))?;
        if !is_origin(&self.cors_origin) {
            return Err(ConfigError::BadUrl(self.cors_origin.clone()));
        }
        if let Some(ref url) = self.public_url {
            if !is_http_url(url) {
                return Err(ConfigError::BadUrl(url.clone()));
            }
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::NotInRange(
                "max_upload_bytes must be greater than 0".to_string(),
            ));
        }
        if let Some(ref url) = self.database_url {
            if url.trim().is_empty() {
                return Err(ConfigError::BadUrl("empty database_url".to_string()));
            }
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self
            .bind_address
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::BadAddress(self.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn database_target(&self) -> DatabaseTarget {
        match self.database_url {
            Some(ref url) if !url.trim().is_empty() => DatabaseTarget::Url(url.clone()),
            _ => DatabaseTarget::Sqlite(self.sqlite_storage.clone()),
        }
    }
}

/// Settings of the `screenrec` client.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the recordings API
    #[arg(long, env = "SCREENREC_API_URL", default_value = "http://localhost:4000")]
    pub api_url: String,
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if is_http_url(&self.api_url) {
            Ok(())
        } else {
            Err(ConfigError::BadUrl(self.api_url.clone()))
        }
    }
}

/// Scheme and authority only, as accepted by a CORS allow-list. A single
/// trailing slash is tolerated.
fn is_origin(raw: &str) -> bool {
    let raw = raw.strip_suffix('/').unwrap_or(raw);
    let authority = raw
        .strip_prefix("http://")
        .or_else(|| raw.strip_prefix("https://"));
    match authority {
        Some(authority) => {
            !authority.is_empty()
                && !authority
                    .chars()
                    .any(|c| matches!(c, '/' | '?' | '#' | '@') || c.is_whitespace())
        }
        None => false,
    }
}

fn is_http_url(raw: &str) -> bool {
    let rest = raw
        .strip_prefix("http://")
        .or_else(|| raw.strip_prefix("https://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.starts_with('/'))
}
