//! Configuration loading and root folder resolution
//!
//! Every setting is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: a warning is logged and
//! resolution continues with the remaining sources.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ENV_ROOT_FOLDER: &str = "ACAGIA_ROOT_FOLDER";
/// Environment variable overriding the listen port
pub const ENV_PORT: &str = "ACAGIA_PORT";
/// Environment variable overriding the bind address
pub const ENV_BIND: &str = "ACAGIA_BIND";

/// Compiled default listen port
pub const DEFAULT_PORT: u16 = 5780;
/// Compiled default bind address
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "acagia.db";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub port: Option<u16>,
    pub bind_address: Option<String>,
}

impl TomlConfig {
    /// Parse TOML text
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub bind_address: String,
    pub port: u16,
}

impl ServiceConfig {
    /// Path of the SQLite database inside the root folder
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    /// `host:port` string for the listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Create the root folder if it does not exist yet
    pub fn ensure_root_folder(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            debug!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }
}

/// Resolves [`ServiceConfig`] from CLI values, environment, TOML and defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_root_folder: Option<PathBuf>,
    cli_port: Option<u16>,
    cli_bind: Option<String>,
    config_file: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root_folder(mut self, path: Option<PathBuf>) -> Self {
        self.cli_root_folder = path;
        self
    }

    pub fn port(mut self, port: Option<u16>) -> Self {
        self.cli_port = port;
        self
    }

    pub fn bind(mut self, bind: Option<String>) -> Self {
        self.cli_bind = bind;
        self
    }

    /// Use an explicit config file instead of the platform search path
    pub fn config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    /// Resolve every setting. Never fails; bad sources are logged and skipped.
    pub fn resolve(&self) -> ServiceConfig {
        let toml = self.load_toml();

        let root_folder = self
            .cli_root_folder
            .clone()
            .or_else(|| std::env::var(ENV_ROOT_FOLDER).ok().map(PathBuf::from))
            .or_else(|| toml.root_folder.clone())
            .unwrap_or_else(default_root_folder);

        let port = self
            .cli_port
            .or_else(env_port)
            .or(toml.port)
            .unwrap_or(DEFAULT_PORT);

        let bind_address = self
            .cli_bind
            .clone()
            .or_else(|| std::env::var(ENV_BIND).ok())
            .or_else(|| toml.bind_address.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        ServiceConfig {
            root_folder,
            bind_address,
            port,
        }
    }

    fn load_toml(&self) -> TomlConfig {
        let path = match self.config_file.clone().or_else(find_config_file) {
            Some(path) => path,
            None => return TomlConfig::default(),
        };

        match TomlConfig::load(&path) {
            Ok(config) => {
                debug!("Loaded config file: {}", path.display());
                config
            }
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                TomlConfig::default()
            }
        }
    }
}

fn env_port() -> Option<u16> {
    let raw = std::env::var(ENV_PORT).ok()?;
    match raw.parse() {
        Ok(port) => Some(port),
        Err(_) => {
            warn!("Ignoring {}={}: not a valid port", ENV_PORT, raw);
            None
        }
    }
}

/// Locate `config.toml` for the platform
///
/// Linux checks `~/.config/acagia/config.toml` then `/etc/acagia/config.toml`.
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("acagia").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/acagia/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("acagia"))
        .unwrap_or_else(|| PathBuf::from("./acagia_data"))
}
