//! Server configuration.
//!
//! Values are layered, later sources winning: built-in defaults, an optional
//! YAML file, the `LISTEN` / `FILES_DIRECTORY` environment variables, then
//! command line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;

use crate::http::connection::Limits;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:4221";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub files: FilesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    /// Largest request (head plus body) accepted on a connection.
    pub max_request_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Base directory for `/files/*`.
    pub directory: PathBuf,
}

/// Command line flags.
#[derive(Debug, Default, Parser)]
#[command(name = "ferry", version, about = "Minimal HTTP/1.1 file server")]
pub struct Args {
    /// Directory served under /files/
    #[arg(long)]
    pub directory: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:4221
    #[arg(long)]
    pub listen: Option<String>,

    /// YAML configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            read_timeout_secs: limits.read_timeout.as_secs(),
            write_timeout_secs: limits.write_timeout.as_secs(),
            max_request_bytes: limits.max_request_bytes,
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        cfg.apply_env(lookup);
        cfg
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("invalid YAML configuration")
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    /// Builds the effective configuration for a run of the binary.
    pub fn resolve(args: &Args) -> anyhow::Result<Self> {
        Self::resolve_with(args, |key| std::env::var(key).ok())
    }

    pub fn resolve_with(args: &Args, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut cfg = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        cfg.apply_env(lookup);

        if let Some(listen) = &args.listen {
            cfg.server.listen_addr = listen.clone();
        }
        if let Some(directory) = &args.directory {
            cfg.files.directory = directory.clone();
        }

        Ok(cfg)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(listen) = lookup("LISTEN") {
            self.server.listen_addr = listen;
        }
        if let Some(directory) = lookup("FILES_DIRECTORY") {
            self.files.directory = PathBuf::from(directory);
        }
    }

    pub fn limits(&self) -> Limits {
        Limits {
            read_timeout: Duration::from_secs(self.server.read_timeout_secs),
            write_timeout: Duration::from_secs(self.server.write_timeout_secs),
            max_request_bytes: self.server.max_request_bytes,
        }
    }
}
