//! Server configuration.
//!
//! Loaded from a YAML file; every field has a default so an empty file (or
//! no file at all) yields a working configuration. The `LISTEN` environment
//! variable (`host:port`) overrides the listen address.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::http::parser::{DEFAULT_MAX_REQUEST_BYTES, DuplicateHeaders, ParseOptions};

/// Environment variable naming the config file when no CLI argument is given.
pub const CONFIG_ENV: &str = "PALISADE_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub static_files: StaticFilesConfig,
    pub http: HttpConfig,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Worker-pool size.
    pub max_connections: usize,
    /// Pending-connection queue size; `2 * max_connections` when unset.
    pub queue_capacity: Option<usize>,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub shutdown_grace_ms: u64,
    pub max_request_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticFilesConfig {
    pub root_directory: PathBuf,
    pub index_file: String,
    pub follow_symlinks: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub duplicate_headers: DuplicateHeaders,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_connections: 8,
            queue_capacity: None,
            read_timeout_ms: 5_000,
            write_timeout_ms: 5_000,
            shutdown_grace_ms: 10_000,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root_directory: PathBuf::from("./public"),
            index_file: "index.html".to_string(),
            follow_symlinks: false,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or(self.max_connections.saturating_mul(2))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl LogLevel {
    pub fn as_filter(&self) -> tracing_subscriber::filter::LevelFilter {
        use tracing_subscriber::filter::LevelFilter;
        match self {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

impl Config {
    /// Loads the configuration for the binary.
    ///
    /// The file comes from `path` if given, else from `PALISADE_CONFIG`,
    /// else defaults are used. `LISTEN` is applied last.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);

        let mut cfg = match path.map(Path::to_path_buf).or(from_env) {
            Some(file) => Self::from_file(&file)?,
            None => Self::default(),
        };

        if let Ok(listen) = std::env::var("LISTEN") {
            cfg.apply_listen(&listen)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Overrides host and port from a `host:port` string.
    pub fn apply_listen(&mut self, listen: &str) -> anyhow::Result<()> {
        let (host, port) = listen
            .rsplit_once(':')
            .with_context(|| format!("LISTEN must be host:port, got {listen:?}"))?;
        self.server.port = port
            .parse()
            .with_context(|| format!("invalid port in LISTEN: {port:?}"))?;
        self.server.host = host.to_string();
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let server = &self.server;
        if server.max_connections == 0 {
            anyhow::bail!("server.max_connections must be at least 1");
        }
        if server.queue_capacity() == 0 {
            anyhow::bail!("server.queue_capacity must be at least 1");
        }
        if server.read_timeout_ms == 0 || server.write_timeout_ms == 0 {
            anyhow::bail!("server timeouts must be non-zero");
        }
        if server.max_request_bytes == 0 {
            anyhow::bail!("server.max_request_bytes must be non-zero");
        }

        let index = &self.static_files.index_file;
        if index.is_empty() || index.contains(['/', '\\']) || index == "." || index == ".." {
            anyhow::bail!("static_files.index_file must be a plain file name, got {index:?}");
        }
        Ok(())
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            duplicate_headers: self.http.duplicate_headers,
            max_request_bytes: self.server.max_request_bytes,
        }
    }
}
