use std::str::FromStr;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

/// Name of the optional configuration file looked up next to the working directory (`tcphttp.toml`).
pub const CONFIG_FILE: &str = "tcphttp";

/// Prefix of the environment variables overriding file values, e.g. `TCPHTTP_PORT=8080`.
pub const ENV_PREFIX: &str = "TCPHTTP";

/// Settings for a running server.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub host: String,
    /// Port the listener binds to. 0 picks a free one.
    pub port: u16,
    /// Upper bound of bytes taken from the socket per read while parsing a request.
    pub read_buffer_size: usize,
    /// Upper bound of bytes the request line and headers may take together. Larger heads get `400 Bad Request`.
    pub max_head_size: usize,
    /// Upper bound of payload bytes per chunk when streaming chunked bodies.
    pub chunk_size: usize,
    /// Optional limit on how long a client may take to send its request.
    ///
    /// Unset by default, in which case a stalled client holds its task indefinitely.
    pub read_timeout_secs: Option<u64>,
    /// Maximum level of emitted log events (`trace`, `debug`, `info`, `warn`, `error`).
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 42069,
            read_buffer_size: 1024,
            max_head_size: 8192,
            chunk_size: 32,
            read_timeout_secs: None,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Loads the configuration from the defaults, `tcphttp.toml` if present and `TCPHTTP_*` environment variables,
    /// later sources overriding earlier ones.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a source cannot be read or holds values of the wrong type.
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Reads the configuration from a TOML document, falling back to defaults for missing keys.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the document is not valid TOML or holds values of the wrong type.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Parses `log_level` into a tracing level.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the level is not one tracing knows.
    pub fn tracing_level(&self) -> Result<tracing::Level, ConfigError> {
        tracing::Level::from_str(&self.log_level)
            .map_err(|_| ConfigError::Message(format!("unknown log level: {}", self.log_level)))
    }
}
