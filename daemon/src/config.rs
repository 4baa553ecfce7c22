//! Configuration for the pink-whisper server.
//!
//! Defaults reproduce the plain `pink-whisper -m <model> -p <port>` behavior.
//! A TOML file passed with `--config` can tune the engine, bound requests and
//! redirect logs; `-m`/`-p` still win over the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::args::Args;

/// Model file used when neither `-m` nor the config file names one.
pub const DEFAULT_MODEL_PATH: &str = "ggml-large-v3.bin";

/// Port used when neither `-p` nor the config file names one.
pub const DEFAULT_PORT: u16 = 7465;

/// Main configuration struct for the server.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub logging: LoggingConfig,
}

/// Listening socket and per-connection limits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port, bound on all interfaces.
    pub port: u16,
    /// Listen backlog passed to the OS.
    pub backlog: u32,
    /// Largest request payload accepted, in bytes. Unset means no limit.
    pub max_request_bytes: Option<u32>,
    /// Seconds allowed for each read phase of a request. Unset means wait forever.
    pub read_timeout_secs: Option<u64>,
}

/// Whisper model and decoding parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the GGML model file.
    pub path: PathBuf,
    /// Language code, or "auto" for detection.
    pub language: String,
    /// Upper bound on inference threads; the hardware may lower it further.
    pub max_threads: usize,
    /// Ask Whisper for one segment per request.
    pub single_segment: bool,
    pub use_gpu: bool,
    pub flash_attn: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: LogLevel,
    /// Also write logs to this file.
    pub file: Option<PathBuf>,
}

/// Log verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to a tracing filter directive string for the daemon crate.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "pink_whisper_daemon=error",
            LogLevel::Warn => "pink_whisper_daemon=warn",
            LogLevel::Info => "pink_whisper_daemon=info",
            LogLevel::Debug => "pink_whisper_daemon=debug",
            LogLevel::Trace => "pink_whisper_daemon=trace",
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            backlog: 5,
            max_request_bytes: None,
            read_timeout_secs: None,
        }
    }
}

impl ServerConfig {
    /// Read timeout as a `Duration`, if one is configured.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_MODEL_PATH),
            language: "auto".to_string(),
            max_threads: 4,
            single_segment: true,
            use_gpu: true,
            flash_attn: true,
        }
    }
}

impl Config {
    /// Build the effective configuration from command-line arguments.
    ///
    /// Reads the `--config` file when given, then applies `-m`/`-p`.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        Ok(config)
    }

    /// Override file values with explicit command-line flags.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(model) = &args.model {
            self.model.path = model.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
    }

    /// Load configuration from a specific path.
    /// Returns defaults if the file doesn't exist.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file as TOML")
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
