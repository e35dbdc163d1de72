//! Configuration module for the echo client.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Command-line arguments for the echo client
#[derive(Parser, Debug)]
#[command(name = "echo-reactor")]
#[command(version = "0.1.0")]
#[command(about = "Echo client on a single-threaded continuation reactor", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address of the echo peer (e.g., 127.0.0.1:2222)
    #[arg(short = 'c', long)]
    pub connect: Option<String>,

    /// Number of concurrent sessions
    #[arg(short = 's', long)]
    pub sessions: Option<usize>,

    /// Size in bytes of each session's echo buffer
    #[arg(short = 'b', long)]
    pub buffer_size: Option<usize>,

    /// Readiness events handled per poll
    #[arg(long)]
    pub events: Option<usize>,

    /// Disable Nagle's algorithm on client sockets
    #[arg(long)]
    pub nodelay: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub echo: EchoConfig,
    #[serde(default)]
    pub reactor: ReactorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Client-related configuration
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    /// Peer address
    #[serde(default = "default_connect")]
    pub connect: String,
    /// Number of sessions submitted to the reactor
    #[serde(default = "default_sessions")]
    pub sessions: usize,
    #[serde(default)]
    pub nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect: default_connect(),
            sessions: default_sessions(),
            nodelay: false,
        }
    }
}

/// Echo protocol configuration
#[derive(Debug, Deserialize)]
pub struct EchoConfig {
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
        }
    }
}

/// Reactor configuration
#[derive(Debug, Deserialize)]
pub struct ReactorConfig {
    /// Event batch size per poll
    #[serde(default = "default_events")]
    pub events: usize,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            events: default_events(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_connect() -> String {
    "127.0.0.1:2222".to_string()
}

fn default_sessions() -> usize {
    1
}

fn default_buffer_size() -> usize {
    1024
}

fn default_events() -> usize {
    crate::runtime::DEFAULT_EVENTS
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub connect: SocketAddr,
    pub sessions: usize,
    pub nodelay: bool,
    pub buffer_size: usize,
    pub events: usize,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    /// Merge parsed CLI args over the TOML file they name, if any.
    pub fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let connect = cli.connect.unwrap_or(toml_config.client.connect);
        let connect = connect
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(connect))?;

        let config = Config {
            connect,
            sessions: cli.sessions.unwrap_or(toml_config.client.sessions),
            nodelay: cli.nodelay || toml_config.client.nodelay,
            buffer_size: cli.buffer_size.unwrap_or(toml_config.echo.buffer_size),
            events: cli.events.unwrap_or(toml_config.reactor.events),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sessions == 0 {
            return Err(ConfigError::Invalid("sessions must be greater than 0"));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid("buffer_size must be greater than 0"));
        }
        if self.events == 0 {
            return Err(ConfigError::Invalid("events must be greater than 0"));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),

    #[error("Invalid peer address '{0}'")]
    InvalidAddress(String),

    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli(args: &[&str]) -> CliArgs {
        let mut argv = vec!["echo-reactor"];
        argv.extend_from_slice(args);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.client.connect, "127.0.0.1:2222");
        assert_eq!(config.client.sessions, 1);
        assert!(!config.client.nodelay);
        assert_eq!(config.echo.buffer_size, 1024);
        assert_eq!(config.reactor.events, 1024);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_defaults_resolve() {
        let config = Config::from_cli(cli(&[])).unwrap();
        assert_eq!(config.connect, "127.0.0.1:2222".parse::<SocketAddr>().unwrap());
        assert_eq!(config.sessions, 1);
        assert_eq!(config.buffer_size, 1024);
        assert_eq!(config.events, 1024);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [client]
            connect = "10.0.0.1:7"
            sessions = 4
            nodelay = true

            [echo]
            buffer_size = 4096

            [reactor]
            events = 256

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.client.connect, "10.0.0.1:7");
        assert_eq!(config.client.sessions, 4);
        assert!(config.client.nodelay);
        assert_eq!(config.echo.buffer_size, 4096);
        assert_eq!(config.reactor.events, 256);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [client]
            connect = "10.0.0.1:7"
            sessions = 4

            [logging]
            level = "debug"
        "#,
        )
        .unwrap();

        let args = cli(&["-c", "127.0.0.1:9000", "--log-level", "trace", "-b", "64"]);
        let config = Config::merge(args, toml_config).unwrap();
        assert_eq!(config.connect, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.sessions, 4);
        assert_eq!(config.buffer_size, 64);
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_config_file_loaded() {
        let path = std::env::temp_dir().join(format!("echo-reactor-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[client]\nsessions = 3").unwrap();
        drop(file);

        let config = Config::from_cli(cli(&["--config", path.to_str().unwrap()])).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.sessions, 3);
    }

    #[test]
    fn test_missing_config_file() {
        let err = Config::from_cli(cli(&["--config", "/nonexistent/echo.toml"])).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(..)));
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(toml::from_str::<TomlConfig>("[server]\nport = 1").is_err());
    }

    #[test]
    fn test_invalid_address() {
        let err = Config::from_cli(cli(&["-c", "localhost"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress(ref addr) if addr == "localhost"));
    }

    #[test]
    fn test_zero_values_rejected() {
        for args in [&["-s", "0"][..], &["-b", "0"][..], &["--events", "0"][..]] {
            let err = Config::from_cli(cli(args)).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{args:?}");
        }
    }
}
