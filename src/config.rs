//! Configuration for the kvserve binary.
//!
//! Supports both command-line arguments and a TOML configuration file.
//! CLI arguments take precedence over config file values. The only
//! positional argument is the starting port: `kvserve [port]`.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(name = "kvserve")]
#[command(version = "0.1.0")]
#[command(about = "A multi-engine in-memory key/value server", long_about = None)]
pub struct CliArgs {
    /// Starting port of the listener range
    pub port: Option<u16>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind (e.g. 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// Number of consecutive ports to listen on
    #[arg(long)]
    pub port_count: Option<u16>,

    /// Per-connection read/write buffer size in bytes
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Maximum number of concurrent connections
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Serve as a plain echo server instead of the KV dispatcher
    #[arg(long)]
    pub echo: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub buffers: BufferConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_port_count")]
    pub port_count: u16,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            port_count: default_port_count(),
            max_connections: default_max_connections(),
        }
    }
}

/// Per-connection buffer configuration
#[derive(Debug, Deserialize)]
pub struct BufferConfig {
    /// Read/write buffer size in bytes. The two historical build profiles
    /// used 256 and 1024.
    #[serde(default = "default_buffer_size")]
    pub size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            size: default_buffer_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
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

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    2000
}

fn default_port_count() -> u16 {
    1
}

fn default_max_connections() -> usize {
    65536
}

fn default_buffer_size() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Smallest accepted buffer size; every fixed reply fits above this.
const MIN_BUFFER_SIZE: usize = 64;

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub port_count: u16,
    pub buffer_size: usize,
    pub max_connections: usize,
    pub echo: bool,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

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

    /// Merge CLI args with TOML config (CLI takes precedence) and validate.
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let config = Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            port: cli.port.unwrap_or(toml_config.server.port),
            port_count: cli.port_count.unwrap_or(toml_config.server.port_count),
            buffer_size: cli.buffer_size.unwrap_or(toml_config.buffers.size),
            max_connections: cli
                .max_connections
                .unwrap_or(toml_config.server.max_connections),
            echo: cli.echo,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        };

        if config.port_count == 0
            || u32::from(config.port) + u32::from(config.port_count) - 1 > 65535
        {
            return Err(ConfigError::PortRange(config.port, config.port_count));
        }
        if config.buffer_size < MIN_BUFFER_SIZE {
            return Err(ConfigError::BufferSize(config.buffer_size));
        }
        Ok(config)
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    PortRange(u16, u16),
    BufferSize(usize),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::PortRange(port, count) => {
                write!(f, "Invalid port range ({port}, {count} ports)")
            }
            ConfigError::BufferSize(size) => {
                write!(f, "Buffer size {size} below minimum {MIN_BUFFER_SIZE}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 2000);
        assert_eq!(config.server.port_count, 1);
        assert_eq!(config.buffers.size, 1024);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            host = "127.0.0.1"
            port = 3000
            port_count = 4
            max_connections = 100000

            [buffers]
            size = 256

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.port_count, 4);
        assert_eq!(config.server.max_connections, 100000);
        assert_eq!(config.buffers.size, 256);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn cli_port_takes_precedence() {
        let cli = CliArgs::try_parse_from(["kvserve", "4000"]).unwrap();
        let toml_config: TomlConfig = toml::from_str("[server]\nport = 3000\n").unwrap();
        let config = Config::merge(cli, toml_config).unwrap();
        assert_eq!(config.port, 4000);
    }

    #[test]
    fn port_defaults_to_2000() {
        let cli = CliArgs::try_parse_from(["kvserve"]).unwrap();
        let config = Config::merge(cli, TomlConfig::default()).unwrap();
        assert_eq!(config.port, 2000);
        assert_eq!(config.port_count, 1);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let cli = CliArgs::try_parse_from(["kvserve", "65535", "--port-count", "2"]).unwrap();
        assert!(matches!(
            Config::merge(cli, TomlConfig::default()),
            Err(ConfigError::PortRange(..))
        ));

        let cli = CliArgs::try_parse_from(["kvserve", "--buffer-size", "16"]).unwrap();
        assert!(matches!(
            Config::merge(cli, TomlConfig::default()),
            Err(ConfigError::BufferSize(16))
        ));
    }
}
