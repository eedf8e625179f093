// src/config/mod.rs
//
// Process configuration. Every flag can also come from the environment.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_DB_PATH: &str = "./data/data.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable output for local runs.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about = "Paginated query service over users, addresses and posts", long_about = None)]
pub struct Config {
    /// Port to listen on
    #[clap(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Path of the SQLite database file
    #[clap(long, env = "DB_PATH", default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,

    /// Log output format
    #[clap(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Create the data directory and missing tables before serving
    #[clap(long, env = "INIT_SCHEMA")]
    pub init_schema: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: DEFAULT_PORT,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            log_format: LogFormat::default(),
            init_schema: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let config = Config::try_parse_from([
            "skquery",
            "--port",
            "8080",
            "--db-path",
            "/tmp/x.db",
            "--log-format",
            "json",
            "--init-schema",
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.init_schema);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(Config::try_parse_from(["skquery", "--port", "70000"]).is_err());
    }

    #[test]
    fn test_default_matches_documented_values() {
        let config = Config::default();
        assert_eq!(config.port, 4000);
        assert_eq!(config.db_path, PathBuf::from("./data/data.db"));
        assert!(!config.init_schema);
    }
}
