use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = "server_fusion.conf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Real-time vehicle position fusion gateway", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "FUSION_PORT", help = "Port to listen on for sources and inspectors.")]
    pub port: Option<u16>,

    #[clap(long, env = "FUSION_BIND", help = "Address to bind the listener to.")]
    pub bind: Option<IpAddr>,

    #[clap(long, env = "FUSION_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "FUSION_LOG_DIR", help = "Directory for log files. Console only when unset.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "FUSION_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(
        long,
        env = "FUSION_DEBUG_TOKEN",
        help = "Bearer token required by /debug and /export. Both are refused when unset."
    )]
    pub debug_token: Option<String>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            bind: other.bind.or(self.bind),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            debug_token: other.debug_token.or(self.debug_token),
        }
    }

    fn defaults() -> Config {
        Config {
            port: Some(8080),
            bind: Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            log_level: Some("info".to_string()),
            ..Default::default()
        }
    }
}

/// Fully resolved gateway settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub addr: SocketAddr,
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
    pub debug_token: Option<String>,
}

pub fn load_config() -> Result<Settings, ConfigError> {
    resolve(Config::parse())
}

/// Layers the sources: defaults, then the config file, then environment and
/// command line (already merged into `cli` by clap).
///
/// The config file is optional only when its path was not given explicitly.
pub fn resolve(cli: Config) -> Result<Settings, ConfigError> {
    let mut current = Config::defaults();

    let (config_path, explicit) = match &cli.config_path {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    if explicit || config_path.exists() {
        current = current.merge(read_config_file(&config_path)?);
    }

    let merged = current.merge(cli);
    let bind = merged.bind.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    Ok(Settings {
        addr: SocketAddr::new(bind, merged.port.unwrap_or(8080)),
        log_dir: merged.log_dir,
        log_level: merged.log_level.unwrap_or_else(|| "info".to_string()),
        debug_token: merged.debug_token.filter(|token| !token.is_empty()),
    })
}

fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_without_file() {
        // The crate directory carries no server_fusion.conf.
        assert!(!Path::new(DEFAULT_CONFIG_FILE).exists());

        let settings = resolve(Config::default()).unwrap();

        assert_eq!(settings.addr.port(), 8080);
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.debug_token, None);
    }

    #[test]
    fn file_overrides_defaults_and_cli_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fusion.json");
        fs::write(
            &path,
            r#"{"port": 9100, "bind": "127.0.0.1", "logLevel": "debug", "debugToken": "from-file"}"#,
        )
        .unwrap();

        let cli = Config {
            config_path: Some(path),
            debug_token: Some("from-cli".into()),
            ..Default::default()
        };
        let settings = resolve(cli).unwrap();

        assert_eq!(settings.addr, "127.0.0.1:9100".parse().unwrap());
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.debug_token.as_deref(), Some("from-cli"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let cli = Config {
            config_path: Some(dir.path().join("absent.json")),
            ..Default::default()
        };
        assert!(matches!(resolve(cli), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fusion.json");
        fs::write(&path, "{ port: }").unwrap();

        let cli = Config {
            config_path: Some(path),
            ..Default::default()
        };
        assert!(matches!(resolve(cli), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn empty_token_counts_as_unset() {
        let cli = Config {
            debug_token: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(resolve(cli).unwrap().debug_token, None);
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Config::try_parse_from(["server_fusion", "--port", "9001", "--bind", "127.0.0.1"]).unwrap();
        assert_eq!(cli.port, Some(9001));
        assert_eq!(cli.bind, Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }
}
