//! # CastMe configuration module
//!
//! Loads the `castme.toml` configuration file, searching (in order):
//! an explicit path given on the command line, `./castme.toml`,
//! `~/.config/castme.toml`, and `/etc/castme.toml`.
//!
//! ## Usage
//!
//! ```no_run
//! use cmconfig::Config;
//!
//! let config = Config::load(None)?;
//! println!("Subsonic server: {}", config.subsonic_server);
//! # Ok::<(), cmconfig::ConfigError>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Backend selected when the config file does not name one.
pub const DEFAULT_BACKEND: &str = "chromecast";

const CONFIG_FILE_NAME: &str = "castme.toml";

/// Commented template written by `--init`.
const CONFIG_TEMPLATE: &str = r#"# CastMe configuration.
# Subsonic credentials and server base URL (no trailing /rest).
user = "admin"
password = "secret"
subsonic_server = "https://music.example.com"

# Friendly name of the Chromecast to control, as shown in Google Home.
chromecast_friendly_name = "Living Room speaker"

# Backend selected at startup: "chromecast" or "local".
default_backend = "chromecast"
"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration file found (searched --config, ./castme.toml, ~/.config/castme.toml, /etc/castme.toml)")]
    NotFound,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("refusing to overwrite existing configuration at {0}")]
    AlreadyExists(PathBuf),
}

/// Application configuration as read from `castme.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Subsonic user name.
    pub user: String,
    /// Subsonic password, used to derive the per-request auth token.
    pub password: String,
    /// Base URL of the Subsonic server, e.g. `https://music.example.com`.
    pub subsonic_server: String,
    /// Friendly name of the cast target to resolve at startup.
    pub chromecast_friendly_name: String,
    /// Backend to select at startup; defaults to `"chromecast"`.
    #[serde(default = "default_backend")]
    pub default_backend: String,
}

fn default_backend() -> String {
    DEFAULT_BACKEND.to_string()
}

impl Config {
    /// Load the configuration, from `path` when given, otherwise from the
    /// first file found on the search path.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load_file(path);
        }

        for candidate in Self::search_paths() {
            if candidate.is_file() {
                return Self::load_file(&candidate);
            }
        }

        Err(ConfigError::NotFound)
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        info!(path = %path.display(), "Loading configuration");
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(CONFIG_FILE_NAME));
        }
        paths.push(PathBuf::from("/etc").join(CONFIG_FILE_NAME));
        paths
    }

    /// Write a commented configuration template to the user config directory
    /// (or `./castme.toml` when no config directory exists) and return the
    /// path written. Refuses to overwrite an existing file.
    pub fn write_template() -> Result<PathBuf, ConfigError> {
        let path = dirs::config_dir()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

        if path.exists() {
            return Err(ConfigError::AlreadyExists(path));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, CONFIG_TEMPLATE).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "Wrote configuration template");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
            user = "alice"
            password = "pw"
            subsonic_server = "https://music.example.com"
            chromecast_friendly_name = "Kitchen"
            default_backend = "local"
            "#,
        );

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.user, "alice");
        assert_eq!(config.default_backend, "local");
    }

    #[test]
    fn default_backend_falls_back_to_chromecast() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
            user = "alice"
            password = "pw"
            subsonic_server = "https://music.example.com"
            chromecast_friendly_name = "Kitchen"
            "#,
        );

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.default_backend, DEFAULT_BACKEND);
    }

    #[test]
    fn missing_field_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "user = \"alice\"\n");

        match Config::load(Some(&path)) {
            Err(ConfigError::Parse { .. }) => {}
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");

        match Config::load(Some(&path)) {
            Err(ConfigError::Io { .. }) => {}
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn template_parses_back() {
        let config: Config = toml::from_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.default_backend, DEFAULT_BACKEND);
    }
}
