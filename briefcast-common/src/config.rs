//! Configuration loading for briefcast
//!
//! Resolution priority: environment variables, then the optional TOML file,
//! then compiled defaults. The xAI credential is deliberately optional at
//! startup: endpoints that need it fail fast per request instead of taking
//! the whole process down.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default HTTP bind address
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Browser origins allowed to call the API (local development frontends)
const DEFAULT_ALLOWED_ORIGINS: &[&str] =
    &["http://localhost:5173", "http://127.0.0.1:5173"];

/// Optional TOML configuration file contents
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub xai_api_key: Option<String>,
    pub bind_addr: Option<String>,
    pub audio_dir: Option<String>,
    pub video_dir: Option<String>,
    pub allowed_origins: Option<Vec<String>>,
}

/// Resolved application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// xAI API credential; absent means briefing endpoints fail per request
    pub xai_api_key: Option<String>,
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// Directory for generated WAV files (served under /audio)
    pub audio_dir: PathBuf,
    /// Directory for generated video files (served under /videos)
    pub video_dir: PathBuf,
    /// CORS allow-list
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            xai_api_key: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            audio_dir: PathBuf::from("audio"),
            video_dir: PathBuf::from("videos"),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the environment plus an optional TOML file
    ///
    /// The TOML path comes from `BRIEFCAST_CONFIG`, falling back to
    /// `./briefcast.toml` when present. Environment variables win over TOML.
    pub fn load() -> Self {
        let toml_config = locate_config_file()
            .and_then(|path| read_toml_config(&path).ok())
            .unwrap_or_default();

        Self::from_sources(&toml_config, |name| std::env::var(name).ok())
    }

    /// Merge TOML values with an environment lookup (injectable for tests)
    pub fn from_sources<F>(toml_config: &TomlConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let xai_api_key = env("XAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                toml_config
                    .xai_api_key
                    .clone()
                    .filter(|k| !k.trim().is_empty())
            });

        if xai_api_key.is_none() {
            warn!("XAI_API_KEY not set; briefing endpoints will report a configuration error");
        }

        Self {
            xai_api_key,
            bind_addr: env("BRIEFCAST_BIND_ADDR")
                .or_else(|| toml_config.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            audio_dir: env("BRIEFCAST_AUDIO_DIR")
                .or_else(|| toml_config.audio_dir.clone())
                .map(PathBuf::from)
                .unwrap_or(defaults.audio_dir),
            video_dir: env("BRIEFCAST_VIDEO_DIR")
                .or_else(|| toml_config.video_dir.clone())
                .map(PathBuf::from)
                .unwrap_or(defaults.video_dir),
            allowed_origins: toml_config
                .allowed_origins
                .clone()
                .unwrap_or(defaults.allowed_origins),
        }
    }

    /// Return the configured API key or the per-request configuration error
    pub fn require_api_key(&self) -> Result<&str> {
        self.xai_api_key
            .as_deref()
            .ok_or_else(|| Error::Config("XAI_API_KEY not configured".to_string()))
    }
}

/// Find the TOML config file, if any
fn locate_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("BRIEFCAST_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        warn!(path = %path.display(), "BRIEFCAST_CONFIG points at a missing file");
        return None;
    }

    let local = PathBuf::from("briefcast.toml");
    local.exists().then_some(local)
}

/// Parse a TOML config file
fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    info!(path = %path.display(), "Loaded configuration file");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = AppConfig::from_sources(&TomlConfig::default(), |_| None);
        assert!(config.xai_api_key.is_none());
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.audio_dir, PathBuf::from("audio"));
        assert_eq!(config.video_dir, PathBuf::from("videos"));
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:5173", "http://127.0.0.1:5173"]
        );
    }

    #[test]
    fn test_env_wins_over_toml() {
        let toml_config = TomlConfig {
            xai_api_key: Some("toml-key".to_string()),
            bind_addr: Some("127.0.0.1:9000".to_string()),
            ..Default::default()
        };
        let config = AppConfig::from_sources(
            &toml_config,
            env_from(&[("XAI_API_KEY", "env-key")]),
        );
        assert_eq!(config.xai_api_key.as_deref(), Some("env-key"));
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
    }

    #[test]
    fn test_blank_key_treated_as_missing() {
        let config =
            AppConfig::from_sources(&TomlConfig::default(), env_from(&[("XAI_API_KEY", "  ")]));
        assert!(config.xai_api_key.is_none());
    }

    #[test]
    fn test_require_api_key_error_message() {
        let config = AppConfig::default();
        let err = config.require_api_key().unwrap_err();
        assert_eq!(err.to_string(), "XAI_API_KEY not configured");
    }

    #[test]
    fn test_toml_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("briefcast.toml");
        std::fs::write(
            &path,
            "xai_api_key = \"abc\"\naudio_dir = \"/tmp/audio\"\n",
        )
        .unwrap();
        let config = read_toml_config(&path).unwrap();
        assert_eq!(config.xai_api_key.as_deref(), Some("abc"));
        assert_eq!(config.audio_dir.as_deref(), Some("/tmp/audio"));
    }
}
