//! Configuration
//!
//! Resolved from, highest priority first: command-line flags, a JSON
//! config file, environment variables, built-in defaults.
//!
//! | Variable              | Meaning                                  |
//! |-----------------------|------------------------------------------|
//! | `RELIGHT_BACKEND_URL` | Base URL of the backend server           |
//! | `RELIGHT_TIMEOUT_MS`  | Per-request transport timeout            |
//! | `RELIGHT_API_KEY`     | Generation credential                    |
//! | `GEMINI_API_KEY`      | Credential fallback used by the backend  |

use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RelightError, Result};

/// Default backend location
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

/// Default transport timeout (5 minutes; generation is slow)
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;

/// Runtime configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    pub backend_url: String,
    pub timeout_ms: u64,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            api_key: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("backend_url", &self.backend_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Config file contents; every field is optional and overrides the environment
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    backend_url: Option<String>,
    timeout_ms: Option<u64>,
    api_key: Option<String>,
}

impl Config {
    /// Defaults overlaid with environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let backend_url = lookup("RELIGHT_BACKEND_URL").unwrap_or(defaults.backend_url);
        let timeout_ms = lookup("RELIGHT_TIMEOUT_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.timeout_ms);
        let api_key = lookup("RELIGHT_API_KEY")
            .or_else(|| lookup("GEMINI_API_KEY"))
            .filter(|key| !key.trim().is_empty());

        Self {
            backend_url,
            timeout_ms,
            api_key,
        }
    }

    /// Environment configuration overlaid with a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_env().merge_file(path)
    }

    fn merge_file(mut self, path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RelightError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let file = File::open(path)?;
        let overrides: ConfigFile = serde_json::from_reader(BufReader::new(file))?;

        if let Some(url) = overrides.backend_url {
            self.backend_url = url;
        }
        if let Some(timeout_ms) = overrides.timeout_ms {
            self.timeout_ms = timeout_ms;
        }
        if let Some(key) = overrides.api_key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }

        self.validate()?;
        Ok(self)
    }

    /// Check the backend URL and timeout are usable
    pub fn validate(&self) -> Result<()> {
        if !(self.backend_url.starts_with("http://") || self.backend_url.starts_with("https://")) {
            return Err(RelightError::Config {
                reason: format!("backend_url must be an http(s) URL, got '{}'", self.backend_url),
            });
        }
        if self.timeout_ms == 0 {
            return Err(RelightError::Config {
                reason: "timeout_ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// The configured credential, if any
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(config.credential().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("RELIGHT_BACKEND_URL", "http://backend:9000"),
            ("RELIGHT_TIMEOUT_MS", "1500"),
            ("GEMINI_API_KEY", "gem-key"),
        ]));
        assert_eq!(config.backend_url, "http://backend:9000");
        assert_eq!(config.timeout_ms, 1500);
        assert_eq!(config.credential(), Some("gem-key"));
    }

    #[test]
    fn test_relight_key_wins_over_gemini_key() {
        let config = Config::from_lookup(lookup(&[
            ("RELIGHT_API_KEY", "relight-key"),
            ("GEMINI_API_KEY", "gem-key"),
        ]));
        assert_eq!(config.credential(), Some("relight-key"));
    }

    #[test]
    fn test_blank_key_is_absent() {
        let config = Config::from_lookup(lookup(&[("RELIGHT_API_KEY", "   ")]));
        assert!(config.credential().is_none());
    }

    #[test]
    fn test_file_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"backend_url": "https://relight.example", "timeout_ms": 42}}"#).unwrap();

        let config = Config::from_lookup(lookup(&[("RELIGHT_API_KEY", "k")]))
            .merge_file(file.path())
            .unwrap();
        assert_eq!(config.backend_url, "https://relight.example");
        assert_eq!(config.timeout_ms, 42);
        assert_eq!(config.credential(), Some("k"));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"backend_url": "ftp://nope"}}"#).unwrap();

        let err = Config::default().merge_file(file.path()).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = Config {
            api_key: Some("top-secret".to_string()),
            ..Config::default()
        };
        assert!(!format!("{:?}", config).contains("top-secret"));
    }
}
