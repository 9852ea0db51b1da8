//! Configuration management for keygate.
//!
//! Loads configuration from ${KEYGATE_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
/// To update, edit default_config.toml directly.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for keygate configuration and session data.
    //!
    //! KEYGATE_HOME resolution order:
    //! 1. KEYGATE_HOME environment variable (if set)
    //! 2. ~/.config/keygate (default)

    use std::path::PathBuf;

    /// Returns the keygate home directory.
    ///
    /// Checks KEYGATE_HOME env var first, falls back to ~/.config/keygate
    pub fn keygate_home() -> PathBuf {
        if let Ok(home) = std::env::var("KEYGATE_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("keygate"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        keygate_home().join("config.toml")
    }

    /// Returns the path to the persisted session cache.
    pub fn session_path() -> PathBuf {
        keygate_home().join("session.json")
    }
}

/// Identity-provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// App client ID registered with the identity provider.
    pub client_id: String,
    /// Identity API endpoint (InitiateAuth / SignUp / ConfirmSignUp).
    pub endpoint: String,
    /// Hosted UI domain for the OAuth code flow (scheme optional).
    pub domain: String,
    /// Redirect URI registered for the OAuth code flow.
    pub redirect_uri: String,
}

impl ProviderSettings {
    /// Returns the client ID if set and non-empty.
    pub fn effective_client_id(&self) -> Option<&str> {
        non_empty(&self.client_id)
    }

    /// Returns the identity API endpoint if set and non-empty.
    pub fn effective_endpoint(&self) -> Option<&str> {
        non_empty(&self.endpoint)
    }

    /// Returns the hosted UI domain if set and non-empty.
    pub fn effective_domain(&self) -> Option<&str> {
        non_empty(&self.domain)
    }

    /// Returns the redirect URI if set and non-empty.
    pub fn effective_redirect_uri(&self) -> Option<&str> {
        non_empty(&self.redirect_uri)
    }
}

/// Protected backend API settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL of the protected backend API.
    pub base_url: String,
}

impl ApiSettings {
    /// Returns the base URL if set and non-empty.
    pub fn effective_base_url(&self) -> Option<&str> {
        non_empty(&self.base_url)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identity-provider settings.
    pub provider: ProviderSettings,
    /// Protected backend API settings.
    pub api: ApiSettings,
}

impl Config {
    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    /// Config loading: missing file returns defaults.
    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert!(config.provider.effective_client_id().is_none());
        assert!(config.api.effective_base_url().is_none());
    }

    /// Config loading: partial config merges with defaults.
    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(
            &config_path,
            "[provider]\nclient_id = \"abc123\"\n",
        )
        .unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.provider.effective_client_id(), Some("abc123"));
        assert!(config.provider.effective_domain().is_none());
        assert!(config.api.effective_base_url().is_none());
    }

    /// Config init: creates file with template, creates parent dirs.
    #[test]
    fn test_init_creates_config_with_template() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("subdir").join("config.toml");

        Config::init(&config_path).unwrap();

        assert!(config_path.exists());
        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("# Keygate Configuration"));
        assert!(contents.contains("client_id ="));
        assert!(contents.contains("redirect_uri ="));
    }

    /// Config init: fails if file exists (no silent overwrite).
    #[test]
    fn test_init_fails_if_exists() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(&config_path, "").unwrap();

        let result = Config::init(&config_path);
        assert!(result.is_err());
    }

    /// Effective accessors: empty/whitespace treated as unset.
    #[test]
    fn test_effective_accessors_trim_empty() {
        let config = Config {
            provider: ProviderSettings {
                client_id: "   ".to_string(),
                endpoint: " https://idp.example.com ".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(config.provider.effective_client_id(), None);
        assert_eq!(
            config.provider.effective_endpoint(),
            Some("https://idp.example.com")
        );
    }

    /// Template parses back into a default Config.
    #[test]
    fn test_template_parses() {
        let config: Config = toml::from_str(default_config_template()).unwrap();
        assert!(config.provider.effective_client_id().is_none());
    }
}
