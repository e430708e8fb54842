//! Persistent configuration and credentials.

use dialoguer::Password;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::git::RemoteIdentity;

const APP_NAME: &str = std::env!("CARGO_PKG_NAME");
const CONFIG_NAME: &str = "config";
const TOKEN_ENV_VAR: &str = "GITLAB_TOKEN";
const DEFAULT_HOST_PATTERN: &str = "gitlab";

/// Errors reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration")]
    Load(#[source] confy::ConfyError),

    #[error("failed to save configuration")]
    Store(#[source] confy::ConfyError),

    #[error("failed to read the GitLab private token")]
    Prompt(#[source] dialoguer::Error),
}

/// Configuration stored in TOML format.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Token sent in the `PRIVATE-TOKEN` header. `GITLAB_TOKEN` takes
    /// precedence.
    pub private_token: String,

    /// Base URL of the API. Derived from the remote's host if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Remotes whose host starts with this are considered GitLab remotes.
    pub host_pattern: String,

    /// Command used to edit titles and descriptions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,
}

impl ConfigError {
    /// Whether reading or writing the configuration file failed.
    pub fn is_file_error(&self) -> bool {
        matches!(self, ConfigError::Load(_) | ConfigError::Store(_))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            private_token: String::new(),
            api_url: None,
            host_pattern: DEFAULT_HOST_PATTERN.to_string(),
            editor: None,
        }
    }
}

impl Config {
    /// Load configuration from disk, creating the file if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Fails with [`ConfigError::Load`] if the file can't be read, created or
    /// parsed.
    pub fn load_from_disk() -> Result<Config, ConfigError> {
        confy::load(APP_NAME, CONFIG_NAME).map_err(ConfigError::Load)
    }

    fn save_to_disk(&self) -> Result<(), ConfigError> {
        confy::store(APP_NAME, CONFIG_NAME, self).map_err(ConfigError::Store)
    }

    /// The API base URL for the project's host.
    pub fn api_url_for(&self, remote: &RemoteIdentity) -> String {
        match &self.api_url {
            Some(api_url) => api_url.clone(),
            None => format!("https://{}/api/v4", remote.host),
        }
    }

    /// Returns the private token, asking for it and saving it if neither the
    /// environment nor the configuration provides one.
    ///
    /// # Errors
    ///
    /// Fails with [`ConfigError::Prompt`] if the token can't be read from the
    /// terminal, or [`ConfigError::Store`] if it can't be saved.
    pub fn ensure_private_token(&mut self) -> Result<String, ConfigError> {
        if let Some(token) = self.known_private_token(std::env::var(TOKEN_ENV_VAR).ok()) {
            return Ok(token);
        }

        let token = Password::new()
            .with_prompt("Please input GitLab private token")
            .interact()
            .map_err(ConfigError::Prompt)?;

        self.private_token = token.clone();
        self.save_to_disk()?;

        debug!("saved private token to configuration");

        Ok(token)
    }

    fn known_private_token(&self, env_token: Option<String>) -> Option<String> {
        env_token
            .filter(|token| !token.trim().is_empty())
            .or_else(|| Some(self.private_token.clone()).filter(|token| !token.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote() -> RemoteIdentity {
        RemoteIdentity {
            raw_url: "ssh://git@gitlab.example.com/acme/widgets.git".to_string(),
            host: "gitlab.example.com".to_string(),
            owner: "acme".to_string(),
            project: "widgets".to_string(),
        }
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{ "private-token": "secret" }"#).unwrap();

        assert_eq!(
            config,
            Config {
                private_token: "secret".to_string(),
                ..Default::default()
            }
        );
        assert_eq!(config.host_pattern, "gitlab");
    }

    #[test]
    fn test_api_url_for() {
        let mut config = Config::default();

        assert_eq!(
            config.api_url_for(&remote()),
            "https://gitlab.example.com/api/v4"
        );

        config.api_url = Some("http://localhost:8080/api/v4".to_string());

        assert_eq!(config.api_url_for(&remote()), "http://localhost:8080/api/v4");
    }

    #[test]
    fn test_prompt_failure_is_not_a_file_error() {
        let error = ConfigError::Prompt(dialoguer::Error::IO(std::io::Error::other("no tty")));

        assert!(!error.is_file_error());
    }

    #[test]
    fn test_known_private_token_precedence() {
        let config = Config {
            private_token: "from-config".to_string(),
            ..Default::default()
        };

        assert_eq!(
            config.known_private_token(Some("from-env".to_string())),
            Some("from-env".to_string())
        );
        assert_eq!(
            config.known_private_token(Some(" ".to_string())),
            Some("from-config".to_string())
        );
        assert_eq!(
            config.known_private_token(None),
            Some("from-config".to_string())
        );
        assert_eq!(Config::default().known_private_token(None), None);
    }
}
