//! Configuration loading and the webhook registry.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 600;

/// One registered webhook: a shared secret and the deploy action it unlocks.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub secret: String,
    pub repo_path: String,
    pub restart_command: String,
    pub branch: String,
}

impl WebhookConfig {
    /// Full git ref for the configured branch, as it appears in push payloads.
    pub fn branch_ref(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }
}

/// How the deploy executor is dispatched from the webhook handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    /// Block the request until the deploy finishes; outcome becomes the response.
    Sync,
    /// Spawn a detached task and acknowledge immediately; outcome is only logged.
    Async,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub deploy_mode: DeployMode,
    pub command_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            deploy_mode: DeployMode::Async,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Immutable mapping from shared secret to webhook config, in file order.
/// Built once at startup; concurrent reads need no locking.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<WebhookConfig>,
}

impl Registry {
    pub fn iter(&self) -> impl Iterator<Item = &WebhookConfig> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DeployerConfig {
    pub settings: Settings,
    pub registry: Registry,
}

/// Raw shape of the TOML file. Entry fields are optional here so that a
/// missing one can be reported by name instead of as a generic parse error.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    webhook: Vec<RawWebhookEntry>,
}

#[derive(Debug, Deserialize)]
struct RawWebhookEntry {
    secret: Option<String>,
    repo_path: Option<String>,
    restart_command: Option<String>,
    branch: Option<String>,
}

impl RawWebhookEntry {
    fn validate(self, index: usize) -> Result<WebhookConfig, ConfigError> {
        let missing = |field| ConfigError::MissingField { index, field };
        Ok(WebhookConfig {
            secret: self.secret.ok_or_else(|| missing("secret"))?,
            repo_path: self.repo_path.ok_or_else(|| missing("repo_path"))?,
            restart_command: self
                .restart_command
                .ok_or_else(|| missing("restart_command"))?,
            branch: self.branch.ok_or_else(|| missing("branch"))?,
        })
    }
}

impl DeployerConfig {
    /// Load and validate the configuration file. Any failure here is fatal.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::MissingFile(path.display().to_string())
            } else {
                ConfigError::InvalidFormat(format!(
                    "failed to read '{}': {}",
                    path.display(),
                    e
                ))
            }
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(contents).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;

        let mut entries = Vec::with_capacity(raw.webhook.len());
        let mut seen_secrets = HashSet::new();
        for (index, entry) in raw.webhook.into_iter().enumerate() {
            let config = entry.validate(index)?;
            // Secrets are the registry key; a shadowed duplicate would never match.
            if !seen_secrets.insert(config.secret.clone()) {
                return Err(ConfigError::InvalidFormat(format!(
                    "duplicate secret in webhook entry {}",
                    index
                )));
            }
            entries.push(config);
        }

        if entries.is_empty() {
            return Err(ConfigError::Empty);
        }

        Ok(Self {
            settings: raw.settings,
            registry: Registry { entries },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_CONFIG: &str = r#"
        [[webhook]]
        secret = "s3cr3t"
        repo_path = "/srv/app"
        restart_command = "systemctl restart app"
        branch = "main"

        [[webhook]]
        secret = "other"
        repo_path = "/srv/other"
        restart_command = "systemctl restart other"
        branch = "develop"
    "#;

    #[test]
    fn loads_entries_in_file_order() {
        let config = DeployerConfig::from_toml_str(GOOD_CONFIG).unwrap();
        assert_eq!(config.registry.len(), 2);
        let secrets: Vec<_> = config.registry.iter().map(|c| c.secret.as_str()).collect();
        assert_eq!(secrets, vec!["s3cr3t", "other"]);
        assert_eq!(config.settings.deploy_mode, DeployMode::Async);
        assert_eq!(config.settings.command_timeout_secs, 600);
    }

    #[test]
    fn parses_settings_table() {
        let toml = r#"
            [settings]
            deploy_mode = "sync"
            command_timeout_secs = 30

            [[webhook]]
            secret = "s"
            repo_path = "/srv/app"
            restart_command = "true"
            branch = "main"
        "#;
        let config = DeployerConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.settings.deploy_mode, DeployMode::Sync);
        assert_eq!(config.settings.command_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn missing_branch_reports_field_name() {
        let toml = r#"
            [[webhook]]
            secret = "s"
            repo_path = "/srv/app"
            restart_command = "true"
        "#;
        let err = DeployerConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField {
                index: 0,
                field: "branch"
            }
        ));
    }

    #[test]
    fn empty_registry_is_rejected() {
        let err = DeployerConfig::from_toml_str("").unwrap_err();
        assert!(matches!(err, ConfigError::Empty));
    }

    #[test]
    fn invalid_toml_is_rejected() {
        let err = DeployerConfig::from_toml_str("[[webhook").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFormat(_)));
    }

    #[test]
    fn duplicate_secrets_are_rejected() {
        let toml = r#"
            [[webhook]]
            secret = "same"
            repo_path = "/srv/a"
            restart_command = "true"
            branch = "main"

            [[webhook]]
            secret = "same"
            repo_path = "/srv/b"
            restart_command = "true"
            branch = "main"
        "#;
        let err = DeployerConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFormat(_)));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = DeployerConfig::load("/nonexistent/push_deployer_config.toml").unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile(_)));
    }

    #[test]
    fn branch_ref_uses_full_ref_format() {
        let config = DeployerConfig::from_toml_str(GOOD_CONFIG).unwrap();
        let first = config.registry.iter().next().unwrap();
        assert_eq!(first.branch_ref(), "refs/heads/main");
    }
}
