//! Configuration resolution for Pinpoint.
//!
//! Backend endpoint and credential come from the environment (the way the
//! deployment pipeline injects them); the tool-server map and optional api
//! overrides come from a TOML settings file. Precedence:
//! env > explicit `--config` file > `./pinpoint.toml` > `~/.pinpoint/config.toml`
//! > defaults.

use pinpoint_mcp::McpServerConfig;
use pinpoint_types::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The default model (deployment) name.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Name of the project-local settings file.
pub const LOCAL_SETTINGS_FILE: &str = "pinpoint.toml";

/// Resolved configuration for a Pinpoint session.
#[derive(Debug, Clone)]
pub struct PinpointConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub servers: HashMap<String, McpServerConfig>,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub servers: HashMap<String, McpServerConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

/// Values read from the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl EnvOverrides {
    /// Collect the recognized environment variables.
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var("AZURE_OPENAI_ENDPOINT").ok(),
            api_key: std::env::var("AZURE_OPENAI_API_KEY").ok(),
            model: std::env::var("PINPOINT_MODEL").ok(),
        }
    }
}

impl PinpointConfig {
    /// Load configuration from the environment and the first settings file
    /// found (explicit path, project-local, then home directory).
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match explicit_path {
            Some(path) => read_settings_file(path)?,
            None => first_settings_file()
                .map(|path| read_settings_file(&path))
                .transpose()?
                .unwrap_or_default(),
        };
        resolve(settings, EnvOverrides::from_env())
    }
}

/// Apply precedence: env > settings file > defaults.
pub fn resolve(settings: SettingsFile, env: EnvOverrides) -> Result<PinpointConfig, ConfigError> {
    let endpoint = env
        .endpoint
        .or(settings.api.endpoint)
        .ok_or_else(|| ConfigError::MissingKey {
            key: "endpoint (set AZURE_OPENAI_ENDPOINT or [api].endpoint)".to_string(),
        })?;

    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        return Err(ConfigError::InvalidValue {
            key: "endpoint".to_string(),
            message: format!("expected an http(s) URL, got '{endpoint}'"),
        });
    }

    let api_key = env
        .api_key
        .or(settings.api.api_key)
        .ok_or_else(|| ConfigError::MissingKey {
            key: "api_key (set AZURE_OPENAI_API_KEY or [api].api_key)".to_string(),
        })?;

    let model = env
        .model
        .or(settings.api.model)
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    Ok(PinpointConfig {
        endpoint,
        api_key,
        model,
        servers: settings.servers,
    })
}

fn first_settings_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_SETTINGS_FILE);
    if local.is_file() {
        return Some(local);
    }
    let home = dirs_next::home_dir()?.join(".pinpoint").join("config.toml");
    home.is_file().then_some(home)
}

fn read_settings_file(path: &Path) -> Result<SettingsFile, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let settings = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    tracing::debug!(path = %path.display(), "loaded settings file");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_settings() -> SettingsFile {
        toml::from_str(
            r#"
[api]
endpoint = "https://example.openai.azure.com/openai/deployments/gpt-4o"
api_key = "file-key"
model = "gpt-4o-mini"

[servers.geoip]
command = "pinpoint-geoip"
"#,
        )
        .unwrap()
    }

    #[test]
    fn file_values_used_when_env_absent() {
        let config = resolve(full_settings(), EnvOverrides::default()).unwrap();
        assert_eq!(config.api_key, "file-key");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers["geoip"].command, "pinpoint-geoip");
    }

    #[test]
    fn env_takes_precedence_over_file() {
        let env = EnvOverrides {
            endpoint: Some("https://env.example.com".to_string()),
            api_key: Some("env-key".to_string()),
            model: Some("gpt-4o".to_string()),
        };
        let config = resolve(full_settings(), env).unwrap();
        assert_eq!(config.endpoint, "https://env.example.com");
        assert_eq!(config.api_key, "env-key");
        assert_eq!(config.model, "gpt-4o");
    }

    #[test]
    fn missing_credential_is_an_error() {
        let result = resolve(SettingsFile::default(), EnvOverrides::default());
        assert!(matches!(result, Err(ConfigError::MissingKey { .. })));
    }

    #[test]
    fn non_url_endpoint_is_rejected() {
        let env = EnvOverrides {
            endpoint: Some("example.openai.azure.com".to_string()),
            api_key: Some("env-key".to_string()),
            model: None,
        };
        match resolve(SettingsFile::default(), env) {
            Err(ConfigError::InvalidValue { key, message }) => {
                assert_eq!(key, "endpoint");
                assert!(message.contains("example.openai.azure.com"));
            }
            other => panic!("Expected InvalidValue, got: {other:?}"),
        }
    }

    #[test]
    fn model_defaults_when_unset() {
        let env = EnvOverrides {
            endpoint: Some("https://env.example.com".to_string()),
            api_key: Some("env-key".to_string()),
            model: None,
        };
        let config = resolve(SettingsFile::default(), env).unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn settings_file_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pinpoint.toml");
        std::fs::write(
            &path,
            r#"
[servers.geoip]
command = "pinpoint-geoip"
init_timeout_ms = 2500
"#,
        )
        .unwrap();

        let settings = read_settings_file(&path).unwrap();
        assert_eq!(settings.servers["geoip"].init_timeout_ms, 2500);
        assert!(settings.api.endpoint.is_none());
    }

    #[test]
    fn invalid_settings_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pinpoint.toml");
        std::fs::write(&path, "not = [valid").unwrap();

        match read_settings_file(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert!(p.contains("pinpoint.toml")),
            other => panic!("Expected Parse error, got: {other:?}"),
        }
    }
}
