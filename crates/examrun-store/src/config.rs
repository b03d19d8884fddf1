//! Backend configuration loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Connection settings for the record backend.
///
/// Note: Custom Debug impl masks the auth token to prevent accidental
/// exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the record service.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Optional bearer token sent as the `Authorization` header.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("server_url", &self.server_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_server_url() -> String {
    "http://127.0.0.1:8090".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            auth_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examrun.toml` in the current directory
/// 2. `~/.config/examrun/config.toml`
///
/// Environment variable overrides: `EXAMRUN_SERVER`, `EXAMRUN_TOKEN`.
pub fn load_config() -> Result<BackendConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<BackendConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("examrun.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<BackendConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => BackendConfig::default(),
    };

    if let Ok(server) = std::env::var("EXAMRUN_SERVER") {
        config.server_url = server;
    }
    if let Ok(token) = std::env::var("EXAMRUN_TOKEN") {
        config.auth_token = Some(token);
    }

    config.server_url = resolve_env_vars(&config.server_url);
    config.auth_token = config.auth_token.as_ref().map(|t| resolve_env_vars(t));

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examrun"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_EXAMRUN_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_EXAMRUN_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_EXAMRUN_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        std::env::remove_var("_EXAMRUN_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = BackendConfig::default();
        assert_eq!(config.server_url, "http://127.0.0.1:8090");
        assert_eq!(config.timeout_secs, 30);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn parse_config_file() {
        let toml_str = r#"
server_url = "https://records.example.com"
auth_token = "secret"
timeout_secs = 10
"#;
        let config: BackendConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server_url, "https://records.example.com");
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn debug_masks_the_token() {
        let config = BackendConfig {
            auth_token: Some("secret".into()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn explicit_missing_path_errors() {
        let err = load_config_from(Some(Path::new("/nonexistent/examrun.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }
}
