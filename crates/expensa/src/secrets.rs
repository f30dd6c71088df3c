//! Bearer-token resolution for the analysis backend and push gateway.
//!
//! A token may be configured in one of three ways, checked in this order:
//!
//! 1. **Direct value** (`token`) - local testing only
//! 2. **File reference** (`tokenFile`) - mounted secrets, e.g. `/run/secrets/backend`
//! 3. **Env var reference** (`tokenEnvVar`) - production deployments

use std::fs;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// Where a token comes from. All fields empty means "no token".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env_var: Option<String>,
}

impl SecretSource {
    pub fn from_env_var(name: &str) -> Self {
        Self {
            token_env_var: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// Returns true if any source is configured (non-empty).
    pub fn is_configured(&self) -> bool {
        non_empty(&self.token).is_some()
            || non_empty(&self.token_file).is_some()
            || non_empty(&self.token_env_var).is_some()
    }

    /// Resolves the token. `Ok(None)` when nothing is configured.
    pub fn resolve(&self) -> Result<Option<SecretString>, SecretError> {
        if let Some(value) = non_empty(&self.token) {
            return Ok(Some(SecretString::from(value.to_string())));
        }

        if let Some(path) = non_empty(&self.token_file) {
            let expanded = expand_home(path);
            return fs::read_to_string(&expanded)
                .map(|content| Some(SecretString::from(content.trim().to_string())))
                .map_err(|e| SecretError::FileReadError {
                    path: expanded,
                    source: e,
                });
        }

        if let Some(name) = non_empty(&self.token_env_var) {
            return match std::env::var(name) {
                Ok(value) => Ok(Some(SecretString::from(value.trim().to_string()))),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Ok(None)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Expands a leading `~` to the user's home directory.
pub(crate) fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_direct_value_wins() {
        let source = SecretSource {
            token: Some("direct".to_string()),
            token_file: Some("/nonexistent".to_string()),
            token_env_var: Some("EXPENSA_TEST_UNSET_VAR".to_string()),
        };
        let secret = source.resolve().unwrap().unwrap();
        assert_eq!(secret.expose_secret(), "direct");
    }

    #[test]
    fn test_file_value_is_trimmed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "  from-file  ").unwrap();

        let source = SecretSource {
            token_file: Some(file.path().to_string_lossy().to_string()),
            ..Default::default()
        };
        let secret = source.resolve().unwrap().unwrap();
        assert_eq!(secret.expose_secret(), "from-file");
    }

    #[test]
    fn test_missing_env_var_is_error() {
        let source = SecretSource::from_env_var("EXPENSA_TEST_DEFINITELY_UNSET_42");
        assert!(matches!(
            source.resolve(),
            Err(SecretError::EnvVarNotSet { .. })
        ));
    }

    #[test]
    fn test_unconfigured_resolves_to_none() {
        let source = SecretSource {
            token: Some(String::new()),
            ..Default::default()
        };
        assert!(!source.is_configured());
        assert!(source.resolve().unwrap().is_none());
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/run/secrets/x"), "/run/secrets/x");
    }
}
