//! Resolution of source API credentials.
//!
//! A credential can be configured three ways, checked in this order:
//!
//! 1. **Direct value** in the config file (`"appKey": "..."`), handy for local runs
//! 2. **File reference** (`"appKeyFile": "/run/secrets/adzuna_key"`), for mounted secrets
//! 3. **Env var reference** (`"appKeyEnvVar": "ADZUNA_APP_KEY"`), also fed from `.env`

use secrecy::SecretString;
use std::fs;

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

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

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from the first non-empty source: direct value, file, env var.
///
/// File contents and env var values are trimmed.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        return match fs::read_to_string(&expanded) {
            Ok(content) => Ok(SecretString::from(content.trim().to_string())),
            Err(e) => Err(SecretError::FileReadError {
                path: expanded,
                source: e,
            }),
        };
    }

    if let Some(var_name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(var_name) {
            Ok(value) => Ok(SecretString::from(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: var_name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: var_name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Like [`resolve_secret`], but a credential that is simply not configured
/// yields `None`.
///
/// "Not configured" means no source at all, or only an env var that is unset
/// or blank. An unreadable file is still an error: the user asked for it.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    use secrecy::ExposeSecret;

    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) if secret.expose_secret().is_empty() => Ok(None),
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) | Err(SecretError::EnvVarNotSet { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Expands a leading `~` or `~/` to the home directory. `~user` is not supported.
pub(crate) fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            if path == "~" {
                return home.into_owned();
            }
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // Env-mutating tests run serially.
    #[test]
    #[serial]
    fn test_direct_value_takes_priority() {
        std::env::set_var("JH_TEST_SECRET_1", "env_value");
        let result = resolve_secret(Some("direct_value"), None, Some("JH_TEST_SECRET_1")).unwrap();
        assert_eq!(result.expose_secret(), "direct_value");
        std::env::remove_var("JH_TEST_SECRET_1");
    }

    #[test]
    #[serial]
    fn test_file_takes_priority_over_env() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "file_value").unwrap();

        std::env::set_var("JH_TEST_SECRET_2", "env_value");
        let result = resolve_secret(
            None,
            Some(temp_file.path().to_str().unwrap()),
            Some("JH_TEST_SECRET_2"),
        )
        .unwrap();
        assert_eq!(result.expose_secret(), "file_value");
        std::env::remove_var("JH_TEST_SECRET_2");
    }

    #[test]
    #[serial]
    fn test_env_var_fallback_is_trimmed() {
        std::env::set_var("JH_TEST_SECRET_3", " env_value\n");
        let result = resolve_secret(None, None, Some("JH_TEST_SECRET_3")).unwrap();
        assert_eq!(result.expose_secret(), "env_value");
        std::env::remove_var("JH_TEST_SECRET_3");
    }

    #[test]
    fn test_no_source_error() {
        let result = resolve_secret(None, None, None);
        assert!(matches!(result, Err(SecretError::NoSourceProvided)));
    }

    #[test]
    #[serial]
    fn test_empty_strings_ignored() {
        std::env::set_var("JH_TEST_SECRET_4", "env_value");
        let result = resolve_secret(Some(""), Some(""), Some("JH_TEST_SECRET_4")).unwrap();
        assert_eq!(result.expose_secret(), "env_value");
        std::env::remove_var("JH_TEST_SECRET_4");
    }

    #[test]
    fn test_file_not_found_error() {
        let result = resolve_secret(None, Some("/nonexistent/path/to/secret"), None);
        assert!(matches!(result, Err(SecretError::FileReadError { .. })));
    }

    #[test]
    fn test_env_var_not_set_error() {
        let result = resolve_secret(None, None, Some("JH_DEFINITELY_NOT_SET_12345"));
        assert!(matches!(result, Err(SecretError::EnvVarNotSet { .. })));
    }

    #[test]
    #[serial]
    fn test_resolve_secret_optional() {
        assert!(resolve_secret_optional(None, None, None).unwrap().is_none());
        assert!(resolve_secret_optional(None, None, Some("JH_DEFINITELY_NOT_SET_12345"))
            .unwrap()
            .is_none());

        std::env::set_var("JH_TEST_SECRET_OPT", "value");
        let result = resolve_secret_optional(None, None, Some("JH_TEST_SECRET_OPT")).unwrap();
        assert_eq!(result.unwrap().expose_secret(), "value");

        std::env::set_var("JH_TEST_SECRET_OPT", "   ");
        assert!(resolve_secret_optional(None, None, Some("JH_TEST_SECRET_OPT"))
            .unwrap()
            .is_none());
        std::env::remove_var("JH_TEST_SECRET_OPT");

        // A missing file is still reported.
        assert!(resolve_secret_optional(None, Some("/nonexistent/secret"), None).is_err());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/absolute/path"), "/absolute/path");
        assert_eq!(expand_home("relative/path"), "relative/path");

        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy().into_owned();
            assert_eq!(expand_home("~/test"), format!("{}/test", home));
            assert_eq!(expand_home("~"), home);
        }
    }
}
