//! Credential references.
//!
//! Configuration never carries the API token itself, only where to find it:
//! `env:NAME` reads an environment variable, `file:/path` reads a file.
//! A bare value is treated as an environment variable name.

use std::fmt;
use std::path::PathBuf;

use fleetsync_pipeline::ConfigError;

const KEY: &str = "api_credentials_ref";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsRef {
    Env(String),
    File(PathBuf),
}

impl CredentialsRef {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        let parsed = match raw.split_once(':') {
            Some(("env", name)) => Self::Env(name.trim().to_string()),
            Some(("file", path)) => Self::File(PathBuf::from(path.trim())),
            Some((scheme, _)) => {
                return Err(ConfigError::invalid(
                    KEY,
                    format!("unsupported credentials scheme {scheme:?}"),
                ));
            }
            None => Self::Env(raw.to_string()),
        };

        let empty = match &parsed {
            Self::Env(name) => name.is_empty(),
            Self::File(path) => path.as_os_str().is_empty(),
        };
        if empty {
            return Err(ConfigError::Missing(KEY.to_string()));
        }
        Ok(parsed)
    }

    /// Load the token. Surrounding whitespace is stripped; an empty token is
    /// treated as missing.
    pub fn resolve(&self) -> Result<String, ConfigError> {
        let token = match self {
            Self::Env(name) => std::env::var(name)
                .map_err(|_| ConfigError::Missing(format!("environment variable {name}")))?,
            Self::File(path) => std::fs::read_to_string(path).map_err(|e| {
                ConfigError::Unavailable(format!("cannot read {}: {e}", path.display()))
            })?,
        };

        let token = token.trim();
        if token.is_empty() {
            return Err(ConfigError::Missing(format!("credentials in {self}")));
        }
        Ok(token.to_string())
    }
}

impl fmt::Display for CredentialsRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env(name) => write!(f, "env:{name}"),
            Self::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}
