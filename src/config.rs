use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Result, SqlServerError};

/// Prefix of environment variables overriding a named connection string,
/// e.g. `ConnectionStrings__DefaultConnection`.
pub const CONNECTION_STRING_ENV_PREFIX: &str = "ConnectionStrings__";

static MARS_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)MultipleActiveResultSets\s*=\s*[^;]*")
        .unwrap_or_else(|e| panic!("invalid MARS regex: {e}"))
});

/// Application settings holding named connection strings.
///
/// Mirrors the usual `appsettings.json` layout:
/// ```json
/// { "ConnectionStrings": { "DefaultConnection": "server=tcp:localhost,1433;..." } }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppSettings {
    #[serde(rename = "ConnectionStrings", default)]
    connection_strings: HashMap<String, String>,
}

impl AppSettings {
    /// Load settings from a JSON file.
    ///
    /// # Errors
    /// Returns `SqlServerError::ConfigError` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SqlServerError::ConfigError(format!("Cannot read settings '{}': {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    /// Parse settings from JSON text.
    ///
    /// # Errors
    /// Returns `SqlServerError::ConfigError` if the text is not valid settings JSON.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| SqlServerError::ConfigError(format!("Invalid settings JSON: {e}")))
    }

    /// Add or replace a named connection string.
    #[must_use]
    pub fn with_connection_string(
        mut self,
        name: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> Self {
        self.connection_strings
            .insert(name.into(), connection_string.into());
        self
    }

    /// Resolve a named connection string; `ConnectionStrings__<name>` in the
    /// environment takes precedence over the file.
    ///
    /// # Errors
    /// Returns `SqlServerError::ConfigError` if the name is unknown or the value is empty.
    pub fn connection_string(&self, name: &str) -> Result<String> {
        self.resolve(name, |key| std::env::var(key).ok())
    }

    fn resolve(&self, name: &str, env: impl Fn(&str) -> Option<String>) -> Result<String> {
        let value = env(&format!("{CONNECTION_STRING_ENV_PREFIX}{name}"))
            .or_else(|| self.connection_strings.get(name).cloned())
            .ok_or_else(|| {
                SqlServerError::ConfigError(format!("Connection string '{name}' not found"))
            })?;

        if value.trim().is_empty() {
            return Err(SqlServerError::ConfigError(format!(
                "Connection string '{name}' is empty"
            )));
        }
        Ok(value)
    }
}

/// Parse an ADO.NET style connection string into a driver configuration.
///
/// # Errors
/// Returns `SqlServerError::ConfigError` if the driver rejects the string.
pub fn parse_connection_string(connection_string: &str) -> Result<tiberius::Config> {
    tiberius::Config::from_ado_string(connection_string)
        .map_err(|e| SqlServerError::ConfigError(format!("Invalid connection string: {e}")))
}

/// Turn on multiple active result sets, replacing any existing setting.
#[must_use]
pub fn enable_mars(connection_string: &str) -> String {
    if MARS_KEY.is_match(connection_string) {
        return MARS_KEY
            .replace(connection_string, "MultipleActiveResultSets=True")
            .into_owned();
    }

    let trimmed = connection_string.trim_end();
    if trimmed.is_empty() || trimmed.ends_with(';') {
        format!("{trimmed}MultipleActiveResultSets=True")
    } else {
        format!("{trimmed};MultipleActiveResultSets=True")
    }
}
