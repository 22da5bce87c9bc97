//! Router configuration.

use crate::error::WrapResult;
use crate::properties::WrapperProperties;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

/// Well-known name of the wrapper properties file.
pub const DEFAULT_PROPERTIES_NAME: &str = "sqlwrap.properties";

/// URL prefix claimed by the wrapping driver.
pub const DEFAULT_INTERCEPT_PREFIX: &str = "wrapped:";

/// Prefix the interception prefix is rewritten to.
pub const DEFAULT_TARGET_PREFIX: &str = "";

/// Environment variable overriding the properties file location.
pub const PROPERTIES_PATH_ENV: &str = "SQLWRAP_PROPERTIES";

/// Configuration of a [`WrappingDriver`](crate::WrappingDriver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperConfig {
    /// Prefix that marks a URL for interception.
    pub intercept_prefix: String,
    /// Replacement for the interception prefix; the connection-type tag follows it.
    pub target_prefix: String,
    /// Location of the properties file.
    pub properties_path: PathBuf,
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            intercept_prefix: DEFAULT_INTERCEPT_PREFIX.to_string(),
            target_prefix: DEFAULT_TARGET_PREFIX.to_string(),
            properties_path: PathBuf::from(DEFAULT_PROPERTIES_NAME),
        }
    }
}

impl WrapperConfig {
    /// Create a configuration with defaults (`wrapped:` → ``, `sqlwrap.properties`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with the properties path taken from `SQLWRAP_PROPERTIES` when set.
    pub fn from_env() -> Self {
        let config = Self::new();
        match std::env::var_os(PROPERTIES_PATH_ENV) {
            Some(path) if !path.is_empty() => config.with_properties_path(path),
            _ => config,
        }
    }

    /// Set the interception prefix.
    pub fn with_intercept_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.intercept_prefix = prefix.into();
        self
    }

    /// Set the prefix the interception prefix is rewritten to.
    ///
    /// For the classic layout use `jdbc:wrapped:` / `jdbc:`.
    pub fn with_target_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.target_prefix = prefix.into();
        self
    }

    /// Set the properties file location.
    pub fn with_properties_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.properties_path = path.into();
        self
    }

    /// Load the properties file.
    ///
    /// A missing file is an empty configuration. Other failures are logged and
    /// also yield an empty configuration.
    pub fn load_properties(&self) -> WrapperProperties {
        match open(&self.properties_path) {
            Ok(Some(file)) => WrapperProperties::load(BufReader::new(file)),
            Ok(None) => {
                tracing::debug!(
                    path = %self.properties_path.display(),
                    "no wrapper properties found, nothing will be decorated"
                );
                WrapperProperties::default()
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.properties_path.display(),
                    error = %e,
                    "error opening wrapper properties, defaults assumed"
                );
                WrapperProperties::default()
            }
        }
    }
}

fn open(path: &Path) -> WrapResult<Option<File>> {
    match File::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = WrapperConfig::new();
        assert_eq!(config.intercept_prefix, "wrapped:");
        assert_eq!(config.target_prefix, "");
        assert_eq!(config.properties_path, PathBuf::from("sqlwrap.properties"));
    }

    #[test]
    fn builder_overrides() {
        let config = WrapperConfig::new()
            .with_intercept_prefix("jdbc:wrapped:")
            .with_target_prefix("jdbc:")
            .with_properties_path("/etc/app/wrap.properties");
        assert_eq!(config.intercept_prefix, "jdbc:wrapped:");
        assert_eq!(config.target_prefix, "jdbc:");
        assert_eq!(
            config.properties_path,
            PathBuf::from("/etc/app/wrap.properties")
        );
    }

    #[test]
    fn missing_properties_file_is_empty() {
        let config = WrapperConfig::new()
            .with_properties_path("/nonexistent/sqlwrap-test/sqlwrap.properties");
        assert!(config.load_properties().is_empty());
    }

    #[test]
    fn loads_properties_file() {
        let path = std::env::temp_dir().join(format!(
            "sqlwrap-config-test-{}.properties",
            std::process::id()
        ));
        let mut file = File::create(&path).unwrap();
        writeln!(file, "# test").unwrap();
        writeln!(file, "pg.connection.wrapper = sqlwrap::WrappedConnection").unwrap();
        drop(file);

        let props = WrapperConfig::new().with_properties_path(&path).load_properties();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            props.get("pg.connection.wrapper"),
            Some("sqlwrap::WrappedConnection")
        );
    }
}
