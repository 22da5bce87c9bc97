//! The wrapping driver: URL interception, rewrite and decoration.

use crate::catalog::DecoratorCatalog;
use crate::config::WrapperConfig;
use crate::connection::{Connection, ConnectProperties};
use crate::driver::{Driver, DriverManager};
use crate::error::{WrapError, WrapResult};
use crate::factory::wrap_connection;
use crate::properties::WrapperProperties;
use crate::registry::DecoratorRegistry;
use regex::Regex;
use std::sync::{Arc, RwLock};

/// A driver that claims URLs carrying the interception prefix, connects
/// through the underlying driver the rewritten URL belongs to, and decorates
/// the connection according to its connection-type tag.
#[derive(Debug)]
pub struct WrappingDriver {
    config: WrapperConfig,
    tag_pattern: Regex,
    registry: Arc<DecoratorRegistry>,
    drivers: Arc<DriverManager>,
}

impl WrappingDriver {
    pub const MAJOR_VERSION: u32 = 1;
    pub const MINOR_VERSION: u32 = 0;

    pub fn builder(drivers: Arc<DriverManager>) -> WrappingDriverBuilder {
        WrappingDriverBuilder::new(drivers)
    }

    /// A driver with [`WrapperConfig::from_env`], its properties file and
    /// every `inventory`-registered decorator and listener.
    pub fn from_env(drivers: Arc<DriverManager>) -> WrapResult<Self> {
        Self::builder(drivers)
            .config(WrapperConfig::from_env())
            .build()
    }

    /// Whether `url` carries the interception prefix.
    pub fn accepts_url(&self, url: &str) -> bool {
        url.starts_with(&self.config.intercept_prefix)
    }

    /// Replace the interception prefix by the target prefix.
    pub fn rewrite_url(&self, url: &str) -> String {
        url.replacen(
            &self.config.intercept_prefix,
            &self.config.target_prefix,
            1,
        )
    }

    /// The connection-type tag of a rewritten URL: the text after the target
    /// prefix up to the next `:`.
    pub fn connection_tag<'u>(&self, rewritten: &'u str) -> Option<&'u str> {
        self.tag_pattern
            .captures(rewritten)
            .and_then(|caps| caps.name("tag"))
            .map(|tag| tag.as_str())
    }

    /// Connect and decorate.
    ///
    /// `Ok(None)` if the URL is not intercepted; no underlying driver is
    /// consulted in that case. Underlying failures are returned unchanged.
    /// Decoration never fails: on any problem the raw connection is returned.
    pub async fn connect(
        &self,
        url: &str,
        properties: &ConnectProperties,
    ) -> WrapResult<Option<Box<dyn Connection>>> {
        if !self.accepts_url(url) {
            return Ok(None);
        }

        let rewritten = self.rewrite_url(url);
        let tag = self.connection_tag(&rewritten);
        tracing::debug!(tag = tag.unwrap_or("-"), "intercepted connect");

        let raw = self.drivers.connect(&rewritten, properties).await?;
        Ok(Some(wrap_connection(raw, tag, &self.registry)))
    }

    pub fn registry(&self) -> &Arc<DecoratorRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &WrapperConfig {
        &self.config
    }

    pub fn drivers(&self) -> &Arc<DriverManager> {
        &self.drivers
    }

    /// `(major, minor)` version.
    pub fn version(&self) -> (u32, u32) {
        (Self::MAJOR_VERSION, Self::MINOR_VERSION)
    }

    /// Decorated connections are not certified against any compliance suite.
    pub fn jdbc_compliant(&self) -> bool {
        false
    }
}

#[async_trait::async_trait]
impl Driver for WrappingDriver {
    fn name(&self) -> &str {
        "sqlwrap"
    }

    fn accepts_url(&self, url: &str) -> bool {
        WrappingDriver::accepts_url(self, url)
    }

    async fn connect(
        &self,
        url: &str,
        properties: &ConnectProperties,
    ) -> WrapResult<Option<Box<dyn Connection>>> {
        WrappingDriver::connect(self, url, properties).await
    }
}

/// Builder for [`WrappingDriver`].
#[derive(Debug)]
pub struct WrappingDriverBuilder {
    drivers: Arc<DriverManager>,
    config: WrapperConfig,
    properties: Option<WrapperProperties>,
    catalog: Option<DecoratorCatalog>,
}

impl WrappingDriverBuilder {
    pub fn new(drivers: Arc<DriverManager>) -> Self {
        Self {
            drivers,
            config: WrapperConfig::default(),
            properties: None,
            catalog: None,
        }
    }

    pub fn config(mut self, config: WrapperConfig) -> Self {
        self.config = config;
        self
    }

    /// Use these properties instead of reading the configured file.
    pub fn properties(mut self, properties: WrapperProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Use this catalog instead of the `inventory` registrations.
    pub fn catalog(mut self, catalog: DecoratorCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn build(self) -> WrapResult<WrappingDriver> {
        let pattern = format!(
            "^{}(?P<tag>[^:]+):",
            regex::escape(&self.config.target_prefix)
        );
        let tag_pattern = Regex::new(&pattern)
            .map_err(|e| WrapError::config(format!("invalid target prefix: {e}")))?;

        let properties = self
            .properties
            .unwrap_or_else(|| self.config.load_properties());
        let catalog = self.catalog.unwrap_or_else(DecoratorCatalog::from_inventory);
        let registry = DecoratorRegistry::from_properties(&properties, &catalog);

        Ok(WrappingDriver {
            config: self.config,
            tag_pattern,
            registry: Arc::new(registry),
            drivers: self.drivers,
        })
    }
}

static INSTALLED: RwLock<Option<Arc<WrappingDriver>>> = RwLock::new(None);

/// Make `driver` the process-wide wrapping driver.
pub fn install(driver: WrappingDriver) -> WrapResult<Arc<WrappingDriver>> {
    let mut slot = INSTALLED.write().unwrap_or_else(|e| e.into_inner());
    if slot.is_some() {
        return Err(WrapError::AlreadyInstalled);
    }
    let driver = Arc::new(driver);
    *slot = Some(driver.clone());
    tracing::debug!(
        intercept_prefix = %driver.config.intercept_prefix,
        tags = driver.registry.len(),
        "wrapping driver installed"
    );
    Ok(driver)
}

/// Remove the process-wide wrapping driver.
pub fn uninstall() -> WrapResult<Arc<WrappingDriver>> {
    let driver = INSTALLED
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .take()
        .ok_or(WrapError::NotInstalled)?;
    tracing::debug!("wrapping driver uninstalled");
    Ok(driver)
}

pub fn is_installed() -> bool {
    INSTALLED
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .is_some()
}

/// The process-wide wrapping driver, if installed.
pub fn installed() -> Option<Arc<WrappingDriver>> {
    INSTALLED.read().unwrap_or_else(|e| e.into_inner()).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(config: WrapperConfig) -> WrappingDriver {
        WrappingDriver::builder(Arc::new(DriverManager::new()))
            .config(config)
            .properties(WrapperProperties::new())
            .build()
            .unwrap()
    }

    #[test]
    fn accepts_only_intercepted_urls() {
        let d = driver(WrapperConfig::new());
        assert!(d.accepts_url("wrapped:pg://host/db"));
        assert!(!d.accepts_url("pg://host/db"));
        assert!(!d.accepts_url("xwrapped:pg://host/db"));
        assert!(!d.accepts_url(""));
    }

    #[test]
    fn rewrite_replaces_first_occurrence_only() {
        let d = driver(WrapperConfig::new());
        assert_eq!(d.rewrite_url("wrapped:pg://host/db"), "pg://host/db");
        assert_eq!(
            d.rewrite_url("wrapped:pg://host/wrapped:db"),
            "pg://host/wrapped:db"
        );
    }

    #[test]
    fn tag_follows_target_prefix() {
        let d = driver(WrapperConfig::new());
        assert_eq!(d.connection_tag("pg://host/db"), Some("pg"));
        assert_eq!(d.connection_tag("postgresql://h:5432/db"), Some("postgresql"));
        assert_eq!(d.connection_tag("nocolon"), None);
        assert_eq!(d.connection_tag("://host"), None);
    }

    #[test]
    fn classic_layout_prefixes() {
        let d = driver(
            WrapperConfig::new()
                .with_intercept_prefix("jdbc:wrapped:")
                .with_target_prefix("jdbc:"),
        );
        let url = "jdbc:wrapped:postgresql://localhost/test";
        assert!(d.accepts_url(url));
        let rewritten = d.rewrite_url(url);
        assert_eq!(rewritten, "jdbc:postgresql://localhost/test");
        assert_eq!(d.connection_tag(&rewritten), Some("postgresql"));
        assert_eq!(d.connection_tag("other:postgresql://x"), None);
    }

    #[test]
    fn target_prefix_is_literal() {
        let d = driver(WrapperConfig::new().with_target_prefix("a.b:"));
        assert_eq!(d.connection_tag("a.b:pg://x"), Some("pg"));
        assert_eq!(d.connection_tag("axb:pg://x"), None);
    }

    #[test]
    fn metadata() {
        let d = driver(WrapperConfig::new());
        assert_eq!(d.version(), (1, 0));
        assert!(!d.jdbc_compliant());
        assert_eq!(Driver::name(&d), "sqlwrap");
    }

    #[tokio::test]
    async fn non_intercepted_url_returns_none() {
        let d = driver(WrapperConfig::new());
        let conn = d
            .connect("pg://host/db", &ConnectProperties::new())
            .await
            .unwrap();
        assert!(conn.is_none());
    }

    #[tokio::test]
    async fn unclaimed_rewritten_url_is_no_driver() {
        let d = driver(WrapperConfig::new());
        let err = d
            .connect("wrapped:pg://host/db", &ConnectProperties::new())
            .await
            .err()
            .unwrap();
        assert!(err.is_no_driver());
    }
}
