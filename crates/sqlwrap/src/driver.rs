//! Underlying drivers and the ordered set they are looked up in.

use crate::connection::{Connection, ConnectProperties};
use crate::error::{WrapError, WrapResult};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// A source of raw connections for the URLs it claims.
#[async_trait::async_trait]
pub trait Driver: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// Whether this driver handles `url`.
    fn accepts_url(&self, url: &str) -> bool;

    /// Open a connection.
    ///
    /// Returns `Ok(None)` when the driver does not handle `url`.
    async fn connect(
        &self,
        url: &str,
        properties: &ConnectProperties,
    ) -> WrapResult<Option<Box<dyn Connection>>>;
}

/// Handle returned by [`DriverManager::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DriverId(u64);

impl DriverId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Ordered set of registered drivers.
///
/// The first driver (in registration order) that accepts a URL handles it.
#[derive(Default)]
pub struct DriverManager {
    drivers: RwLock<Vec<(DriverId, Arc<dyn Driver>)>>,
    next_id: AtomicU64,
}

impl DriverManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a driver after all existing ones.
    pub fn register(&self, driver: Arc<dyn Driver>) -> DriverId {
        let id = DriverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(driver = driver.name(), id = id.0, "driver registered");
        self.drivers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, driver));
        id
    }

    /// Remove a previously registered driver.
    pub fn deregister(&self, id: DriverId) -> WrapResult<()> {
        let mut drivers = self.drivers.write().unwrap_or_else(|e| e.into_inner());
        let idx = drivers
            .iter()
            .position(|(registered, _)| *registered == id)
            .ok_or(WrapError::UnknownDriver(id.0))?;
        let (_, driver) = drivers.remove(idx);
        tracing::debug!(driver = driver.name(), id = id.0, "driver deregistered");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.drivers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first driver that accepts `url`.
    pub fn driver_for(&self, url: &str) -> Option<Arc<dyn Driver>> {
        self.drivers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|(_, driver)| driver.accepts_url(url))
            .map(|(_, driver)| driver.clone())
    }

    /// Connect through the first driver that accepts `url`.
    ///
    /// Driver failures are returned unchanged. [`WrapError::NoDriver`] if no
    /// driver claims the URL.
    pub async fn connect(
        &self,
        url: &str,
        properties: &ConnectProperties,
    ) -> WrapResult<Box<dyn Connection>> {
        let driver = self
            .driver_for(url)
            .ok_or_else(|| WrapError::NoDriver(url.to_string()))?;
        tracing::trace!(driver = driver.name(), "delegating connect");
        driver
            .connect(url, properties)
            .await?
            .ok_or_else(|| WrapError::NoDriver(url.to_string()))
    }
}

impl fmt::Debug for DriverManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let drivers = self.drivers.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("DriverManager")
            .field(
                "drivers",
                &drivers
                    .iter()
                    .map(|(id, driver)| (id.0, driver.name().to_string()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
