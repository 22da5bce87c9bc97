//! Named factories for decorators and listeners.
//!
//! Configuration refers to decorator and listener types by name. The catalog
//! maps those names to factory functions. Built-in types register themselves
//! through `inventory`; applications add their own either with
//! [`inventory::submit!`] and a [`DecoratorRegistration`] /
//! [`ListenerRegistration`] entry, or explicitly on a catalog instance.
//!
//! ```ignore
//! sqlwrap::inventory::submit! {
//!     sqlwrap::DecoratorRegistration {
//!         name: "app::AuditConnection",
//!         from_connection: None,
//!         from_connection_and_listeners: Some(AuditConnection::create),
//!     }
//! }
//! ```

use crate::connection::Connection;
use crate::decorator::WrappedConnection;
use crate::error::{DecoratorError, WrapResult};
use crate::instrument::{
    Listener, LoggingStatementListener, LoggingTransactionListener, MeasuringConnection,
    NoTransactionId, PostgresMonitoringConnection, StatsListener, TxMonitoringConnection,
    postgres_monitoring_from_connection, postgres_monitoring_from_connection_and_listeners,
    tx_monitoring_from_connection, tx_monitoring_from_connection_and_listeners,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Result of a decorator factory.
pub type DecorateResult = Result<Box<dyn Connection>, DecoratorError>;

/// Decorator factory of shape `(Connection)`.
pub type FromConnectionFn = Arc<dyn Fn(Box<dyn Connection>) -> DecorateResult + Send + Sync>;

/// Decorator factory of shape `(Connection, listeners)`.
pub type FromConnectionAndListenersFn =
    Arc<dyn Fn(Box<dyn Connection>, Vec<Box<dyn Listener>>) -> DecorateResult + Send + Sync>;

/// Zero-argument listener factory.
pub type ListenerFactory = Arc<dyn Fn() -> WrapResult<Box<dyn Listener>> + Send + Sync>;

/// Link-time registration of a decorator type.
pub struct DecoratorRegistration {
    /// Name used in `<tag>.connection.wrapper`.
    pub name: &'static str,
    pub from_connection: Option<fn(Box<dyn Connection>) -> DecorateResult>,
    pub from_connection_and_listeners:
        Option<fn(Box<dyn Connection>, Vec<Box<dyn Listener>>) -> DecorateResult>,
}

inventory::collect!(DecoratorRegistration);

/// Link-time registration of a listener type.
pub struct ListenerRegistration {
    /// Name used in `<tag>.connection.listeners`.
    pub name: &'static str,
    pub construct: fn() -> WrapResult<Box<dyn Listener>>,
}

inventory::collect!(ListenerRegistration);

inventory::submit! {
    DecoratorRegistration {
        name: WrappedConnection::NAME,
        from_connection: Some(WrappedConnection::from_connection),
        from_connection_and_listeners: Some(WrappedConnection::from_connection_and_listeners),
    }
}

inventory::submit! {
    DecoratorRegistration {
        name: MeasuringConnection::NAME,
        from_connection: Some(MeasuringConnection::from_connection),
        from_connection_and_listeners: Some(MeasuringConnection::from_connection_and_listeners),
    }
}

inventory::submit! {
    DecoratorRegistration {
        name: TxMonitoringConnection::<NoTransactionId>::NAME,
        from_connection: Some(tx_monitoring_from_connection),
        from_connection_and_listeners: Some(tx_monitoring_from_connection_and_listeners),
    }
}

inventory::submit! {
    DecoratorRegistration {
        name: PostgresMonitoringConnection::NAME,
        from_connection: Some(postgres_monitoring_from_connection),
        from_connection_and_listeners: Some(postgres_monitoring_from_connection_and_listeners),
    }
}

inventory::submit! {
    ListenerRegistration {
        name: LoggingStatementListener::NAME,
        construct: LoggingStatementListener::construct,
    }
}

inventory::submit! {
    ListenerRegistration {
        name: StatsListener::NAME,
        construct: StatsListener::construct,
    }
}

inventory::submit! {
    ListenerRegistration {
        name: LoggingTransactionListener::NAME,
        construct: LoggingTransactionListener::construct,
    }
}

/// The construction shapes one decorator type provides.
#[derive(Clone, Default)]
pub struct DecoratorFactory {
    pub from_connection: Option<FromConnectionFn>,
    pub from_connection_and_listeners: Option<FromConnectionAndListenersFn>,
}

impl DecoratorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide the `(Connection)` shape.
    pub fn with_connection<F>(mut self, f: F) -> Self
    where
        F: Fn(Box<dyn Connection>) -> DecorateResult + Send + Sync + 'static,
    {
        self.from_connection = Some(Arc::new(f));
        self
    }

    /// Provide the `(Connection, listeners)` shape.
    pub fn with_connection_and_listeners<F>(mut self, f: F) -> Self
    where
        F: Fn(Box<dyn Connection>, Vec<Box<dyn Listener>>) -> DecorateResult
            + Send
            + Sync
            + 'static,
    {
        self.from_connection_and_listeners = Some(Arc::new(f));
        self
    }

    /// Pick the constructor to use: `(Connection, listeners)` wins over `(Connection)`.
    pub fn select(&self) -> Option<DecoratorConstructor> {
        if let Some(f) = &self.from_connection_and_listeners {
            return Some(DecoratorConstructor::ConnectionAndListeners(f.clone()));
        }
        self.from_connection
            .as_ref()
            .map(|f| DecoratorConstructor::Connection(f.clone()))
    }
}

impl fmt::Debug for DecoratorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorFactory")
            .field("from_connection", &self.from_connection.is_some())
            .field(
                "from_connection_and_listeners",
                &self.from_connection_and_listeners.is_some(),
            )
            .finish()
    }
}

impl From<&DecoratorRegistration> for DecoratorFactory {
    fn from(reg: &DecoratorRegistration) -> Self {
        let mut factory = DecoratorFactory::new();
        if let Some(f) = reg.from_connection {
            factory = factory.with_connection(f);
        }
        if let Some(f) = reg.from_connection_and_listeners {
            factory = factory.with_connection_and_listeners(f);
        }
        factory
    }
}

/// The selected constructor of a decorator type.
#[derive(Clone)]
pub enum DecoratorConstructor {
    Connection(FromConnectionFn),
    ConnectionAndListeners(FromConnectionAndListenersFn),
}

impl DecoratorConstructor {
    pub fn accepts_listeners(&self) -> bool {
        matches!(self, Self::ConnectionAndListeners(_))
    }

    /// Invoke the constructor. `listeners` is ignored by the `(Connection)` shape.
    pub fn construct(
        &self,
        connection: Box<dyn Connection>,
        listeners: Vec<Box<dyn Listener>>,
    ) -> DecorateResult {
        match self {
            Self::Connection(f) => f(connection),
            Self::ConnectionAndListeners(f) => f(connection, listeners),
        }
    }
}

impl fmt::Debug for DecoratorConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(_) => f.write_str("DecoratorConstructor::Connection"),
            Self::ConnectionAndListeners(_) => {
                f.write_str("DecoratorConstructor::ConnectionAndListeners")
            }
        }
    }
}

/// Name → factory lookup for decorators and listeners.
#[derive(Clone, Default)]
pub struct DecoratorCatalog {
    decorators: HashMap<String, DecoratorFactory>,
    listeners: HashMap<String, ListenerFactory>,
}

impl DecoratorCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog with every type registered via `inventory` linked into the binary.
    pub fn from_inventory() -> Self {
        let mut catalog = Self::new();
        for reg in inventory::iter::<DecoratorRegistration> {
            catalog.register_decorator(reg.name, DecoratorFactory::from(reg));
        }
        for reg in inventory::iter::<ListenerRegistration> {
            catalog.register_listener(reg.name, reg.construct);
        }
        catalog
    }

    /// Register (or replace) a decorator type.
    pub fn register_decorator(&mut self, name: impl Into<String>, factory: DecoratorFactory) {
        self.decorators.insert(name.into(), factory);
    }

    /// Register (or replace) a listener type.
    pub fn register_listener<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> WrapResult<Box<dyn Listener>> + Send + Sync + 'static,
    {
        self.listeners.insert(name.into(), Arc::new(factory));
    }

    pub fn decorator(&self, name: &str) -> Option<&DecoratorFactory> {
        self.decorators.get(name)
    }

    pub fn listener(&self, name: &str) -> Option<&ListenerFactory> {
        self.listeners.get(name)
    }

    pub fn decorator_names(&self) -> impl Iterator<Item = &str> {
        self.decorators.keys().map(String::as_str)
    }

    pub fn listener_names(&self) -> impl Iterator<Item = &str> {
        self.listeners.keys().map(String::as_str)
    }
}

impl fmt::Debug for DecoratorCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorCatalog")
            .field("decorators", &self.decorators.keys().collect::<Vec<_>>())
            .field("listeners", &self.listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}
