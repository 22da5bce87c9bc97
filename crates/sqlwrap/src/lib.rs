//! # sqlwrap
//!
//! Transparent, configuration-driven instrumentation for database connections.
//!
//! ## Features
//!
//! - **URL-routed interception**: a [`WrappingDriver`] claims URLs with a reserved
//!   prefix (`wrapped:` by default), rewrites them, and connects through the
//!   underlying driver
//! - **Per connection-type decoration**: the tag in the URL (`wrapped:pg://...` → `pg`)
//!   selects a decorator and its listeners from `sqlwrap.properties`
//! - **Never worse than unwrapped**: configuration and instantiation problems are
//!   logged and fall back to the raw connection
//! - **Instrumentation protocol**: statement and transaction lifecycle listeners
//!   with guaranteed end notification
//!
//! ## Configuration
//!
//! ```text
//! pg.connection.wrapper = sqlwrap::instrument::PostgresMonitoringConnection
//! pg.connection.listeners = sqlwrap::instrument::StatsListener, sqlwrap::instrument::LoggingTransactionListener
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use sqlwrap::{ConnectProperties, DriverManager, PostgresDriver, WrappingDriver};
//! use std::sync::Arc;
//!
//! let drivers = Arc::new(DriverManager::new());
//! drivers.register(Arc::new(PostgresDriver::new()));
//!
//! let driver = sqlwrap::install(WrappingDriver::from_env(drivers)?)?;
//! let mut conn = driver
//!     .connect("wrapped:pg://postgres@localhost/app", &ConnectProperties::new())
//!     .await?
//!     .expect("intercepted URL");
//!
//! conn.set_auto_commit(false).await?;
//! conn.execute("UPDATE accounts SET balance = balance - 10 WHERE id = 1").await?;
//! conn.commit().await?;
//! ```

pub mod catalog;
pub mod config;
pub mod connection;
pub mod decorator;
pub mod driver;
pub mod error;
pub mod factory;
pub mod instrument;
pub mod properties;
pub mod registry;
pub mod router;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use catalog::{
    DecorateResult, DecoratorCatalog, DecoratorConstructor, DecoratorFactory,
    DecoratorRegistration, ListenerFactory, ListenerRegistration,
};
pub use config::WrapperConfig;
pub use connection::{Connection, ConnectProperties, PreparedStatement, Row, Value};
pub use decorator::{ConnectionDecorator, WrappedConnection};
pub use driver::{Driver, DriverId, DriverManager};
pub use error::{DecoratorError, WrapError, WrapResult};
pub use factory::wrap_connection;
pub use properties::{NestedProperties, WrapperProperties};
pub use registry::{ConnectionMetadata, DecoratorRegistry, RegistryWarning};
pub use router::{WrappingDriver, WrappingDriverBuilder, install, installed, is_installed, uninstall};

#[cfg(feature = "postgres")]
pub use postgres::{PgConnection, PostgresDriver};

// Re-export inventory for link-time decorator and listener registration
pub use inventory;
