//! Instrumentation protocol for intercepted connections.
//!
//! This module provides:
//! - The statement lifecycle contract (`on_statement_start` / `on_statement_end`)
//! - The transaction lifecycle contract (`on_transaction_start` / `on_transaction_end`)
//! - [`time`], which brackets an operation with statement notifications and
//!   guarantees the end notification on every exit path
//! - Built-in decorators and listeners that can be named in the wrapper configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlwrap::instrument::{Listener, MeasuringConnection, StatementContext, StatementListener};
//!
//! struct PrintListener;
//!
//! impl Listener for PrintListener {
//!     fn as_statement_listener(&self) -> Option<&dyn StatementListener> {
//!         Some(self)
//!     }
//! }
//!
//! impl StatementListener for PrintListener {
//!     fn on_statement_end(&self, stmt: &StatementContext) {
//!         println!("[{:?}] {} - {}", stmt.elapsed(), stmt.sql, stmt.outcome);
//!     }
//! }
//!
//! let conn = MeasuringConnection::with_listeners(raw, vec![Box::new(PrintListener)]);
//! ```

mod listener;
mod listeners;
mod measuring;
mod timing;
mod txmonitoring;
mod types;


pub use listener::{Listener, ListenerSet, StatementListener, TransactionListener};
pub use listeners::{
    LoggingStatementListener, LoggingTransactionListener, StatementStats, StatsListener,
};
pub use measuring::MeasuringConnection;
pub use timing::{StatementResult, StatementScope, time};
pub use txmonitoring::{
    NoTransactionId, PostgresMonitoringConnection, PostgresTransactionId, TransactionIdSource,
    TransactionState, TxMonitoringConnection,
};
pub use types::{Operation, StatementContext, StatementOutcome, TransactionContext};

pub(crate) use txmonitoring::{
    postgres_monitoring_from_connection, postgres_monitoring_from_connection_and_listeners,
    tx_monitoring_from_connection, tx_monitoring_from_connection_and_listeners,
};

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
