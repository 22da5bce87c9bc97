use super::listener::{Listener, ListenerSet, TransactionListener};
use super::timing::time;
use super::types::{Operation, StatementContext, TransactionContext};
use crate::connection::{Connection, PreparedStatement, Row, Value};
use crate::decorator::ConnectionDecorator;
use crate::error::{DecoratorError, WrapResult};

/// Source of database transaction identifiers.
///
/// Called on the delegate connection right after a transaction starts. Errors
/// are never propagated; the monitoring decorator reports id `0` instead.
#[async_trait::async_trait]
pub trait TransactionIdSource: Send + Sync + 'static {
    async fn transaction_id(&self, connection: &mut dyn Connection) -> WrapResult<i64>;
}

/// Reports every transaction with id `0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransactionId;

#[async_trait::async_trait]
impl TransactionIdSource for NoTransactionId {
    async fn transaction_id(&self, _connection: &mut dyn Connection) -> WrapResult<i64> {
        Ok(0)
    }
}

/// Reads the id via `select txid_current()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresTransactionId;

#[async_trait::async_trait]
impl TransactionIdSource for PostgresTransactionId {
    async fn transaction_id(&self, connection: &mut dyn Connection) -> WrapResult<i64> {
        let rows = connection.query("select txid_current()").await?;
        let id = rows
            .first()
            .and_then(|row| row.get(0))
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(0);
        Ok(id)
    }
}

/// Transaction state of one monitored connection.
#[derive(Debug, Clone)]
pub enum TransactionState {
    Idle,
    Active(TransactionContext),
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}

/// A decorator that reports transaction boundaries and statement timings.
///
/// A transaction becomes active on the first statement while auto-commit is
/// off, or on an explicit [`begin`](Connection::begin). It ends on commit
/// (success is the commit outcome), rollback (failure), switching auto-commit
/// back on (implicit commit), close (implicit rollback) or when the decorator
/// is dropped while a transaction is still open (implicit rollback).
pub struct TxMonitoringConnection<S: TransactionIdSource = NoTransactionId> {
    inner: Box<dyn Connection>,
    listeners: ListenerSet,
    source: S,
    state: TransactionState,
    transactions: u64,
    statements: u64,
}

/// Transaction monitoring for PostgreSQL connections.
pub type PostgresMonitoringConnection = TxMonitoringConnection<PostgresTransactionId>;

impl<S: TransactionIdSource> TxMonitoringConnection<S> {
    /// Monitor `inner`, reading transaction ids from `source`.
    pub fn with_source(
        inner: Box<dyn Connection>,
        listeners: Vec<Box<dyn Listener>>,
        source: S,
    ) -> Self {
        Self {
            inner,
            listeners: ListenerSet::new(listeners),
            source,
            state: TransactionState::Idle,
            transactions: 0,
            statements: 0,
        }
    }

    /// The listeners this decorator reports to.
    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    /// Whether a transaction is currently being tracked.
    pub fn state(&self) -> &TransactionState {
        &self.state
    }

    /// Id of the current transaction from the configured source.
    ///
    /// Best effort: any failure is logged and reported as `0`.
    pub async fn transaction_id(&mut self) -> i64 {
        match self.source.transaction_id(self.inner.as_mut()).await {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(error = %e, "transaction id unavailable");
                0
            }
        }
    }

    async fn start_transaction(&mut self) {
        self.transactions += 1;
        let transaction_id = self.transaction_id().await;
        let tx = TransactionContext::new(self.transactions, transaction_id);
        self.listeners.on_transaction_start(&tx);
        self.state = TransactionState::Active(tx);
    }

    fn end_transaction(&mut self, success: bool) {
        let previous = std::mem::replace(&mut self.state, TransactionState::Idle);
        if let TransactionState::Active(tx) = previous {
            self.listeners.on_transaction_end(&tx, success);
        }
    }

    /// Open a transaction on the first statement while auto-commit is off.
    async fn before_statement(&mut self) {
        if !self.state.is_active() && !self.inner.auto_commit() && !self.inner.is_closed() {
            self.start_transaction().await;
        }
    }

    fn next_statement(&mut self, sql: impl Into<String>, operation: Operation) -> StatementContext {
        self.statements += 1;
        StatementContext::new(self.statements, sql, operation)
    }
}

impl TxMonitoringConnection<NoTransactionId> {
    /// Registered name of the id-less variant.
    pub const NAME: &'static str = "sqlwrap::instrument::TxMonitoringConnection";

    pub fn new(inner: Box<dyn Connection>, listeners: Vec<Box<dyn Listener>>) -> Self {
        Self::with_source(inner, listeners, NoTransactionId)
    }
}

impl TxMonitoringConnection<PostgresTransactionId> {
    /// Registered name of the PostgreSQL variant.
    pub const NAME: &'static str = "sqlwrap::instrument::PostgresMonitoringConnection";

    pub fn postgres(inner: Box<dyn Connection>, listeners: Vec<Box<dyn Listener>>) -> Self {
        Self::with_source(inner, listeners, PostgresTransactionId)
    }
}

pub(crate) fn tx_monitoring_from_connection(
    inner: Box<dyn Connection>,
) -> Result<Box<dyn Connection>, DecoratorError> {
    Ok(Box::new(TxMonitoringConnection::<NoTransactionId>::new(inner, Vec::new())))
}

pub(crate) fn tx_monitoring_from_connection_and_listeners(
    inner: Box<dyn Connection>,
    listeners: Vec<Box<dyn Listener>>,
) -> Result<Box<dyn Connection>, DecoratorError> {
    Ok(Box::new(TxMonitoringConnection::<NoTransactionId>::new(inner, listeners)))
}

pub(crate) fn postgres_monitoring_from_connection(
    inner: Box<dyn Connection>,
) -> Result<Box<dyn Connection>, DecoratorError> {
    Ok(Box::new(PostgresMonitoringConnection::postgres(inner, Vec::new())))
}

pub(crate) fn postgres_monitoring_from_connection_and_listeners(
    inner: Box<dyn Connection>,
    listeners: Vec<Box<dyn Listener>>,
) -> Result<Box<dyn Connection>, DecoratorError> {
    Ok(Box::new(PostgresMonitoringConnection::postgres(inner, listeners)))
}

#[async_trait::async_trait]
impl<S: TransactionIdSource> ConnectionDecorator for TxMonitoringConnection<S> {
    fn delegate(&self) -> &dyn Connection {
        self.inner.as_ref()
    }

    fn delegate_mut(&mut self) -> &mut dyn Connection {
        self.inner.as_mut()
    }

    async fn execute(&mut self, sql: &str) -> WrapResult<u64> {
        self.before_statement().await;
        let ctx = self.next_statement(sql, Operation::Execute);
        time(&self.listeners, ctx, self.inner.execute(sql)).await
    }

    async fn query(&mut self, sql: &str) -> WrapResult<Vec<Row>> {
        self.before_statement().await;
        let ctx = self.next_statement(sql, Operation::Query);
        time(&self.listeners, ctx, self.inner.query(sql)).await
    }

    async fn execute_batch(&mut self, statements: &[String]) -> WrapResult<Vec<u64>> {
        self.before_statement().await;
        let ctx = self
            .next_statement(statements.join("; "), Operation::Batch)
            .with_batch_size(statements.len());
        time(&self.listeners, ctx, self.inner.execute_batch(statements)).await
    }

    async fn execute_prepared(
        &mut self,
        statement: &PreparedStatement,
        params: &[Value],
    ) -> WrapResult<u64> {
        self.before_statement().await;
        let ctx = self.next_statement(statement.sql(), Operation::PreparedExecute);
        time(&self.listeners, ctx, self.inner.execute_prepared(statement, params)).await
    }

    async fn query_prepared(
        &mut self,
        statement: &PreparedStatement,
        params: &[Value],
    ) -> WrapResult<Vec<Row>> {
        self.before_statement().await;
        let ctx = self.next_statement(statement.sql(), Operation::PreparedQuery);
        time(&self.listeners, ctx, self.inner.query_prepared(statement, params)).await
    }

    async fn execute_prepared_batch(
        &mut self,
        statement: &PreparedStatement,
        param_sets: &[Vec<Value>],
    ) -> WrapResult<Vec<u64>> {
        self.before_statement().await;
        let ctx = self
            .next_statement(statement.sql(), Operation::PreparedBatch)
            .with_batch_size(param_sets.len());
        let op = self.inner.execute_prepared_batch(statement, param_sets);
        time(&self.listeners, ctx, op).await
    }

    async fn begin(&mut self) -> WrapResult<()> {
        self.inner.begin().await?;
        if !self.state.is_active() {
            self.start_transaction().await;
        }
        Ok(())
    }

    async fn commit(&mut self) -> WrapResult<()> {
        let result = self.inner.commit().await;
        self.end_transaction(result.is_ok());
        result
    }

    async fn rollback(&mut self) -> WrapResult<()> {
        let result = self.inner.rollback().await;
        self.end_transaction(false);
        result
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> WrapResult<()> {
        let result = self.inner.set_auto_commit(auto_commit).await;
        if auto_commit {
            self.end_transaction(result.is_ok());
        }
        result
    }

    async fn close(&mut self) -> WrapResult<()> {
        let result = self.inner.close().await;
        self.end_transaction(false);
        result
    }
}

impl<S: TransactionIdSource> Drop for TxMonitoringConnection<S> {
    fn drop(&mut self) {
        if let TransactionState::Active(tx) = &self.state {
            tracing::debug!(
                sequence = tx.sequence,
                "monitored connection dropped inside a transaction"
            );
        }
        // The delegate is dropped next, which abandons the open transaction.
        self.end_transaction(false);
    }
}
