use super::listener::{Listener, ListenerSet};
use super::timing::time;
use super::types::{Operation, StatementContext};
use crate::connection::{Connection, PreparedStatement, Row, Value};
use crate::decorator::ConnectionDecorator;
use crate::error::{DecoratorError, WrapResult};

/// A decorator that brackets every execute-family operation, plain and
/// prepared, with statement notifications delivered to its listeners.
///
/// `prepare` itself is forwarded untimed; executions of the returned handle
/// are timed.
pub struct MeasuringConnection {
    inner: Box<dyn Connection>,
    listeners: ListenerSet,
    statements: u64,
}

impl MeasuringConnection {
    /// Registered name of this decorator.
    pub const NAME: &'static str = "sqlwrap::instrument::MeasuringConnection";

    /// Wrap `inner` without listeners.
    pub fn new(inner: Box<dyn Connection>) -> Self {
        Self::with_listeners(inner, Vec::new())
    }

    pub fn with_listeners(inner: Box<dyn Connection>, listeners: Vec<Box<dyn Listener>>) -> Self {
        Self {
            inner,
            listeners: ListenerSet::new(listeners),
            statements: 0,
        }
    }

    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    /// Number of operations intercepted so far.
    pub fn statement_count(&self) -> u64 {
        self.statements
    }

    pub fn into_inner(self) -> Box<dyn Connection> {
        self.inner
    }

    fn next_statement(&mut self, sql: impl Into<String>, operation: Operation) -> StatementContext {
        self.statements += 1;
        StatementContext::new(self.statements, sql, operation)
    }

    pub(crate) fn from_connection(
        inner: Box<dyn Connection>,
    ) -> Result<Box<dyn Connection>, DecoratorError> {
        Ok(Box::new(Self::new(inner)))
    }

    pub(crate) fn from_connection_and_listeners(
        inner: Box<dyn Connection>,
        listeners: Vec<Box<dyn Listener>>,
    ) -> Result<Box<dyn Connection>, DecoratorError> {
        Ok(Box::new(Self::with_listeners(inner, listeners)))
    }
}

#[async_trait::async_trait]
impl ConnectionDecorator for MeasuringConnection {
    fn delegate(&self) -> &dyn Connection {
        self.inner.as_ref()
    }

    fn delegate_mut(&mut self) -> &mut dyn Connection {
        self.inner.as_mut()
    }

    async fn execute(&mut self, sql: &str) -> WrapResult<u64> {
        let ctx = self.next_statement(sql, Operation::Execute);
        time(&self.listeners, ctx, self.inner.execute(sql)).await
    }

    async fn query(&mut self, sql: &str) -> WrapResult<Vec<Row>> {
        let ctx = self.next_statement(sql, Operation::Query);
        time(&self.listeners, ctx, self.inner.query(sql)).await
    }

    async fn execute_batch(&mut self, statements: &[String]) -> WrapResult<Vec<u64>> {
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
        let ctx = self.next_statement(statement.sql(), Operation::PreparedExecute);
        time(&self.listeners, ctx, self.inner.execute_prepared(statement, params)).await
    }

    async fn query_prepared(
        &mut self,
        statement: &PreparedStatement,
        params: &[Value],
    ) -> WrapResult<Vec<Row>> {
        let ctx = self.next_statement(statement.sql(), Operation::PreparedQuery);
        time(&self.listeners, ctx, self.inner.query_prepared(statement, params)).await
    }

    async fn execute_prepared_batch(
        &mut self,
        statement: &PreparedStatement,
        param_sets: &[Vec<Value>],
    ) -> WrapResult<Vec<u64>> {
        let ctx = self
            .next_statement(statement.sql(), Operation::PreparedBatch)
            .with_batch_size(param_sets.len());
        let op = self.inner.execute_prepared_batch(statement, param_sets);
        time(&self.listeners, ctx, op).await
    }
}
