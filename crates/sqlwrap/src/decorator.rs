//! Pass-through decoration.
//!
//! [`ConnectionDecorator`] forwards the whole [`Connection`] surface to a
//! delegate through default methods. A concrete decorator only provides access
//! to its delegate and overrides the operations it instruments; every type
//! implementing it is a [`Connection`] through the blanket impl below.

use crate::connection::{Connection, PreparedStatement, Row, Value};
use crate::error::{DecoratorError, WrapResult};
use crate::instrument::{Listener, ListenerSet};

/// A connection that adds behavior around a delegate connection.
#[async_trait::async_trait]
pub trait ConnectionDecorator: Send + 'static {
    /// The wrapped connection.
    fn delegate(&self) -> &dyn Connection;

    /// The wrapped connection, mutably.
    fn delegate_mut(&mut self) -> &mut dyn Connection;

    async fn execute(&mut self, sql: &str) -> WrapResult<u64> {
        self.delegate_mut().execute(sql).await
    }

    async fn query(&mut self, sql: &str) -> WrapResult<Vec<Row>> {
        self.delegate_mut().query(sql).await
    }

    async fn execute_batch(&mut self, statements: &[String]) -> WrapResult<Vec<u64>> {
        self.delegate_mut().execute_batch(statements).await
    }

    async fn prepare(&mut self, sql: &str) -> WrapResult<PreparedStatement> {
        self.delegate_mut().prepare(sql).await
    }

    async fn execute_prepared(
        &mut self,
        statement: &PreparedStatement,
        params: &[Value],
    ) -> WrapResult<u64> {
        self.delegate_mut().execute_prepared(statement, params).await
    }

    async fn query_prepared(
        &mut self,
        statement: &PreparedStatement,
        params: &[Value],
    ) -> WrapResult<Vec<Row>> {
        self.delegate_mut().query_prepared(statement, params).await
    }

    async fn execute_prepared_batch(
        &mut self,
        statement: &PreparedStatement,
        param_sets: &[Vec<Value>],
    ) -> WrapResult<Vec<u64>> {
        self.delegate_mut()
            .execute_prepared_batch(statement, param_sets)
            .await
    }

    async fn begin(&mut self) -> WrapResult<()> {
        self.delegate_mut().begin().await
    }

    async fn commit(&mut self) -> WrapResult<()> {
        self.delegate_mut().commit().await
    }

    async fn rollback(&mut self) -> WrapResult<()> {
        self.delegate_mut().rollback().await
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> WrapResult<()> {
        self.delegate_mut().set_auto_commit(auto_commit).await
    }

    fn auto_commit(&self) -> bool {
        self.delegate().auto_commit()
    }

    fn in_transaction(&self) -> bool {
        self.delegate().in_transaction()
    }

    async fn close(&mut self) -> WrapResult<()> {
        self.delegate_mut().close().await
    }

    fn is_closed(&self) -> bool {
        self.delegate().is_closed()
    }
}

#[async_trait::async_trait]
impl<D: ConnectionDecorator> Connection for D {
    async fn execute(&mut self, sql: &str) -> WrapResult<u64> {
        ConnectionDecorator::execute(self, sql).await
    }

    async fn query(&mut self, sql: &str) -> WrapResult<Vec<Row>> {
        ConnectionDecorator::query(self, sql).await
    }

    async fn execute_batch(&mut self, statements: &[String]) -> WrapResult<Vec<u64>> {
        ConnectionDecorator::execute_batch(self, statements).await
    }

    async fn prepare(&mut self, sql: &str) -> WrapResult<PreparedStatement> {
        ConnectionDecorator::prepare(self, sql).await
    }

    async fn execute_prepared(
        &mut self,
        statement: &PreparedStatement,
        params: &[Value],
    ) -> WrapResult<u64> {
        ConnectionDecorator::execute_prepared(self, statement, params).await
    }

    async fn query_prepared(
        &mut self,
        statement: &PreparedStatement,
        params: &[Value],
    ) -> WrapResult<Vec<Row>> {
        ConnectionDecorator::query_prepared(self, statement, params).await
    }

    async fn execute_prepared_batch(
        &mut self,
        statement: &PreparedStatement,
        param_sets: &[Vec<Value>],
    ) -> WrapResult<Vec<u64>> {
        ConnectionDecorator::execute_prepared_batch(self, statement, param_sets).await
    }

    async fn begin(&mut self) -> WrapResult<()> {
        ConnectionDecorator::begin(self).await
    }

    async fn commit(&mut self) -> WrapResult<()> {
        ConnectionDecorator::commit(self).await
    }

    async fn rollback(&mut self) -> WrapResult<()> {
        ConnectionDecorator::rollback(self).await
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> WrapResult<()> {
        ConnectionDecorator::set_auto_commit(self, auto_commit).await
    }

    fn auto_commit(&self) -> bool {
        ConnectionDecorator::auto_commit(self)
    }

    fn in_transaction(&self) -> bool {
        ConnectionDecorator::in_transaction(self)
    }

    async fn close(&mut self) -> WrapResult<()> {
        ConnectionDecorator::close(self).await
    }

    fn is_closed(&self) -> bool {
        ConnectionDecorator::is_closed(self)
    }
}

/// A decorator that forwards everything unchanged.
///
/// Keeps the listeners it was constructed with; code holding the decorator can
/// deliver its own events through [`notify_listeners`](Self::notify_listeners).
pub struct WrappedConnection {
    inner: Box<dyn Connection>,
    listeners: ListenerSet,
}

impl WrappedConnection {
    /// Registered name of this decorator.
    pub const NAME: &'static str = "sqlwrap::WrappedConnection";

    /// Wrap `inner` without listeners.
    pub fn new(inner: Box<dyn Connection>) -> Self {
        Self::with_listeners(inner, Vec::new())
    }

    /// Wrap `inner`, keeping `listeners` in registration order.
    pub fn with_listeners(inner: Box<dyn Connection>, listeners: Vec<Box<dyn Listener>>) -> Self {
        Self {
            inner,
            listeners: ListenerSet::new(listeners),
        }
    }

    /// The listeners this decorator was constructed with.
    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    /// Invoke `event` on every listener in registration order.
    pub fn notify_listeners(&self, event: impl FnMut(&dyn Listener)) {
        self.listeners.for_each(event);
    }

    /// Unwrap, returning the delegate.
    pub fn into_inner(self) -> Box<dyn Connection> {
        self.inner
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

impl ConnectionDecorator for WrappedConnection {
    fn delegate(&self) -> &dyn Connection {
        self.inner.as_ref()
    }

    fn delegate_mut(&mut self) -> &mut dyn Connection {
        self.inner.as_mut()
    }
}
