//! The connection surface shared by raw driver connections and decorators.

use crate::error::{WrapError, WrapResult};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

/// A single result row in text form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Option<String>>,
}

impl Row {
    /// Create a row from column names and their (nullable) text values.
    pub fn new(columns: Vec<String>, values: Vec<Option<String>>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Column names in select-list order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `idx`. `None` for SQL NULL or an out-of-range index.
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).and_then(|v| v.as_deref())
    }

    /// Value of the first column called `name`.
    pub fn get_by_name(&self, name: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.get(idx)
    }
}

/// Connection properties handed to the underlying driver (`user`, `password`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectProperties {
    entries: BTreeMap<String, String>,
}

impl ConnectProperties {
    /// An empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Value of `key`, if set.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// All entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether no property is set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A bind parameter or a decoded column value of a prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Text form as stored in a [`Row`]; `None` for SQL NULL.
    pub fn into_text(self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Handle to a statement prepared on one connection.
///
/// Only valid on the connection that handed it out. Decorators pass the handle
/// through to their delegate unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    id: u64,
    sql: String,
    param_count: usize,
}

impl PreparedStatement {
    /// Called by drivers; `id` must be unique per connection.
    pub fn new(id: u64, sql: impl Into<String>, param_count: usize) -> Self {
        Self {
            id,
            sql: sql.into(),
            param_count,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of `$n` placeholders the statement expects.
    pub fn param_count(&self) -> usize {
        self.param_count
    }
}

/// An open database connection.
///
/// Implemented by raw driver connections and, through
/// [`ConnectionDecorator`](crate::decorator::ConnectionDecorator), by every
/// decorator. Transaction demarcation follows the auto-commit model: with
/// auto-commit off, the first statement implicitly opens a transaction that
/// lasts until `commit` or `rollback`.
#[async_trait::async_trait]
pub trait Connection: Any + Send {
    /// Execute a statement and return the number of affected rows.
    async fn execute(&mut self, sql: &str) -> WrapResult<u64>;

    /// Execute a query and return all rows.
    async fn query(&mut self, sql: &str) -> WrapResult<Vec<Row>>;

    /// Execute several statements in order, returning one update count each.
    ///
    /// Stops at the first failure.
    async fn execute_batch(&mut self, statements: &[String]) -> WrapResult<Vec<u64>> {
        let mut counts = Vec::with_capacity(statements.len());
        for sql in statements {
            counts.push(self.execute(sql).await?);
        }
        Ok(counts)
    }

    /// Prepare `sql` for repeated execution with bind parameters.
    async fn prepare(&mut self, _sql: &str) -> WrapResult<PreparedStatement> {
        Err(WrapError::unsupported("prepared statements"))
    }

    /// Execute a prepared statement and return the number of affected rows.
    async fn execute_prepared(
        &mut self,
        statement: &PreparedStatement,
        _params: &[Value],
    ) -> WrapResult<u64> {
        Err(WrapError::UnknownStatement(statement.id()))
    }

    /// Run a prepared query and return all rows.
    async fn query_prepared(
        &mut self,
        statement: &PreparedStatement,
        _params: &[Value],
    ) -> WrapResult<Vec<Row>> {
        Err(WrapError::UnknownStatement(statement.id()))
    }

    /// Execute a prepared statement once per parameter set, in order.
    ///
    /// Stops at the first failure.
    async fn execute_prepared_batch(
        &mut self,
        statement: &PreparedStatement,
        param_sets: &[Vec<Value>],
    ) -> WrapResult<Vec<u64>> {
        let mut counts = Vec::with_capacity(param_sets.len());
        for params in param_sets {
            counts.push(self.execute_prepared(statement, params).await?);
        }
        Ok(counts)
    }

    /// Explicitly open a transaction, regardless of the auto-commit mode.
    async fn begin(&mut self) -> WrapResult<()>;

    /// Commit the current transaction.
    async fn commit(&mut self) -> WrapResult<()>;

    /// Roll back the current transaction.
    async fn rollback(&mut self) -> WrapResult<()>;

    /// Switch auto-commit mode. Enabling it while a transaction is open commits it.
    async fn set_auto_commit(&mut self, auto_commit: bool) -> WrapResult<()>;

    /// Current auto-commit mode. New connections start with auto-commit on.
    fn auto_commit(&self) -> bool;

    /// Whether a transaction is currently open on this connection.
    fn in_transaction(&self) -> bool;

    /// Close the connection. An open transaction is rolled back.
    async fn close(&mut self) -> WrapResult<()>;

    /// Whether the connection was closed or lost.
    fn is_closed(&self) -> bool;
}

impl dyn Connection {
    /// Returns `true` if the connection is of type `T`.
    pub fn is<T: Connection>(&self) -> bool {
        (self as &dyn Any).is::<T>()
    }

    /// Downcast to a concrete connection or decorator type.
    pub fn downcast_ref<T: Connection>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }

    /// Mutable variant of [`downcast_ref`](Self::downcast_ref).
    pub fn downcast_mut<T: Connection>(&mut self) -> Option<&mut T> {
        (self as &mut dyn Any).downcast_mut::<T>()
    }
}
