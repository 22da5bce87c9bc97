//! In-memory driver and connection for integration tests.

#![allow(dead_code)]

use sqlwrap::instrument::{
    Listener, StatementContext, StatementListener, TransactionContext, TransactionListener,
};
use sqlwrap::{
    Connection, ConnectProperties, DecoratorCatalog, Driver, DriverManager, PreparedStatement,
    Row, Value, WrapError, WrapResult, WrapperProperties, WrappingDriver,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Calls observed by the in-memory connection, shared with the test.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

/// A connection that answers deterministically and logs every call.
pub struct MemoryConnection {
    pub url: String,
    pub user: Option<String>,
    log: CallLog,
    fail_on: Option<String>,
    auto_commit: bool,
    in_transaction: bool,
    closed: bool,
    prepared: Vec<String>,
}

impl MemoryConnection {
    pub fn new(url: &str, properties: &ConnectProperties, log: CallLog) -> Self {
        Self {
            url: url.to_string(),
            user: properties.get("user").map(str::to_string),
            log,
            fail_on: None,
            auto_commit: true,
            in_transaction: false,
            closed: false,
            prepared: Vec::new(),
        }
    }

    /// Make the call logged as `call` fail after taking effect.
    pub fn failing_on(mut self, call: &str) -> Self {
        self.fail_on = Some(call.to_string());
        self
    }

    fn logged(&self, call: impl Into<String>) -> WrapResult<()> {
        let call = call.into();
        let fail = self.fail_on.as_deref() == Some(call.as_str());
        self.log.push(call.clone());
        if fail {
            return Err(WrapError::database(format!("{call} failed")));
        }
        Ok(())
    }

    fn statement(&mut self, sql: &str) -> WrapResult<()> {
        self.log.push(sql);
        if self.closed {
            return Err(WrapError::Closed);
        }
        if sql.contains("missing_table") {
            return Err(WrapError::database("relation \"missing_table\" does not exist"));
        }
        if !self.auto_commit {
            self.in_transaction = true;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Connection for MemoryConnection {
    async fn execute(&mut self, sql: &str) -> WrapResult<u64> {
        self.statement(sql)?;
        Ok(sql.len() as u64)
    }

    async fn query(&mut self, sql: &str) -> WrapResult<Vec<Row>> {
        self.statement(sql)?;
        Ok(vec![Row::new(
            vec!["sql".to_string()],
            vec![Some(sql.to_string())],
        )])
    }

    async fn prepare(&mut self, sql: &str) -> WrapResult<PreparedStatement> {
        self.logged(format!("PREPARE {sql}"))?;
        self.prepared.push(sql.to_string());
        Ok(PreparedStatement::new(
            self.prepared.len() as u64,
            sql,
            sql.matches('$').count(),
        ))
    }

    async fn execute_prepared(
        &mut self,
        statement: &PreparedStatement,
        params: &[Value],
    ) -> WrapResult<u64> {
        let known = (statement.id() as usize)
            .checked_sub(1)
            .and_then(|idx| self.prepared.get(idx));
        if known.map(String::as_str) != Some(statement.sql()) {
            return Err(WrapError::UnknownStatement(statement.id()));
        }
        self.statement(statement.sql())?;
        Ok(params.len() as u64)
    }

    async fn begin(&mut self) -> WrapResult<()> {
        self.in_transaction = true;
        self.logged("BEGIN")
    }

    async fn commit(&mut self) -> WrapResult<()> {
        self.in_transaction = false;
        self.logged("COMMIT")
    }

    async fn rollback(&mut self) -> WrapResult<()> {
        self.in_transaction = false;
        self.logged("ROLLBACK")
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> WrapResult<()> {
        if auto_commit {
            self.in_transaction = false;
        }
        self.auto_commit = auto_commit;
        self.logged(format!("AUTOCOMMIT {auto_commit}"))
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    async fn close(&mut self) -> WrapResult<()> {
        self.log.push("CLOSE");
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Claims URLs with one scheme and hands out [`MemoryConnection`]s.
pub struct MemoryDriver {
    scheme: String,
    pub connects: AtomicUsize,
    pub log: CallLog,
    refuse: bool,
    fail_on: Option<String>,
}

impl MemoryDriver {
    pub fn new(scheme: &str) -> Arc<Self> {
        Arc::new(Self {
            scheme: scheme.to_string(),
            connects: AtomicUsize::new(0),
            log: CallLog::default(),
            refuse: false,
            fail_on: None,
        })
    }

    /// A driver whose connections fail the call logged as `call`.
    pub fn failing_on(scheme: &str, call: &str) -> Arc<Self> {
        Arc::new(Self {
            scheme: scheme.to_string(),
            connects: AtomicUsize::new(0),
            log: CallLog::default(),
            refuse: false,
            fail_on: Some(call.to_string()),
        })
    }

    /// A driver whose connect attempts always fail.
    pub fn refusing(scheme: &str) -> Arc<Self> {
        Arc::new(Self {
            scheme: scheme.to_string(),
            connects: AtomicUsize::new(0),
            log: CallLog::default(),
            refuse: true,
            fail_on: None,
        })
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Driver for MemoryDriver {
    fn name(&self) -> &str {
        "memory"
    }

    fn accepts_url(&self, url: &str) -> bool {
        url.starts_with(&self.scheme)
    }

    async fn connect(
        &self,
        url: &str,
        properties: &ConnectProperties,
    ) -> WrapResult<Option<Box<dyn Connection>>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(WrapError::Connection("connection refused".to_string()));
        }
        let mut conn = MemoryConnection::new(url, properties, self.log.clone());
        if let Some(call) = &self.fail_on {
            conn = conn.failing_on(call);
        }
        Ok(Some(Box::new(conn)))
    }
}

/// Lifecycle events captured by [`RecordingListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StatementStart(String),
    StatementEnd(String, bool),
    TransactionStart,
    TransactionEnd(bool),
}

/// Records every lifecycle event into a buffer shared with the test.
#[derive(Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Listener for RecordingListener {
    fn as_statement_listener(&self) -> Option<&dyn StatementListener> {
        Some(self)
    }

    fn as_transaction_listener(&self) -> Option<&dyn TransactionListener> {
        Some(self)
    }
}

impl StatementListener for RecordingListener {
    fn on_statement_start(&self, stmt: &StatementContext) {
        self.push(Event::StatementStart(stmt.sql.clone()));
    }

    fn on_statement_end(&self, stmt: &StatementContext) {
        self.push(Event::StatementEnd(stmt.sql.clone(), !stmt.outcome.is_failure()));
    }
}

impl TransactionListener for RecordingListener {
    fn on_transaction_start(&self, _tx: &TransactionContext) {
        self.push(Event::TransactionStart);
    }

    fn on_transaction_end(&self, _tx: &TransactionContext, success: bool) {
        self.push(Event::TransactionEnd(success));
    }
}

/// A catalog with the built-ins plus `test::Recording`, which always hands out
/// a listener writing into `recorder`.
pub fn catalog_with(recorder: &RecordingListener) -> DecoratorCatalog {
    let mut catalog = DecoratorCatalog::from_inventory();
    let shared = recorder.clone();
    catalog.register_listener("test::Recording", move || {
        Ok(Box::new(shared.clone()) as Box<dyn Listener>)
    });
    catalog
}

/// A wrapping driver over `driver` configured with `properties` text.
pub fn wrapping_driver(
    driver: Arc<MemoryDriver>,
    properties: &str,
    catalog: DecoratorCatalog,
) -> WrappingDriver {
    let drivers = Arc::new(DriverManager::new());
    drivers.register(driver);
    WrappingDriver::builder(drivers)
        .properties(WrapperProperties::parse(properties).unwrap())
        .catalog(catalog)
        .build()
        .unwrap()
}
