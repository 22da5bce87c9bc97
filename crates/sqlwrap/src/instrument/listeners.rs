use super::listener::{Listener, StatementListener, TransactionListener};
use super::truncate_sql_bytes;
use super::types::{Operation, StatementContext, StatementOutcome, TransactionContext};
use crate::error::WrapResult;
use std::sync::Mutex;
use std::time::Duration;
use tracing::Level;

/// `tracing` call sites carry a fixed level, so branch to the one matching `$level`.
macro_rules! event_at {
    ($target:literal, $level:expr, $($rest:tt)+) => {{
        let level: Level = $level;
        if level == Level::ERROR {
            tracing::event!(target: $target, Level::ERROR, $($rest)+)
        } else if level == Level::WARN {
            tracing::event!(target: $target, Level::WARN, $($rest)+)
        } else if level == Level::INFO {
            tracing::event!(target: $target, Level::INFO, $($rest)+)
        } else if level == Level::DEBUG {
            tracing::event!(target: $target, Level::DEBUG, $($rest)+)
        } else {
            tracing::event!(target: $target, Level::TRACE, $($rest)+)
        }
    }};
}

/// Emits one `tracing` event per finished statement.
///
/// Successful statements are logged at `level` once they reach `min_duration`.
/// Failed and cancelled statements are always logged, at `failure_level`.
#[derive(Debug, Clone)]
pub struct LoggingStatementListener {
    pub level: Level,
    pub failure_level: Level,
    /// Skip successful statements faster than this.
    pub min_duration: Option<Duration>,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for LoggingStatementListener {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            failure_level: Level::WARN,
            min_duration: None,
            max_sql_length: Some(200),
        }
    }
}

impl LoggingStatementListener {
    /// Registered name of this listener.
    pub const NAME: &'static str = "sqlwrap::instrument::LoggingStatementListener";

    pub fn new() -> Self {
        Self::default()
    }

    /// Level for successful statements.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Level for failed and cancelled statements.
    pub fn failure_level(mut self, level: Level) -> Self {
        self.failure_level = level;
        self
    }

    pub fn min_duration(mut self, duration: Duration) -> Self {
        self.min_duration = Some(duration);
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    /// Level to log `stmt` at, or `None` to skip it.
    pub(crate) fn level_for(&self, stmt: &StatementContext, elapsed: Duration) -> Option<Level> {
        if stmt.outcome.is_failure() {
            Some(self.failure_level)
        } else if self.min_duration.is_some_and(|min| elapsed < min) {
            None
        } else {
            Some(self.level)
        }
    }

    pub(crate) fn construct() -> WrapResult<Box<dyn Listener>> {
        Ok(Box::new(Self::new()))
    }
}

impl Listener for LoggingStatementListener {
    fn as_statement_listener(&self) -> Option<&dyn StatementListener> {
        Some(self)
    }
}

impl StatementListener for LoggingStatementListener {
    fn on_statement_end(&self, stmt: &StatementContext) {
        let elapsed = stmt.elapsed();
        let Some(level) = self.level_for(stmt, elapsed) else {
            return;
        };

        let sql = self.truncate_sql(&stmt.sql);
        event_at!(
            "sqlwrap.statement",
            level,
            id = stmt.id,
            operation = %stmt.operation,
            batch_size = stmt.batch_size,
            elapsed = ?elapsed,
            outcome = %stmt.outcome,
            sql = %sql,
            "sqlwrap statement"
        );
    }
}

/// Snapshot of what a [`StatsListener`] has seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementStats {
    /// Finished operations, whatever their outcome.
    pub total_statements: u64,
    pub failed: u64,
    /// Operations dropped before they completed.
    pub cancelled: u64,
    /// Rows returned by queries.
    pub rows_returned: u64,
    /// Rows affected by updates, batches summed.
    pub rows_affected: u64,
    /// Statements and parameter sets submitted through batch operations.
    pub batched_entries: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
    /// SQL of the slowest operation.
    pub slowest_statement: Option<String>,
    per_operation: [u64; Operation::COUNT],
}

impl StatementStats {
    /// Finished operations of kind `operation`.
    pub fn count(&self, operation: Operation) -> u64 {
        self.per_operation[operation.index()]
    }

    pub fn succeeded(&self) -> u64 {
        self.total_statements - self.failed - self.cancelled
    }

    /// Mean duration per operation; `None` before the first one.
    pub fn average_duration(&self) -> Option<Duration> {
        let count = u32::try_from(self.total_statements).ok()?;
        self.total_duration.checked_div(count)
    }

    fn record(&mut self, stmt: &StatementContext, elapsed: Duration) {
        self.total_statements += 1;
        self.per_operation[stmt.operation.index()] += 1;

        match &stmt.outcome {
            StatementOutcome::Rows(n) => {
                self.rows_returned = self.rows_returned.saturating_add(*n as u64);
            }
            StatementOutcome::Affected(n) => {
                self.rows_affected = self.rows_affected.saturating_add(*n);
            }
            StatementOutcome::Failed(_) => self.failed += 1,
            StatementOutcome::Cancelled => self.cancelled += 1,
            StatementOutcome::Pending => {}
        }

        if stmt.operation.is_batch() {
            self.batched_entries += stmt.batch_size as u64;
        }

        self.total_duration = self.total_duration.saturating_add(elapsed);
        if self.slowest_statement.is_none() || elapsed > self.max_duration {
            self.max_duration = elapsed;
            self.slowest_statement = Some(stmt.sql.clone());
        }
    }
}

/// Aggregates statement counts, outcomes and durations.
#[derive(Debug, Default)]
pub struct StatsListener {
    stats: Mutex<StatementStats>,
}

impl StatsListener {
    /// Registered name of this listener.
    pub const NAME: &'static str = "sqlwrap::instrument::StatsListener";

    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current statistics.
    pub fn stats(&self) -> StatementStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn reset(&self) {
        *self.stats.lock().unwrap_or_else(|e| e.into_inner()) = StatementStats::default();
    }

    /// Fold one finished statement into the totals.
    pub fn record(&self, stmt: &StatementContext, elapsed: Duration) {
        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(stmt, elapsed);
    }

    pub(crate) fn construct() -> WrapResult<Box<dyn Listener>> {
        Ok(Box::new(Self::new()))
    }
}

impl Listener for StatsListener {
    fn as_statement_listener(&self) -> Option<&dyn StatementListener> {
        Some(self)
    }
}

impl StatementListener for StatsListener {
    fn on_statement_end(&self, stmt: &StatementContext) {
        self.record(stmt, stmt.elapsed());
    }
}

/// Emits `tracing` events at transaction boundaries.
#[derive(Debug, Clone)]
pub struct LoggingTransactionListener {
    /// Tracing event level to emit at.
    pub level: Level,
}

impl Default for LoggingTransactionListener {
    fn default() -> Self {
        Self { level: Level::DEBUG }
    }
}

impl LoggingTransactionListener {
    /// Registered name of this listener.
    pub const NAME: &'static str = "sqlwrap::instrument::LoggingTransactionListener";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub(crate) fn construct() -> WrapResult<Box<dyn Listener>> {
        Ok(Box::new(Self::new()))
    }
}

impl Listener for LoggingTransactionListener {
    fn as_transaction_listener(&self) -> Option<&dyn TransactionListener> {
        Some(self)
    }
}

impl TransactionListener for LoggingTransactionListener {
    fn on_transaction_start(&self, tx: &TransactionContext) {
        event_at!(
            "sqlwrap.transaction",
            self.level,
            sequence = tx.sequence,
            transaction_id = tx.transaction_id,
            "sqlwrap transaction started"
        );
    }

    fn on_transaction_end(&self, tx: &TransactionContext, success: bool) {
        event_at!(
            "sqlwrap.transaction",
            self.level,
            sequence = tx.sequence,
            transaction_id = tx.transaction_id,
            elapsed = ?tx.elapsed(),
            success,
            "sqlwrap transaction finished"
        );
    }
}
