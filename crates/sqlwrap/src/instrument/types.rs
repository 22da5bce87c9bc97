use std::fmt;
use std::time::{Duration, Instant};

/// Which execute-family operation was intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `Connection::execute`
    Execute,
    /// `Connection::query`
    Query,
    /// `Connection::execute_batch`
    Batch,
    /// `Connection::execute_prepared`
    PreparedExecute,
    /// `Connection::query_prepared`
    PreparedQuery,
    /// `Connection::execute_prepared_batch`
    PreparedBatch,
}

impl Operation {
    pub const COUNT: usize = 6;

    /// Every operation, in [`index`](Self::index) order.
    pub const ALL: [Operation; Self::COUNT] = [
        Operation::Execute,
        Operation::Query,
        Operation::Batch,
        Operation::PreparedExecute,
        Operation::PreparedQuery,
        Operation::PreparedBatch,
    ];

    /// Position in [`ALL`](Self::ALL).
    pub fn index(self) -> usize {
        match self {
            Operation::Execute => 0,
            Operation::Query => 1,
            Operation::Batch => 2,
            Operation::PreparedExecute => 3,
            Operation::PreparedQuery => 4,
            Operation::PreparedBatch => 5,
        }
    }

    /// Runs a statement handle from `Connection::prepare`.
    pub fn is_prepared(self) -> bool {
        matches!(
            self,
            Operation::PreparedExecute | Operation::PreparedQuery | Operation::PreparedBatch
        )
    }

    /// Covers several statements or parameter sets in one call.
    pub fn is_batch(self) -> bool {
        matches!(self, Operation::Batch | Operation::PreparedBatch)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Execute => "execute",
            Operation::Query => "query",
            Operation::Batch => "batch",
            Operation::PreparedExecute => "prepared_execute",
            Operation::PreparedQuery => "prepared_query",
            Operation::PreparedBatch => "prepared_batch",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an intercepted operation, as seen by `on_statement_end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementOutcome {
    /// The operation has not finished (only visible in `on_statement_start`).
    Pending,
    /// A query returned rows.
    Rows(usize),
    /// A statement (or batch, summed) affected rows.
    Affected(u64),
    /// The delegated call failed.
    Failed(String),
    /// The operation was dropped before it completed.
    Cancelled,
}

impl StatementOutcome {
    /// `Failed` or `Cancelled`.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Cancelled)
    }
}

impl fmt::Display for StatementOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementOutcome::Pending => write!(f, "pending"),
            StatementOutcome::Rows(n) => write!(f, "{n} rows"),
            StatementOutcome::Affected(n) => write!(f, "{n} affected"),
            StatementOutcome::Failed(e) => write!(f, "error: {e}"),
            StatementOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The statement an instrumentation event refers to.
#[derive(Debug, Clone)]
pub struct StatementContext {
    /// Per-connection sequence number of this operation, starting at 1.
    pub id: u64,
    /// SQL text (plain batches are joined with `"; "`).
    pub sql: String,
    /// Intercepted operation.
    pub operation: Operation,
    /// Statements or parameter sets covered by the call; `1` unless batched.
    pub batch_size: usize,
    /// Set just before `on_statement_end`.
    pub outcome: StatementOutcome,
    started: Instant,
}

impl StatementContext {
    pub fn new(id: u64, sql: impl Into<String>, operation: Operation) -> Self {
        Self {
            id,
            sql: sql.into(),
            operation,
            batch_size: 1,
            outcome: StatementOutcome::Pending,
            started: Instant::now(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Time since the start notification.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn started_at(&self) -> Instant {
        self.started
    }
}

/// The transaction an instrumentation event refers to.
#[derive(Debug, Clone)]
pub struct TransactionContext {
    /// Per-connection sequence number of this transaction, starting at 1.
    pub sequence: u64,
    /// Database transaction id, or `0` when it could not be determined.
    pub transaction_id: i64,
    started: Instant,
}

impl TransactionContext {
    pub fn new(sequence: u64, transaction_id: i64) -> Self {
        Self {
            sequence,
            transaction_id,
            started: Instant::now(),
        }
    }

    /// Time since the transaction started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
