use super::listener::StatementListener;
use super::types::{StatementContext, StatementOutcome};
use crate::connection::Row;
use crate::error::WrapResult;
use std::future::Future;

/// Results of execute-family operations that can be summarized as an outcome.
pub trait StatementResult {
    fn outcome(&self) -> StatementOutcome;
}

impl StatementResult for u64 {
    fn outcome(&self) -> StatementOutcome {
        StatementOutcome::Affected(*self)
    }
}

impl StatementResult for Vec<Row> {
    fn outcome(&self) -> StatementOutcome {
        StatementOutcome::Rows(self.len())
    }
}

impl StatementResult for Vec<u64> {
    fn outcome(&self) -> StatementOutcome {
        StatementOutcome::Affected(self.iter().copied().fold(0, u64::saturating_add))
    }
}

impl StatementResult for () {
    fn outcome(&self) -> StatementOutcome {
        StatementOutcome::Affected(0)
    }
}

/// Brackets one operation with start/end notifications.
///
/// `on_statement_start` fires on [`enter`](Self::enter); `on_statement_end`
/// fires when the scope is dropped. If no result was recorded by then the
/// operation was abandoned and the outcome is [`StatementOutcome::Cancelled`].
pub struct StatementScope<'a, L: StatementListener + ?Sized> {
    listener: &'a L,
    ctx: StatementContext,
}

impl<'a, L: StatementListener + ?Sized> StatementScope<'a, L> {
    pub fn enter(listener: &'a L, ctx: StatementContext) -> Self {
        listener.on_statement_start(&ctx);
        Self { listener, ctx }
    }

    /// Record the result that the end notification will carry.
    pub fn record<T: StatementResult>(&mut self, result: &WrapResult<T>) {
        self.ctx.outcome = match result {
            Ok(value) => value.outcome(),
            Err(e) => StatementOutcome::Failed(e.to_string()),
        };
    }

    pub fn context(&self) -> &StatementContext {
        &self.ctx
    }
}

impl<L: StatementListener + ?Sized> Drop for StatementScope<'_, L> {
    fn drop(&mut self) {
        if self.ctx.outcome == StatementOutcome::Pending {
            self.ctx.outcome = StatementOutcome::Cancelled;
        }
        tracing::trace!(
            id = self.ctx.id,
            operation = ?self.ctx.operation,
            elapsed = ?self.ctx.elapsed(),
            outcome = %self.ctx.outcome,
            "statement finished"
        );
        self.listener.on_statement_end(&self.ctx);
    }
}

/// Run `op` between `on_statement_start` and `on_statement_end`.
///
/// The result (value or error) is returned unchanged; the end notification is
/// delivered on every exit path, including when the returned future is dropped
/// before completion.
pub async fn time<L, T, F>(listener: &L, ctx: StatementContext, op: F) -> WrapResult<T>
where
    L: StatementListener + ?Sized,
    T: StatementResult,
    F: Future<Output = WrapResult<T>>,
{
    let mut scope = StatementScope::enter(listener, ctx);
    let result = op.await;
    scope.record(&result);
    result
}
