use super::types::{StatementContext, TransactionContext};
use std::any::Any;

/// Notified around every intercepted execute-family operation.
///
/// `on_statement_end` is called exactly once per `on_statement_start`, also when
/// the operation fails or is dropped before completion.
pub trait StatementListener: Send + Sync {
    /// Called immediately before the delegated call.
    fn on_statement_start(&self, _stmt: &StatementContext) {}

    /// Called after the delegated call on every exit path.
    fn on_statement_end(&self, stmt: &StatementContext);
}

/// Notified at transaction boundaries.
///
/// `on_transaction_end` fires once per started transaction and never without a
/// preceding `on_transaction_start`.
pub trait TransactionListener: Send + Sync {
    fn on_transaction_start(&self, tx: &TransactionContext);

    /// `success` is `true` for a successful commit, `false` for rollback or failure.
    fn on_transaction_end(&self, tx: &TransactionContext, success: bool);
}

/// An auxiliary object owned by a decorator.
///
/// Listeners advertise which notification surfaces they implement; a
/// decorator only delivers the events it produces to listeners that opted in.
pub trait Listener: Any + Send + Sync {
    fn as_statement_listener(&self) -> Option<&dyn StatementListener> {
        None
    }

    fn as_transaction_listener(&self) -> Option<&dyn TransactionListener> {
        None
    }
}

impl dyn Listener {
    /// Downcast to a concrete listener type.
    pub fn downcast_ref<T: Listener>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }
}

/// The ordered listeners of one decorator.
#[derive(Default)]
pub struct ListenerSet {
    listeners: Vec<Box<dyn Listener>>,
}

impl ListenerSet {
    pub fn new(listeners: Vec<Box<dyn Listener>>) -> Self {
        Self { listeners }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn as_slice(&self) -> &[Box<dyn Listener>] {
        &self.listeners
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Listener> {
        self.listeners.iter().map(|l| l.as_ref())
    }

    /// First listener of type `T`.
    pub fn find<T: Listener>(&self) -> Option<&T> {
        self.iter().find_map(|l| l.downcast_ref::<T>())
    }

    pub fn for_each(&self, mut event: impl FnMut(&dyn Listener)) {
        for listener in &self.listeners {
            event(listener.as_ref());
        }
    }
}

impl StatementListener for ListenerSet {
    fn on_statement_start(&self, stmt: &StatementContext) {
        for listener in self.iter().filter_map(|l| l.as_statement_listener()) {
            listener.on_statement_start(stmt);
        }
    }

    fn on_statement_end(&self, stmt: &StatementContext) {
        for listener in self.iter().filter_map(|l| l.as_statement_listener()) {
            listener.on_statement_end(stmt);
        }
    }
}

impl TransactionListener for ListenerSet {
    fn on_transaction_start(&self, tx: &TransactionContext) {
        for listener in self.iter().filter_map(|l| l.as_transaction_listener()) {
            listener.on_transaction_start(tx);
        }
    }

    fn on_transaction_end(&self, tx: &TransactionContext, success: bool) {
        for listener in self.iter().filter_map(|l| l.as_transaction_listener()) {
            listener.on_transaction_end(tx, success);
        }
    }
}
