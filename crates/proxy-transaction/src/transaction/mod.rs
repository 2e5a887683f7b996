//! Proxy transactions
//!
//! A proxy transaction wraps one SIP request/response exchange driven by the
//! engine. There are two kinds:
//!
//! - [`OutgoingTransaction`]: client side, created to forward a request
//!   onward. The engine context is created lazily on the first `send()`.
//! - [`IncomingTransaction`]: server side, created for a received request.
//!   The engine context is created by `handle()`.
//!
//! ## Lifecycle
//!
//! ```text
//!   Created ──(engine context bound)──► Active ──(terminate)──► Terminated
//! ```
//!
//! While `Active`, a transaction holds a strong reference to itself. That
//! reference, not the caller's, keeps it alive while the engine may still
//! call back. [`TransactionBase::terminate`] releases it exactly once; later
//! calls are no-ops.

mod base;
mod incoming;
mod outgoing;

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use uuid::Uuid;

use crate::engine::{EngineEvent, EngineHandle};

pub use base::TransactionBase;
pub use incoming::IncomingTransaction;
pub use outgoing::OutgoingTransaction;

/// Stable per-instance token the engine uses to reach a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionToken(Uuid);

impl TransactionToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Lifecycle state of a proxy transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransactionState {
    /// Constructed, no engine context yet
    #[default]
    Created,
    /// Engine context bound, the engine may call back
    Active,
    /// Torn down, permanently unusable
    Terminated,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionState::Created => "Created",
            TransactionState::Active => "Active",
            TransactionState::Terminated => "Terminated",
        };
        f.write_str(s)
    }
}

/// Operations shared by both transaction kinds
pub trait TransactionCommon {
    fn base(&self) -> &TransactionBase;

    fn token(&self) -> TransactionToken {
        self.base().token()
    }

    fn state(&self) -> TransactionState {
        self.base().state()
    }

    fn is_terminated(&self) -> bool {
        self.state() == TransactionState::Terminated
    }

    /// Engine context, if one is currently bound
    fn engine_handle(&self) -> Option<EngineHandle> {
        self.base().handle()
    }

    /// Tear the transaction down. Idempotent.
    fn terminate(&self) -> bool {
        self.base().terminate()
    }

    fn set_property<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        self.base().set_property(name, value)
    }

    fn property<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.base().property(name)
    }

    fn remove_property(&self, name: &str) -> bool {
        self.base().remove_property(name)
    }
}

/// A proxy transaction of either kind
#[derive(Debug, Clone)]
pub enum Transaction {
    Outgoing(Arc<OutgoingTransaction>),
    Incoming(Arc<IncomingTransaction>),
}

impl Transaction {
    pub fn base(&self) -> &TransactionBase {
        match self {
            Transaction::Outgoing(tx) => tx.base(),
            Transaction::Incoming(tx) => tx.base(),
        }
    }

    pub fn token(&self) -> TransactionToken {
        self.base().token()
    }

    pub fn state(&self) -> TransactionState {
        self.base().state()
    }

    pub fn terminate(&self) -> bool {
        self.base().terminate()
    }

    pub fn is_outgoing(&self) -> bool {
        matches!(self, Transaction::Outgoing(_))
    }

    pub fn as_outgoing(&self) -> Option<&Arc<OutgoingTransaction>> {
        match self {
            Transaction::Outgoing(tx) => Some(tx),
            _ => None,
        }
    }

    pub fn as_incoming(&self) -> Option<&Arc<IncomingTransaction>> {
        match self {
            Transaction::Incoming(tx) => Some(tx),
            _ => None,
        }
    }

    /// Whether both refer to the same transaction object
    pub fn ptr_eq(&self, other: &Transaction) -> bool {
        match (self, other) {
            (Transaction::Outgoing(a), Transaction::Outgoing(b)) => Arc::ptr_eq(a, b),
            (Transaction::Incoming(a), Transaction::Incoming(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn downgrade(&self) -> WeakTransaction {
        match self {
            Transaction::Outgoing(tx) => WeakTransaction::Outgoing(Arc::downgrade(tx)),
            Transaction::Incoming(tx) => WeakTransaction::Incoming(Arc::downgrade(tx)),
        }
    }

    /// Hand an engine event to the right transaction kind.
    pub fn on_engine_event(&self, event: EngineEvent) {
        match self {
            Transaction::Outgoing(tx) => tx.on_engine_event(event),
            Transaction::Incoming(tx) => tx.on_engine_event(event),
        }
    }
}

impl From<Arc<OutgoingTransaction>> for Transaction {
    fn from(tx: Arc<OutgoingTransaction>) -> Self {
        Transaction::Outgoing(tx)
    }
}

impl From<Arc<IncomingTransaction>> for Transaction {
    fn from(tx: Arc<IncomingTransaction>) -> Self {
        Transaction::Incoming(tx)
    }
}

/// Non-owning counterpart of [`Transaction`]
#[derive(Debug, Clone)]
pub enum WeakTransaction {
    Outgoing(Weak<OutgoingTransaction>),
    Incoming(Weak<IncomingTransaction>),
}

impl WeakTransaction {
    pub fn upgrade(&self) -> Option<Transaction> {
        match self {
            WeakTransaction::Outgoing(tx) => tx.upgrade().map(Transaction::Outgoing),
            WeakTransaction::Incoming(tx) => tx.upgrade().map(Transaction::Incoming),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique() {
        let a = TransactionToken::new();
        let b = TransactionToken::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 32);
    }

    #[test]
    fn test_state_default_and_display() {
        assert_eq!(TransactionState::default(), TransactionState::Created);
        assert_eq!(TransactionState::Terminated.to_string(), "Terminated");
    }
}
