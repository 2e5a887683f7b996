//! Token lookup table used to route engine callbacks back to transactions

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::engine::EngineEvent;
use crate::transaction::{Transaction, TransactionToken, WeakTransaction};

/// Maps transaction tokens to the transactions currently bound to the engine
///
/// Entries are weak: the registry never keeps a transaction alive. A
/// transaction is inserted when it binds its engine callback and removed when
/// it terminates.
#[derive(Debug, Default)]
pub struct TransactionRegistry {
    entries: DashMap<TransactionToken, WeakTransaction>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bind(&self, token: TransactionToken, transaction: WeakTransaction) {
        trace!(%token, "Binding engine callback");
        self.entries.insert(token, transaction);
    }

    pub(crate) fn unbind(&self, token: TransactionToken) -> bool {
        trace!(%token, "Unbinding engine callback");
        self.entries.remove(&token).is_some()
    }

    pub fn is_bound(&self, token: TransactionToken) -> bool {
        self.entries.contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Upgrade the transaction bound to `token`, if it is still alive.
    pub fn resolve(&self, token: TransactionToken) -> Option<Transaction> {
        self.entries
            .get(&token)
            .and_then(|entry| entry.value().upgrade())
    }

    /// Route an engine event to the transaction bound to `token`.
    ///
    /// The map is not locked while the transaction handles the event, so the
    /// handler may terminate the transaction (and unbind it) re-entrantly.
    pub fn deliver(&self, token: TransactionToken, event: EngineEvent) -> bool {
        match self.resolve(token) {
            Some(transaction) => {
                transaction.on_engine_event(event);
                true
            }
            None => {
                debug!(%token, "No transaction bound for engine event, dropping it");
                false
            }
        }
    }
}
