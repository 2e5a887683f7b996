//! The bundle of collaborators every transaction works against

use std::fmt;
use std::sync::{Arc, Weak};

use crate::agent::Agent;
use crate::config::TransactionConfig;
use crate::engine::{EngineEvent, TransactionEngine};
use crate::registry::TransactionRegistry;
use crate::transaction::{IncomingTransaction, OutgoingTransaction, TransactionToken};

/// Shared context for transactions created on behalf of one agent
///
/// Cloning is cheap. The layer keeps the engine alive but only holds the
/// agent weakly.
#[derive(Clone)]
pub struct TransactionLayer {
    inner: Arc<LayerInner>,
}

struct LayerInner {
    engine: Arc<dyn TransactionEngine>,
    agent: Weak<dyn Agent>,
    registry: Arc<TransactionRegistry>,
    config: TransactionConfig,
}

impl TransactionLayer {
    /// Create a layer. Only a weak reference to `agent` is kept.
    pub fn new(
        engine: Arc<dyn TransactionEngine>,
        agent: Arc<dyn Agent>,
        config: TransactionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(LayerInner {
                engine,
                agent: Arc::downgrade(&agent),
                registry: Arc::new(TransactionRegistry::new()),
                config,
            }),
        }
    }

    pub fn engine(&self) -> &Arc<dyn TransactionEngine> {
        &self.inner.engine
    }

    pub fn registry(&self) -> &Arc<TransactionRegistry> {
        &self.inner.registry
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.inner.config
    }

    /// The agent, if it is still alive
    pub fn agent(&self) -> Option<Arc<dyn Agent>> {
        self.inner.agent.upgrade()
    }

    pub fn create_outgoing(&self) -> Arc<OutgoingTransaction> {
        OutgoingTransaction::create(self)
    }

    pub fn create_incoming(&self) -> Arc<IncomingTransaction> {
        IncomingTransaction::create(self)
    }

    /// Number of transactions currently bound to engine callbacks
    pub fn active_transactions(&self) -> usize {
        self.inner.registry.len()
    }

    /// Route an engine event by token. Same as going through the
    /// [`EngineCallback`](crate::engine::EngineCallback).
    pub fn deliver(&self, token: TransactionToken, event: EngineEvent) -> bool {
        self.inner.registry.deliver(token, event)
    }
}

impl fmt::Debug for TransactionLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionLayer")
            .field("engine", &"Arc<dyn TransactionEngine>")
            .field("agent_alive", &(self.inner.agent.strong_count() > 0))
            .field("active_transactions", &self.inner.registry.len())
            .field("config", &self.inner.config)
            .finish()
    }
}
