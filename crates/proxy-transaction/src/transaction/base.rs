use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::agent::Agent;
use crate::engine::{EngineCallback, EngineHandle, TransactionEngine};
use crate::error::{Error, Result};
use crate::layer::TransactionLayer;

use super::{Transaction, TransactionState, TransactionToken};

type Property = Arc<dyn Any + Send + Sync>;

/// State and teardown logic shared by outgoing and incoming transactions
///
/// The lock is only ever held for field access. It is never held across a
/// call into the engine or the agent, both of which may re-enter the
/// transaction.
pub struct TransactionBase {
    token: TransactionToken,
    kind: &'static str,
    layer: TransactionLayer,
    inner: Mutex<BaseInner>,
}

#[derive(Default)]
struct BaseInner {
    state: TransactionState,
    handle: Option<EngineHandle>,
    /// Strong self reference held while the engine context is alive
    self_hold: Option<Transaction>,
    /// Paired transaction on the other side of the proxy
    peer: Option<Transaction>,
    properties: HashMap<String, Property>,
    /// Engine context creation in progress, callbacks already routable
    starting: bool,
    /// The engine ended the exchange before creation returned
    end_requested: bool,
}

impl TransactionBase {
    pub(crate) fn new(layer: &TransactionLayer, kind: &'static str) -> Self {
        Self {
            token: TransactionToken::new(),
            kind,
            layer: layer.clone(),
            inner: Mutex::new(BaseInner::default()),
        }
    }

    pub fn token(&self) -> TransactionToken {
        self.token
    }

    pub fn layer(&self) -> &TransactionLayer {
        &self.layer
    }

    pub fn state(&self) -> TransactionState {
        self.inner.lock().state
    }

    pub fn handle(&self) -> Option<EngineHandle> {
        self.inner.lock().handle
    }

    pub(crate) fn engine(&self) -> &Arc<dyn TransactionEngine> {
        self.layer.engine()
    }

    /// The agent, or `None` with a warning naming what `action` skips.
    pub(crate) fn agent(&self, action: &str) -> Option<Arc<dyn Agent>> {
        let agent = self.layer.agent();
        if agent.is_none() {
            warn!(token = %self.token, kind = self.kind, action, "Agent is gone, skipping");
        }
        agent
    }

    pub(crate) fn callback(&self) -> EngineCallback {
        EngineCallback::new(self.token, Arc::downgrade(self.layer.registry()))
    }

    /// The bound engine handle, or the reason there is none.
    pub(crate) fn require_handle(&self, operation: &str) -> Result<EngineHandle> {
        let inner = self.inner.lock();
        match (inner.handle, inner.state) {
            (Some(handle), _) => Ok(handle),
            (None, TransactionState::Terminated) => {
                warn!(token = %self.token, kind = self.kind, operation, "Transaction already terminated, dropping");
                Err(Error::Terminated)
            }
            (None, _) => {
                warn!(token = %self.token, kind = self.kind, operation, "No engine context, dropping");
                Err(Error::NotStarted)
            }
        }
    }

    /// Register the callback token ahead of engine context creation, so
    /// events the engine delivers from inside the creation call are routed.
    pub(crate) fn begin_start(&self, this: &Transaction) {
        {
            let mut inner = self.inner.lock();
            inner.starting = true;
            inner.end_requested = false;
        }
        self.layer.registry().bind(self.token, this.downgrade());
    }

    /// Undo [`begin_start`](Self::begin_start) after a failed creation.
    pub(crate) fn abort_start(&self) {
        {
            let mut inner = self.inner.lock();
            inner.starting = false;
            inner.end_requested = false;
        }
        self.layer.registry().unbind(self.token);
    }

    /// Move from `Created` to `Active` with `handle`, taking the self hold
    /// and registering the engine callback token.
    ///
    /// Returns `false`, without side effects, if the transaction is not in
    /// the `Created` state. A termination requested by the engine while the
    /// context was being created is applied right after activation.
    pub(crate) fn activate(&self, handle: EngineHandle, this: Transaction) -> bool {
        let weak = this.downgrade();
        let end_requested = {
            let mut inner = self.inner.lock();
            if inner.state != TransactionState::Created {
                return false;
            }
            inner.state = TransactionState::Active;
            inner.handle = Some(handle);
            inner.self_hold = Some(this);
            inner.starting = false;
            std::mem::take(&mut inner.end_requested)
        };
        self.layer.registry().bind(self.token, weak);
        debug!(token = %self.token, kind = self.kind, %handle, "Transaction active");

        if end_requested {
            debug!(token = %self.token, kind = self.kind, %handle, "Engine ended the exchange during creation");
            self.terminate();
        }
        true
    }

    /// Tear the transaction down.
    ///
    /// Does nothing unless the transaction is active. Otherwise, in order:
    /// the self hold is cleared, the engine callback is unbound, the engine
    /// context is destroyed, the paired transaction and properties are
    /// released and the handle is forgotten. Safe to call from inside an
    /// engine callback running on this transaction.
    ///
    /// Returns whether this call performed the teardown.
    pub fn terminate(&self) -> bool {
        let (self_hold, handle, peer, properties) = {
            let mut inner = self.inner.lock();
            let Some(self_hold) = inner.self_hold.take() else {
                if inner.starting {
                    inner.end_requested = true;
                    trace!(token = %self.token, kind = self.kind, "terminate() during context creation, deferred");
                } else {
                    trace!(token = %self.token, kind = self.kind, state = %inner.state, "terminate() on inactive transaction");
                }
                return false;
            };
            inner.state = TransactionState::Terminated;
            let handle = inner.handle.take();
            let peer = inner.peer.take();
            let properties = std::mem::take(&mut inner.properties);
            (self_hold, handle, peer, properties)
        };

        self.layer.registry().unbind(self.token);
        if let Some(handle) = handle {
            let engine = self.engine();
            engine.unbind(handle);
            engine.destroy(handle);
        }
        drop(peer);
        drop(properties);

        debug!(token = %self.token, kind = self.kind, "Transaction terminated");
        // Callers always reach `&self` through their own strong reference,
        // so this is never the last one while `self` is borrowed.
        drop(self_hold);
        true
    }

    /// Link the paired transaction. Refused once terminated: nothing would
    /// release the link anymore.
    pub(crate) fn set_peer(&self, peer: Transaction) {
        let previous = {
            let mut inner = self.inner.lock();
            if inner.state == TransactionState::Terminated {
                drop(inner);
                warn!(token = %self.token, kind = self.kind, peer = %peer.token(), "Transaction terminated, not linking peer");
                return;
            }
            inner.peer.replace(peer)
        };
        drop(previous);
    }

    pub(crate) fn peer(&self) -> Option<Transaction> {
        self.inner.lock().peer.clone()
    }

    /// Attach a named value. Ignored once terminated.
    pub fn set_property<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        let name = name.into();
        let value: Property = Arc::new(value);
        let previous = {
            let mut inner = self.inner.lock();
            if inner.state == TransactionState::Terminated {
                drop(inner);
                warn!(token = %self.token, kind = self.kind, property = %name, "Transaction terminated, dropping property");
                return;
            }
            inner.properties.insert(name, value)
        };
        drop(previous);
    }

    pub fn property<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let value = self.inner.lock().properties.get(name).cloned()?;
        value.downcast::<T>().ok()
    }

    pub fn remove_property(&self, name: &str) -> bool {
        let previous = self.inner.lock().properties.remove(name);
        previous.is_some()
    }
}

impl fmt::Debug for TransactionBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TransactionBase")
            .field("token", &self.token)
            .field("kind", &self.kind)
            .field("state", &inner.state)
            .field("handle", &inner.handle)
            .field("properties", &inner.properties.len())
            .finish()
    }
}
