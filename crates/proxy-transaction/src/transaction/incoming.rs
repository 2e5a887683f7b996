use std::fmt;
use std::sync::Arc;

use rvoip_sip_core::{Method, Request, Response, StatusCode, Uri};
use tracing::{debug, error, warn};

use crate::engine::EngineEvent;
use crate::error::{Error, Result};
use crate::events::RequestEvent;
use crate::layer::TransactionLayer;
use crate::options::{ReplyOptions, SendOptions};

use super::{OutgoingTransaction, Transaction, TransactionBase, TransactionCommon, TransactionState};

/// Server transaction: one request received by the proxy
pub struct IncomingTransaction {
    base: TransactionBase,
}

impl IncomingTransaction {
    pub fn create(layer: &TransactionLayer) -> Arc<Self> {
        let tx = Arc::new(Self {
            base: TransactionBase::new(layer, "incoming"),
        });
        debug!(token = %tx.base.token(), "New IncomingTransaction");
        tx
    }

    /// Bind a received request to this transaction.
    ///
    /// The request must already be validated. On engine failure the
    /// transaction stays inert and the caller decides what to do with the
    /// request.
    pub fn handle(self: &Arc<Self>, request: &Request) -> Result<()> {
        match self.base.state() {
            TransactionState::Created => {}
            TransactionState::Active => {
                warn!(token = %self.base.token(), "Incoming transaction already handles a request");
                return Err(Error::AlreadyStarted);
            }
            TransactionState::Terminated => {
                warn!(token = %self.base.token(), "Incoming transaction already terminated");
                return Err(Error::Terminated);
            }
        }

        let engine = self.base.engine();
        let handle = engine.create_incoming(request.clone()).map_err(|e| {
            error!(token = %self.base.token(), method = ?request.method(), error = %e, "Error during incoming transaction creation");
            e.into_creation_error()
        })?;

        if !self.base.activate(handle, Transaction::Incoming(self.clone())) {
            error!(token = %self.base.token(), %handle, "Incoming transaction activated twice, discarding context");
            engine.destroy(handle);
            return Err(Error::AlreadyStarted);
        }
        engine.bind(handle, self.base.callback());
        Ok(())
    }

    /// Build a response skeleton for the handled request.
    ///
    /// The returned response is independent of the transaction: the caller
    /// may edit it and later pass it to [`send`](Self::send).
    pub fn create_response(&self, status: StatusCode, reason: Option<&str>) -> Result<Response> {
        let handle = self.base.require_handle("create_response")?;
        self.base
            .engine()
            .build_response(handle, status, reason)
            .map_err(|e| {
                error!(token = %self.base.token(), status = status.as_u16(), error = %e, "Engine failed to build response");
                e
            })
    }

    /// Send `response` through the transaction. A final response terminates
    /// it, whether or not the engine accepted the delivery.
    pub fn send(&self, response: &Response, destination: Option<&Uri>, options: &SendOptions) -> Result<()> {
        let handle = self.base.require_handle("send")?;
        debug!(token = %self.base.token(), status = response.status().as_u16(), "Response is sent through an incoming transaction");

        let options = options.merged_with(&self.base.layer().config().default_send_options);
        let sent = self
            .base
            .engine()
            .send_response(handle, response.clone(), destination, &options);
        if let Err(e) = &sent {
            error!(token = %self.base.token(), status = response.status().as_u16(), error = %e, "Engine rejected response");
        }
        if response.status().as_u16() >= 200 {
            self.base.terminate();
        }
        sent
    }

    /// Build and send a response in one step. Counted in the agent's reply
    /// statistics; a final status terminates the transaction.
    pub fn reply(&self, status: StatusCode, reason: Option<&str>, options: &ReplyOptions) -> Result<()> {
        let handle = self.base.require_handle("reply")?;

        if self.base.layer().config().record_reply_statistics {
            if let Some(agent) = self.base.agent("reply statistics") {
                agent.incr_reply_stat(status);
            }
        }

        let sent = self.base.engine().reply(handle, status, reason, options);
        if let Err(e) = &sent {
            error!(token = %self.base.token(), status = status.as_u16(), error = %e, "Engine rejected reply");
        }
        if status.as_u16() >= 200 {
            self.base.terminate();
        }
        sent
    }

    /// Link the outgoing transaction forwarding this request.
    pub fn set_outgoing(&self, outgoing: Arc<OutgoingTransaction>) {
        self.base.set_peer(Transaction::Outgoing(outgoing));
    }

    pub fn outgoing(&self) -> Option<Arc<OutgoingTransaction>> {
        self.base.peer().and_then(|peer| peer.as_outgoing().cloned())
    }

    /// Handle a notification from the engine.
    ///
    /// Correlated requests are dispatched to the agent as [`RequestEvent`]s.
    /// A CANCEL always ends the server transaction after dispatch. An
    /// engine-side end of transaction terminates without dispatching.
    pub fn on_engine_event(self: &Arc<Self>, event: EngineEvent) {
        debug!(token = %self.base.token(), "IncomingTransaction callback");
        match event {
            EngineEvent::Request(request) => {
                let is_cancel = request.method() == Method::Cancel;
                if let Some(agent) = self.base.agent("request event") {
                    agent.send_request_event(RequestEvent::new(self.clone(), request));
                }
                if is_cancel {
                    self.base.terminate();
                }
            }
            EngineEvent::Terminated => {
                self.base.terminate();
            }
            EngineEvent::Response(response) => {
                warn!(token = %self.base.token(), status = response.status().as_u16(), "Unexpected response on incoming transaction, ignoring");
            }
        }
    }
}

impl TransactionCommon for IncomingTransaction {
    fn base(&self) -> &TransactionBase {
        &self.base
    }
}

impl fmt::Debug for IncomingTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingTransaction")
            .field("base", &self.base)
            .finish()
    }
}

impl Drop for IncomingTransaction {
    fn drop(&mut self) {
        debug!(token = %self.base.token(), "Delete IncomingTransaction");
    }
}
