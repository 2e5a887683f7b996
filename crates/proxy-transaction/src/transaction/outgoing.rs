use std::fmt;
use std::sync::Arc;

use rvoip_sip_core::{Method, Request, Uri};
use tracing::{debug, error, warn};

use crate::branch::BranchId;
use crate::engine::EngineEvent;
use crate::error::{Error, Result};
use crate::events::ResponseEvent;
use crate::layer::TransactionLayer;
use crate::options::SendOptions;

use super::{IncomingTransaction, Transaction, TransactionBase, TransactionCommon, TransactionState};

/// Client transaction: one request forwarded onward by the proxy
///
/// The branch is generated at construction. The engine context is only
/// created by the first [`send`](Self::send), so a transaction can be built
/// ahead of the routing decision without committing any network resource.
pub struct OutgoingTransaction {
    base: TransactionBase,
    branch: BranchId,
}

impl OutgoingTransaction {
    pub fn create(layer: &TransactionLayer) -> Arc<Self> {
        let tx = Arc::new(Self {
            base: TransactionBase::new(layer, "outgoing"),
            branch: BranchId::generate(),
        });
        debug!(token = %tx.base.token(), branch = %tx.branch, "New OutgoingTransaction");
        tx
    }

    pub fn branch_id(&self) -> &BranchId {
        &self.branch
    }

    /// Send `request` through this transaction.
    ///
    /// The first call duplicates the request, creates the engine context and
    /// activates the transaction. Once active, only a CANCEL is accepted: it
    /// cancels the exchange. Any other request is logged and dropped, leaving
    /// the exchange untouched.
    pub fn send(
        self: &Arc<Self>,
        request: &Request,
        destination: Option<&Uri>,
        options: &SendOptions,
    ) -> Result<()> {
        debug!(token = %self.base.token(), method = ?request.method(), "Request is sent through an outgoing transaction");

        match self.base.state() {
            TransactionState::Created => self.start(request, destination, options),
            TransactionState::Active if request.method() == Method::Cancel => {
                // Forwarding a CANCEL for the request already in flight
                self.cancel();
                Ok(())
            }
            TransactionState::Active => {
                error!(
                    token = %self.base.token(),
                    method = ?request.method(),
                    "Attempting to send request through an already created outgoing transaction"
                );
                Err(Error::AlreadyStarted)
            }
            TransactionState::Terminated => {
                warn!(token = %self.base.token(), method = ?request.method(), "Outgoing transaction already terminated, dropping request");
                Err(Error::Terminated)
            }
        }
    }

    fn start(
        self: &Arc<Self>,
        request: &Request,
        destination: Option<&Uri>,
        options: &SendOptions,
    ) -> Result<()> {
        let config = self.base.layer().config();
        let mut options = options.merged_with(&config.default_send_options);
        if options.branch.is_none() {
            options.branch = Some(self.branch.via_value(config.branch_magic_cookie));
        }

        let engine = self.base.engine();
        self.base.begin_start(&Transaction::Outgoing(self.clone()));
        let handle = engine
            .create_outgoing(destination, request.clone(), &options, self.base.callback())
            .map_err(|e| {
                error!(token = %self.base.token(), error = %e, "Error during outgoing transaction creation");
                self.base.abort_start();
                e.into_creation_error()
            })?;

        if !self.base.activate(handle, Transaction::Outgoing(self.clone())) {
            // Lost a race with another send on the same transaction
            error!(token = %self.base.token(), %handle, "Outgoing transaction activated twice, discarding context");
            engine.destroy(handle);
            return Err(Error::AlreadyStarted);
        }
        Ok(())
    }

    /// Cancel the pending exchange and terminate the transaction.
    pub fn cancel(&self) {
        match self.base.handle() {
            Some(handle) => {
                debug!(token = %self.base.token(), %handle, "Cancelling outgoing transaction");
                self.base.engine().cancel(handle);
            }
            None => debug!(token = %self.base.token(), "cancel() without engine context"),
        }
        self.base.terminate();
    }

    /// Request-URI of the forwarded request, `None` before the first send.
    pub fn request_uri(&self) -> Option<Uri> {
        match self.base.handle() {
            Some(handle) => self.base.engine().request_uri(handle),
            None => {
                error!(token = %self.base.token(), "OutgoingTransaction::request_uri(): transaction not started");
                None
            }
        }
    }

    /// Last status code received, 0 before the first send.
    pub fn response_code(&self) -> u16 {
        match self.base.handle() {
            Some(handle) => self.base.engine().status(handle),
            None => {
                error!(token = %self.base.token(), "OutgoingTransaction::response_code(): transaction not started");
                0
            }
        }
    }

    /// Link the incoming transaction this one forwards.
    pub fn set_incoming(&self, incoming: Arc<IncomingTransaction>) {
        self.base.set_peer(Transaction::Incoming(incoming));
    }

    pub fn incoming(&self) -> Option<Arc<IncomingTransaction>> {
        self.base.peer().and_then(|peer| peer.as_incoming().cloned())
    }

    /// Handle a notification from the engine.
    ///
    /// Every response is dispatched to the agent as a [`ResponseEvent`]; a
    /// final one then terminates the transaction. An engine-side end of
    /// transaction terminates it without dispatching anything.
    pub fn on_engine_event(self: &Arc<Self>, event: EngineEvent) {
        debug!(token = %self.base.token(), "OutgoingTransaction callback");
        match event {
            EngineEvent::Response(response) => {
                let is_final = response.status().as_u16() >= 200;
                if let Some(agent) = self.base.agent("response event") {
                    agent.send_response_event(ResponseEvent::new(self.clone(), response));
                }
                if is_final {
                    self.base.terminate();
                }
            }
            EngineEvent::Terminated => {
                self.base.terminate();
            }
            EngineEvent::Request(request) => {
                warn!(token = %self.base.token(), method = ?request.method(), "Unexpected request on outgoing transaction, ignoring");
            }
        }
    }
}

impl TransactionCommon for OutgoingTransaction {
    fn base(&self) -> &TransactionBase {
        &self.base
    }
}

impl fmt::Debug for OutgoingTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutgoingTransaction")
            .field("branch", &self.branch)
            .field("base", &self.base)
            .finish()
    }
}

impl Drop for OutgoingTransaction {
    fn drop(&mut self) {
        debug!(token = %self.base.token(), branch = %self.branch, "Delete OutgoingTransaction");
    }
}
