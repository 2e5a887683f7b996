//! Seam to the transaction-capable SIP engine
//!
//! The engine owns the wire side of a transaction: retransmissions, RFC 3261
//! timers, request/response matching and transport selection. This crate only
//! drives it through [`TransactionEngine`] and receives its asynchronous
//! notifications through an [`EngineCallback`].
//!
//! ## Callback resolution
//!
//! An engine never gets a pointer to a transaction. It gets an
//! [`EngineCallback`] holding the transaction's [`TransactionToken`] and a weak
//! reference to the [`TransactionRegistry`]. Delivering an event looks the
//! token up in the registry, so a callback that outlives its transaction, or
//! that fires after `unbind`, resolves to nothing instead of to a dangling
//! object.

use std::fmt;
use std::sync::Weak;

use rvoip_sip_core::{Request, Response, StatusCode, Uri};
use tracing::debug;

use crate::error::Result;
use crate::options::{ReplyOptions, SendOptions};
use crate::registry::TransactionRegistry;
use crate::transaction::TransactionToken;

/// Opaque identifier of a live engine-side transaction context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineHandle(u64);

impl EngineHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

/// Notification from the engine about a bound transaction
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A response arrived for an outgoing transaction.
    Response(Response),
    /// A request correlated to an incoming transaction arrived (ACK, CANCEL).
    Request(Request),
    /// The engine ended the transaction without a message (timeout, transport
    /// failure, completed retransmission window).
    Terminated,
}

/// Callback binding handed to the engine
#[derive(Clone)]
pub struct EngineCallback {
    token: TransactionToken,
    registry: Weak<TransactionRegistry>,
}

impl EngineCallback {
    pub(crate) fn new(token: TransactionToken, registry: Weak<TransactionRegistry>) -> Self {
        Self { token, registry }
    }

    /// Token of the transaction this callback belongs to
    pub fn token(&self) -> TransactionToken {
        self.token
    }

    /// Deliver an event to the bound transaction.
    ///
    /// Returns `false` when the transaction is gone or no longer bound.
    pub fn deliver(&self, event: EngineEvent) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.deliver(self.token, event),
            None => {
                debug!(token = %self.token, "Dropping engine event, registry is gone");
                false
            }
        }
    }
}

impl fmt::Debug for EngineCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineCallback")
            .field("token", &self.token)
            .finish()
    }
}

/// Operations the proxy transaction layer needs from the engine
///
/// All calls are synchronous and must not block. An engine may deliver
/// callbacks from inside any of these calls; transactions never hold a lock
/// while calling into the engine.
pub trait TransactionEngine: Send + Sync {
    /// Create a client transaction context and send `request` to
    /// `destination` (or to the Request-URI when `None`).
    ///
    /// The callback is routable before this is called, so the engine may
    /// deliver events from inside the call. An end of exchange delivered
    /// that early takes effect as soon as the call returns.
    fn create_outgoing(
        &self,
        destination: Option<&Uri>,
        request: Request,
        options: &SendOptions,
        callback: EngineCallback,
    ) -> Result<EngineHandle>;

    /// Create a server transaction context from a received request.
    fn create_incoming(&self, request: Request) -> Result<EngineHandle>;

    /// Bind the callback of an existing context, replacing any previous one.
    fn bind(&self, handle: EngineHandle, callback: EngineCallback);

    /// Drop the callback of a context so no further events are delivered.
    fn unbind(&self, handle: EngineHandle);

    /// Send a CANCEL for a pending client transaction. No-op once a final
    /// response has been received.
    fn cancel(&self, handle: EngineHandle);

    /// Release the context.
    fn destroy(&self, handle: EngineHandle);

    /// Request-URI of the request sent by a client transaction.
    fn request_uri(&self, handle: EngineHandle) -> Option<Uri>;

    /// Last status code received (client) or sent (server), 0 if none.
    fn status(&self, handle: EngineHandle) -> u16;

    /// Build a response skeleton to the request of a server transaction.
    fn build_response(
        &self,
        handle: EngineHandle,
        status: StatusCode,
        reason: Option<&str>,
    ) -> Result<Response>;

    /// Send a complete response through a server transaction. Without a
    /// `destination` the response follows the top `Via` of the request.
    fn send_response(
        &self,
        handle: EngineHandle,
        response: Response,
        destination: Option<&Uri>,
        options: &SendOptions,
    ) -> Result<()>;

    /// Build and send a response through a server transaction in one step.
    fn reply(
        &self,
        handle: EngineHandle,
        status: StatusCode,
        reason: Option<&str>,
        options: &ReplyOptions,
    ) -> Result<()>;
}
