//! # RVoIP Proxy Transaction
//!
//! Stateful transaction layer of a SIP proxy. Each SIP request/response
//! exchange the proxy takes part in is represented by a transaction object
//! that drives an external transaction engine (retransmissions, RFC 3261
//! timers, matching) and turns the engine's asynchronous notifications into
//! events for the proxy pipeline.
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────────────── Agent (proxy pipeline) ◄─────────────┐
//!            │ create / send / reply           ResponseEvent/RequestEvent
//!            ▼                                                          │
//!   OutgoingTransaction / IncomingTransaction ──────────────────────────┘
//!            │ create_outgoing / create_incoming / cancel / destroy   ▲
//!            ▼                                                        │
//!   TransactionEngine ── EngineCallback ──► TransactionRegistry ──────┘
//! ```
//!
//! - [`OutgoingTransaction`]: client transaction. Generates its branch at
//!   construction and creates the engine context on the first `send()`.
//! - [`IncomingTransaction`]: server transaction. `handle()` creates the
//!   engine context for a received request; `reply()`/`send()` answer it.
//! - [`TransactionLayer`]: the engine, the agent, the callback registry and
//!   the configuration shared by the transactions of one agent.
//!
//! Any final status (>= 200) terminates a transaction, as does a CANCEL
//! received by a server transaction or the engine ending the exchange. An
//! active transaction keeps itself alive until it terminates, independently
//! of who else holds it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rvoip_proxy_transaction::prelude::*;
//! use rvoip_sip_core::{Request, StatusCode};
//!
//! fn on_invite(engine: Arc<dyn TransactionEngine>, agent: Arc<ChannelAgent>, invite: &Request) -> Result<()> {
//!     let layer = TransactionLayer::new(engine, agent, TransactionConfig::default());
//!
//!     let server_tx = IncomingTransaction::create(&layer);
//!     server_tx.handle(invite)?;
//!     server_tx.reply(StatusCode::Trying, None, &ReplyOptions::default())?;
//!
//!     let client_tx = OutgoingTransaction::create(&layer);
//!     client_tx.set_incoming(server_tx.clone());
//!     client_tx.send(invite, None, &SendOptions::default())?;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod branch;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod layer;
pub mod logging;
pub mod options;
pub mod registry;
pub mod transaction;

pub use agent::{Agent, ChannelAgent, ReplyStatistics};
pub use branch::{BranchId, generate_branch};
pub use config::TransactionConfig;
pub use engine::{EngineCallback, EngineEvent, EngineHandle, TransactionEngine};
pub use error::{Error, Result};
pub use events::{ProxyEvent, RequestEvent, ResponseEvent};
pub use layer::TransactionLayer;
pub use options::{ReplyOptions, SendOptions, TransportKind};
pub use registry::TransactionRegistry;
pub use transaction::{
    IncomingTransaction, OutgoingTransaction, Transaction, TransactionBase, TransactionCommon,
    TransactionState, TransactionToken, WeakTransaction,
};

/// Re-export of common types and functions
pub mod prelude {
    pub use crate::{
        Agent, BranchId, ChannelAgent, EngineCallback, EngineEvent, EngineHandle, Error,
        IncomingTransaction, OutgoingTransaction, ProxyEvent, ReplyOptions, RequestEvent,
        ResponseEvent, Result, SendOptions, Transaction, TransactionCommon, TransactionConfig,
        TransactionEngine, TransactionLayer, TransactionState, TransactionToken, TransportKind,
    };
}
