//! Events handed from transactions to the proxy pipeline

use std::sync::Arc;

use rvoip_sip_core::{Method, Request, Response};

use crate::transaction::{IncomingTransaction, OutgoingTransaction, Transaction};

/// A response received on an outgoing (client) transaction
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    /// The outgoing transaction the response belongs to
    pub transaction: Arc<OutgoingTransaction>,
    /// The response, owned by the event
    pub response: Response,
}

impl ResponseEvent {
    pub fn new(transaction: Arc<OutgoingTransaction>, response: Response) -> Self {
        Self { transaction, response }
    }

    pub fn status_code(&self) -> u16 {
        self.response.status().as_u16()
    }

    /// Whether the response is final (status >= 200)
    pub fn is_final(&self) -> bool {
        self.status_code() >= 200
    }
}

/// A request correlated to an incoming (server) transaction
#[derive(Debug, Clone)]
pub struct RequestEvent {
    /// The incoming transaction the request was matched to
    pub transaction: Arc<IncomingTransaction>,
    /// The request, owned by the event
    pub request: Request,
}

impl RequestEvent {
    pub fn new(transaction: Arc<IncomingTransaction>, request: Request) -> Self {
        Self { transaction, request }
    }

    pub fn method(&self) -> Method {
        self.request.method()
    }
}

/// Any event dispatched to the agent
#[derive(Debug, Clone)]
pub enum ProxyEvent {
    Request(RequestEvent),
    Response(ResponseEvent),
}

impl ProxyEvent {
    /// The transaction that produced the event
    pub fn transaction(&self) -> Transaction {
        match self {
            ProxyEvent::Request(ev) => Transaction::Incoming(ev.transaction.clone()),
            ProxyEvent::Response(ev) => Transaction::Outgoing(ev.transaction.clone()),
        }
    }

    pub fn as_request(&self) -> Option<&RequestEvent> {
        match self {
            ProxyEvent::Request(ev) => Some(ev),
            _ => None,
        }
    }

    pub fn as_response(&self) -> Option<&ResponseEvent> {
        match self {
            ProxyEvent::Response(ev) => Some(ev),
            _ => None,
        }
    }
}

impl From<RequestEvent> for ProxyEvent {
    fn from(ev: RequestEvent) -> Self {
        ProxyEvent::Request(ev)
    }
}

impl From<ResponseEvent> for ProxyEvent {
    fn from(ev: ResponseEvent) -> Self {
        ProxyEvent::Response(ev)
    }
}
