//! Per-call protocol options for sending requests and replying
//!
//! The engine accepts an open set of protocol knobs on every send. They are
//! modelled here as plain structs with named optional fields and `with_*`
//! builders, passed by reference to the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport to force for an outgoing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Udp,
    Tcp,
    Tls,
    Ws,
    Wss,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportKind::Udp => "UDP",
            TransportKind::Tcp => "TCP",
            TransportKind::Tls => "TLS",
            TransportKind::Ws => "WS",
            TransportKind::Wss => "WSS",
        };
        f.write_str(s)
    }
}

/// Options applied when a message is handed to the engine for sending
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOptions {
    /// Branch to use in the top `Via`. Outgoing transactions fill in their
    /// own branch when this is unset.
    pub branch: Option<String>,
    /// Transport to force instead of the one resolved from the destination.
    pub transport: Option<TransportKind>,
    /// Extra headers appended to the message, in order.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Fill the unset fields of `self` from `defaults`.
    ///
    /// Scalar fields set on `self` win. Default headers come first, followed
    /// by the per-call ones.
    pub fn merged_with(&self, defaults: &SendOptions) -> SendOptions {
        let mut headers = defaults.headers.clone();
        headers.extend(self.headers.iter().cloned());
        SendOptions {
            branch: self.branch.clone().or_else(|| defaults.branch.clone()),
            transport: self.transport.or(defaults.transport),
            headers,
        }
    }
}

/// Options for a reply built and sent by the engine in one step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyOptions {
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub body: Option<String>,
}

impl ReplyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = Some(body.into());
        self
    }
}
