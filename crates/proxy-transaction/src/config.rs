//! Configuration for the proxy transaction layer
//!
//! ```rust
//! use rvoip_proxy_transaction::config::TransactionConfig;
//! use rvoip_proxy_transaction::options::{SendOptions, TransportKind};
//!
//! let config = TransactionConfig::default()
//!     .with_default_send_options(SendOptions::new().with_transport(TransportKind::Tcp))
//!     .without_magic_cookie();
//! assert!(!config.branch_magic_cookie);
//! ```

use serde::{Deserialize, Serialize};

use crate::options::SendOptions;

/// Settings shared by every transaction created through one
/// [`TransactionLayer`](crate::layer::TransactionLayer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Options merged under the per-call options of every outgoing send.
    pub default_send_options: SendOptions,

    /// Prefix the branch handed to the engine with the RFC 3261 magic cookie.
    pub branch_magic_cookie: bool,

    /// Report every `reply()` to the agent's reply statistics.
    pub record_reply_statistics: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            default_send_options: SendOptions::default(),
            branch_magic_cookie: true,
            record_reply_statistics: true,
        }
    }
}

impl TransactionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_send_options(mut self, options: SendOptions) -> Self {
        self.default_send_options = options;
        self
    }

    pub fn without_magic_cookie(mut self) -> Self {
        self.branch_magic_cookie = false;
        self
    }

    pub fn without_reply_statistics(mut self) -> Self {
        self.record_reply_statistics = false;
        self
    }
}
