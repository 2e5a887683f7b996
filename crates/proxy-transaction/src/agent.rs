//! Agent seam: where transactions deliver their events
//!
//! The agent is the proxy's routing pipeline. Transactions only keep a weak
//! reference to it, so an agent shutting down never waits on in-flight
//! transactions.
//!
//! [`ChannelAgent`] is a ready-made agent that forwards every event into a
//! tokio channel and keeps reply statistics, for hosts that run their pipeline
//! as an async task.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use rvoip_sip_core::StatusCode;
use tokio::sync::mpsc;
use tracing::warn;

use crate::events::{ProxyEvent, RequestEvent, ResponseEvent};

/// Consumer of transaction events
///
/// Implementations must not block: the methods run synchronously inside
/// engine callbacks. They may call back into the transaction carried by the
/// event (for example to cancel it).
pub trait Agent: Send + Sync {
    /// A response arrived on an outgoing transaction.
    fn send_response_event(&self, event: ResponseEvent);

    /// A correlated request (ACK, CANCEL) arrived on an incoming transaction.
    fn send_request_event(&self, event: RequestEvent);

    /// A reply is about to be sent through an incoming transaction.
    fn incr_reply_stat(&self, status: StatusCode);
}

/// Per-status-code reply counters
#[derive(Debug, Default)]
pub struct ReplyStatistics {
    counters: DashMap<u16, u64>,
}

impl ReplyStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, status: u16) {
        *self.counters.entry(status).or_insert(0) += 1;
    }

    pub fn count(&self, status: u16) -> u64 {
        self.counters.get(&status).map(|c| *c).unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counters.iter().map(|entry| *entry.value()).sum()
    }

    pub fn snapshot(&self) -> HashMap<u16, u64> {
        self.counters
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }
}

/// Agent forwarding events into an unbounded tokio channel
#[derive(Debug)]
pub struct ChannelAgent {
    events_tx: mpsc::UnboundedSender<ProxyEvent>,
    stats: ReplyStatistics,
}

impl ChannelAgent {
    /// Create the agent and the receiving end of its event channel.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ProxyEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let agent = Arc::new(Self {
            events_tx,
            stats: ReplyStatistics::new(),
        });
        (agent, events_rx)
    }

    pub fn stats(&self) -> &ReplyStatistics {
        &self.stats
    }

    fn forward(&self, event: ProxyEvent) {
        if self.events_tx.send(event).is_err() {
            warn!("Proxy event receiver dropped, discarding event");
        }
    }
}

impl Agent for ChannelAgent {
    fn send_response_event(&self, event: ResponseEvent) {
        self.forward(ProxyEvent::Response(event));
    }

    fn send_request_event(&self, event: RequestEvent) {
        self.forward(ProxyEvent::Request(event));
    }

    fn incr_reply_stat(&self, status: StatusCode) {
        self.stats.record(status.as_u16());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_statistics() {
        let stats = ReplyStatistics::new();
        stats.record(180);
        stats.record(200);
        stats.record(180);

        assert_eq!(stats.count(180), 2);
        assert_eq!(stats.count(200), 1);
        assert_eq!(stats.count(486), 0);
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.snapshot().get(&180), Some(&2));
    }

    #[test]
    fn test_channel_agent_counts_replies() {
        let (agent, _rx) = ChannelAgent::new();
        agent.incr_reply_stat(StatusCode::Trying);
        agent.incr_reply_stat(StatusCode::Ok);
        assert_eq!(agent.stats().count(100), 1);
        assert_eq!(agent.stats().count(200), 1);
    }
}
