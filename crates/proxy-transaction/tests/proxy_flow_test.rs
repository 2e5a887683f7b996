//! Proxy Flow Tests
//!
//! End-to-end scenarios running a server transaction and its forwarded
//! client transaction through one agent, the way a stateful proxy does.

mod common;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rvoip_proxy_transaction::prelude::*;
use rvoip_sip_core::{Method, StatusCode};
use tokio::time::timeout;

use common::{request, setup};

/// Test the reply sequence of a server transaction and its statistics
#[tokio::test]
async fn test_reply_sequence_and_statistics() {
    let (engine, agent, _rx, layer) = setup();
    let tx = IncomingTransaction::create(&layer);
    tx.handle(&request(Method::Invite)).unwrap();
    let handle = tx.engine_handle().unwrap();

    tx.reply(StatusCode::Ringing, Some("Ringing"), &ReplyOptions::default()).unwrap();
    assert_eq!(tx.state(), TransactionState::Active);
    assert_eq!(agent.stats().count(180), 1);

    tx.reply(StatusCode::Ok, Some("OK"), &ReplyOptions::default()).unwrap();
    assert!(tx.is_terminated());
    assert_eq!(agent.stats().count(200), 1);

    let late = tx.reply(StatusCode::BusyHere, Some("Busy"), &ReplyOptions::default());
    assert_eq!(late, Err(Error::Terminated));
    assert_eq!(agent.stats().count(486), 0);
    assert_eq!(agent.stats().total(), 2);
    assert_eq!(engine.destroys(handle), 1);
    assert_eq!(layer.active_transactions(), 0);
}

/// Test a forwarded INVITE: responses flow back, then the pipeline relays
/// them on the server transaction
#[tokio::test]
async fn test_forwarded_invite_round_trip() {
    let (engine, agent, mut rx, layer) = setup();
    let invite = request(Method::Invite);

    let server_tx = layer.create_incoming();
    server_tx.handle(&invite).unwrap();
    server_tx.reply(StatusCode::Trying, None, &ReplyOptions::default()).unwrap();

    let client_tx = layer.create_outgoing();
    client_tx.set_incoming(server_tx.clone());
    server_tx.set_outgoing(client_tx.clone());
    client_tx.send(&invite, None, &SendOptions::default()).unwrap();
    assert_eq!(layer.active_transactions(), 2);
    assert!(Arc::ptr_eq(&client_tx.incoming().unwrap(), &server_tx));

    let client_handle = client_tx.engine_handle().unwrap();
    drop(client_tx);

    // The engine answers from another task
    let remote = engine.clone();
    tokio::spawn(async move {
        remote.respond(client_handle, StatusCode::Ringing);
        remote.respond(client_handle, StatusCode::Ok);
    });

    let mut relayed = Vec::new();
    while relayed.len() < 2 {
        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for response event")
            .expect("event channel closed");
        let ProxyEvent::Response(response_event) = event else {
            panic!("unexpected request event");
        };

        let status = response_event.status_code();
        let response = server_tx
            .create_response(response_event.response.status(), None)
            .unwrap();
        server_tx.send(&response, None, &SendOptions::default()).unwrap();
        relayed.push(status);
    }

    assert_eq!(relayed, vec![180, 200]);
    assert_eq!(layer.active_transactions(), 0);
    assert_eq!(agent.stats().count(100), 1);
    assert_eq!(engine.count(|c| matches!(c, common::EngineCall::Destroy(_))), 2);
}

/// Test a CANCEL from upstream is relayed as a cancel of the forwarded leg
#[tokio::test]
async fn test_upstream_cancel_cancels_forwarded_leg() -> anyhow::Result<()> {
    let (engine, _agent, mut rx, layer) = setup();
    let invite = request(Method::Invite);

    let server_tx = IncomingTransaction::create(&layer);
    server_tx.handle(&invite)?;
    let server_handle = server_tx.engine_handle().unwrap();

    let client_tx = OutgoingTransaction::create(&layer);
    server_tx.set_outgoing(client_tx.clone());
    client_tx.send(&invite, None, &SendOptions::default())?;

    assert!(engine.fire(server_handle, EngineEvent::Request(request(Method::Cancel))));
    assert!(server_tx.is_terminated());

    let event = rx.recv().await.unwrap();
    let cancel = event.as_request().unwrap();
    assert_eq!(cancel.method(), Method::Cancel);
    assert!(matches!(event.transaction(), Transaction::Incoming(_)));

    // The server side dropped its peer when it terminated
    assert!(cancel.transaction.outgoing().is_none());
    client_tx.send(&cancel.request, None, &SendOptions::default())?;

    assert!(client_tx.is_terminated());
    assert_eq!(engine.cancels(), 1);
    assert_eq!(layer.active_transactions(), 0);
    assert!(Arc::ptr_eq(&cancel.transaction, &server_tx));
    Ok(())
}

/// Test events keep flowing only while the agent is alive
#[tokio::test]
async fn test_agent_gone() {
    let (engine, agent, rx, layer) = setup();
    let tx = OutgoingTransaction::create(&layer);
    tx.send(&request(Method::Invite), None, &SendOptions::default()).unwrap();
    let handle = tx.engine_handle().unwrap();

    drop(rx);
    drop(agent);

    // Delivery still drives the lifecycle
    assert!(engine.respond(handle, StatusCode::Ok));
    assert!(tx.is_terminated());
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Test replies without an agent still go out, and the warning names the
/// skipped statistics rather than an event
#[tokio::test]
async fn test_reply_without_agent_warns_about_statistics() {
    let (engine, agent, _rx, layer) = setup();
    let tx = IncomingTransaction::create(&layer);
    tx.handle(&request(Method::Invite)).unwrap();
    let handle = tx.engine_handle().unwrap();
    drop(agent);

    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        tx.reply(StatusCode::BusyHere, None, &ReplyOptions::default())
    });

    assert!(result.is_ok());
    assert!(tx.is_terminated());
    assert_eq!(engine.count(|c| *c == common::EngineCall::Reply(handle, 486)), 1);

    let text = logs.text();
    assert!(text.contains("Agent is gone"));
    assert!(text.contains("reply statistics"));
    assert!(!text.contains("event"));
}
