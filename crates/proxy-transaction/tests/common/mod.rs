// Shared test fixtures: a recording transaction engine and message helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use rvoip_proxy_transaction::prelude::*;
use rvoip_sip_core::{Method, Request, Response, StatusCode, Uri};

/// Every call the transactions made on the engine, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    CreateOutgoing(EngineHandle),
    CreateIncoming(EngineHandle),
    Bind(EngineHandle),
    Unbind(EngineHandle),
    Cancel(EngineHandle),
    Destroy(EngineHandle),
    SendResponse(EngineHandle, u16),
    Reply(EngineHandle, u16),
}

struct MockContext {
    request: Request,
    callback: Option<EngineCallback>,
    status: u16,
    options: Option<SendOptions>,
    destination: Option<Uri>,
}

/// Engine double recording calls and letting tests fire callbacks
#[derive(Default)]
pub struct MockEngine {
    next_handle: AtomicU64,
    contexts: Mutex<HashMap<EngineHandle, MockContext>>,
    calls: Mutex<Vec<EngineCall>>,
    fail_create: AtomicBool,
    fail_send: AtomicBool,
    early_event: Mutex<Option<EngineEvent>>,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Deliver `event` from inside the next `create_outgoing` call.
    pub fn deliver_during_create(&self, event: EngineEvent) {
        *self.early_event.lock() = Some(event);
    }

    pub fn fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn creations(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::CreateOutgoing(_) | EngineCall::CreateIncoming(_)))
    }

    pub fn destroys(&self, handle: EngineHandle) -> usize {
        self.count(|c| *c == EngineCall::Destroy(handle))
    }

    pub fn cancels(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::Cancel(_)))
    }

    pub fn sent_options(&self, handle: EngineHandle) -> Option<SendOptions> {
        self.contexts.lock().get(&handle).and_then(|ctx| ctx.options.clone())
    }

    pub fn destination(&self, handle: EngineHandle) -> Option<Uri> {
        self.contexts.lock().get(&handle).and_then(|ctx| ctx.destination.clone())
    }

    pub fn is_live(&self, handle: EngineHandle) -> bool {
        self.contexts.lock().contains_key(&handle)
    }

    /// Callback currently bound to `handle`, as the engine would use it.
    pub fn callback(&self, handle: EngineHandle) -> Option<EngineCallback> {
        self.contexts.lock().get(&handle).and_then(|ctx| ctx.callback.clone())
    }

    /// Fire `event` on the callback bound to `handle`.
    pub fn fire(&self, handle: EngineHandle, event: EngineEvent) -> bool {
        match self.callback(handle) {
            Some(callback) => callback.deliver(event),
            None => false,
        }
    }

    /// Simulate a response arriving on a client context.
    pub fn respond(&self, handle: EngineHandle, status: StatusCode) -> bool {
        if let Some(ctx) = self.contexts.lock().get_mut(&handle) {
            ctx.status = status.as_u16();
        }
        self.fire(handle, EngineEvent::Response(Response::new(status)))
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }

    fn insert(&self, request: Request, callback: Option<EngineCallback>, options: Option<SendOptions>, destination: Option<Uri>) -> EngineHandle {
        let handle = EngineHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        self.contexts.lock().insert(
            handle,
            MockContext {
                request,
                callback,
                status: 0,
                options,
                destination,
            },
        );
        handle
    }
}

impl TransactionEngine for MockEngine {
    fn create_outgoing(
        &self,
        destination: Option<&Uri>,
        request: Request,
        options: &SendOptions,
        callback: EngineCallback,
    ) -> Result<EngineHandle> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::EngineCreation("no route to destination".to_string()));
        }
        let handle = self.insert(request, Some(callback.clone()), Some(options.clone()), destination.cloned());
        self.record(EngineCall::CreateOutgoing(handle));
        let early = self.early_event.lock().take();
        if let Some(event) = early {
            callback.deliver(event);
        }
        Ok(handle)
    }

    fn create_incoming(&self, request: Request) -> Result<EngineHandle> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::EngineCreation("malformed request".to_string()));
        }
        let handle = self.insert(request, None, None, None);
        self.record(EngineCall::CreateIncoming(handle));
        Ok(handle)
    }

    fn bind(&self, handle: EngineHandle, callback: EngineCallback) {
        if let Some(ctx) = self.contexts.lock().get_mut(&handle) {
            ctx.callback = Some(callback);
        }
        self.record(EngineCall::Bind(handle));
    }

    fn unbind(&self, handle: EngineHandle) {
        if let Some(ctx) = self.contexts.lock().get_mut(&handle) {
            ctx.callback = None;
        }
        self.record(EngineCall::Unbind(handle));
    }

    fn cancel(&self, handle: EngineHandle) {
        self.record(EngineCall::Cancel(handle));
    }

    fn destroy(&self, handle: EngineHandle) {
        self.contexts.lock().remove(&handle);
        self.record(EngineCall::Destroy(handle));
    }

    fn request_uri(&self, handle: EngineHandle) -> Option<Uri> {
        self.contexts.lock().get(&handle).map(|ctx| ctx.request.uri().clone())
    }

    fn status(&self, handle: EngineHandle) -> u16 {
        self.contexts.lock().get(&handle).map(|ctx| ctx.status).unwrap_or(0)
    }

    fn build_response(&self, handle: EngineHandle, status: StatusCode, _reason: Option<&str>) -> Result<Response> {
        if !self.is_live(handle) {
            return Err(Error::Engine(format!("unknown context {}", handle)));
        }
        Ok(Response::new(status))
    }

    fn send_response(
        &self,
        handle: EngineHandle,
        response: Response,
        destination: Option<&Uri>,
        options: &SendOptions,
    ) -> Result<()> {
        self.record(EngineCall::SendResponse(handle, response.status().as_u16()));
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(Error::Engine("transport closed".to_string()));
        }
        if let Some(ctx) = self.contexts.lock().get_mut(&handle) {
            ctx.status = response.status().as_u16();
            ctx.options = Some(options.clone());
            ctx.destination = destination.cloned();
        }
        Ok(())
    }

    fn reply(&self, handle: EngineHandle, status: StatusCode, _reason: Option<&str>, _options: &ReplyOptions) -> Result<()> {
        self.record(EngineCall::Reply(handle, status.as_u16()));
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(Error::Engine("transport closed".to_string()));
        }
        if let Some(ctx) = self.contexts.lock().get_mut(&handle) {
            ctx.status = status.as_u16();
        }
        Ok(())
    }
}

pub fn uri(s: &str) -> Uri {
    Uri::from_str(s).unwrap()
}

pub fn request(method: Method) -> Request {
    Request::new(method, uri("sip:bob@example.com"))
}

/// Engine, agent, event receiver and layer wired together
pub fn setup() -> (
    Arc<MockEngine>,
    Arc<ChannelAgent>,
    tokio::sync::mpsc::UnboundedReceiver<ProxyEvent>,
    TransactionLayer,
) {
    setup_with_config(TransactionConfig::default())
}

pub fn setup_with_config(
    config: TransactionConfig,
) -> (
    Arc<MockEngine>,
    Arc<ChannelAgent>,
    tokio::sync::mpsc::UnboundedReceiver<ProxyEvent>,
    TransactionLayer,
) {
    let engine = MockEngine::new();
    let (agent, events_rx) = ChannelAgent::new();
    let layer = TransactionLayer::new(engine.clone(), agent.clone(), config);
    (engine, agent, events_rx, layer)
}
