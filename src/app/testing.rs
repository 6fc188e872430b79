// SPDX-License-Identifier: Apache-2.0
//! testing
//!
//! Layer: Application (test support)
//! Purpose:
//! - scripted in-memory host for application tests
//!
//! Notes:
//! - Commands yield once before answering so concurrent callers interleave.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::{
    domain::{
        codec,
        wire::{response, Functions, Request, Response, WxMsg},
    },
    error::{Error, Result},
    ports::transport::{EventStream, FrameHandler, HostTransport, StreamErrorHandler},
};

type Responder = Box<dyn Fn(&Request) -> Option<response::Msg> + Send + Sync>;

#[derive(Default)]
struct State {
    sticky: HashMap<i32, response::Msg>,
    queued: HashMap<i32, VecDeque<Option<response::Msg>>>,
    responder: Option<Responder>,
    requests: Vec<Request>,
    streams: Vec<(FrameHandler, watch::Receiver<bool>)>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    connected: AtomicBool,
    refuse_connect: AtomicBool,
    refuse_stream: AtomicBool,
}

/// Fake host: records requests, answers from a script, pushes events.
#[derive(Clone, Default)]
pub(crate) struct FakeHost {
    inner: Arc<Inner>,
}

impl FakeHost {
    /// A host whose command channel is already open.
    pub fn new() -> Self {
        let host = Self::default();
        host.inner.connected.store(true, Ordering::SeqCst);
        host
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn transport(&self) -> Arc<dyn HostTransport> {
        Arc::new(self.clone())
    }

    /// Answer every `function` request with `msg` (after any queued replies).
    pub fn reply(&self, function: Functions, msg: response::Msg) {
        self.lock().sticky.insert(function as i32, msg);
    }

    /// Answer the next `function` requests with `replies`, in order.
    pub fn reply_seq(&self, function: Functions, replies: Vec<Option<response::Msg>>) {
        self.lock()
            .queued
            .entry(function as i32)
            .or_default()
            .extend(replies);
    }

    /// Full control: consulted before the scripted replies.
    pub fn respond_with(
        &self,
        f: impl Fn(&Request) -> Option<response::Msg> + Send + Sync + 'static,
    ) {
        self.lock().responder = Some(Box::new(f));
    }

    pub fn refuse_connect(&self, refuse: bool) {
        self.inner.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    pub fn refuse_stream(&self, refuse: bool) {
        self.inner.refuse_stream.store(refuse, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    pub fn count(&self, function: Functions) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.func == function as i32)
            .count()
    }

    /// Functions of the recorded requests, in order.
    pub fn calls(&self) -> Vec<Functions> {
        self.lock()
            .requests
            .iter()
            .filter_map(|r| Functions::try_from(r.func).ok())
            .collect()
    }

    pub fn open_streams(&self) -> usize {
        self.lock()
            .streams
            .iter()
            .filter(|(_, stop)| !*stop.borrow())
            .count()
    }

    /// Push one message to every live event stream.
    pub fn push_event(&self, msg: WxMsg) {
        let frame = codec::encode_response(&Response {
            func: 0,
            msg: Some(response::Msg::Wxmsg(msg)),
        });
        let handlers: Vec<FrameHandler> = self
            .lock()
            .streams
            .iter()
            .filter(|(_, stop)| !*stop.borrow())
            .map(|(handler, _)| handler.clone())
            .collect();
        for handler in handlers {
            handler(frame.clone());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.state.lock().unwrap()
    }

    fn answer(&self, req: &Request) -> Option<response::Msg> {
        let mut state = self.lock();
        if let Some(msg) = state.responder.as_ref().and_then(|f| f(req)) {
            return Some(msg);
        }
        if let Some(next) = state.queued.get_mut(&req.func).and_then(VecDeque::pop_front) {
            return next;
        }
        state.sticky.get(&req.func).cloned()
    }
}

impl HostTransport for FakeHost {
    fn connect(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.inner.refuse_connect.load(Ordering::SeqCst) {
                return Err(Error::Connect {
                    addr: "fake".into(),
                    source: std::io::ErrorKind::ConnectionRefused.into(),
                });
            }
            self.inner.connected.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.inner.connected.store(false, Ordering::SeqCst);
        })
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    fn send_command(&self, request: Bytes) -> BoxFuture<'_, Result<Bytes>> {
        Box::pin(async move {
            if !self.is_connected() {
                return Err(Error::NotConnected);
            }
            tokio::task::yield_now().await;
            let req = codec::decode_request(&request)?;
            self.lock().requests.push(req.clone());
            let msg = self.answer(&req);
            Ok(codec::encode_response(&Response { func: req.func, msg }))
        })
    }

    fn open_event_stream(
        &self,
        on_frame: FrameHandler,
        _on_error: StreamErrorHandler,
    ) -> BoxFuture<'_, Result<EventStream>> {
        Box::pin(async move {
            if self.inner.refuse_stream.load(Ordering::SeqCst) {
                return Err(Error::Connect {
                    addr: "fake:events".into(),
                    source: std::io::ErrorKind::ConnectionRefused.into(),
                });
            }
            let (tx, rx) = watch::channel(false);
            self.lock().streams.push((on_frame, rx));
            Ok(EventStream::new(tx))
        })
    }
}
