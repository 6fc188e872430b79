// SPDX-License-Identifier: Apache-2.0
//! transport
//!
//! Layer: Ports
//! Purpose:
//! - command/event channel contract the engine drives
//!
//! Notes:
//! - `send_command` is strictly one request, one reply. Implementations
//!   serialize concurrent callers; they never pipeline.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::error::{Error, Result};

/// Called with each raw frame read from the event channel, in arrival order.
pub type FrameHandler = Arc<dyn Fn(Bytes) + Send + Sync>;

/// Called when the event channel read loop hits an error.
pub type StreamErrorHandler = Arc<dyn Fn(&Error) + Send + Sync>;

/// Outbound port to the host.
///
/// Async (BoxFuture) to avoid async-trait.
pub trait HostTransport: Send + Sync {
    /// Open the command channel. Fails fast; no retry.
    fn connect(&self) -> BoxFuture<'_, Result<()>>;

    /// Close the command channel. Idempotent.
    fn close(&self) -> BoxFuture<'_, ()>;

    fn is_connected(&self) -> bool;

    /// Write one request and wait for its reply.
    fn send_command(&self, request: Bytes) -> BoxFuture<'_, Result<Bytes>>;

    /// Start the event channel read loop. Runs until the returned handle is
    /// disposed or dropped.
    fn open_event_stream(
        &self,
        on_frame: FrameHandler,
        on_error: StreamErrorHandler,
    ) -> BoxFuture<'_, Result<EventStream>>;
}

/// Disposer for a running event read loop.
#[derive(Debug)]
pub struct EventStream {
    stop: watch::Sender<bool>,
}

impl EventStream {
    /// `stop` is flipped to `true` on dispose; the loop must watch it.
    pub fn new(stop: watch::Sender<bool>) -> Self {
        Self { stop }
    }

    pub fn dispose(self) {
        // Drop does the work.
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.stop.send_replace(true);
    }
}
