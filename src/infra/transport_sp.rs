// SPDX-License-Identifier: Apache-2.0
//! transport_sp
//!
//! Layer: Infrastructure
//! Purpose:
//! - `HostTransport` over SP/TCP: command channel at `port`, event channel
//!   at `port + 1`
//!
//! Notes:
//! - The command stream sits behind an async mutex: one request, one reply,
//!   callers queue.
//! - An I/O failure or timeout mid-command drops the command stream; the
//!   caller gets the error and the transport reports disconnected.
//! - The event loop re-dials on `redial_interval` until disposed.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::{io::AsyncWriteExt, net::TcpStream, sync::watch, sync::Mutex, time};
use tracing::{debug, info, warn};

use crate::{
    config::{SocketOptions, WcfOptions},
    error::{Error, Result},
    infra::sp_frame::{self, PROTO_PAIR1},
    ports::transport::{EventStream, FrameHandler, HostTransport, StreamErrorHandler},
};

pub struct SpTransport {
    command_addr: String,
    event_addr: String,
    socket: Arc<SocketOptions>,
    command: Mutex<Option<TcpStream>>,
    connected: AtomicBool,
}

impl SpTransport {
    pub fn new(options: &WcfOptions) -> Self {
        Self {
            command_addr: options.command_addr(),
            event_addr: options.event_addr(),
            socket: Arc::new(options.socket.clone()),
            command: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    async fn exchange(&self, stream: &mut TcpStream, request: &[u8]) -> Result<Bytes> {
        let max = self.socket.max_frame_size;
        bounded(
            self.socket.send_timeout(),
            sp_frame::write_frame(stream, request, max),
        )
        .await?;
        bounded(self.socket.recv_timeout(), sp_frame::read_frame(stream, max)).await
    }
}

/// Open a TCP stream to `addr` and complete the PAIR v1 handshake.
async fn dial(addr: &str, socket: &SocketOptions) -> Result<TcpStream> {
    let limit = socket.connect_timeout();
    let connect_err = |source: std::io::Error| Error::Connect {
        addr: addr.to_string(),
        source,
    };

    let mut stream = time::timeout(limit, TcpStream::connect(addr))
        .await
        .map_err(|_| connect_err(std::io::ErrorKind::TimedOut.into()))?
        .map_err(connect_err)?;
    stream.set_nodelay(true)?;

    time::timeout(limit, sp_frame::handshake(&mut stream, PROTO_PAIR1))
        .await
        .map_err(|_| Error::Handshake(format!("no SP header from {addr} within {limit:?}")))??;
    Ok(stream)
}

async fn bounded<T>(limit: Option<Duration>, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match limit {
        Some(limit) => time::timeout(limit, fut)
            .await
            .map_err(|_| Error::CommandTimeout(limit))?,
        None => fut.await,
    }
}

impl HostTransport for SpTransport {
    fn connect(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut command = self.command.lock().await;
            if command.is_some() {
                return Ok(());
            }

            let stream = dial(&self.command_addr, &self.socket).await?;
            *command = Some(stream);
            self.connected.store(true, Ordering::SeqCst);
            info!(addr=%self.command_addr, "command channel connected");
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut command = self.command.lock().await;
            self.connected.store(false, Ordering::SeqCst);
            if let Some(mut stream) = command.take() {
                if let Err(e) = stream.shutdown().await {
                    debug!(error=%e, "command channel shutdown");
                }
                info!(addr=%self.command_addr, "command channel closed");
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send_command(&self, request: Bytes) -> BoxFuture<'_, Result<Bytes>> {
        Box::pin(async move {
            let mut command = self.command.lock().await;
            let stream = command.as_mut().ok_or(Error::NotConnected)?;

            let reply = self.exchange(stream, &request).await;
            if let Err(e) = &reply {
                if e.breaks_connection() {
                    warn!(addr=%self.command_addr, error=%e, "command channel broken; dropping it");
                    *command = None;
                    self.connected.store(false, Ordering::SeqCst);
                }
            }
            reply
        })
    }

    fn open_event_stream(
        &self,
        on_frame: FrameHandler,
        on_error: StreamErrorHandler,
    ) -> BoxFuture<'_, Result<EventStream>> {
        Box::pin(async move {
            let (stop_tx, stop_rx) = watch::channel(false);
            tokio::spawn(run_event_loop(
                self.event_addr.clone(),
                self.socket.clone(),
                on_frame,
                on_error,
                stop_rx,
            ));
            Ok(EventStream::new(stop_tx))
        })
    }
}

async fn run_event_loop(
    addr: String,
    socket: Arc<SocketOptions>,
    on_frame: FrameHandler,
    on_error: StreamErrorHandler,
    mut stop: watch::Receiver<bool>,
) {
    while !*stop.borrow() {
        let dialed = tokio::select! {
            _ = stop.changed() => break,
            r = dial(&addr, &socket) => r,
        };

        match dialed {
            Ok(mut stream) => {
                info!(%addr, "event channel connected");
                loop {
                    let frame = tokio::select! {
                        _ = stop.changed() => {
                            debug!(%addr, "event loop stopped");
                            return;
                        }
                        r = sp_frame::read_frame(&mut stream, socket.max_frame_size) => r,
                    };
                    match frame {
                        Ok(frame) => on_frame(frame),
                        Err(e) => {
                            on_error(&e);
                            break;
                        }
                    }
                }
            }
            Err(e) => debug!(%addr, error=%e, "event channel not reachable yet"),
        }

        tokio::select! {
            _ = stop.changed() => break,
            _ = time::sleep(socket.redial_interval()) => {}
        }
    }
    debug!(%addr, "event loop stopped");
}
