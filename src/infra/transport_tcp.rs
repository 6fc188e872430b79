// SPDX-License-Identifier: Apache-2.0
//! transport_tcp
//!
//! Layer: Infrastructure
//! Purpose:
//! - JSONL façade over TCP: allow-listed engine calls plus pushed messages
//!
//! Notes:
//! - Each connection gets its own writer task fed by a queue; calls run on
//!   their own tasks and answer by id, so a slow poll never blocks the line.
//! - A connection's message subscription is removed when it goes away.

use std::{
    net::SocketAddr,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{tcp::OwnedWriteHalf, TcpListener, TcpStream},
    sync::mpsc,
};
use tracing::{debug, info, warn};

use crate::{
    app::{BridgeService, Subscription},
    domain::{
        message::Message,
        protocol::{code, ClientRequest, ServerResponse},
    },
};

const PROTOCOL_VERSION: &str = "0.1";
const HELLO_ACK_TIMEOUT: Duration = Duration::from_secs(3);
/// Lines queued per connection before pushed messages start to drop.
const OUTBOUND_QUEUE: usize = 1024;

/// TCP server for JSONL (one JSON object per line).
pub struct FacadeServer {
    addr: SocketAddr,
    next_conn_id: AtomicU64,
}

impl FacadeServer {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            next_conn_id: AtomicU64::new(1),
        }
    }

    pub async fn run(&self, service: BridgeService) -> Result<()> {
        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("failed to bind TCP listener on {}", self.addr))?;
        self.serve(listener, service).await
    }

    /// Accept loop over an already-bound listener.
    pub async fn serve(&self, listener: TcpListener, service: BridgeService) -> Result<()> {
        info!(addr=%listener.local_addr()?, "façade listening (jsonl)");

        loop {
            let (stream, peer) = listener.accept().await?;
            let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);

            info!(%conn_id, %peer, "client connected");

            let svc = service.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(conn_id, peer, stream, svc).await {
                    warn!(%conn_id, %peer, error=%e, "client handler ended");
                } else {
                    info!(%conn_id, %peer, "client handler ended");
                }
            });
        }
    }
}

async fn handle_connection(
    conn_id: u64,
    peer: SocketAddr,
    stream: TcpStream,
    service: BridgeService,
) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let (tx, rx) = mpsc::channel::<ServerResponse>(OUTBOUND_QUEUE);
    let writer = tokio::spawn(write_loop(write_half, rx));

    // Send Hello immediately
    tx.send(ServerResponse::Hello {
        version: PROTOCOL_VERSION.to_string(),
        features: vec!["tcp".into(), "jsonl".into(), "messages".into()],
        server_name: "wcf-bridge".to_string(),
    })
    .await
    .context("writer gone before hello")?;

    let mut subscription: Option<Subscription> = None;
    let result = async {
        expect_hello_ack(conn_id, peer, &mut reader).await?;
        read_loop(conn_id, peer, &mut reader, &tx, &service, &mut subscription).await
    }
    .await;

    if let Some(sub) = subscription.take() {
        sub.unsubscribe().await;
        debug!(%conn_id, %peer, "message subscription removed");
    }
    drop(tx);
    writer.abort();
    result
}

async fn expect_hello_ack(
    conn_id: u64,
    peer: SocketAddr,
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
) -> Result<()> {
    let mut first = String::new();
    let n = tokio::time::timeout(HELLO_ACK_TIMEOUT, reader.read_line(&mut first))
        .await
        .context("hello_ack timeout")??;

    if n == 0 {
        anyhow::bail!("client disconnected before hello_ack");
    }

    let raw = first.trim_end_matches(&['\r', '\n'][..]);
    let req: ClientRequest = serde_json::from_str(raw).context("invalid hello_ack json")?;

    match req {
        ClientRequest::HelloAck { client, protocol } => {
            info!(%conn_id, %peer, %client, %protocol, "hello_ack received");
            Ok(())
        }
        other => anyhow::bail!("expected hello_ack, got: {:?}", other),
    }
}

async fn read_loop(
    conn_id: u64,
    peer: SocketAddr,
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
    tx: &mpsc::Sender<ServerResponse>,
    service: &BridgeService,
    subscription: &mut Option<Subscription>,
) -> Result<()> {
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            debug!(%conn_id, %peer, "client EOF");
            return Ok(());
        }

        let raw = line.trim_end_matches(&['\r', '\n'][..]);
        if raw.is_empty() {
            continue;
        }
        debug!(%conn_id, %peer, %raw, "rx line");

        let req: ClientRequest = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(%conn_id, %peer, error=%e, %raw, "bad json request");
                reply(
                    tx,
                    ServerResponse::Error {
                        id: None,
                        message: format!("invalid json request: {e}"),
                        code: code::PROTOCOL,
                    },
                )
                .await?;
                continue;
            }
        };

        match req {
            ClientRequest::Ping { id } => reply(tx, ServerResponse::Pong { id }).await?,
            ClientRequest::HelloAck { .. } => {
                reply(
                    tx,
                    ServerResponse::Error {
                        id: None,
                        message: "hello_ack already received".to_string(),
                        code: code::PROTOCOL,
                    },
                )
                .await?
            }
            ClientRequest::Call { id, method, params } => {
                let svc = service.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let resp = match svc.invoke(&method, params).await {
                        Ok(result) => ServerResponse::Result { id, result },
                        Err(e) => {
                            debug!(%conn_id, id, %method, error=%e, "call failed");
                            ServerResponse::Error {
                                id: Some(id),
                                message: e.message,
                                code: e.code,
                            }
                        }
                    };
                    if tx.send(resp).await.is_err() {
                        debug!(%conn_id, id, "connection gone before call finished");
                    }
                });
            }
            ClientRequest::MessageEnable { id } => {
                let resp = if subscription.is_some() {
                    ok(id)
                } else {
                    match service.subscribe(push_to(conn_id, tx.clone())).await {
                        Ok(sub) => {
                            info!(%conn_id, %peer, "message push enabled");
                            *subscription = Some(sub);
                            ok(id)
                        }
                        Err(e) => ServerResponse::Error {
                            id: Some(id),
                            message: e.to_string(),
                            code: code::SUBSCRIPTION,
                        },
                    }
                };
                reply(tx, resp).await?;
            }
            ClientRequest::MessageDisable { id } => {
                if let Some(sub) = subscription.take() {
                    sub.unsubscribe().await;
                    info!(%conn_id, %peer, "message push disabled");
                }
                reply(tx, ok(id)).await?;
            }
            ClientRequest::RecvPyq { id, enabled } => {
                let resp = match service.set_recv_pyq(enabled).await {
                    Ok(()) => ok(id),
                    Err(e) => ServerResponse::Error {
                        id: Some(id),
                        message: e.to_string(),
                        code: code::EXECUTION,
                    },
                };
                reply(tx, resp).await?;
            }
        }
    }
}

fn ok(id: u64) -> ServerResponse {
    ServerResponse::Result {
        id,
        result: Value::Bool(true),
    }
}

/// Listener that forwards pushed messages to one connection's writer.
fn push_to(conn_id: u64, tx: mpsc::Sender<ServerResponse>) -> impl Fn(&Message) + Send + Sync {
    move |msg: &Message| {
        let data = match serde_json::to_value(msg.raw()) {
            Ok(data) => data,
            Err(e) => {
                warn!(%conn_id, error=%e, "cannot encode message");
                return;
            }
        };
        if tx.try_send(ServerResponse::Message { data }).is_err() {
            warn!(%conn_id, msg_id = msg.id(), "client not keeping up; message dropped");
        }
    }
}

async fn reply(tx: &mpsc::Sender<ServerResponse>, resp: ServerResponse) -> Result<()> {
    tx.send(resp).await.context("connection writer stopped")
}

async fn write_loop(mut w: OwnedWriteHalf, mut rx: mpsc::Receiver<ServerResponse>) -> Result<()> {
    while let Some(msg) = rx.recv().await {
        write_jsonl(&mut w, &msg).await?;
    }
    Ok(())
}

/// Serialize and write one JSONL response.
async fn write_jsonl<W: AsyncWriteExt + Unpin>(w: &mut W, msg: &ServerResponse) -> Result<()> {
    let mut s = serde_json::to_string(msg)?;
    s.push('\n');
    w.write_all(s.as_bytes()).await?;
    w.flush().await?;
    Ok(())
}
