//! End-to-end checks of the SP/TCP transport against a loopback fake host.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use bytes::Bytes;
use tokio::{net::TcpListener, sync::mpsc, time::timeout};

use wcf_bridge::{
    domain::{
        codec,
        wire::{request, response, Functions, Request, Response, RpcContact, RpcContacts, WxMsg},
    },
    infra::sp_frame::{self, PROTO_PAIR1},
    Error, SocketOptions, WcfOptions, Wcferry,
};

const MAX_FRAME: usize = 1 << 20;
const WAIT: Duration = Duration::from_secs(5);

type Responder = dyn Fn(&Request) -> Option<response::Msg> + Send + Sync;

struct FakeHost {
    port: u16,
    calls: Arc<Mutex<Vec<Functions>>>,
}

impl FakeHost {
    fn calls(&self) -> Vec<Functions> {
        self.calls.lock().unwrap().clone()
    }
}

/// Command listener on some free port P plus the event listener on P+1.
async fn bind_pair() -> (TcpListener, TcpListener) {
    for _ in 0..50 {
        let command = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = command.local_addr().unwrap().port();
        if port == u16::MAX {
            continue;
        }
        if let Ok(events) = TcpListener::bind(("127.0.0.1", port + 1)).await {
            return (command, events);
        }
    }
    panic!("no adjacent pair of free ports");
}

/// Serves commands with `respond`; an enable request pushes `event` on the
/// event channel.
async fn spawn_host(event: Option<WxMsg>, respond: Arc<Responder>) -> FakeHost {
    let (command, events) = bind_pair().await;
    let port = command.local_addr().unwrap().port();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<Bytes>();

    tokio::spawn(async move {
        let Ok((mut stream, _)) = events.accept().await else {
            return;
        };
        sp_frame::handshake(&mut stream, PROTO_PAIR1).await.unwrap();
        while let Some(frame) = push_rx.recv().await {
            if sp_frame::write_frame(&mut stream, &frame, MAX_FRAME).await.is_err() {
                return;
            }
        }
    });

    let recorded = calls.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = command.accept().await else {
                return;
            };
            sp_frame::handshake(&mut stream, PROTO_PAIR1).await.unwrap();
            while let Ok(body) = sp_frame::read_frame(&mut stream, MAX_FRAME).await {
                let req = codec::decode_request(&body).unwrap();
                let func = Functions::try_from(req.func).unwrap();
                recorded.lock().unwrap().push(func);

                if func == Functions::EnableRecvTxt {
                    if let Some(msg) = event.clone() {
                        let frame = codec::encode_response(&Response {
                            func: 0,
                            msg: Some(response::Msg::Wxmsg(msg)),
                        });
                        let _ = push_tx.send(frame);
                    }
                }

                let rsp = codec::encode_response(&Response {
                    func: req.func,
                    msg: respond(&req),
                });
                if sp_frame::write_frame(&mut stream, &rsp, MAX_FRAME).await.is_err() {
                    break;
                }
            }
        }
    });

    FakeHost { port, calls }
}

fn options(port: u16, cache: &tempfile::TempDir) -> WcfOptions {
    WcfOptions {
        port,
        socket: SocketOptions {
            recv_timeout_ms: Some(5_000),
            redial_interval_ms: 20,
            ..SocketOptions::default()
        },
        cache_dir: cache.path().to_path_buf(),
        ..WcfOptions::default()
    }
}

#[tokio::test]
async fn commands_round_trip_over_sp() {
    let host = spawn_host(
        None,
        Arc::new(|req: &Request| match Functions::try_from(req.func) {
            Ok(Functions::IsLogin) => Some(response::Msg::Status(1)),
            Ok(Functions::GetSelfWxid) => Some(response::Msg::Str("wxid_me".into())),
            _ => None,
        }),
    )
    .await;
    let cache = tempfile::tempdir().unwrap();
    let wcf = Wcferry::new(options(host.port, &cache)).unwrap();

    wcf.start().await.unwrap();
    assert!(wcf.is_connected());

    assert!(wcf.commands().is_login().await.unwrap());
    assert_eq!(wcf.commands().get_self_wxid().await.unwrap(), "wxid_me");

    wcf.stop().await;
    assert!(!wcf.is_connected());
    assert_eq!(
        host.calls(),
        [
            Functions::IsLogin,
            Functions::GetSelfWxid,
            Functions::DisableRecvTxt
        ]
    );
}

#[tokio::test]
async fn concurrent_callers_are_serialized() {
    let host = spawn_host(
        None,
        Arc::new(|req: &Request| match &req.msg {
            Some(request::Msg::Str(wxid)) => Some(response::Msg::Contacts(RpcContacts {
                contacts: vec![RpcContact {
                    wxid: wxid.clone(),
                    ..Default::default()
                }],
            })),
            _ => None,
        }),
    )
    .await;
    let cache = tempfile::tempdir().unwrap();
    let wcf = Arc::new(Wcferry::new(options(host.port, &cache)).unwrap());
    wcf.start().await.unwrap();

    let mut tasks = Vec::new();
    for n in 0..16 {
        let wcf = wcf.clone();
        tasks.push(tokio::spawn(async move {
            let wxid = format!("wxid_{n}");
            let contact = wcf.commands().get_contact(&wxid).await.unwrap();
            assert_eq!(contact.map(|c| c.wxid), Some(wxid));
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(host.calls().len(), 16);
}

#[tokio::test]
async fn messages_flow_between_enable_and_stop() {
    let host = spawn_host(
        Some(WxMsg {
            id: 99,
            is_group: true,
            roomid: "1@chatroom".into(),
            content: "hello".into(),
            ..Default::default()
        }),
        Arc::new(|_: &Request| None),
    )
    .await;
    let cache = tempfile::tempdir().unwrap();
    let wcf = Wcferry::new(options(host.port, &cache)).unwrap();
    wcf.start().await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = wcf
        .on(move |msg| {
            let _ = tx.send((msg.id(), msg.content().to_string()));
        })
        .await
        .unwrap();
    assert!(wcf.is_receiving());

    let got = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(got, (99, "hello".to_string()));

    wcf.stop().await;
    assert!(!wcf.is_receiving());
    assert_eq!(
        host.calls(),
        [Functions::EnableRecvTxt, Functions::DisableRecvTxt]
    );
}

#[tokio::test]
async fn nothing_listening_fails_start() {
    let port = {
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        probe.local_addr().unwrap().port()
    };
    let cache = tempfile::tempdir().unwrap();
    let wcf = Wcferry::new(options(port, &cache)).unwrap();

    let err = wcf.start().await.unwrap_err();
    assert!(matches!(err, Error::Connect { .. }));
    assert!(!wcf.is_connected());
    assert!(matches!(
        wcf.commands().get_self_wxid().await,
        Err(Error::NotConnected)
    ));
}

#[tokio::test]
async fn a_dropped_command_stream_disconnects() {
    let (command, _events) = bind_pair().await;
    let port = command.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut stream, _) = command.accept().await.unwrap();
        sp_frame::handshake(&mut stream, PROTO_PAIR1).await.unwrap();
        // read one request, then hang up without answering
        let _ = sp_frame::read_frame(&mut stream, MAX_FRAME).await;
    });

    let cache = tempfile::tempdir().unwrap();
    let wcf = Wcferry::new(options(port, &cache)).unwrap();
    wcf.start().await.unwrap();

    let err = wcf.commands().get_self_wxid().await.unwrap_err();
    assert!(err.breaks_connection(), "unexpected error {err:?}");
    assert!(!wcf.is_connected());
}
