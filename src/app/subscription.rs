// SPDX-License-Identifier: Apache-2.0
//! subscription
//!
//! Layer: Application
//! Purpose:
//! - keep the host's push state in step with the local listener count
//!
//! Notes:
//! - Receiving is enabled iff the event stream handle is held and the
//!   command channel is up. Every transition happens under `state`, so
//!   concurrent add/remove calls never double-enable or skip a disable.
//! - A stream held across a dropped connection is stale; `resume` discards
//!   it and enables again.
//! - Disable failures are logged and never block teardown.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    app::{
        client::CommandClient,
        listeners::{Listener, ListenerId, ListenerRegistry},
    },
    domain::{codec, message::Message},
    error::{Error, Result},
    ports::transport::{EventStream, FrameHandler, HostTransport, StreamErrorHandler},
};

#[derive(Default)]
struct GateState {
    stream: Option<EventStream>,
}

pub struct ReceivingGate {
    transport: Arc<dyn HostTransport>,
    commands: CommandClient,
    listeners: Arc<ListenerRegistry>,
    state: Mutex<GateState>,
    receiving: AtomicBool,
    recv_pyq: AtomicBool,
}

impl ReceivingGate {
    pub fn new(transport: Arc<dyn HostTransport>, recv_pyq: bool) -> Self {
        Self {
            commands: CommandClient::new(transport.clone()),
            transport,
            listeners: Arc::new(ListenerRegistry::new()),
            state: Mutex::new(GateState::default()),
            receiving: AtomicBool::new(false),
            recv_pyq: AtomicBool::new(recv_pyq),
        }
    }

    pub fn is_receiving(&self) -> bool {
        self.receiving.load(Ordering::SeqCst) && self.transport.is_connected()
    }

    pub fn recv_pyq(&self) -> bool {
        self.recv_pyq.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Register a listener. The first one (while connected) turns receiving
    /// on; if that fails the listener is rolled back and the error returned.
    pub async fn listener_added(&self, listener: Listener) -> Result<ListenerId> {
        let mut state = self.state.lock().await;
        let (id, count) = self.listeners.insert(listener);
        debug!(listener=?id, count, "listener added");

        if count == 1 && state.stream.is_none() && self.transport.is_connected() {
            if let Err(e) = self.enable(&mut state).await {
                self.listeners.remove(id);
                return Err(e);
            }
        }
        Ok(id)
    }

    /// Unregister a listener. Removing the last one turns receiving off.
    /// Returns false if the handle was already gone.
    pub async fn listener_removed(&self, id: ListenerId) -> bool {
        let mut state = self.state.lock().await;
        match self.listeners.remove(id) {
            None => false,
            Some(count) => {
                debug!(listener=?id, count, "listener removed");
                if count == 0 {
                    self.disable(&mut state, false).await;
                }
                true
            }
        }
    }

    /// Tell the host to stop pushing and drop the event stream, whatever the
    /// current state.
    pub async fn force_disable(&self) {
        let mut state = self.state.lock().await;
        self.disable(&mut state, true).await;
    }

    /// Re-enable receiving on a fresh connection when listeners already
    /// exist. The host forgot the old subscription with the old connection,
    /// so a held stream is dropped without a disable.
    pub async fn resume(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(stale) = state.stream.take() {
            debug!("dropping event stream of the previous connection");
            stale.dispose();
            self.receiving.store(false, Ordering::SeqCst);
        }
        if !self.listeners.is_empty() {
            self.enable(&mut state).await?;
        }
        Ok(())
    }

    /// Switch the moments feed. While receiving, this is an observable
    /// disable followed by an enable with the new flag.
    pub async fn set_recv_pyq(&self, pyq: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        if self.recv_pyq.swap(pyq, Ordering::SeqCst) == pyq {
            return Ok(());
        }
        info!(recv_pyq = pyq, "moments feed toggled");
        if state.stream.is_some() {
            self.disable(&mut state, false).await;
            self.enable(&mut state).await?;
        }
        Ok(())
    }

    async fn enable(&self, state: &mut GateState) -> Result<()> {
        let pyq = self.recv_pyq();
        let status = self.commands.enable_receiving(pyq).await?;
        if status != 0 {
            warn!(status, "host refused to enable message receiving");
            return Err(Error::EnableRejected(status));
        }

        let listeners = self.listeners.clone();
        let on_frame: FrameHandler =
            Arc::new(move |frame: Bytes| match codec::decode_event(&frame) {
                Ok(raw) => listeners.dispatch(&Message::new(raw)),
                Err(e) => warn!(error=%e, len=frame.len(), "dropping undecodable event frame"),
            });
        let on_error: StreamErrorHandler =
            Arc::new(|e: &Error| warn!(error=%e, "event channel read failed"));

        match self.transport.open_event_stream(on_frame, on_error).await {
            Ok(stream) => {
                state.stream = Some(stream);
                self.receiving.store(true, Ordering::SeqCst);
                info!(recv_pyq = pyq, "message receiving enabled");
                Ok(())
            }
            Err(e) => {
                warn!(error=%e, "cannot open event channel; disabling receiving");
                if let Err(e) = self.commands.disable_receiving().await {
                    debug!(error=%e, "rollback disable failed");
                }
                Err(e)
            }
        }
    }

    async fn disable(&self, state: &mut GateState, force: bool) {
        let held = state.stream.take();
        if held.is_none() && !force {
            return;
        }

        if force || self.transport.is_connected() {
            match self.commands.disable_receiving().await {
                Ok(status) => debug!(status, "disable receiving sent"),
                Err(e) => warn!(error=%e, "disable receiving failed"),
            }
        }
        if let Some(stream) = held {
            stream.dispose();
        }
        if self.receiving.swap(false, Ordering::SeqCst) {
            info!("message receiving disabled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        app::testing::FakeHost,
        domain::wire::{response, Functions, WxMsg},
    };
    use std::sync::Mutex as StdMutex;

    fn noop() -> Listener {
        Arc::new(|_: &Message| {})
    }

    #[tokio::test]
    async fn only_boundary_transitions_reach_the_host() {
        let host = FakeHost::new();
        let gate = ReceivingGate::new(host.transport(), false);

        let a = gate.listener_added(noop()).await.unwrap();
        let b = gate.listener_added(noop()).await.unwrap();
        assert_eq!(host.count(Functions::EnableRecvTxt), 1);
        assert!(gate.is_receiving());
        assert_eq!(host.open_streams(), 1);

        assert!(gate.listener_removed(a).await);
        assert_eq!(host.count(Functions::DisableRecvTxt), 0);

        assert!(gate.listener_removed(b).await);
        assert!(!gate.listener_removed(b).await);
        assert_eq!(host.count(Functions::DisableRecvTxt), 1);
        assert!(!gate.is_receiving());
        assert_eq!(host.open_streams(), 0);
    }

    #[tokio::test]
    async fn enable_payload_carries_the_pyq_flag() {
        let host = FakeHost::new();
        let gate = ReceivingGate::new(host.transport(), true);
        gate.listener_added(noop()).await.unwrap();

        let enable = &host.requests()[0];
        assert_eq!(
            enable.msg,
            Some(crate::domain::wire::request::Msg::Flag(true))
        );
    }

    #[tokio::test]
    async fn rejected_enable_rolls_the_listener_back() {
        let host = FakeHost::new();
        host.reply(Functions::EnableRecvTxt, response::Msg::Status(-1));
        let gate = ReceivingGate::new(host.transport(), false);

        let err = gate.listener_added(noop()).await.unwrap_err();
        assert!(matches!(err, Error::EnableRejected(-1)));
        assert_eq!(gate.listener_count(), 0);
        assert!(!gate.is_receiving());
        assert_eq!(host.open_streams(), 0);
    }

    #[tokio::test]
    async fn event_stream_failure_undoes_the_enable() {
        let host = FakeHost::new();
        host.refuse_stream(true);
        let gate = ReceivingGate::new(host.transport(), false);

        assert!(gate.listener_added(noop()).await.is_err());
        assert_eq!(gate.listener_count(), 0);
        assert_eq!(
            host.calls(),
            [Functions::EnableRecvTxt, Functions::DisableRecvTxt]
        );
    }

    #[tokio::test]
    async fn listeners_added_offline_wait_for_resume() {
        let host = FakeHost::disconnected();
        let gate = ReceivingGate::new(host.transport(), false);

        gate.listener_added(noop()).await.unwrap();
        assert!(host.requests().is_empty());
        assert!(!gate.is_receiving());

        host.connect().await.unwrap();
        gate.resume().await.unwrap();
        assert_eq!(host.count(Functions::EnableRecvTxt), 1);
        assert!(gate.is_receiving());
    }

    #[tokio::test]
    async fn resume_rearms_a_stream_left_by_a_dropped_connection() {
        let host = FakeHost::new();
        let transport = host.transport();
        let gate = ReceivingGate::new(transport.clone(), false);
        gate.listener_added(noop()).await.unwrap();

        transport.close().await;
        assert!(!gate.is_receiving());

        transport.connect().await.unwrap();
        gate.resume().await.unwrap();

        assert_eq!(
            host.calls(),
            [Functions::EnableRecvTxt, Functions::EnableRecvTxt]
        );
        assert!(gate.is_receiving());
        assert_eq!(host.open_streams(), 1);
    }

    #[tokio::test]
    async fn concurrent_first_listeners_enable_once() {
        let host = FakeHost::new();
        let gate = ReceivingGate::new(host.transport(), false);

        let (a, b) = tokio::join!(gate.listener_added(noop()), gate.listener_added(noop()));
        a.unwrap();
        b.unwrap();

        assert_eq!(host.count(Functions::EnableRecvTxt), 1);
        assert_eq!(gate.listener_count(), 2);
        assert_eq!(host.open_streams(), 1);
    }

    #[tokio::test]
    async fn force_disable_always_sends() {
        let host = FakeHost::new();
        let gate = ReceivingGate::new(host.transport(), false);

        gate.force_disable().await;
        gate.force_disable().await;
        assert_eq!(host.count(Functions::DisableRecvTxt), 2);
        assert!(!gate.is_receiving());
    }

    #[tokio::test]
    async fn pyq_toggle_is_a_two_step_transition() {
        let host = FakeHost::new();
        let gate = ReceivingGate::new(host.transport(), false);

        // not receiving yet: only the flag changes
        gate.set_recv_pyq(true).await.unwrap();
        assert!(host.requests().is_empty());

        gate.listener_added(noop()).await.unwrap();
        gate.set_recv_pyq(true).await.unwrap();
        gate.set_recv_pyq(false).await.unwrap();

        assert_eq!(
            host.calls(),
            [
                Functions::EnableRecvTxt,
                Functions::DisableRecvTxt,
                Functions::EnableRecvTxt,
            ]
        );
        assert_eq!(
            host.requests()[2].msg,
            Some(crate::domain::wire::request::Msg::Flag(false))
        );
        assert!(gate.is_receiving());
        assert_eq!(host.open_streams(), 1);
    }

    #[tokio::test]
    async fn frames_fan_out_to_every_listener() {
        let host = FakeHost::new();
        let gate = ReceivingGate::new(host.transport(), false);
        let seen = Arc::new(StdMutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let seen = seen.clone();
            gate.listener_added(Arc::new(move |m: &Message| {
                seen.lock().unwrap().push(format!("{tag}:{}", m.content()));
            }))
            .await
            .unwrap();
        }

        host.push_event(WxMsg {
            id: 1,
            content: "hello".into(),
            ..Default::default()
        });

        assert_eq!(*seen.lock().unwrap(), ["a:hello", "b:hello"]);
    }
}
