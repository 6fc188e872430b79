// SPDX-License-Identifier: Apache-2.0
//! wcferry
//!
//! Layer: Application
//! Purpose:
//! - engine entry point: lifecycle, subscriptions, polling operations
//! - path-based sends through the resource acquirer
//!
//! Notes:
//! - Listeners outlive connect/disconnect cycles; `start` re-enables
//!   receiving for them.
//! - `stop` cancels in-flight polling at its next attempt boundary.

use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    app::{
        client::CommandClient,
        listeners::ListenerId,
        polling::{Cancellation, DecryptPolicy, MembershipPolicy, ResultPolicy},
        subscription::ReceivingGate,
    },
    config::WcfOptions,
    domain::{
        codec::{self, DbValue},
        message::Message,
        wire::{Functions, RoomData},
    },
    error::Result,
    infra::{file_ref::FileRefAcquirer, transport_sp::SpTransport},
    ports::{
        resource::{AcquiredFile, Locator, ResourceAcquirer},
        transport::HostTransport,
    },
};

const CONTACT_DB: &str = "MicroMsg.db";

/// Handle for one registered listener.
pub struct Subscription {
    id: ListenerId,
    gate: Arc<ReceivingGate>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove the listener; the last removal turns receiving off.
    pub async fn unsubscribe(self) -> bool {
        self.gate.listener_removed(self.id).await
    }
}

pub struct Wcferry {
    options: WcfOptions,
    transport: Arc<dyn HostTransport>,
    commands: CommandClient,
    gate: Arc<ReceivingGate>,
    resources: Arc<dyn ResourceAcquirer>,
    cancel: watch::Sender<bool>,
}

impl Wcferry {
    /// Engine over the SP/TCP transport with URL/inline staging in
    /// `options.cache_dir`.
    pub fn new(options: WcfOptions) -> Result<Self> {
        let transport = Arc::new(SpTransport::new(&options));
        let resources = Arc::new(FileRefAcquirer::new(options.cache_dir.clone())?);
        Ok(Self::with_parts(options, transport, resources))
    }

    pub fn with_parts(
        options: WcfOptions,
        transport: Arc<dyn HostTransport>,
        resources: Arc<dyn ResourceAcquirer>,
    ) -> Self {
        let gate = Arc::new(ReceivingGate::new(transport.clone(), options.recv_pyq));
        let (cancel, _) = watch::channel(false);
        Self {
            commands: CommandClient::new(transport.clone()),
            options,
            transport,
            gate,
            resources,
            cancel,
        }
    }

    pub fn options(&self) -> &WcfOptions {
        &self.options
    }

    /// Single-probe command surface.
    pub fn commands(&self) -> &CommandClient {
        &self.commands
    }

    /// Connect the command channel and resume receiving for existing
    /// listeners. On failure the transport is left closed. Starting an
    /// engine that is already connected changes nothing.
    pub async fn start(&self) -> Result<()> {
        self.cancel.send_replace(false);
        if self.transport.is_connected() {
            debug!("wcferry already started");
            return Ok(());
        }
        self.transport.connect().await?;

        if let Err(e) = self.gate.resume().await {
            warn!(error=%e, "cannot resume message receiving; closing");
            self.transport.close().await;
            return Err(e);
        }
        info!(addr=%self.options.command_addr(), "wcferry started");
        Ok(())
    }

    pub async fn stop(&self) {
        self.cancel.send_replace(true);
        self.gate.force_disable().await;
        self.transport.close().await;
        info!("wcferry stopped");
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn is_receiving(&self) -> bool {
        self.gate.is_receiving()
    }

    pub fn recv_pyq(&self) -> bool {
        self.gate.recv_pyq()
    }

    pub async fn set_recv_pyq(&self, pyq: bool) -> Result<()> {
        self.gate.set_recv_pyq(pyq).await
    }

    /// Register a message listener. Messages are delivered on the event
    /// channel's task, in arrival order.
    pub async fn on<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let id = self.gate.listener_added(Arc::new(listener)).await?;
        Ok(Subscription {
            id,
            gate: self.gate.clone(),
        })
    }

    pub fn cancellation(&self) -> Cancellation {
        Cancellation::new(self.cancel.subscribe())
    }

    async fn room_record(&self, roomid: &str) -> Result<Option<RoomData>> {
        let sql = format!(
            "SELECT RoomData FROM ChatRoom WHERE ChatRoomName = '{}';",
            sql_quote(roomid)
        );
        let rows = self.commands.db_sql_query(CONTACT_DB, &sql).await?;
        match rows.first().and_then(|row| row.get("RoomData")) {
            Some(DbValue::Blob(blob)) => codec::decode_room_data(blob).map(Some),
            _ => Ok(None),
        }
    }

    async fn nicknames(&self) -> Result<BTreeMap<String, String>> {
        let rows = self
            .commands
            .db_sql_query(CONTACT_DB, "SELECT UserName, NickName FROM Contact;")
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                let wxid = row.get("UserName")?.as_text()?;
                let nick = row.get("NickName").and_then(DbValue::as_text);
                Some((wxid.to_string(), nick.unwrap_or_default().to_string()))
            })
            .collect())
    }

    /// Members of `roomid` as wxid -> display name. Empty when the room
    /// record never shows up.
    pub async fn get_chat_room_members(&self, roomid: &str) -> Result<BTreeMap<String, String>> {
        self.get_chat_room_members_with(roomid, &MembershipPolicy::default())
            .await
    }

    pub async fn get_chat_room_members_with(
        &self,
        roomid: &str,
        policy: &MembershipPolicy,
    ) -> Result<BTreeMap<String, String>> {
        let room = policy
            .run(&self.cancellation(), move || self.room_record(roomid))
            .await?;
        let Some(room) = room else {
            return Ok(BTreeMap::new());
        };

        let nicknames = if room.members.iter().any(|m| m.name.is_empty()) {
            self.nicknames().await?
        } else {
            BTreeMap::new()
        };

        Ok(room
            .members
            .into_iter()
            .map(|m| {
                let name = if m.name.is_empty() {
                    nicknames.get(&m.wxid).cloned().unwrap_or_default()
                } else {
                    m.name
                };
                (m.wxid, name)
            })
            .collect())
    }

    /// Display name of `wxid` inside `roomid`; `None` if the contact or the
    /// room is unknown, or the member set no room alias.
    pub async fn get_alias_in_chat_room(&self, wxid: &str, roomid: &str) -> Result<Option<String>> {
        let sql = format!(
            "SELECT NickName FROM Contact WHERE UserName = '{}';",
            sql_quote(wxid)
        );
        let rows = self.commands.db_sql_query(CONTACT_DB, &sql).await?;
        let known = rows
            .first()
            .and_then(|row| row.get("NickName"))
            .and_then(DbValue::as_text)
            .is_some_and(|nick| !nick.is_empty());
        if !known {
            return Ok(None);
        }

        let Some(room) = self.room_record(roomid).await? else {
            return Ok(None);
        };
        Ok(room
            .members
            .into_iter()
            .find(|m| m.wxid == wxid)
            .map(|m| m.name)
            .filter(|name| !name.is_empty()))
    }

    /// Save a voice message as MP3 under `dir` (which must exist on the
    /// host); returns the written path.
    pub async fn get_audio_msg(&self, msg_id: u64, dir: &str) -> Result<String> {
        self.get_audio_msg_with(msg_id, dir, &ResultPolicy::audio())
            .await
    }

    pub async fn get_audio_msg_with(
        &self,
        msg_id: u64,
        dir: &str,
        policy: &ResultPolicy,
    ) -> Result<String> {
        let commands = &self.commands;
        policy
            .run(&self.cancellation(), move || async move {
                let path = commands.get_audio_msg(msg_id, dir).await?;
                Ok((!path.is_empty()).then_some(path))
            })
            .await
    }

    /// Recognized text of the image at `extra`.
    pub async fn get_ocr_result(&self, extra: &str) -> Result<String> {
        self.get_ocr_result_with(extra, &ResultPolicy::ocr()).await
    }

    pub async fn get_ocr_result_with(&self, extra: &str, policy: &ResultPolicy) -> Result<String> {
        let commands = &self.commands;
        policy
            .run(&self.cancellation(), move || async move {
                let ocr = commands.exec_ocr(extra).await?;
                Ok((ocr.status == 0 && !ocr.result.is_empty()).then_some(ocr.result))
            })
            .await
    }

    /// Download the image of message `msg_id` and decrypt it into `dir`;
    /// returns the decrypted file's path.
    pub async fn download_image(&self, msg_id: u64, extra: &str, dir: &str) -> Result<String> {
        self.download_image_with(msg_id, extra, dir, &DecryptPolicy::default())
            .await
    }

    pub async fn download_image_with(
        &self,
        msg_id: u64,
        extra: &str,
        dir: &str,
        policy: &DecryptPolicy,
    ) -> Result<String> {
        let status = self.commands.download_attach(msg_id, "", extra).await?;
        if status != 0 {
            return Err(crate::error::Error::DownloadRejected(status));
        }

        let commands = &self.commands;
        policy
            .run(&self.cancellation(), move || async move {
                let path = commands.decrypt_image(extra, dir).await?;
                Ok((!path.is_empty()).then_some(path))
            })
            .await
    }

    async fn send_acquired(
        &self,
        function: Functions,
        locator: Locator,
        receiver: &str,
    ) -> Result<i32> {
        let file = self.resources.acquire(locator).await?;
        let path = file.path().to_string_lossy().into_owned();
        let sent = self.commands.send_path(function, &path, receiver).await;
        release(file, &path).await;
        sent
    }

    /// Send an image from a path, URL or inline payload. 0 = ok.
    pub async fn send_image(&self, image: Locator, receiver: &str) -> Result<i32> {
        self.send_acquired(Functions::SendImg, image, receiver)
            .await
    }

    /// Send a file from a path, URL or inline payload. 0 = ok.
    pub async fn send_file(&self, file: Locator, receiver: &str) -> Result<i32> {
        self.send_acquired(Functions::SendFile, file, receiver)
            .await
    }

    /// Send an emoticon from a path, URL or inline payload. 0 = ok.
    pub async fn send_emotion(&self, emotion: Locator, receiver: &str) -> Result<i32> {
        self.send_acquired(Functions::SendEmotion, emotion, receiver)
            .await
    }

    /// Send an XML card of type `kind`. A `cover` is staged like any other
    /// payload and removed once the host has answered. 0 = ok.
    pub async fn send_xml(
        &self,
        receiver: &str,
        content: &str,
        cover: Option<Locator>,
        kind: u64,
    ) -> Result<i32> {
        let Some(cover) = cover else {
            return self.commands.send_xml(receiver, content, None, kind).await;
        };
        let file = self.resources.acquire(cover).await?;
        let path = file.path().to_string_lossy().into_owned();
        let sent = self
            .commands
            .send_xml(receiver, content, Some(&path), kind)
            .await;
        release(file, &path).await;
        sent
    }
}

async fn release(file: AcquiredFile, path: &str) {
    if let Err(e) = file.dispose().await {
        warn!(error=%e, %path, "cannot remove staged file");
    }
}

fn sql_quote(value: &str) -> String {
    value.replace('\'', "''")
}
