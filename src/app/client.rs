// SPDX-License-Identifier: Apache-2.0
//! client
//!
//! Layer: Application
//! Purpose:
//! - typed command surface: one method per host function
//!
//! Notes:
//! - Status codes are returned as data. Their meaning differs per function
//!   (0 = ok for sends, 1 = ok for room/friend/transfer operations).
//! - Polling operations (membership, audio, OCR, image download) live on
//!   `Wcferry`; the methods here are single probes.

use std::{collections::BTreeMap, sync::Arc};

use tracing::debug;

use crate::{
    domain::{
        codec::{self, Reply, Row},
        contacts,
        wire::{
            request::Msg, AttachMsg, AudioMsg, DbQuery, DbTable, DecPath, ForwardMsg,
            Functions, MemberMgmt, OcrMsg, PatMsg, PathMsg, Request, RichText, RpcContact,
            TextMsg, Transfer, UserInfo, Verification, XmlMsg,
        },
    },
    error::Result,
    ports::transport::HostTransport,
};

/// Rich-text (link card) message fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct RichTextCard {
    pub name: String,
    pub account: String,
    pub title: String,
    pub digest: String,
    pub url: String,
    pub thumburl: String,
}

#[derive(Clone)]
pub struct CommandClient {
    transport: Arc<dyn HostTransport>,
}

impl CommandClient {
    pub fn new(transport: Arc<dyn HostTransport>) -> Self {
        Self { transport }
    }

    /// Send one request and decode its reply.
    pub async fn call(&self, function: Functions, msg: Option<Msg>) -> Result<Reply> {
        debug!(?function, payload=?msg, "command");
        let req = Request {
            func: function as i32,
            msg,
        };
        let rsp = self
            .transport
            .send_command(codec::encode_request(&req))
            .await?;
        codec::decode_response(function, &rsp)
    }

    async fn status(&self, function: Functions, msg: Msg) -> Result<i32> {
        self.call(function, Some(msg)).await?.into_status()
    }

    pub async fn is_login(&self) -> Result<bool> {
        Ok(self.call(Functions::IsLogin, None).await?.into_status()? == 1)
    }

    pub async fn get_self_wxid(&self) -> Result<String> {
        self.call(Functions::GetSelfWxid, None).await?.into_str()
    }

    pub async fn get_user_info(&self) -> Result<UserInfo> {
        self.call(Functions::GetUserInfo, None)
            .await?
            .into_user_info()
    }

    pub async fn get_contacts(&self) -> Result<Vec<RpcContact>> {
        self.call(Functions::GetContacts, None)
            .await?
            .into_contacts()
    }

    /// Full contact card for one wxid; `None` when the host knows nothing.
    pub async fn get_contact(&self, wxid: &str) -> Result<Option<RpcContact>> {
        let contacts = self
            .call(Functions::GetContactInfo, Some(Msg::Str(wxid.to_string())))
            .await?
            .into_contacts()?;
        Ok(contacts.into_iter().next())
    }

    pub async fn get_chat_rooms(&self) -> Result<Vec<RpcContact>> {
        Ok(contacts::chat_rooms(self.get_contacts().await?))
    }

    pub async fn get_friends(&self) -> Result<Vec<RpcContact>> {
        Ok(contacts::friends(self.get_contacts().await?))
    }

    pub async fn get_db_names(&self) -> Result<Vec<String>> {
        self.call(Functions::GetDbNames, None)
            .await?
            .into_db_names()
    }

    pub async fn get_db_tables(&self, db: &str) -> Result<Vec<DbTable>> {
        self.call(Functions::GetDbTables, Some(Msg::Str(db.to_string())))
            .await?
            .into_db_tables()
    }

    pub async fn db_sql_query(&self, db: &str, sql: &str) -> Result<Vec<Row>> {
        let query = DbQuery {
            db: db.to_string(),
            sql: sql.to_string(),
        };
        self.call(Functions::ExecDbQuery, Some(Msg::Query(query)))
            .await?
            .into_rows()
    }

    pub async fn get_msg_types(&self) -> Result<BTreeMap<i32, String>> {
        self.call(Functions::GetMsgTypes, None).await?.into_types()
    }

    /// Refresh the moments feed starting at `id` (0 for the latest). 1 = ok.
    pub async fn refresh_pyq(&self, id: u64) -> Result<i32> {
        self.status(Functions::RefreshPyq, Msg::Ui64(id)).await
    }

    async fn room_members(
        &self,
        function: Functions,
        roomid: &str,
        wxids: &[String],
    ) -> Result<i32> {
        let m = MemberMgmt {
            roomid: roomid.to_string(),
            wxids: contacts::join_wxids(wxids),
        };
        self.status(function, Msg::M(m)).await
    }

    /// 1 = ok.
    pub async fn invite_chatroom_members(&self, roomid: &str, wxids: &[String]) -> Result<i32> {
        self.room_members(Functions::InvRoomMembers, roomid, wxids)
            .await
    }

    /// 1 = ok.
    pub async fn add_chatroom_members(&self, roomid: &str, wxids: &[String]) -> Result<i32> {
        self.room_members(Functions::AddRoomMembers, roomid, wxids)
            .await
    }

    /// 1 = ok.
    pub async fn del_chatroom_members(&self, roomid: &str, wxids: &[String]) -> Result<i32> {
        self.room_members(Functions::DelRoomMembers, roomid, wxids)
            .await
    }

    /// 1 = ok.
    pub async fn revoke_msg(&self, msg_id: u64) -> Result<i32> {
        self.status(Functions::RevokeMsg, Msg::Ui64(msg_id)).await
    }

    /// 1 = ok.
    pub async fn forward_msg(&self, msg_id: u64, receiver: &str) -> Result<i32> {
        let fm = ForwardMsg {
            id: msg_id,
            receiver: receiver.to_string(),
        };
        self.status(Functions::ForwardMsg, Msg::Fm(fm)).await
    }

    /// Send text; `aters` are the wxids @-mentioned in a group. 0 = ok.
    pub async fn send_txt(&self, msg: &str, receiver: &str, aters: &[String]) -> Result<i32> {
        let txt = TextMsg {
            msg: msg.to_string(),
            receiver: receiver.to_string(),
            aters: aters.join(","),
        };
        self.status(Functions::SendTxt, Msg::Txt(txt)).await
    }

    pub(crate) async fn send_path(
        &self,
        function: Functions,
        path: &str,
        receiver: &str,
    ) -> Result<i32> {
        let file = PathMsg {
            path: path.to_string(),
            receiver: receiver.to_string(),
        };
        self.status(function, Msg::File(file)).await
    }

    /// `path` must be readable by the host. 0 = ok.
    pub async fn send_image(&self, path: &str, receiver: &str) -> Result<i32> {
        self.send_path(Functions::SendImg, path, receiver).await
    }

    /// `path` must be readable by the host. 0 = ok.
    pub async fn send_file(&self, path: &str, receiver: &str) -> Result<i32> {
        self.send_path(Functions::SendFile, path, receiver).await
    }

    /// 0 = ok.
    pub async fn send_emotion(&self, path: &str, receiver: &str) -> Result<i32> {
        self.send_path(Functions::SendEmotion, path, receiver).await
    }

    /// 0 = ok.
    pub async fn send_xml(
        &self,
        receiver: &str,
        content: &str,
        path: Option<&str>,
        kind: u64,
    ) -> Result<i32> {
        let xml = XmlMsg {
            receiver: receiver.to_string(),
            content: content.to_string(),
            path: path.unwrap_or_default().to_string(),
            r#type: kind,
        };
        self.status(Functions::SendXml, Msg::Xml(xml)).await
    }

    /// 0 = ok.
    pub async fn send_rich_text(&self, card: RichTextCard, receiver: &str) -> Result<i32> {
        let rt = RichText {
            name: card.name,
            account: card.account,
            title: card.title,
            digest: card.digest,
            url: card.url,
            thumburl: card.thumburl,
            receiver: receiver.to_string(),
        };
        self.status(Functions::SendRichTxt, Msg::Rt(rt)).await
    }

    /// Pat `wxid` in `roomid`. 1 = ok.
    pub async fn send_pat(&self, roomid: &str, wxid: &str) -> Result<i32> {
        let pm = PatMsg {
            roomid: roomid.to_string(),
            wxid: wxid.to_string(),
        };
        self.status(Functions::SendPatMsg, Msg::Pm(pm)).await
    }

    /// One attempt at saving a voice message under `dir`; empty until the
    /// host has the audio ready.
    pub async fn get_audio_msg(&self, msg_id: u64, dir: &str) -> Result<String> {
        let am = AudioMsg {
            id: msg_id,
            dir: dir.to_string(),
        };
        self.call(Functions::GetAudioMsg, Some(Msg::Am(am)))
            .await?
            .into_str()
    }

    /// One OCR attempt over the image at `extra`.
    pub async fn exec_ocr(&self, extra: &str) -> Result<OcrMsg> {
        self.call(Functions::ExecOcr, Some(Msg::Str(extra.to_string())))
            .await?
            .into_ocr()
    }

    /// Ask the host to download a message attachment. 0 = ok.
    pub async fn download_attach(&self, msg_id: u64, thumb: &str, extra: &str) -> Result<i32> {
        let att = AttachMsg {
            id: msg_id,
            thumb: thumb.to_string(),
            extra: extra.to_string(),
        };
        self.status(Functions::DownloadAttach, Msg::Att(att)).await
    }

    /// Decrypt a downloaded `.dat` image into `dir`; returns the written path,
    /// empty on failure.
    pub async fn decrypt_image(&self, src: &str, dir: &str) -> Result<String> {
        let dec = DecPath {
            src: src.to_string(),
            dst: dir.to_string(),
        };
        self.call(Functions::DecryptImage, Some(Msg::Dec(dec)))
            .await?
            .into_str()
    }

    /// 1 = ok.
    pub async fn accept_new_friend(&self, v3: &str, v4: &str, scene: i32) -> Result<i32> {
        let v = Verification {
            v3: v3.to_string(),
            v4: v4.to_string(),
            scene,
        };
        self.status(Functions::AcceptFriend, Msg::V(v)).await
    }

    /// 1 = ok.
    pub async fn receive_transfer(&self, wxid: &str, tfid: &str, taid: &str) -> Result<i32> {
        let tf = Transfer {
            wxid: wxid.to_string(),
            tfid: tfid.to_string(),
            taid: taid.to_string(),
        };
        self.status(Functions::RecvTransfer, Msg::Tf(tf)).await
    }

    /// Tell the host to start pushing messages. 0 = ok.
    pub(crate) async fn enable_receiving(&self, pyq: bool) -> Result<i32> {
        self.status(Functions::EnableRecvTxt, Msg::Flag(pyq)).await
    }

    pub(crate) async fn disable_receiving(&self) -> Result<i32> {
        self.call(Functions::DisableRecvTxt, None)
            .await?
            .into_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        app::testing::FakeHost,
        domain::wire::{response, DbField, DbRow, DbRows, RpcContacts},
    };

    #[tokio::test]
    async fn status_is_returned_as_data() {
        let host = FakeHost::new();
        host.reply(Functions::IsLogin, response::Msg::Status(1));
        host.reply(Functions::SendTxt, response::Msg::Status(-1));
        let client = CommandClient::new(host.transport());

        assert!(client.is_login().await.unwrap());
        assert_eq!(client.send_txt("hi", "wxid_a", &[]).await.unwrap(), -1);
    }

    #[tokio::test]
    async fn requests_carry_the_function_payload() {
        let host = FakeHost::new();
        let client = CommandClient::new(host.transport());

        client
            .add_chatroom_members("r@chatroom", &["a ".into(), " b".into()])
            .await
            .unwrap();
        client
            .send_txt("hi @a", "r@chatroom", &["a".into(), "b".into()])
            .await
            .unwrap();
        client.get_self_wxid().await.unwrap();

        let sent = host.requests();
        assert_eq!(sent[0].func, Functions::AddRoomMembers as i32);
        assert_eq!(
            sent[0].msg,
            Some(Msg::M(MemberMgmt {
                roomid: "r@chatroom".into(),
                wxids: "a,b".into(),
            }))
        );
        match &sent[1].msg {
            Some(Msg::Txt(t)) => assert_eq!(t.aters, "a,b"),
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(sent[2].func, Functions::GetSelfWxid as i32);
        assert_eq!(sent[2].msg, None);
    }

    #[tokio::test]
    async fn friends_filter_drops_rooms_accounts_and_system_ids() {
        let host = FakeHost::new();
        let contact = |wxid: &str| RpcContact {
            wxid: wxid.into(),
            ..Default::default()
        };
        host.reply(
            Functions::GetContacts,
            response::Msg::Contacts(RpcContacts {
                contacts: vec![
                    contact("1@chatroom"),
                    contact("gh_news"),
                    contact("filehelper"),
                    contact("wxid_friend"),
                ],
            }),
        );
        let client = CommandClient::new(host.transport());

        let friends = client.get_friends().await.unwrap();
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0].wxid, "wxid_friend");

        let rooms = client.get_chat_rooms().await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].wxid, "1@chatroom");
    }

    #[tokio::test]
    async fn missing_contact_is_none() {
        let host = FakeHost::new();
        let client = CommandClient::new(host.transport());
        assert_eq!(client.get_contact("wxid_nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn query_rows_are_decoded() {
        let host = FakeHost::new();
        host.reply(
            Functions::ExecDbQuery,
            response::Msg::Rows(DbRows {
                rows: vec![DbRow {
                    fields: vec![DbField {
                        r#type: 1,
                        column: "n".into(),
                        content: b"42".to_vec(),
                    }],
                }],
            }),
        );
        let client = CommandClient::new(host.transport());

        let rows = client.db_sql_query("MicroMsg.db", "SELECT 42 AS n;").await.unwrap();
        assert_eq!(rows[0].get("n").and_then(codec::DbValue::as_integer), Some(42));
    }
}
