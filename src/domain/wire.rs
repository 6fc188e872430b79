// SPDX-License-Identifier: Apache-2.0
//! wire
//!
//! Layer: Domain
//! Purpose:
//! - protobuf schema spoken by the host on both channels (package `wcf`)
//! - room record blob stored in the host database (`RoomData`)
//!
//! Notes:
//! - Field tags and function codes are fixed by the host. Do not renumber.

use std::collections::BTreeMap;

use serde::Serialize;

/// Host operation selector carried in every request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Functions {
    Reserved = 0x00,
    IsLogin = 0x01,
    GetSelfWxid = 0x10,
    GetMsgTypes = 0x11,
    GetContacts = 0x12,
    GetDbNames = 0x13,
    GetDbTables = 0x14,
    GetUserInfo = 0x15,
    GetAudioMsg = 0x16,
    SendTxt = 0x20,
    SendImg = 0x21,
    SendFile = 0x22,
    SendXml = 0x23,
    SendEmotion = 0x24,
    SendRichTxt = 0x25,
    SendPatMsg = 0x26,
    ForwardMsg = 0x27,
    EnableRecvTxt = 0x30,
    DisableRecvTxt = 0x40,
    ExecDbQuery = 0x50,
    AcceptFriend = 0x51,
    RecvTransfer = 0x52,
    RefreshPyq = 0x53,
    DownloadAttach = 0x54,
    GetContactInfo = 0x55,
    RevokeMsg = 0x56,
    DecryptImage = 0x60,
    ExecOcr = 0x61,
    AddRoomMembers = 0x70,
    DelRoomMembers = 0x71,
    InvRoomMembers = 0x72,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Request {
    #[prost(enumeration = "Functions", tag = "1")]
    pub func: i32,
    #[prost(
        oneof = "request::Msg",
        tags = "2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18"
    )]
    pub msg: Option<request::Msg>,
}

pub mod request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Msg {
        #[prost(message, tag = "2")]
        Empty(super::Empty),
        #[prost(string, tag = "3")]
        Str(String),
        #[prost(message, tag = "4")]
        Txt(super::TextMsg),
        #[prost(message, tag = "5")]
        File(super::PathMsg),
        #[prost(message, tag = "6")]
        Query(super::DbQuery),
        #[prost(message, tag = "7")]
        V(super::Verification),
        #[prost(message, tag = "8")]
        M(super::MemberMgmt),
        #[prost(message, tag = "9")]
        Xml(super::XmlMsg),
        #[prost(message, tag = "10")]
        Dec(super::DecPath),
        #[prost(message, tag = "11")]
        Tf(super::Transfer),
        #[prost(uint64, tag = "12")]
        Ui64(u64),
        #[prost(bool, tag = "13")]
        Flag(bool),
        #[prost(message, tag = "14")]
        Att(super::AttachMsg),
        #[prost(message, tag = "15")]
        Am(super::AudioMsg),
        #[prost(message, tag = "16")]
        Rt(super::RichText),
        #[prost(message, tag = "17")]
        Pm(super::PatMsg),
        #[prost(message, tag = "18")]
        Fm(super::ForwardMsg),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Response {
    #[prost(enumeration = "Functions", tag = "1")]
    pub func: i32,
    #[prost(oneof = "response::Msg", tags = "2, 3, 4, 5, 6, 7, 8, 9, 10, 11")]
    pub msg: Option<response::Msg>,
}

pub mod response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Msg {
        #[prost(int32, tag = "2")]
        Status(i32),
        #[prost(string, tag = "3")]
        Str(String),
        #[prost(message, tag = "4")]
        Wxmsg(super::WxMsg),
        #[prost(message, tag = "5")]
        Types(super::MsgTypes),
        #[prost(message, tag = "6")]
        Contacts(super::RpcContacts),
        #[prost(message, tag = "7")]
        Dbs(super::DbNames),
        #[prost(message, tag = "8")]
        Tables(super::DbTables),
        #[prost(message, tag = "9")]
        Rows(super::DbRows),
        #[prost(message, tag = "10")]
        Ui(super::UserInfo),
        #[prost(message, tag = "11")]
        Ocr(super::OcrMsg),
    }

    impl Msg {
        /// Wire name of the populated variant, for diagnostics.
        pub fn kind(&self) -> &'static str {
            match self {
                Self::Status(_) => "status",
                Self::Str(_) => "str",
                Self::Wxmsg(_) => "wxmsg",
                Self::Types(_) => "types",
                Self::Contacts(_) => "contacts",
                Self::Dbs(_) => "dbs",
                Self::Tables(_) => "tables",
                Self::Rows(_) => "rows",
                Self::Ui(_) => "ui",
                Self::Ocr(_) => "ocr",
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Empty {}

/// Pushed chat message, as delivered on the event channel.
#[derive(Clone, PartialEq, Serialize, ::prost::Message)]
pub struct WxMsg {
    #[prost(bool, tag = "1")]
    pub is_self: bool,
    #[prost(bool, tag = "2")]
    pub is_group: bool,
    #[prost(uint64, tag = "3")]
    pub id: u64,
    #[prost(uint32, tag = "4")]
    pub r#type: u32,
    #[prost(uint32, tag = "5")]
    pub ts: u32,
    #[prost(string, tag = "6")]
    pub roomid: String,
    #[prost(string, tag = "7")]
    pub content: String,
    #[prost(string, tag = "8")]
    pub sender: String,
    #[prost(string, tag = "9")]
    pub sign: String,
    #[prost(string, tag = "10")]
    pub thumb: String,
    #[prost(string, tag = "11")]
    pub extra: String,
    #[prost(string, tag = "12")]
    pub xml: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TextMsg {
    #[prost(string, tag = "1")]
    pub msg: String,
    #[prost(string, tag = "2")]
    pub receiver: String,
    /// Comma-separated ids to @; `notify@all` mentions everyone.
    #[prost(string, tag = "3")]
    pub aters: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PathMsg {
    #[prost(string, tag = "1")]
    pub path: String,
    #[prost(string, tag = "2")]
    pub receiver: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct XmlMsg {
    #[prost(string, tag = "1")]
    pub receiver: String,
    #[prost(string, tag = "2")]
    pub content: String,
    /// Cover image path.
    #[prost(string, tag = "3")]
    pub path: String,
    #[prost(uint64, tag = "4")]
    pub r#type: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgTypes {
    #[prost(btree_map = "int32, string", tag = "1")]
    pub types: BTreeMap<i32, String>,
}

#[derive(Clone, PartialEq, Serialize, ::prost::Message)]
pub struct RpcContact {
    #[prost(string, tag = "1")]
    pub wxid: String,
    #[prost(string, tag = "2")]
    pub code: String,
    #[prost(string, tag = "3")]
    pub remark: String,
    #[prost(string, tag = "4")]
    pub name: String,
    #[prost(string, tag = "5")]
    pub country: String,
    #[prost(string, tag = "6")]
    pub province: String,
    #[prost(string, tag = "7")]
    pub city: String,
    #[prost(int32, tag = "8")]
    pub gender: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcContacts {
    #[prost(message, repeated, tag = "1")]
    pub contacts: Vec<RpcContact>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DbNames {
    #[prost(string, repeated, tag = "1")]
    pub names: Vec<String>,
}

#[derive(Clone, PartialEq, Serialize, ::prost::Message)]
pub struct DbTable {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub sql: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DbTables {
    #[prost(message, repeated, tag = "1")]
    pub tables: Vec<DbTable>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DbQuery {
    #[prost(string, tag = "1")]
    pub db: String,
    #[prost(string, tag = "2")]
    pub sql: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DbField {
    /// Content type tag, see `codec::parse_db_field`.
    #[prost(int32, tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub column: String,
    #[prost(bytes = "vec", tag = "3")]
    pub content: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DbRow {
    #[prost(message, repeated, tag = "1")]
    pub fields: Vec<DbField>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DbRows {
    #[prost(message, repeated, tag = "1")]
    pub rows: Vec<DbRow>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Verification {
    #[prost(string, tag = "1")]
    pub v3: String,
    #[prost(string, tag = "2")]
    pub v4: String,
    #[prost(int32, tag = "3")]
    pub scene: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MemberMgmt {
    #[prost(string, tag = "1")]
    pub roomid: String,
    #[prost(string, tag = "2")]
    pub wxids: String,
}

#[derive(Clone, PartialEq, Serialize, ::prost::Message)]
pub struct UserInfo {
    #[prost(string, tag = "1")]
    pub wxid: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub mobile: String,
    #[prost(string, tag = "4")]
    pub home: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DecPath {
    #[prost(string, tag = "1")]
    pub src: String,
    #[prost(string, tag = "2")]
    pub dst: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Transfer {
    #[prost(string, tag = "1")]
    pub wxid: String,
    #[prost(string, tag = "2")]
    pub tfid: String,
    #[prost(string, tag = "3")]
    pub taid: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AttachMsg {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(string, tag = "2")]
    pub thumb: String,
    #[prost(string, tag = "3")]
    pub extra: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AudioMsg {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(string, tag = "2")]
    pub dir: String,
}

/// Link card. `account` takes a `gh_` id to show that account's avatar.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RichText {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub account: String,
    #[prost(string, tag = "3")]
    pub title: String,
    #[prost(string, tag = "4")]
    pub digest: String,
    #[prost(string, tag = "5")]
    pub url: String,
    #[prost(string, tag = "6")]
    pub thumburl: String,
    #[prost(string, tag = "7")]
    pub receiver: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PatMsg {
    #[prost(string, tag = "1")]
    pub roomid: String,
    #[prost(string, tag = "2")]
    pub wxid: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OcrMsg {
    #[prost(int32, tag = "1")]
    pub status: i32,
    #[prost(string, tag = "2")]
    pub result: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ForwardMsg {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(string, tag = "2")]
    pub receiver: String,
}

/// `ChatRoom.RoomData` column blob.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RoomData {
    #[prost(message, repeated, tag = "1")]
    pub members: Vec<room_data::RoomMember>,
    #[prost(int32, tag = "5")]
    pub room_capacity: i32,
}

pub mod room_data {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct RoomMember {
        #[prost(string, tag = "1")]
        pub wxid: String,
        /// Display name inside the room; empty when the member never set one.
        #[prost(string, tag = "2")]
        pub name: String,
        #[prost(int32, tag = "3")]
        pub state: i32,
    }
}
