// SPDX-License-Identifier: Apache-2.0
//! codec
//!
//! Layer: Domain
//! Purpose:
//! - request/response (de)serialization keyed by function code
//! - typed extraction of the one result field a function answers with
//! - query row field decoding
//!
//! Notes:
//! - Result fields are selected by the function that was *sent*. An absent
//!   field decodes to its zero value; a field of another kind is an error.

use std::collections::BTreeMap;

use bytes::Bytes;
use prost::Message;
use serde::{Serialize, Serializer};

use crate::{
    domain::wire::{
        response, DbRow, DbTable, Functions, OcrMsg, Request, Response, RoomData, RpcContact,
        UserInfo, WxMsg,
    },
    error::{Error, Result},
};

/// Which `Response.msg` variant a function answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Status,
    Str,
    Types,
    Contacts,
    DbNames,
    DbTables,
    Rows,
    UserInfo,
    Ocr,
}

impl Functions {
    pub fn result_kind(self) -> ResultKind {
        use Functions::*;
        match self {
            GetSelfWxid | GetAudioMsg | DecryptImage => ResultKind::Str,
            GetMsgTypes => ResultKind::Types,
            GetContacts | GetContactInfo => ResultKind::Contacts,
            GetDbNames => ResultKind::DbNames,
            GetDbTables => ResultKind::DbTables,
            ExecDbQuery => ResultKind::Rows,
            GetUserInfo => ResultKind::UserInfo,
            ExecOcr => ResultKind::Ocr,
            Reserved | IsLogin | SendTxt | SendImg | SendFile | SendXml | SendEmotion
            | SendRichTxt | SendPatMsg | ForwardMsg | EnableRecvTxt | DisableRecvTxt
            | AcceptFriend | RecvTransfer | RefreshPyq | DownloadAttach | RevokeMsg
            | AddRoomMembers | DelRoomMembers | InvRoomMembers => ResultKind::Status,
        }
    }
}

pub fn encode_request(req: &Request) -> Bytes {
    Bytes::from(req.encode_to_vec())
}

pub fn decode_request(buf: &[u8]) -> Result<Request> {
    Request::decode(buf).map_err(|source| Error::Decode {
        what: "request",
        source,
    })
}

pub fn encode_response(rsp: &Response) -> Bytes {
    Bytes::from(rsp.encode_to_vec())
}

/// Decode a command reply for `function`.
pub fn decode_response(function: Functions, buf: &[u8]) -> Result<Reply> {
    let rsp = Response::decode(buf).map_err(|source| Error::Decode {
        what: "response",
        source,
    })?;
    if rsp.func != 0 && rsp.func != function as i32 {
        tracing::debug!(sent=?function, answered=rsp.func, "response carries another function code");
    }
    Ok(Reply {
        function,
        msg: rsp.msg,
    })
}

/// Decode one frame from the event channel.
pub fn decode_event(buf: &[u8]) -> Result<WxMsg> {
    let rsp = Response::decode(buf).map_err(|source| Error::Decode {
        what: "event",
        source,
    })?;
    match rsp.msg {
        Some(response::Msg::Wxmsg(msg)) => Ok(msg),
        Some(other) => Err(Error::UnexpectedPayload {
            function: Functions::EnableRecvTxt,
            found: other.kind(),
        }),
        None => Err(Error::UnexpectedPayload {
            function: Functions::EnableRecvTxt,
            found: "empty",
        }),
    }
}

pub fn decode_room_data(buf: &[u8]) -> Result<RoomData> {
    RoomData::decode(buf).map_err(|source| Error::Decode {
        what: "room data",
        source,
    })
}

/// A decoded command reply awaiting typed extraction.
#[derive(Debug, Clone)]
pub struct Reply {
    function: Functions,
    msg: Option<response::Msg>,
}

macro_rules! take_field {
    ($reply:expr, $kind:expr, $variant:ident) => {{
        let reply = $reply;
        if reply.function.result_kind() != $kind {
            return Err(Error::UnexpectedPayload {
                function: reply.function,
                found: stringify!($variant),
            });
        }
        match reply.msg {
            Some(response::Msg::$variant(v)) => v,
            None => Default::default(),
            Some(other) => {
                return Err(Error::UnexpectedPayload {
                    function: reply.function,
                    found: other.kind(),
                })
            }
        }
    }};
}

impl Reply {
    pub fn into_status(self) -> Result<i32> {
        Ok(take_field!(self, ResultKind::Status, Status))
    }

    pub fn into_str(self) -> Result<String> {
        Ok(take_field!(self, ResultKind::Str, Str))
    }

    pub fn into_types(self) -> Result<BTreeMap<i32, String>> {
        Ok(take_field!(self, ResultKind::Types, Types).types)
    }

    pub fn into_contacts(self) -> Result<Vec<RpcContact>> {
        Ok(take_field!(self, ResultKind::Contacts, Contacts).contacts)
    }

    pub fn into_db_names(self) -> Result<Vec<String>> {
        Ok(take_field!(self, ResultKind::DbNames, Dbs).names)
    }

    pub fn into_db_tables(self) -> Result<Vec<DbTable>> {
        Ok(take_field!(self, ResultKind::DbTables, Tables).tables)
    }

    pub fn into_rows(self) -> Result<Vec<Row>> {
        take_field!(self, ResultKind::Rows, Rows)
            .rows
            .into_iter()
            .map(Row::from_wire)
            .collect()
    }

    pub fn into_user_info(self) -> Result<UserInfo> {
        Ok(take_field!(self, ResultKind::UserInfo, Ui))
    }

    pub fn into_ocr(self) -> Result<OcrMsg> {
        Ok(take_field!(self, ResultKind::Ocr, Ocr))
    }
}

/// One decoded column value of a query row.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    /// Content type 5: the column carries no value.
    Absent,
}

impl DbValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl Serialize for DbValue {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Integer(n) => s.serialize_i64(*n),
            Self::Float(f) => s.serialize_f64(*f),
            Self::Text(t) => s.serialize_str(t),
            Self::Blob(b) => b.serialize(s),
            Self::Absent => s.serialize_none(),
        }
    }
}

/// Decode one field by its content type tag:
/// 1 integer, 2 float, 3 (and unknown) text, 4 raw bytes, 5 absent.
pub fn parse_db_field(kind: i32, column: &str, content: &[u8]) -> Result<DbValue> {
    let numeric = || {
        std::str::from_utf8(content)
            .map(str::trim)
            .map_err(|e| Error::Field {
                column: column.to_string(),
                reason: format!("not utf-8: {e}"),
            })
    };

    match kind {
        1 => {
            let s = numeric()?;
            s.parse::<i64>().map(DbValue::Integer).map_err(|e| Error::Field {
                column: column.to_string(),
                reason: format!("{s:?} is not an integer: {e}"),
            })
        }
        2 => {
            let s = numeric()?;
            s.parse::<f64>().map(DbValue::Float).map_err(|e| Error::Field {
                column: column.to_string(),
                reason: format!("{s:?} is not a float: {e}"),
            })
        }
        4 => Ok(DbValue::Blob(content.to_vec())),
        5 => Ok(DbValue::Absent),
        _ => Ok(DbValue::Text(String::from_utf8_lossy(content).into_owned())),
    }
}

/// A decoded query row, columns in the order the host returned them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, DbValue)>,
}

impl Row {
    fn from_wire(row: DbRow) -> Result<Self> {
        let fields = row
            .fields
            .into_iter()
            .map(|f| {
                let value = parse_db_field(f.r#type, &f.column, &f.content)?;
                Ok((f.column, value))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { fields })
    }

    pub fn get(&self, column: &str) -> Option<&DbValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_map(self.fields.iter().map(|(k, v)| (k, v)))
    }
}
