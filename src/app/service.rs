// SPDX-License-Identifier: Apache-2.0
//! service
//!
//! Layer: Application
//! Purpose:
//! - name-based entry point for the façade: allow-listed calls with
//!   positional JSON params, plus message subscription

use std::sync::Arc;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    app::{
        client::RichTextCard,
        polling::{DecryptPolicy, MembershipPolicy, ResultPolicy},
        wcferry::{Subscription, Wcferry},
    },
    domain::{message::Message, protocol::code},
    ports::resource::Locator,
};

/// Engine methods the façade may call by name.
pub const ALLOWED_METHODS: &[&str] = &[
    "accept_new_friend",
    "add_chatroom_members",
    "db_sql_query",
    "decrypt_image",
    "del_chatroom_members",
    "download_attach",
    "download_image",
    "forward_msg",
    "get_alias_in_chat_room",
    "get_audio_msg",
    "get_chat_room_members",
    "get_chat_rooms",
    "get_contact",
    "get_contacts",
    "get_db_names",
    "get_friends",
    "get_msg_types",
    "get_ocr_result",
    "get_self_wxid",
    "get_user_info",
    "invite_chatroom_members",
    "is_login",
    "receive_transfer",
    "refresh_pyq",
    "revoke_msg",
    "send_file",
    "send_image",
    "send_pat",
    "send_rich_text",
    "send_txt",
];

/// Failure of a named call, carried back to the façade client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct InvokeError {
    pub message: String,
    pub code: i32,
}

impl InvokeError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code::REJECTED,
        }
    }

    fn execution(method: &str, err: crate::error::Error) -> Self {
        Self {
            message: format!("Execute {method} failed: {err}"),
            code: code::EXECUTION,
        }
    }
}

/// Positional call arguments.
struct Params<'a> {
    method: &'a str,
    values: Vec<Value>,
}

impl<'a> Params<'a> {
    fn take<T: DeserializeOwned>(&mut self, idx: usize) -> Result<Option<T>, InvokeError> {
        match self.values.get_mut(idx).map(Value::take) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_json::from_value(v).map(Some).map_err(|e| {
                InvokeError::rejected(format!(
                    "{}: parameter {idx} is invalid: {e}",
                    self.method
                ))
            }),
        }
    }

    fn req<T: DeserializeOwned>(&mut self, idx: usize) -> Result<T, InvokeError> {
        self.take(idx)?.ok_or_else(|| {
            InvokeError::rejected(format!("{}: missing parameter {idx}", self.method))
        })
    }
}

/// `aters` as a comma-separated string or a list of wxids.
#[derive(Deserialize)]
#[serde(untagged)]
enum Aters {
    Joined(String),
    List(Vec<String>),
}

impl Aters {
    fn into_list(self) -> Vec<String> {
        match self {
            Self::Joined(s) => s
                .split(',')
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(str::to_string)
                .collect(),
            Self::List(list) => list,
        }
    }
}

fn to_json<T: Serialize>(method: &str, out: crate::error::Result<T>) -> Result<Value, InvokeError> {
    let out = out.map_err(|e| InvokeError::execution(method, e))?;
    serde_json::to_value(out).map_err(|e| InvokeError {
        message: format!("Execute {method} failed: cannot encode result: {e}"),
        code: code::EXECUTION,
    })
}

/// BridgeService = application layer entry point for the façade.
#[derive(Clone)]
pub struct BridgeService {
    wcferry: Arc<Wcferry>,
}

impl BridgeService {
    pub fn new(wcferry: Arc<Wcferry>) -> Self {
        Self { wcferry }
    }

    pub fn wcferry(&self) -> &Arc<Wcferry> {
        &self.wcferry
    }

    /// Forward pushed messages to `cb` until the subscription is dropped via
    /// `unsubscribe`.
    pub async fn subscribe<F>(&self, cb: F) -> crate::error::Result<Subscription>
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.wcferry.on(cb).await
    }

    pub async fn set_recv_pyq(&self, enabled: bool) -> crate::error::Result<()> {
        self.wcferry.set_recv_pyq(enabled).await
    }

    /// Call an allow-listed engine method with positional params.
    pub async fn invoke(&self, method: &str, params: Vec<Value>) -> Result<Value, InvokeError> {
        if !ALLOWED_METHODS.contains(&method) {
            return Err(InvokeError::rejected(format!(
                "method `{method}` is not allowed"
            )));
        }
        debug!(%method, params=params.len(), "invoke");

        let mut p = Params {
            method,
            values: params,
        };
        let wcf = &self.wcferry;
        let c = wcf.commands();

        match method {
            "is_login" => to_json(method, c.is_login().await),
            "get_self_wxid" => to_json(method, c.get_self_wxid().await),
            "get_user_info" => to_json(method, c.get_user_info().await),
            "get_msg_types" => to_json(method, c.get_msg_types().await),
            "get_contacts" => to_json(method, c.get_contacts().await),
            "get_chat_rooms" => to_json(method, c.get_chat_rooms().await),
            "get_friends" => to_json(method, c.get_friends().await),
            "get_db_names" => to_json(method, c.get_db_names().await),
            "get_contact" => {
                let wxid: String = p.req(0)?;
                to_json(method, c.get_contact(&wxid).await)
            }
            "db_sql_query" => {
                let (db, sql): (String, String) = (p.req(0)?, p.req(1)?);
                to_json(method, c.db_sql_query(&db, &sql).await)
            }
            "refresh_pyq" => {
                let id = p.take::<u64>(0)?.unwrap_or(0);
                to_json(method, c.refresh_pyq(id).await)
            }
            "revoke_msg" => {
                let id: u64 = p.req(0)?;
                to_json(method, c.revoke_msg(id).await)
            }
            "forward_msg" => {
                let (id, receiver): (u64, String) = (p.req(0)?, p.req(1)?);
                to_json(method, c.forward_msg(id, &receiver).await)
            }
            "add_chatroom_members" | "del_chatroom_members" | "invite_chatroom_members" => {
                let (roomid, wxids): (String, Vec<String>) = (p.req(0)?, p.req(1)?);
                let out = match method {
                    "add_chatroom_members" => c.add_chatroom_members(&roomid, &wxids).await,
                    "del_chatroom_members" => c.del_chatroom_members(&roomid, &wxids).await,
                    _ => c.invite_chatroom_members(&roomid, &wxids).await,
                };
                to_json(method, out)
            }
            "send_txt" => {
                let (msg, receiver): (String, String) = (p.req(0)?, p.req(1)?);
                let aters = p
                    .take::<Aters>(2)?
                    .map(Aters::into_list)
                    .unwrap_or_default();
                to_json(method, c.send_txt(&msg, &receiver, &aters).await)
            }
            "send_image" | "send_file" => {
                let (location, receiver): (String, String) = (p.req(0)?, p.req(1)?);
                let locator = Locator::parse(&location)
                    .map_err(|e| InvokeError::rejected(format!("{method}: {e}")))?;
                let out = if method == "send_image" {
                    wcf.send_image(locator, &receiver).await
                } else {
                    wcf.send_file(locator, &receiver).await
                };
                to_json(method, out)
            }
            "send_rich_text" => {
                let (card, receiver): (RichTextCard, String) = (p.req(0)?, p.req(1)?);
                to_json(method, c.send_rich_text(card, &receiver).await)
            }
            "send_pat" => {
                let (roomid, wxid): (String, String) = (p.req(0)?, p.req(1)?);
                to_json(method, c.send_pat(&roomid, &wxid).await)
            }
            "accept_new_friend" => {
                let (v3, v4): (String, String) = (p.req(0)?, p.req(1)?);
                let scene = p.take::<i32>(2)?.unwrap_or(30);
                to_json(method, c.accept_new_friend(&v3, &v4, scene).await)
            }
            "receive_transfer" => {
                let (wxid, tfid, taid): (String, String, String) =
                    (p.req(0)?, p.req(1)?, p.req(2)?);
                to_json(method, c.receive_transfer(&wxid, &tfid, &taid).await)
            }
            "download_attach" => {
                let id: u64 = p.req(0)?;
                let thumb = p.take::<String>(1)?.unwrap_or_default();
                let extra = p.take::<String>(2)?.unwrap_or_default();
                to_json(method, c.download_attach(id, &thumb, &extra).await)
            }
            "decrypt_image" => {
                let (src, dir): (String, String) = (p.req(0)?, p.req(1)?);
                to_json(method, c.decrypt_image(&src, &dir).await)
            }
            "get_chat_room_members" => {
                let roomid: String = p.req(0)?;
                let mut policy = MembershipPolicy::default();
                if let Some(times) = p.take::<u32>(1)? {
                    policy.attempts = times;
                }
                to_json(method, wcf.get_chat_room_members_with(&roomid, &policy).await)
            }
            "get_alias_in_chat_room" => {
                let (wxid, roomid): (String, String) = (p.req(0)?, p.req(1)?);
                to_json(method, wcf.get_alias_in_chat_room(&wxid, &roomid).await)
            }
            "get_audio_msg" => {
                let (id, dir): (u64, String) = (p.req(0)?, p.req(1)?);
                let mut policy = ResultPolicy::audio();
                if let Some(times) = p.take::<u32>(2)? {
                    policy = policy.with_attempts(times);
                }
                to_json(method, wcf.get_audio_msg_with(id, &dir, &policy).await)
            }
            "get_ocr_result" => {
                let extra: String = p.req(0)?;
                let mut policy = ResultPolicy::ocr();
                if let Some(times) = p.take::<u32>(1)? {
                    policy = policy.with_attempts(times);
                }
                to_json(method, wcf.get_ocr_result_with(&extra, &policy).await)
            }
            "download_image" => {
                let (id, extra, dir): (u64, String, String) = (p.req(0)?, p.req(1)?, p.req(2)?);
                let mut policy = DecryptPolicy::default();
                if let Some(times) = p.take::<u32>(3)? {
                    policy.attempts = times;
                }
                to_json(method, wcf.download_image_with(id, &extra, &dir, &policy).await)
            }
            other => Err(InvokeError::rejected(format!(
                "method `{other}` is not implemented"
            ))),
        }
    }
}
