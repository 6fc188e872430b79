// SPDX-License-Identifier: Apache-2.0
//! message
//!
//! Layer: Domain
//! Purpose:
//! - read-only view over a pushed chat message
//!
//! Notes:
//! - `is_at` ignores @-everyone mentions.

use crate::domain::wire::WxMsg;

/// Read-only view over one pushed chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    raw: WxMsg,
}

impl Message {
    pub fn new(raw: WxMsg) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &WxMsg {
        &self.raw
    }

    pub fn into_raw(self) -> WxMsg {
        self.raw
    }

    pub fn id(&self) -> u64 {
        self.raw.id
    }

    pub fn kind(&self) -> u32 {
        self.raw.r#type
    }

    pub fn ts(&self) -> u32 {
        self.raw.ts
    }

    pub fn is_self(&self) -> bool {
        self.raw.is_self
    }

    pub fn is_group(&self) -> bool {
        self.raw.is_group
    }

    pub fn room_id(&self) -> &str {
        &self.raw.roomid
    }

    pub fn sender(&self) -> &str {
        &self.raw.sender
    }

    pub fn content(&self) -> &str {
        &self.raw.content
    }

    pub fn xml(&self) -> &str {
        &self.raw.xml
    }

    pub fn thumb(&self) -> &str {
        &self.raw.thumb
    }

    pub fn extra(&self) -> &str {
        &self.raw.extra
    }

    /// Whether `wxid` is @-mentioned: a group message whose `<atuserlist>`
    /// names the id, excluding @-everyone messages.
    pub fn is_at(&self, wxid: &str) -> bool {
        if !self.is_group() || wxid.is_empty() {
            return false;
        }

        let Some(list) = at_user_list(&self.raw.xml) else {
            return false;
        };
        if !list.contains(wxid) {
            return false;
        }

        !["@所有人", "@all", "@All"]
            .iter()
            .any(|tag| self.raw.content.contains(tag))
    }
}

fn at_user_list(xml: &str) -> Option<&str> {
    const OPEN: &str = "<atuserlist>";
    const CLOSE: &str = "</atuserlist>";

    let start = xml.find(OPEN)? + OPEN.len();
    let end = xml[start..].rfind(CLOSE)? + start;
    Some(&xml[start..end])
}

impl From<WxMsg> for Message {
    fn from(raw: WxMsg) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_msg(content: &str, xml: &str) -> Message {
        Message::new(WxMsg {
            is_group: true,
            roomid: "123@chatroom".into(),
            sender: "wxid_sender".into(),
            content: content.into(),
            xml: xml.into(),
            ..Default::default()
        })
    }

    #[test]
    fn at_requires_group_and_listed_id() {
        let xml = "<msgsource><atuserlist>wxid_me,wxid_other</atuserlist></msgsource>";
        assert!(group_msg("@me hello", xml).is_at("wxid_me"));
        assert!(!group_msg("@me hello", xml).is_at("wxid_nobody"));

        let mut direct = group_msg("@me hello", xml);
        direct.raw.is_group = false;
        assert!(!direct.is_at("wxid_me"));
    }

    #[test]
    fn at_everyone_is_not_a_mention() {
        let xml = "<msgsource><atuserlist>wxid_me</atuserlist></msgsource>";
        assert!(!group_msg("@所有人 meeting at 5", xml).is_at("wxid_me"));
        assert!(!group_msg("@All meeting at 5", xml).is_at("wxid_me"));
    }

    #[test]
    fn missing_at_list_is_not_a_mention() {
        assert!(!group_msg("hello", "<msgsource></msgsource>").is_at("wxid_me"));
    }
}
