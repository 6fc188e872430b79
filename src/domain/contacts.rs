// SPDX-License-Identifier: Apache-2.0
//! contacts
//!
//! Layer: Domain
//! Purpose:
//! - local views over the host's full contact list (chat rooms, friends)

use crate::domain::wire::RpcContact;

pub const CHATROOM_SUFFIX: &str = "@chatroom";
pub const PUBLIC_ACCOUNT_PREFIX: &str = "gh_";

/// System accounts that appear in the contact list but are not friends.
pub const NOT_FRIEND: [(&str, &str); 5] = [
    ("fmessage", "friend recommendations"),
    ("medianote", "voice notes"),
    ("floatbottle", "drift bottle"),
    ("filehelper", "file transfer helper"),
    ("newsapp", "news"),
];

pub fn is_chat_room(wxid: &str) -> bool {
    wxid.ends_with(CHATROOM_SUFFIX)
}

pub fn is_friend(wxid: &str) -> bool {
    !is_chat_room(wxid)
        && !wxid.starts_with(PUBLIC_ACCOUNT_PREFIX)
        && !NOT_FRIEND.iter().any(|(id, _)| *id == wxid)
}

pub fn chat_rooms(contacts: Vec<RpcContact>) -> Vec<RpcContact> {
    contacts.into_iter().filter(|c| is_chat_room(&c.wxid)).collect()
}

pub fn friends(contacts: Vec<RpcContact>) -> Vec<RpcContact> {
    contacts.into_iter().filter(|c| is_friend(&c.wxid)).collect()
}

/// Member list argument for invite/add/remove: comma-joined, whitespace removed.
pub fn join_wxids<S: AsRef<str>>(wxids: &[S]) -> String {
    wxids
        .iter()
        .map(|w| w.as_ref())
        .collect::<Vec<_>>()
        .join(",")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(wxid: &str) -> RpcContact {
        RpcContact {
            wxid: wxid.into(),
            ..Default::default()
        }
    }

    #[test]
    fn friends_exclude_rooms_public_accounts_and_system_ids() {
        let all = vec![
            contact("4455@chatroom"),
            contact("gh_news"),
            contact("filehelper"),
            contact("wxid_friend"),
        ];
        let friends = friends(all.clone());
        assert_eq!(friends, vec![contact("wxid_friend")]);

        assert_eq!(chat_rooms(all), vec![contact("4455@chatroom")]);
    }

    #[test]
    fn member_lists_are_compacted() {
        assert_eq!(join_wxids(&["a ", " b", "c d"]), "a,b,cd");
        assert_eq!(join_wxids::<&str>(&[]), "");
    }
}
