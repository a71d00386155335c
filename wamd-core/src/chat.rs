// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat, contact and group state the engine maintains while encoding and
//! decoding messages.
use std::collections::HashSet;

use crate::jid::Jid;
use crate::message::MessageInfo;

/// One conversation (1:1 or group) with its message list and bookkeeping.
#[derive(Clone, Debug)]
pub struct Chat {
    jid: Jid,
    pub name: Option<String>,
    pub messages: Vec<MessageInfo>,
    /// Devices our sender key has already been distributed to. Entries are
    /// never removed when a device leaves the group, so a device which
    /// re-joins will not be sent a fresh distribution within this chat's
    /// lifetime.
    pub participants_prekeys: HashSet<Jid>,
    pub archived: bool,
    pub unread_messages: u32,
    /// Disappearing-messages timer, seconds. `None` when disabled.
    pub ephemeral_expiration: Option<u32>,
    pub ephemeral_toggle_timestamp: Option<u64>,
}

impl Chat {
    pub fn new(jid: Jid) -> Self {
        Self {
            jid,
            name: None,
            messages: Vec::new(),
            participants_prekeys: HashSet::new(),
            archived: false,
            unread_messages: 0,
            ephemeral_expiration: None,
            ephemeral_toggle_timestamp: None,
        }
    }

    pub fn jid(&self) -> &Jid {
        &self.jid
    }

    pub fn is_group(&self) -> bool {
        self.jid().is_group()
    }

    pub fn add_message(&mut self, info: MessageInfo) {
        self.messages.push(info);
    }

    pub fn find_message(&self, id: &str) -> Option<&MessageInfo> {
        self.messages.iter().find(|info| info.id() == id)
    }

    pub fn remove_message(&mut self, id: &str) -> Option<MessageInfo> {
        let position = self.messages.iter().position(|info| info.id() == id)?;
        Some(self.messages.remove(position))
    }
}

/// Group metadata as resolved through a metadata query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupMetadata {
    pub jid: Jid,
    pub subject: String,
    pub participants: Vec<Jid>,
}

/// Address-book entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Contact {
    pub jid: Option<Jid>,
    /// Name the contact chose for themselves (push name).
    pub chosen_name: Option<String>,
    pub full_name: Option<String>,
}

impl Contact {
    pub fn new(jid: Jid) -> Self {
        Self {
            jid: Some(jid),
            ..Self::default()
        }
    }
}

/// Disappearing-messages timers the protocol knows.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ChatEphemeralTimer {
    #[default]
    Off,
    OneDay,
    OneWeek,
    ThreeMonths,
}

impl ChatEphemeralTimer {
    pub fn for_seconds(value: u32) -> Self {
        match value {
            86_400 => ChatEphemeralTimer::OneDay,
            604_800 => ChatEphemeralTimer::OneWeek,
            7_776_000 => ChatEphemeralTimer::ThreeMonths,
            _ => ChatEphemeralTimer::Off,
        }
    }

    pub fn as_seconds(&self) -> u32 {
        match self {
            ChatEphemeralTimer::Off => 0,
            ChatEphemeralTimer::OneDay => 86_400,
            ChatEphemeralTimer::OneWeek => 604_800,
            ChatEphemeralTimer::ThreeMonths => 7_776_000,
        }
    }
}

/// Emitted when a chat's disappearing-messages setting changes remotely.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EphemeralSetting {
    pub chat_jid: Jid,
    pub timer: ChatEphemeralTimer,
    pub toggle_timestamp: u64,
}

/// Emitted when a contact's chosen name changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactAction {
    pub jid: Jid,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use crate::jid::{Jid, Server};
    use crate::message::{MessageContainer, MessageInfo, MessageKey};

    use super::{Chat, ChatEphemeralTimer};

    fn message(id: &str) -> MessageInfo {
        MessageInfo::new(
            MessageKey {
                id: id.into(),
                chat_jid: Jid::new("chat", Server::Group),
                sender_jid: Jid::new("sender", Server::Whatsapp),
                from_me: false,
            },
            MessageContainer::text(id),
        )
    }

    #[test]
    fn message_bookkeeping() {
        let mut chat = Chat::new(Jid::new("chat", Server::Group));
        chat.add_message(message("A"));
        chat.add_message(message("B"));

        assert!(chat.find_message("A").is_some());
        let removed = chat.remove_message("A").unwrap();
        assert_eq!(removed.id(), "A");
        assert!(chat.find_message("A").is_none());
        assert_eq!(chat.messages.len(), 1);
    }

    #[test]
    fn ephemeral_timer_mapping() {
        assert_eq!(
            ChatEphemeralTimer::for_seconds(86_400),
            ChatEphemeralTimer::OneDay
        );
        assert_eq!(ChatEphemeralTimer::for_seconds(1), ChatEphemeralTimer::Off);
        assert_eq!(ChatEphemeralTimer::OneWeek.as_seconds(), 604_800);
    }
}
