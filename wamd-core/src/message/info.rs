// SPDX-License-Identifier: MIT OR Apache-2.0

use std::str::FromStr;

use crate::jid::{Jid, JidError};
use crate::message::container::{Message, MessageContainer};
use crate::message::history::WebMessageInfo;

/// Identity of a logical message: stanza id plus chat, sender and direction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageKey {
    pub id: String,
    pub chat_jid: Jid,
    pub sender_jid: Jid,
    pub from_me: bool,
}

/// A logical message with its envelope metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageInfo {
    pub key: MessageKey,
    pub message: MessageContainer,
    pub push_name: Option<String>,
    /// Seconds since the epoch, as carried by the stanza `t` attribute.
    pub timestamp: u64,
}

impl MessageInfo {
    pub fn new(key: MessageKey, message: MessageContainer) -> Self {
        Self {
            key,
            message,
            push_name: None,
            timestamp: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.key.id
    }

    pub fn chat_jid(&self) -> &Jid {
        &self.key.chat_jid
    }

    pub fn sender_jid(&self) -> &Jid {
        &self.key.sender_jid
    }

    pub fn category(&self) -> MessageCategory {
        self.message
            .content()
            .map(Message::category)
            .unwrap_or(MessageCategory::Standard)
    }
}

impl TryFrom<&WebMessageInfo> for MessageInfo {
    type Error = JidError;

    fn try_from(web: &WebMessageInfo) -> Result<Self, Self::Error> {
        let chat_jid = Jid::from_str(web.key.remote_jid.as_deref().unwrap_or_default())?;
        let sender_jid = match &web.key.participant {
            Some(participant) => Jid::from_str(participant)?,
            None => chat_jid.clone(),
        };
        Ok(MessageInfo {
            key: MessageKey {
                id: web.key.id.clone().unwrap_or_default(),
                chat_jid,
                sender_jid,
                from_me: web.key.from_me.unwrap_or(false),
            },
            message: web.message.clone().unwrap_or_default(),
            push_name: web.push_name.clone(),
            timestamp: web.message_timestamp.unwrap_or(0),
        })
    }
}

/// Broad classification used for unread accounting: server-driven payloads
/// never bump counters or surface as chat content.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageCategory {
    Standard,
    Server,
}

impl Message {
    pub fn category(&self) -> MessageCategory {
        match self {
            Message::Protocol(_) | Message::SenderKeyDistribution(_) | Message::DeviceSent(_) => {
                MessageCategory::Server
            }
            _ => MessageCategory::Standard,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::jid::Jid;
    use crate::message::container::{Message, MessageContainer};
    use crate::message::protocol::ProtocolMessage;

    use super::{MessageCategory, MessageInfo, MessageKey};

    fn info(message: MessageContainer) -> MessageInfo {
        MessageInfo::new(
            MessageKey {
                id: "ID".into(),
                chat_jid: Jid::new("chat", crate::jid::Server::Whatsapp),
                sender_jid: Jid::new("sender", crate::jid::Server::Whatsapp),
                from_me: false,
            },
            message,
        )
    }

    #[test]
    fn categories() {
        assert_eq!(
            info(MessageContainer::text("hello")).category(),
            MessageCategory::Standard
        );
        assert_eq!(
            info(MessageContainer::of(Message::Protocol(
                ProtocolMessage::default()
            )))
            .category(),
            MessageCategory::Server
        );
        assert_eq!(
            info(MessageContainer::default()).category(),
            MessageCategory::Standard
        );
    }
}
