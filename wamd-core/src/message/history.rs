// SPDX-License-Identifier: MIT OR Apache-2.0

//! History-sync payloads: the primary device streams chat history to
//! companions in zlib-compressed protobuf chunks.
use crate::message::container::MessageContainer;
use crate::message::protocol::MessageKeyProto;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum HistorySyncType {
    InitialBootstrap = 0,
    InitialStatusV3 = 1,
    Full = 2,
    Recent = 3,
    PushName = 4,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HistorySync {
    #[prost(enumeration = "HistorySyncType", required, tag = "1")]
    pub sync_type: i32,
    #[prost(message, repeated, tag = "2")]
    pub conversations: Vec<Conversation>,
    #[prost(message, repeated, tag = "3")]
    pub status_v3_messages: Vec<WebMessageInfo>,
    #[prost(uint32, optional, tag = "5")]
    pub chunk_order: Option<u32>,
    #[prost(uint32, optional, tag = "6")]
    pub progress: Option<u32>,
    #[prost(message, repeated, tag = "7")]
    pub pushnames: Vec<Pushname>,
}

impl HistorySync {
    pub fn history_sync_type(&self) -> HistorySyncType {
        HistorySyncType::try_from(self.sync_type).unwrap_or(HistorySyncType::InitialBootstrap)
    }
}

/// One chat as carried by a history sync.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Conversation {
    /// Chat JID.
    #[prost(string, required, tag = "1")]
    pub id: String,
    #[prost(message, repeated, tag = "2")]
    pub messages: Vec<HistorySyncMsg>,
    #[prost(string, optional, tag = "4")]
    pub name: Option<String>,
    #[prost(uint32, optional, tag = "6")]
    pub unread_count: Option<u32>,
    #[prost(bool, optional, tag = "9")]
    pub archived: Option<bool>,
    #[prost(uint32, optional, tag = "10")]
    pub ephemeral_expiration: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HistorySyncMsg {
    #[prost(message, optional, tag = "1")]
    pub message: Option<WebMessageInfo>,
    #[prost(uint64, optional, tag = "2")]
    pub msg_order_id: Option<u64>,
}

/// A stored message as the web/history protocol represents it.
#[derive(Clone, PartialEq, prost::Message)]
pub struct WebMessageInfo {
    #[prost(message, required, tag = "1")]
    pub key: MessageKeyProto,
    #[prost(message, optional, tag = "2")]
    pub message: Option<MessageContainer>,
    #[prost(uint64, optional, tag = "3")]
    pub message_timestamp: Option<u64>,
    #[prost(string, optional, tag = "19")]
    pub push_name: Option<String>,
}

/// Chosen display name of a contact.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Pushname {
    #[prost(string, optional, tag = "1")]
    pub id: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub pushname: Option<String>,
}
