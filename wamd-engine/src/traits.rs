// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator interfaces of the engine.
use async_trait::async_trait;
use thiserror::Error;

use wamd_core::chat::{Chat, ContactAction, EphemeralSetting, GroupMetadata};
use wamd_core::message::{HistorySyncNotification, MessageInfo};
use wamd_core::{Jid, Node};

use crate::error::{EngineError, Location};

/// The WebSocket transport, as far as the engine is concerned.
///
/// The engine never frames or authenticates anything itself; it hands
/// finished stanzas to the socket and consumes parsed response nodes.
#[async_trait]
pub trait Socket: Send + Sync {
    /// Sends a finished stanza.
    async fn send(&self, stanza: Node) -> Result<(), SocketError>;

    /// Sends an iq query and awaits the response stanza.
    async fn send_query(&self, method: &str, xmlns: &str, body: Node)
        -> Result<Node, SocketError>;

    /// Resolves once the connection is ready to carry messages.
    async fn await_ready(&self) -> Result<(), SocketError>;

    /// Group metadata lookup, bypassing any cache.
    async fn query_group_metadata(&self, jid: &Jid) -> Result<GroupMetadata, SocketError>;

    /// Acknowledges a stanza (`class="receipt"`) so the server stops
    /// redelivering it.
    async fn send_message_ack(&self, stanza: &Node) -> Result<(), SocketError>;

    /// Application-level receipt for persisted messages.
    async fn send_receipt(
        &self,
        chat: &Jid,
        sender: &Jid,
        message_ids: Vec<String>,
    ) -> Result<(), SocketError>;

    /// Receipt with an explicit type (`hist_sync`, `peer_msg`).
    async fn send_sync_receipt(
        &self,
        info: &MessageInfo,
        receipt_type: &str,
    ) -> Result<(), SocketError>;

    /// Downloads and decrypts the blob referenced by a history-sync
    /// notification.
    async fn download_media(
        &self,
        notification: &HistorySyncNotification,
    ) -> Result<Vec<u8>, SocketError>;

    /// Starts the initial app-state patch pull after new sync keys arrived.
    async fn pull_initial_patches(&self) -> Result<(), SocketError>;
}

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("connection closed")]
    Closed,

    #[error("query returned malformed response")]
    MalformedResponse,
}

/// Callback surface exposed upward. All methods default to no-ops so
/// implementors only override what they observe.
pub trait Events: Send + Sync {
    fn on_new_message(&self, _info: &MessageInfo) {}

    fn on_new_status(&self, _info: &MessageInfo) {}

    fn on_chat_recent_messages(&self, _chat: &Chat, _from_history_cache: bool) {}

    fn on_message_deleted(&self, _info: &MessageInfo, _from_remote: bool) {}

    fn on_setting(&self, _setting: &EphemeralSetting) {}

    fn on_action(&self, _action: &ContactAction) {}

    /// A history snapshot finished loading.
    fn on_chats(&self) {}

    fn on_status(&self) {}

    fn on_contacts(&self) {}

    /// A pipeline failure after which the engine kept going (bad `<enc>`,
    /// transport error, …). The handler decides whether to reconnect, retry
    /// or surface to the caller.
    fn on_failure(&self, _location: Location, _error: &EngineError) {}
}
