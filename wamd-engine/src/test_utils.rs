// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted collaborators for engine tests: a socket that records every
//! outbound stanza and answers queries from pre-loaded responses, and an
//! event recorder.
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use wamd_core::chat::{Chat, ContactAction, EphemeralSetting, GroupMetadata};
use wamd_core::message::{HistorySyncNotification, MessageInfo};
use wamd_core::{Jid, Node};
use wamd_encryption::keypair::PreKeyBundle;

use crate::error::{EngineError, Location};
use crate::traits::{Events, Socket, SocketError};

/// Socket double: outbound traffic is recorded, queries answered from
/// scripts loaded by the test.
#[derive(Default)]
pub struct ScriptedSocket {
    pub sent: Mutex<Vec<Node>>,
    pub acked: Mutex<Vec<Node>>,
    pub receipts: Mutex<Vec<(Jid, Jid, Vec<String>)>>,
    pub sync_receipts: Mutex<Vec<String>>,
    pub queries: Mutex<Vec<(String, String, Node)>>,
    pub patch_pulls: AtomicUsize,
    usync_responses: Mutex<VecDeque<Node>>,
    encrypt_responses: Mutex<VecDeque<Node>>,
    group_metadata: Mutex<HashMap<Jid, GroupMetadata>>,
    media: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedSocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_usync_response(&self, response: Node) {
        self.usync_responses.lock().unwrap().push_back(response);
    }

    pub fn script_encrypt_response(&self, response: Node) {
        self.encrypt_responses.lock().unwrap().push_back(response);
    }

    pub fn script_group_metadata(&self, metadata: GroupMetadata) {
        self.group_metadata
            .lock()
            .unwrap()
            .insert(metadata.jid.clone(), metadata);
    }

    pub fn script_media(&self, blob: Vec<u8>) {
        self.media.lock().unwrap().push(blob);
    }

    /// Outbound `<message>` stanzas.
    pub fn sent_messages(&self) -> Vec<Node> {
        self.sent.lock().unwrap().clone()
    }

    pub fn queries_with_xmlns(&self, xmlns: &str) -> usize {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, ns, _)| ns == xmlns)
            .count()
    }
}

#[async_trait]
impl Socket for ScriptedSocket {
    async fn send(&self, stanza: Node) -> Result<(), SocketError> {
        self.sent.lock().unwrap().push(stanza);
        Ok(())
    }

    async fn send_query(
        &self,
        method: &str,
        xmlns: &str,
        body: Node,
    ) -> Result<Node, SocketError> {
        self.queries
            .lock()
            .unwrap()
            .push((method.to_string(), xmlns.to_string(), body));
        let response = match xmlns {
            "usync" => self.usync_responses.lock().unwrap().pop_front(),
            "encrypt" => self.encrypt_responses.lock().unwrap().pop_front(),
            _ => None,
        };
        response.ok_or(SocketError::MalformedResponse)
    }

    async fn await_ready(&self) -> Result<(), SocketError> {
        Ok(())
    }

    async fn query_group_metadata(&self, jid: &Jid) -> Result<GroupMetadata, SocketError> {
        self.group_metadata
            .lock()
            .unwrap()
            .get(jid)
            .cloned()
            .ok_or(SocketError::MalformedResponse)
    }

    async fn send_message_ack(&self, stanza: &Node) -> Result<(), SocketError> {
        self.acked.lock().unwrap().push(stanza.clone());
        Ok(())
    }

    async fn send_receipt(
        &self,
        chat: &Jid,
        sender: &Jid,
        message_ids: Vec<String>,
    ) -> Result<(), SocketError> {
        self.receipts
            .lock()
            .unwrap()
            .push((chat.clone(), sender.clone(), message_ids));
        Ok(())
    }

    async fn send_sync_receipt(
        &self,
        _info: &MessageInfo,
        receipt_type: &str,
    ) -> Result<(), SocketError> {
        self.sync_receipts
            .lock()
            .unwrap()
            .push(receipt_type.to_string());
        Ok(())
    }

    async fn download_media(
        &self,
        _notification: &HistorySyncNotification,
    ) -> Result<Vec<u8>, SocketError> {
        self.media
            .lock()
            .unwrap()
            .pop()
            .ok_or(SocketError::MalformedResponse)
    }

    async fn pull_initial_patches(&self) -> Result<(), SocketError> {
        self.patch_pulls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Listener double recording every callback.
#[derive(Default)]
pub struct EventRecorder {
    pub new_messages: Mutex<Vec<MessageInfo>>,
    pub new_statuses: Mutex<Vec<MessageInfo>>,
    pub recent_chats: Mutex<Vec<(Jid, bool)>>,
    pub deleted: Mutex<Vec<(String, bool)>>,
    pub settings: Mutex<Vec<EphemeralSetting>>,
    pub actions: Mutex<Vec<ContactAction>>,
    pub chats_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub contacts_calls: AtomicUsize,
    pub failures: Mutex<Vec<String>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recent(&self) -> Vec<(Jid, bool)> {
        self.recent_chats.lock().unwrap().clone()
    }
}

impl Events for EventRecorder {
    fn on_new_message(&self, info: &MessageInfo) {
        self.new_messages.lock().unwrap().push(info.clone());
    }

    fn on_new_status(&self, info: &MessageInfo) {
        self.new_statuses.lock().unwrap().push(info.clone());
    }

    fn on_chat_recent_messages(&self, chat: &Chat, from_history_cache: bool) {
        self.recent_chats
            .lock()
            .unwrap()
            .push((chat.jid().clone(), from_history_cache));
    }

    fn on_message_deleted(&self, info: &MessageInfo, from_remote: bool) {
        self.deleted
            .lock()
            .unwrap()
            .push((info.id().to_string(), from_remote));
    }

    fn on_setting(&self, setting: &EphemeralSetting) {
        self.settings.lock().unwrap().push(setting.clone());
    }

    fn on_action(&self, action: &ContactAction) {
        self.actions.lock().unwrap().push(action.clone());
    }

    fn on_chats(&self) {
        self.chats_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn on_status(&self) {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn on_contacts(&self) {
        self.contacts_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failure(&self, _location: Location, error: &EngineError) {
        self.failures.lock().unwrap().push(error.to_string());
    }
}

/// `<usync>` response for `users`, each with the given `(device_id,
/// has_key_index)` entries.
pub fn usync_response(users: &[(&Jid, &[(u32, bool)])]) -> Node {
    let user_nodes = users
        .iter()
        .map(|(jid, entries)| {
            let devices = entries
                .iter()
                .map(|(id, key_index)| {
                    let node = Node::with_attributes("device", [("id", id)]);
                    if *key_index {
                        node.attr("key-index", 1)
                    } else {
                        node
                    }
                })
                .collect();
            Node::with_children(
                "user",
                vec![Node::with_children(
                    "devices",
                    vec![Node::with_children("device-list", devices)],
                )],
            )
            .attr("jid", jid)
        })
        .collect();
    Node::with_children(
        "iq",
        vec![Node::with_children(
            "usync",
            vec![Node::with_children("list", user_nodes)],
        )],
    )
}

/// `get/encrypt` response carrying pre-key bundles.
pub fn encrypt_response(bundles: &[(&Jid, &PreKeyBundle)]) -> Node {
    let users = bundles
        .iter()
        .map(|(jid, bundle)| {
            let skey = Node::with_children(
                "skey",
                vec![
                    Node::with_bytes("id", id3(bundle.signed_prekey_id)),
                    Node::with_bytes("value", bundle.signed_prekey.to_djb_bytes()),
                    Node::with_bytes(
                        "signature",
                        bundle.signed_prekey_signature.as_bytes().to_vec(),
                    ),
                ],
            );
            let mut children = vec![
                Node::with_bytes("registration", bundle.registration_id.to_be_bytes().to_vec()),
                // Identity travels with the curve-type header stripped.
                Node::with_bytes("identity", bundle.identity_key.as_bytes().to_vec()),
                skey,
            ];
            if let Some((id, key)) = &bundle.onetime_prekey {
                children.push(Node::with_children(
                    "key",
                    vec![
                        Node::with_bytes("id", id3(*id)),
                        Node::with_bytes("value", key.to_djb_bytes()),
                    ],
                ));
            }
            Node::with_children("user", children).attr("jid", jid)
        })
        .collect();
    Node::with_children("iq", vec![Node::with_children("list", users)])
}

fn id3(id: u32) -> Vec<u8> {
    id.to_be_bytes()[1..].to_vec()
}

/// Zlib-compresses a serialized history-sync blob the way the transport
/// delivers it.
pub fn deflate(bytes: &[u8]) -> Vec<u8> {
    let mut encoder =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}
