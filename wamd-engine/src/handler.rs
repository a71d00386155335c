// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message encode/decode orchestration.
//!
//! One handler instance owns the cryptographic single-writer lock: a
//! one-permit semaphore acquired across every encode and around every
//! decrypt step, so inbound and outbound flows can never advance a ratchet
//! concurrently. Cache reads and store queries happen outside the lock;
//! every exit path releases it through the RAII permit.
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use prost::Message as _;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use wamd_core::chat::{Chat, ContactAction, ChatEphemeralTimer, EphemeralSetting};
use wamd_core::jid::Server;
use wamd_core::message::{
    Conversation, DeviceSentMessage, HistorySync, HistorySyncType, Message, MessageContainer,
    MessageInfo, MessageKey, ProtocolMessage, ProtocolType, Pushname,
    SenderKeyDistributionMessage,
};
use wamd_core::{payload, Jid, Node, SenderKeyName};
use wamd_encryption::crypto::x25519::PublicKey;
use wamd_encryption::crypto::xeddsa::XSignature;
use wamd_encryption::keypair::PreKeyBundle;
use wamd_encryption::wire::{self, PreKeySignalMessage, SignalMessage};
use wamd_encryption::{GroupBuilder, GroupCipher, Rng, SessionBuilder, SessionCipher};
use wamd_store::{ChatStore, KeyStore};

use crate::devices::DeviceRegistry;
use crate::error::{EngineError, Location};
use crate::groups::GroupRegistry;
use crate::history::HistoryCache;
use crate::traits::{Events, Socket};

const ENC_VERSION: u32 = 2;

const SKMSG: &str = "skmsg";
const PKMSG: &str = "pkmsg";
const MSG: &str = "msg";

/// Tunables of the engine; defaults carry the protocol constants.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub device_cache_ttl: Duration,
    pub group_cache_ttl: Duration,
    pub history_cache_ttl: Duration,
    pub history_sweep_period: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device_cache_ttl: Duration::from_secs(5 * 60),
            group_cache_ttl: Duration::from_secs(5 * 60),
            history_cache_ttl: Duration::from_secs(60),
            history_sweep_period: Duration::from_secs(1),
        }
    }
}

/// Orchestrates the encrypted messaging core.
pub struct MessageHandler<S, K, C, E> {
    socket: Arc<S>,
    keys: Arc<Mutex<K>>,
    chats: Arc<Mutex<C>>,
    events: Arc<E>,
    rng: Rng,
    lock: Semaphore,
    devices: DeviceRegistry,
    groups: GroupRegistry,
    history: HistoryCache,
}

impl<S, K, C, E> MessageHandler<S, K, C, E>
where
    S: Socket,
    K: KeyStore,
    C: ChatStore,
    E: Events + 'static,
{
    /// Builds the handler and spawns the history sweeper; call from within a
    /// tokio runtime.
    pub fn new(
        socket: Arc<S>,
        keys: Arc<Mutex<K>>,
        chats: Arc<Mutex<C>>,
        events: Arc<E>,
        config: EngineConfig,
    ) -> Self {
        let history = HistoryCache::new(
            config.history_cache_ttl,
            config.history_sweep_period,
            events.clone(),
        );
        Self {
            socket,
            keys,
            chats,
            events,
            rng: Rng::default(),
            lock: Semaphore::new(1),
            devices: DeviceRegistry::new(config.device_cache_ttl),
            groups: GroupRegistry::new(config.group_cache_ttl),
            history,
        }
    }

    fn lock_keys(&self) -> Result<MutexGuard<'_, K>, EngineError> {
        self.keys.lock().map_err(|_| EngineError::LockPoisoned)
    }

    fn lock_chats(&self) -> Result<MutexGuard<'_, C>, EngineError> {
        self.chats.lock().map_err(|_| EngineError::LockPoisoned)
    }

    // ── Encode path ──────────────────────────────────────────────────────

    /// Encrypts and sends a logical message, then appends it to its chat.
    /// Extra attributes are merged into the outer `<message>` node.
    pub async fn encode(
        &self,
        info: MessageInfo,
        attributes: &[(&str, &str)],
    ) -> Result<(), EngineError> {
        self.socket.await_ready().await?;
        let permit = self
            .lock
            .acquire()
            .await
            .expect("encode lock is never closed");

        let result = if info.chat_jid().is_conversation() {
            self.encode_conversation(&info, attributes).await
        } else {
            self.encode_group(&info, attributes).await
        };
        drop(permit);

        match result {
            Ok(()) => Ok(()),
            Err(error) => {
                self.events.on_failure(Location::Message, &error);
                Err(error)
            }
        }
    }

    async fn encode_conversation(
        &self,
        info: &MessageInfo,
        attributes: &[(&str, &str)],
    ) -> Result<(), EngineError> {
        let chat_jid = info.chat_jid().clone();
        let message_bytes = payload::message_to_bytes(&info.message, self.rng.pad_byte()?);

        // Our own devices receive the message boxed as `DeviceSentMessage`
        // so they can mirror it into their local copy of the chat.
        let device_container = MessageContainer::of(Message::DeviceSent(DeviceSentMessage {
            destination_jid: Some(chat_jid.to_string()),
            message: Some(Box::new(info.message.clone())),
            phash: None,
        }));
        let device_message_bytes =
            payload::message_to_bytes(&device_container, self.rng.pad_byte()?);

        let (own_device, own_user_jid) = {
            let keys = self.lock_keys()?;
            (keys.companion().clone(), keys.companion().to_user_jid())
        };

        let tag = self.lock_chats()?.next_tag();
        let targets = self
            .devices
            .resolve(
                self.socket.as_ref(),
                tag,
                &own_device,
                &[own_user_jid.clone(), chat_jid.clone()],
                true,
            )
            .await?;

        self.ensure_sessions(&targets).await?;

        let mut participants = Vec::with_capacity(targets.len());
        for device in &targets {
            let bytes = if device.user() == own_user_jid.user() {
                &device_message_bytes
            } else {
                &message_bytes
            };
            participants.push(self.encrypt_for_device(device, bytes)?);
        }

        let stanza = self.build_message_node(info, participants, None, attributes)?;
        self.socket.send(stanza).await?;
        self.lock_chats()?
            .chat_or_insert(&chat_jid)
            .add_message(info.clone());
        Ok(())
    }

    async fn encode_group(
        &self,
        info: &MessageInfo,
        attributes: &[(&str, &str)],
    ) -> Result<(), EngineError> {
        let chat_jid = info.chat_jid().clone();
        let message_bytes = payload::message_to_bytes(&info.message, self.rng.pad_byte()?);

        let (own_device, distribution, group_ciphertext) = {
            let mut keys = self.lock_keys()?;
            let own_device = keys.companion().clone();
            let sender_name =
                SenderKeyName::new(chat_jid.to_string(), own_device.signal_address());
            let distribution =
                GroupBuilder::new(&mut *keys).create_outgoing(&sender_name, &self.rng)?;
            let ciphertext = GroupCipher::new(&sender_name, &mut *keys)
                .encrypt(&message_bytes, &self.rng)?;
            (own_device, distribution, ciphertext)
        };

        let metadata = self.groups.resolve(self.socket.as_ref(), &chat_jid).await?;
        let tag = self.lock_chats()?.next_tag();
        let all_devices = self
            .devices
            .resolve(
                self.socket.as_ref(),
                tag,
                &own_device,
                &metadata.participants,
                false,
            )
            .await?;

        let missing: Vec<Jid> = {
            let mut chats = self.lock_chats()?;
            let chat = chats.chat_or_insert(&chat_jid);
            all_devices
                .iter()
                .filter(|device| !chat.participants_prekeys.contains(device))
                .cloned()
                .collect()
        };

        let participants = if missing.is_empty() {
            debug!(group = %chat_jid, "sender key already distributed to all devices");
            Vec::new()
        } else {
            self.ensure_sessions(&missing).await?;

            let wrapper =
                MessageContainer::of(Message::SenderKeyDistribution(SenderKeyDistributionMessage {
                    group_id: Some(chat_jid.to_string()),
                    axolotl_sender_key_distribution_message: Some(
                        distribution.serialized().to_vec(),
                    ),
                }));
            let padded = payload::message_to_bytes(&wrapper, self.rng.pad_byte()?);

            let mut nodes = Vec::with_capacity(missing.len());
            for device in &missing {
                nodes.push(self.encrypt_for_device(device, &padded)?);
            }

            let mut chats = self.lock_chats()?;
            let chat = chats.chat_or_insert(&chat_jid);
            chat.participants_prekeys.extend(missing.iter().cloned());
            nodes
        };

        let descriptor = Node::with_bytes("enc", group_ciphertext.serialized().to_vec())
            .attr("v", ENC_VERSION)
            .attr("type", SKMSG);

        let stanza =
            self.build_message_node(info, participants, Some(descriptor), attributes)?;
        self.socket.send(stanza).await?;
        self.lock_chats()?
            .chat_or_insert(&chat_jid)
            .add_message(info.clone());
        Ok(())
    }

    /// Fetches pre-key bundles for every target without a session and runs
    /// X3DH against each.
    async fn ensure_sessions(&self, targets: &[Jid]) -> Result<(), EngineError> {
        let missing: Vec<Jid> = {
            let keys = self.lock_keys()?;
            targets
                .iter()
                .filter(|target| !keys.contains_session(&target.signal_address()))
                .cloned()
                .collect()
        };
        if missing.is_empty() {
            return Ok(());
        }
        debug!(count = missing.len(), "fetching pre-key bundles");

        let users = missing
            .iter()
            .map(|jid| Node::new("user").attr("jid", jid).attr("reason", "identity"))
            .collect();
        let response = self
            .socket
            .send_query("get", "encrypt", Node::with_children("key", users))
            .await?;

        let bundles = parse_bundles(&response)?;
        let mut keys = self.lock_keys()?;
        for (jid, bundle) in bundles {
            SessionBuilder::new(&jid.signal_address(), &mut *keys)
                .create_outgoing(&bundle, &self.rng)?;
        }
        Ok(())
    }

    /// One `<to jid=…><enc v="2" type="pkmsg|msg">…</enc></to>` child.
    fn encrypt_for_device(&self, device: &Jid, plaintext: &[u8]) -> Result<Node, EngineError> {
        let mut keys = self.lock_keys()?;
        let address = device.signal_address();
        let encrypted = SessionCipher::new(&address, &mut *keys).encrypt(plaintext)?;
        let enc = Node::with_bytes("enc", encrypted.serialized().to_vec())
            .attr("v", ENC_VERSION)
            .attr("type", encrypted.type_attribute());
        Ok(Node::with_children("to", vec![enc]).attr("jid", device))
    }

    /// Assembles the outer `<message>` node. `<device-identity>` is attached
    /// exactly when some child `<enc>` is a `pkmsg`.
    fn build_message_node(
        &self,
        info: &MessageInfo,
        participants: Vec<Node>,
        descriptor: Option<Node>,
        attributes: &[(&str, &str)],
    ) -> Result<Node, EngineError> {
        let has_prekey_child = participants
            .iter()
            .flat_map(|participant| participant.children())
            .any(|enc| enc.attributes().optional_string("type") == Some(PKMSG));

        let mut children = Vec::new();
        if !participants.is_empty() {
            children.push(Node::with_children("participants", participants));
        }
        if let Some(descriptor) = descriptor {
            children.push(descriptor);
        }
        if has_prekey_child {
            let identity = self.lock_keys()?.companion_identity().to_vec();
            children.push(Node::with_bytes("device-identity", identity));
        }

        let mut node = Node::with_children("message", children);
        for (key, value) in attributes {
            node = node.attr(*key, value);
        }
        Ok(node
            .attr("id", info.id())
            .attr("type", "text")
            .attr("to", info.chat_jid()))
    }

    // ── Decode path ──────────────────────────────────────────────────────

    /// Decodes every `<enc>` child of an inbound `<message>` stanza. A bad
    /// ciphertext is reported and skipped; its siblings still decode.
    pub async fn decode(&self, stanza: &Node) {
        for enc in stanza.children_by_tag("enc") {
            if let Err(error) = self.decode_one(stanza, enc).await {
                warn!(%error, "failed to decode enc child");
                self.events.on_failure(Location::Message, &error);
            }
        }
    }

    async fn decode_one(&self, stanza: &Node, enc: &Node) -> Result<(), EngineError> {
        let attrs = stanza.attributes();
        let id = attrs.string("id")?.to_string();
        let timestamp = attrs.optional_u64("t")?.unwrap_or(0);
        let push_name = attrs.optional_string("notify").map(str::to_string);
        let from = attrs.jid("from")?;
        let recipient = attrs.optional_jid("recipient")?;
        let participant = attrs.optional_jid("participant")?;
        let peer = attrs.optional_string("category") == Some("peer");

        let own_user_jid = self.lock_keys()?.companion().to_user_jid();
        let key = if matches!(from.server(), Server::Whatsapp | Server::User) {
            MessageKey {
                id,
                chat_jid: recipient.unwrap_or_else(|| from.clone()),
                sender_jid: from.clone(),
                from_me: from == own_user_jid,
            }
        } else {
            let participant = participant
                .clone()
                .ok_or(EngineError::MissingParticipant)?;
            MessageKey {
                id,
                chat_jid: from.clone(),
                sender_jid: participant.clone(),
                from_me: participant.to_user_jid() == own_user_jid,
            }
        };

        // Ack first: the server must stop redelivering even if decryption
        // fails below.
        self.socket.send_message_ack(stanza).await?;

        let ciphertext = enc.required_bytes()?;
        let enc_type = enc.attributes().string("type")?;
        let plaintext = {
            let permit = self
                .lock
                .acquire()
                .await
                .expect("decode lock is never closed");
            let result = self.decrypt_enc(enc_type, ciphertext, &from, participant.as_ref());
            drop(permit);
            result?
        };

        let container = payload::bytes_to_message(&plaintext)?.unbox_device_sent();
        let mut info = MessageInfo::new(key, container);
        info.push_name = push_name;
        info.timestamp = timestamp;

        if let Some(Message::SenderKeyDistribution(distribution)) = info.message.content() {
            self.accept_sender_key(distribution, info.sender_jid()).await?;
        }

        if let Some(Message::Protocol(protocol)) = info.message.content() {
            let protocol = protocol.clone();
            if let Err(error) = self.handle_protocol_message(&info, &protocol, peer).await {
                // Side-effect failures stay local; receipts below still go out.
                warn!(%error, "protocol message side effect failed");
                self.events.on_failure(Location::Message, &error);
            }
        }

        self.save_message(&info)?;
        self.socket
            .send_receipt(
                info.chat_jid(),
                info.sender_jid(),
                vec![info.id().to_string()],
            )
            .await?;
        Ok(())
    }

    fn decrypt_enc(
        &self,
        enc_type: &str,
        ciphertext: &[u8],
        from: &Jid,
        participant: Option<&Jid>,
    ) -> Result<Vec<u8>, EngineError> {
        let mut keys = self.lock_keys()?;
        match enc_type {
            SKMSG => {
                let participant = participant.ok_or(EngineError::MissingParticipant)?;
                let sender_name =
                    SenderKeyName::new(from.to_string(), participant.signal_address());
                Ok(GroupCipher::new(&sender_name, &mut *keys).decrypt(ciphertext)?)
            }
            PKMSG => {
                let user = session_peer(from, participant)?;
                let message = PreKeySignalMessage::deserialize(ciphertext)?;
                Ok(SessionCipher::new(&user.signal_address(), &mut *keys)
                    .decrypt_prekey(&message, &self.rng)?)
            }
            MSG => {
                let user = session_peer(from, participant)?;
                let message = SignalMessage::deserialize(ciphertext)?;
                Ok(SessionCipher::new(&user.signal_address(), &mut *keys)
                    .decrypt(&message, &self.rng)?)
            }
            other => Err(EngineError::UnsupportedType(other.to_string())),
        }
    }

    /// Installs a remote sender key announced inside a decrypted payload.
    async fn accept_sender_key(
        &self,
        distribution: &SenderKeyDistributionMessage,
        sender: &Jid,
    ) -> Result<(), EngineError> {
        let group_id = distribution
            .group_id
            .as_deref()
            .ok_or(EngineError::MalformedProtocolMessage("group id"))?;
        let data = distribution
            .axolotl_sender_key_distribution_message
            .as_deref()
            .ok_or(EngineError::MalformedProtocolMessage("distribution data"))?;
        let message = wire::SenderKeyDistributionMessage::deserialize(data)?;
        let sender_name = SenderKeyName::new(group_id, sender.signal_address());

        let permit = self
            .lock
            .acquire()
            .await
            .expect("decode lock is never closed");
        let result = self
            .lock_keys()
            .map(|mut keys| GroupBuilder::new(&mut *keys).create_incoming(&sender_name, &message));
        drop(permit);
        result
    }

    // ── Protocol side effects ────────────────────────────────────────────

    async fn handle_protocol_message(
        &self,
        info: &MessageInfo,
        protocol: &ProtocolMessage,
        peer: bool,
    ) -> Result<(), EngineError> {
        match protocol.protocol_type() {
            ProtocolType::HistorySyncNotification => {
                self.handle_history_sync(info, protocol).await?;
            }
            ProtocolType::AppStateSyncKeyShare => {
                let share = protocol
                    .app_state_sync_key_share
                    .as_ref()
                    .ok_or(EngineError::MalformedProtocolMessage("key share"))?;
                if !share.keys.is_empty() {
                    self.lock_keys()?.add_app_state_keys(share.keys.clone());
                    self.socket.pull_initial_patches().await?;
                }
            }
            ProtocolType::Revoke => {
                let revoked_id = protocol
                    .key
                    .as_ref()
                    .and_then(|key| key.id.clone())
                    .ok_or(EngineError::MalformedProtocolMessage("message key"))?;
                let removed = self
                    .lock_chats()?
                    .chat_mut(info.chat_jid())
                    .and_then(|chat| chat.remove_message(&revoked_id));
                if let Some(removed) = removed {
                    self.events.on_message_deleted(&removed, true);
                }
            }
            ProtocolType::EphemeralSetting => {
                let expiration = protocol.ephemeral_expiration.unwrap_or(0);
                {
                    let mut chats = self.lock_chats()?;
                    let chat = chats.chat_or_insert(info.chat_jid());
                    chat.ephemeral_expiration = (expiration > 0).then_some(expiration);
                    chat.ephemeral_toggle_timestamp = Some(info.timestamp);
                }
                self.events.on_setting(&EphemeralSetting {
                    chat_jid: info.chat_jid().clone(),
                    timer: ChatEphemeralTimer::for_seconds(expiration),
                    toggle_timestamp: info.timestamp,
                });
            }
            _ => {}
        }

        // Persist before acknowledging, so a crash cannot lose state the
        // server believes we processed.
        self.lock_chats()?.serialize();
        if peer {
            self.socket.send_sync_receipt(info, "peer_msg").await?;
        }
        Ok(())
    }

    async fn handle_history_sync(
        &self,
        info: &MessageInfo,
        protocol: &ProtocolMessage,
    ) -> Result<(), EngineError> {
        let notification = protocol
            .history_sync_notification
            .as_ref()
            .ok_or(EngineError::MalformedProtocolMessage("history notification"))?;
        let compressed = self.socket.download_media(notification).await?;
        let history = inflate_history(&compressed)?;

        match history.history_sync_type() {
            HistorySyncType::InitialBootstrap => {
                for conversation in &history.conversations {
                    self.buffer_history_chat(conversation)?;
                }
                self.lock_chats()?.set_has_snapshot(true);
                self.events.on_chats();
            }
            HistorySyncType::Full => {
                for conversation in &history.conversations {
                    self.buffer_history_chat(conversation)?;
                }
            }
            HistorySyncType::InitialStatusV3 => {
                {
                    let mut chats = self.lock_chats()?;
                    for status in &history.status_v3_messages {
                        if let Ok(status) = MessageInfo::try_from(status) {
                            chats.add_status(status);
                        }
                    }
                }
                self.events.on_status();
            }
            HistorySyncType::Recent => {
                for conversation in &history.conversations {
                    self.handle_recent_chat(conversation)?;
                }
            }
            HistorySyncType::PushName => {
                for pushname in &history.pushnames {
                    self.handle_push_name(pushname)?;
                }
                self.events.on_contacts();
            }
        }

        self.socket.send_sync_receipt(info, "hist_sync").await?;
        Ok(())
    }

    fn buffer_history_chat(&self, conversation: &Conversation) -> Result<(), EngineError> {
        let Some(chat) = conversation_to_chat(conversation) else {
            warn!(id = %conversation.id, "history conversation with unparsable jid");
            return Ok(());
        };
        self.lock_chats()?.add_chat(chat.clone());
        self.history.insert(chat);
        Ok(())
    }

    fn handle_recent_chat(&self, conversation: &Conversation) -> Result<(), EngineError> {
        let Some(chat) = conversation_to_chat(conversation) else {
            warn!(id = %conversation.id, "recent conversation with unparsable jid");
            return Ok(());
        };
        let known = {
            let mut chats = self.lock_chats()?;
            match chats.chat(chat.jid()) {
                Some(known) => known.clone(),
                None => {
                    chats.add_chat(chat.clone());
                    chat
                }
            }
        };
        self.events.on_chat_recent_messages(&known, false);
        self.history.insert(known);
        Ok(())
    }

    fn handle_push_name(&self, pushname: &Pushname) -> Result<(), EngineError> {
        let (Some(id), Some(name)) = (&pushname.id, &pushname.pushname) else {
            return Ok(());
        };
        let Ok(jid) = id.parse::<Jid>() else {
            warn!(id = %id, "push name with unparsable jid");
            return Ok(());
        };
        self.lock_chats()?.contact_or_insert(&jid).chosen_name = Some(name.clone());
        self.events.on_action(&ContactAction {
            jid,
            full_name: Some(name.clone()),
            first_name: None,
        });
        Ok(())
    }

    // ── Persistence ──────────────────────────────────────────────────────

    fn save_message(&self, info: &MessageInfo) -> Result<(), EngineError> {
        if info.chat_jid() == &Jid::status_account() {
            self.lock_chats()?.add_status(info.clone());
            self.events.on_new_status(info);
            return Ok(());
        }

        let mut chats = self.lock_chats()?;
        let initialization_timestamp = chats.initialization_timestamp();
        let unarchive = chats.unarchive_chats();
        let chat = chats.chat_or_insert(info.chat_jid());
        chat.add_message(info.clone());

        if info.timestamp <= initialization_timestamp {
            return Ok(());
        }
        if info.category() == wamd_core::message::MessageCategory::Server {
            return Ok(());
        }
        if chat.archived && unarchive {
            chat.archived = false;
        }
        chat.unread_messages += 1;
        drop(chats);

        self.events.on_new_message(info);
        Ok(())
    }
}

/// The session peer of a 1:1 `<enc>`: the stanza sender for direct messages,
/// the participant when relayed through a group or broadcast envelope.
fn session_peer<'a>(from: &'a Jid, participant: Option<&'a Jid>) -> Result<&'a Jid, EngineError> {
    if from.server() == Server::Whatsapp {
        Ok(from)
    } else {
        participant.ok_or(EngineError::MissingParticipant)
    }
}

/// Parses a `get/encrypt` response into per-user pre-key bundles.
fn parse_bundles(response: &Node) -> Result<Vec<(Jid, PreKeyBundle)>, EngineError> {
    let list = response.required_child("list")?;
    let mut bundles = Vec::new();
    for user in list.children_by_tag("user") {
        let jid = user.attributes().jid("jid")?;
        if user.has_child("error") {
            return Err(EngineError::ErroneousBundle(jid.to_string()));
        }

        let registration_id = read_be_u32(user.required_child("registration")?.required_bytes()?);
        let identity_key =
            PublicKey::from_djb_bytes(user.required_child("identity")?.required_bytes()?)
                .map_err(wire::WireError::from)?;

        let skey = user.required_child("skey")?;
        let signed_prekey_id = read_be_u32(skey.required_child("id")?.required_bytes()?);
        let signed_prekey =
            PublicKey::from_djb_bytes(skey.required_child("value")?.required_bytes()?)
                .map_err(wire::WireError::from)?;
        let signature_bytes = skey.required_child("signature")?.required_bytes()?;
        let signed_prekey_signature = XSignature::from_slice(signature_bytes)
            .map_err(wire::WireError::from)?;

        let onetime_prekey = user
            .find_child("key")
            .map(|key| -> Result<(u32, PublicKey), EngineError> {
                let id = read_be_u32(key.required_child("id")?.required_bytes()?);
                let value =
                    PublicKey::from_djb_bytes(key.required_child("value")?.required_bytes()?)
                        .map_err(wire::WireError::from)?;
                Ok((id, value))
            })
            .transpose()?;

        bundles.push((
            jid,
            PreKeyBundle {
                registration_id,
                identity_key,
                signed_prekey_id,
                signed_prekey,
                signed_prekey_signature,
                onetime_prekey,
            },
        ));
    }
    Ok(bundles)
}

/// Big-endian integer of up to four bytes (ids come as three on the wire,
/// registration ids as four).
fn read_be_u32(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte))
}

fn inflate_history(compressed: &[u8]) -> Result<HistorySync, EngineError> {
    let mut decoder = flate2::read::ZlibDecoder::new(compressed);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(EngineError::Inflate)?;
    HistorySync::decode(decompressed.as_slice()).map_err(EngineError::HistoryDecode)
}

fn conversation_to_chat(conversation: &Conversation) -> Option<Chat> {
    let jid: Jid = conversation.id.parse().ok()?;
    let mut chat = Chat::new(jid);
    chat.name = conversation.name.clone();
    chat.unread_messages = conversation.unread_count.unwrap_or(0);
    chat.archived = conversation.archived.unwrap_or(false);
    chat.ephemeral_expiration = conversation.ephemeral_expiration;
    for message in &conversation.messages {
        if let Some(web) = &message.message {
            if let Ok(info) = MessageInfo::try_from(web) {
                chat.add_message(info);
            }
        }
    }
    Some(chat)
}
