// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;

use wamd_core::message::{AppStateSyncKey, MessageInfo};
use wamd_core::{Chat, Contact, Jid, SenderKeyName, SignalAddress};
use wamd_encryption::crypto::x25519::PublicKey;
use wamd_encryption::group::SenderKeyState;
use wamd_encryption::traits::{IdentityStore, PreKeyStore, SenderKeyStore, SessionStore};
use wamd_encryption::keypair::KeyPairError;
use wamd_encryption::{
    IdentityKeyPair, PreKeyRecord, Rng, RngError, Session, SignedPreKeyRecord,
};

use crate::traits::{ChatStore, KeyStore};

/// In-memory [`KeyStore`].
pub struct MemoryKeys {
    companion: Jid,
    companion_identity: Vec<u8>,
    identity: IdentityKeyPair,
    registration_id: u32,
    signed_prekey: SignedPreKeyRecord,
    prekeys: HashMap<u32, PreKeyRecord>,
    sessions: HashMap<SignalAddress, Session>,
    sender_keys: HashMap<SenderKeyName, SenderKeyState>,
    trusted: HashMap<SignalAddress, PublicKey>,
    app_state_keys: Vec<AppStateSyncKey>,
}

impl MemoryKeys {
    /// Freshly generated key material for `companion`.
    pub fn generate(companion: Jid, rng: &Rng) -> Result<Self, KeyPairError> {
        let identity = IdentityKeyPair::generate(rng)?;
        let signed_prekey = SignedPreKeyRecord::generate(1, &identity, rng)?;
        Ok(Self {
            companion,
            companion_identity: Vec::new(),
            identity,
            registration_id: rng.key_id()?,
            signed_prekey,
            prekeys: HashMap::new(),
            sessions: HashMap::new(),
            sender_keys: HashMap::new(),
            trusted: HashMap::new(),
            app_state_keys: Vec::new(),
        })
    }

    pub fn set_companion_identity(&mut self, identity: Vec<u8>) {
        self.companion_identity = identity;
    }

    /// Registers `count` fresh one-time pre-keys and returns their ids.
    pub fn mint_prekeys(&mut self, count: u32, rng: &Rng) -> Result<Vec<u32>, RngError> {
        let start = self.prekeys.keys().max().copied().unwrap_or(0) + 1;
        let mut ids = Vec::with_capacity(count as usize);
        for id in start..start + count {
            self.prekeys.insert(id, PreKeyRecord::generate(id, rng)?);
            ids.push(id);
        }
        Ok(ids)
    }

    pub fn app_state_keys(&self) -> &[AppStateSyncKey] {
        &self.app_state_keys
    }

    pub fn signed_prekey_record(&self) -> &SignedPreKeyRecord {
        &self.signed_prekey
    }
}

impl IdentityStore for MemoryKeys {
    fn identity_key_pair(&self) -> &IdentityKeyPair {
        &self.identity
    }

    fn registration_id(&self) -> u32 {
        self.registration_id
    }

    fn is_trusted_identity(&self, address: &SignalAddress, identity: &PublicKey) -> bool {
        match self.trusted.get(address) {
            Some(pinned) => pinned == identity,
            None => true,
        }
    }

    fn save_identity(&mut self, address: &SignalAddress, identity: &PublicKey) {
        self.trusted.insert(address.clone(), *identity);
    }
}

impl SessionStore for MemoryKeys {
    fn load_session(&self, address: &SignalAddress) -> Option<Session> {
        self.sessions.get(address).cloned()
    }

    fn store_session(&mut self, address: &SignalAddress, session: Session) {
        self.sessions.insert(address.clone(), session);
    }
}

impl PreKeyStore for MemoryKeys {
    fn signed_prekey(&self, id: u32) -> Option<SignedPreKeyRecord> {
        (self.signed_prekey.id() == id).then(|| self.signed_prekey.clone())
    }

    fn prekey(&self, id: u32) -> Option<PreKeyRecord> {
        self.prekeys.get(&id).cloned()
    }

    fn remove_prekey(&mut self, id: u32) {
        self.prekeys.remove(&id);
    }
}

impl SenderKeyStore for MemoryKeys {
    fn load_sender_key(&self, name: &SenderKeyName) -> Option<SenderKeyState> {
        self.sender_keys.get(name).cloned()
    }

    fn store_sender_key(&mut self, name: &SenderKeyName, state: SenderKeyState) {
        self.sender_keys.insert(name.clone(), state);
    }
}

impl KeyStore for MemoryKeys {
    fn companion(&self) -> &Jid {
        &self.companion
    }

    fn companion_identity(&self) -> &[u8] {
        &self.companion_identity
    }

    fn add_app_state_keys(&mut self, keys: Vec<AppStateSyncKey>) {
        self.app_state_keys.extend(keys);
    }
}

/// In-memory [`ChatStore`].
#[derive(Default)]
pub struct MemoryStore {
    chats: HashMap<Jid, Chat>,
    contacts: HashMap<Jid, Contact>,
    statuses: Vec<MessageInfo>,
    tag_counter: u64,
    initialization_timestamp: u64,
    unarchive_chats: bool,
    has_snapshot: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initialization_timestamp(mut self, timestamp: u64) -> Self {
        self.initialization_timestamp = timestamp;
        self
    }

    pub fn with_unarchive_chats(mut self, unarchive: bool) -> Self {
        self.unarchive_chats = unarchive;
        self
    }

    pub fn statuses(&self) -> &[MessageInfo] {
        &self.statuses
    }

    pub fn has_snapshot(&self) -> bool {
        self.has_snapshot
    }

    pub fn chats(&self) -> impl Iterator<Item = &Chat> {
        self.chats.values()
    }
}

impl ChatStore for MemoryStore {
    fn next_tag(&mut self) -> String {
        self.tag_counter += 1;
        format!("{}", self.tag_counter)
    }

    fn initialization_timestamp(&self) -> u64 {
        self.initialization_timestamp
    }

    fn unarchive_chats(&self) -> bool {
        self.unarchive_chats
    }

    fn set_has_snapshot(&mut self, has_snapshot: bool) {
        self.has_snapshot = has_snapshot;
    }

    fn add_chat(&mut self, chat: Chat) {
        self.chats.insert(chat.jid().clone(), chat);
    }

    fn chat(&self, jid: &Jid) -> Option<&Chat> {
        self.chats.get(jid)
    }

    fn chat_mut(&mut self, jid: &Jid) -> Option<&mut Chat> {
        self.chats.get_mut(jid)
    }

    fn chat_or_insert(&mut self, jid: &Jid) -> &mut Chat {
        self.chats
            .entry(jid.clone())
            .or_insert_with(|| Chat::new(jid.clone()))
    }

    fn add_status(&mut self, info: MessageInfo) {
        self.statuses.push(info);
    }

    fn contact(&self, jid: &Jid) -> Option<&Contact> {
        self.contacts.get(jid)
    }

    fn contact_or_insert(&mut self, jid: &Jid) -> &mut Contact {
        self.contacts
            .entry(jid.clone())
            .or_insert_with(|| Contact::new(jid.clone()))
    }

    fn serialize(&mut self) {
        // Nothing durable behind the in-memory store.
    }
}
