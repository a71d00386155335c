// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory store used by this crate's tests and by downstream test setups.
use std::collections::HashMap;

use wamd_core::{SenderKeyName, SignalAddress};

use crate::crypto::x25519::PublicKey;
use crate::crypto::Rng;
use crate::group::SenderKeyState;
use crate::keypair::{IdentityKeyPair, PreKeyBundle, PreKeyRecord, SignedPreKeyRecord};
use crate::session::Session;
use crate::traits::{IdentityStore, PreKeyStore, SenderKeyStore, SessionStore};

/// Observable ratchet position, for assertions on persisted state.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Index of the newest receiving chain.
    pub receiving_index: u32,
    /// Skipped keys across all receiving chains.
    pub skipped_keys: usize,
}

/// One peer's complete key state.
pub struct TestStore {
    identity: IdentityKeyPair,
    registration_id: u32,
    signed_prekey: SignedPreKeyRecord,
    prekeys: HashMap<u32, PreKeyRecord>,
    sessions: HashMap<SignalAddress, Session>,
    sender_keys: HashMap<SenderKeyName, SenderKeyState>,
    trusted: HashMap<SignalAddress, PublicKey>,
}

impl TestStore {
    pub fn new(rng: &Rng) -> Self {
        let identity = IdentityKeyPair::generate(rng).unwrap();
        let signed_prekey = SignedPreKeyRecord::generate(1, &identity, rng).unwrap();
        Self {
            identity,
            registration_id: rng.key_id().unwrap(),
            signed_prekey,
            prekeys: HashMap::new(),
            sessions: HashMap::new(),
            sender_keys: HashMap::new(),
            trusted: HashMap::new(),
        }
    }

    /// Publishes this peer's bundle, minting the referenced one-time pre-key.
    pub fn bundle(&mut self, onetime_prekey_id: Option<u32>) -> PreKeyBundle {
        let rng = Rng::default();
        let onetime_prekey = onetime_prekey_id.map(|id| {
            let record = PreKeyRecord::generate(id, &rng).unwrap();
            let public = *record.key_pair().public();
            self.prekeys.insert(id, record);
            (id, public)
        });
        PreKeyBundle {
            registration_id: self.registration_id,
            identity_key: *self.identity.public(),
            signed_prekey_id: self.signed_prekey.id(),
            signed_prekey: *self.signed_prekey.key_pair().public(),
            signed_prekey_signature: *self.signed_prekey.signature(),
            onetime_prekey,
        }
    }

    /// Discards all one-time pre-keys, simulating a store that lost them.
    pub fn drop_prekeys(&mut self) {
        self.prekeys.clear();
    }

    pub fn session_snapshot(&self, address: &SignalAddress) -> SessionSnapshot {
        let session = self.sessions.get(address).expect("session exists");
        let state = session.current_state().expect("current state exists");
        SessionSnapshot {
            receiving_index: state
                .receiver_chains
                .front()
                .map(|chain| chain.chain_key.index())
                .unwrap_or(0),
            skipped_keys: state.skipped_key_count(),
        }
    }
}

impl IdentityStore for TestStore {
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

impl SessionStore for TestStore {
    fn load_session(&self, address: &SignalAddress) -> Option<Session> {
        self.sessions.get(address).cloned()
    }

    fn store_session(&mut self, address: &SignalAddress, session: Session) {
        self.sessions.insert(address.clone(), session);
    }
}

impl PreKeyStore for TestStore {
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

impl SenderKeyStore for TestStore {
    fn load_sender_key(&self, name: &SenderKeyName) -> Option<SenderKeyState> {
        self.sender_keys.get(name).cloned()
    }

    fn store_sender_key(&mut self, name: &SenderKeyName, state: SenderKeyState) {
        self.sender_keys.insert(name.clone(), state);
    }
}
