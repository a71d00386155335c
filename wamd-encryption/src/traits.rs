// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage seams the state machines operate against.
//!
//! Implementations are expected to be cheap in-memory maps; durability is the
//! caller's concern. All methods are synchronous — builders and ciphers run
//! under the engine's single-writer lock, never across a suspension point.
use wamd_core::{SenderKeyName, SignalAddress};

use crate::crypto::x25519::PublicKey;
use crate::group::SenderKeyState;
use crate::keypair::{IdentityKeyPair, PreKeyRecord, SignedPreKeyRecord};
use crate::session::Session;

/// Our own identity and the identities pinned for remote addresses.
pub trait IdentityStore {
    fn identity_key_pair(&self) -> &IdentityKeyPair;

    fn registration_id(&self) -> u32;

    /// Whether `identity` may be used for `address`. First contact is
    /// trusted; a changed identity is rejected until re-pinned.
    fn is_trusted_identity(&self, address: &SignalAddress, identity: &PublicKey) -> bool;

    fn save_identity(&mut self, address: &SignalAddress, identity: &PublicKey);
}

/// Session records per remote address.
pub trait SessionStore {
    fn load_session(&self, address: &SignalAddress) -> Option<Session>;

    fn store_session(&mut self, address: &SignalAddress, session: Session);

    fn contains_session(&self, address: &SignalAddress) -> bool {
        self.load_session(address).is_some()
    }
}

/// Our published pre-keys, looked up when a peer establishes a session
/// towards us.
pub trait PreKeyStore {
    fn signed_prekey(&self, id: u32) -> Option<SignedPreKeyRecord>;

    fn prekey(&self, id: u32) -> Option<PreKeyRecord>;

    /// One-time pre-keys are consumed by the first session that uses them.
    fn remove_prekey(&mut self, id: u32);
}

/// Sender-key chains per (group, sending device).
pub trait SenderKeyStore {
    fn load_sender_key(&self, name: &SenderKeyName) -> Option<SenderKeyState>;

    fn store_sender_key(&mut self, name: &SenderKeyName, state: SenderKeyState);
}

/// Everything the ciphers need, in one bound.
pub trait SignalStore: IdentityStore + SessionStore + PreKeyStore + SenderKeyStore {}

impl<T: IdentityStore + SessionStore + PreKeyStore + SenderKeyStore> SignalStore for T {}
