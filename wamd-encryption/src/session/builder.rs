// SPDX-License-Identifier: MIT OR Apache-2.0

//! X3DH session establishment.
use std::collections::VecDeque;

use wamd_core::SignalAddress;

use crate::crypto::kdf::{self, Derivation};
use crate::crypto::Rng;
use crate::keypair::{KeyPair, PreKeyBundle};
use crate::session::state::{
    ChainKey, PendingPreKey, ReceiverChain, RootKey, SenderChain, SessionState,
};
use crate::session::SessionError;
use crate::traits::{IdentityStore, PreKeyStore, SessionStore};
use crate::wire::{PreKeySignalMessage, CIPHERTEXT_VERSION};

/// Marks the start of the X3DH secret input, so agreements can never be
/// confused with key material from other protocol versions.
const DISCONTINUITY: [u8; 32] = [0xFF; 32];

/// Establishes session state for one address.
pub struct SessionBuilder<'a, S> {
    address: &'a SignalAddress,
    store: &'a mut S,
}

impl<'a, S> SessionBuilder<'a, S>
where
    S: IdentityStore + SessionStore + PreKeyStore,
{
    pub fn new(address: &'a SignalAddress, store: &'a mut S) -> Self {
        Self { address, store }
    }

    /// Initializes an outgoing session from a fetched pre-key bundle and
    /// installs it as current for the address. The first messages of the new
    /// session go out as `pkmsg` until the peer replies.
    pub fn create_outgoing(&mut self, bundle: &PreKeyBundle, rng: &Rng) -> Result<(), SessionError> {
        bundle
            .verify()
            .map_err(|_| SessionError::InvalidSignature)?;

        if !self
            .store
            .is_trusted_identity(self.address, &bundle.identity_key)
        {
            return Err(SessionError::UntrustedIdentity(self.address.to_string()));
        }

        let our_identity = self.store.identity_key_pair().clone();
        let base_key = KeyPair::generate(rng)?;

        // DH1..DH4 of X3DH, our side initiating.
        let mut secrets = Vec::with_capacity(32 * 5);
        secrets.extend_from_slice(&DISCONTINUITY);
        secrets.extend_from_slice(
            &our_identity
                .secret()
                .calculate_agreement(&bundle.signed_prekey),
        );
        secrets.extend_from_slice(&base_key.secret().calculate_agreement(&bundle.identity_key));
        secrets.extend_from_slice(&base_key.secret().calculate_agreement(&bundle.signed_prekey));
        if let Some((_, onetime_prekey)) = &bundle.onetime_prekey {
            secrets.extend_from_slice(&base_key.secret().calculate_agreement(onetime_prekey));
        }

        let (root_key, receiver_chain_key) = derive_initial_keys(&secrets);

        // The peer's signed pre-key doubles as their first ratchet key; our
        // first sending chain comes from one more ratchet step against it.
        let sending_ratchet = KeyPair::generate(rng)?;
        let (root_key, sender_chain_key) =
            root_key.create_chain(&bundle.signed_prekey, &sending_ratchet);

        let mut state = SessionState {
            version: CIPHERTEXT_VERSION,
            local_identity: *our_identity.public(),
            remote_identity: bundle.identity_key,
            root_key,
            sender_chain: SenderChain {
                ratchet_key_pair: sending_ratchet,
                chain_key: sender_chain_key,
            },
            receiver_chains: VecDeque::new(),
            previous_counter: 0,
            pending_prekey: Some(PendingPreKey {
                prekey_id: bundle.onetime_prekey.as_ref().map(|(id, _)| *id),
                signed_prekey_id: bundle.signed_prekey_id,
                base_key: *base_key.public(),
            }),
            base_key: *base_key.public(),
            remote_registration_id: bundle.registration_id,
            closed: false,
        };
        state.add_receiver_chain(ReceiverChain::new(bundle.signed_prekey, receiver_chain_key));

        let mut session = self.store.load_session(self.address).unwrap_or_default();
        session.close_current_state();
        session.push_state(state);
        self.store.store_session(self.address, session);
        self.store.save_identity(self.address, &bundle.identity_key);
        Ok(())
    }

    /// Mirrors the X3DH derivation for an incoming `PreKeySignalMessage`,
    /// prepending the resulting state. The prior session — if any — stays
    /// addressable for late ciphertexts. Returns the consumed one-time
    /// pre-key id, or `None` when the message re-announced a known session.
    pub(crate) fn process_prekey_message(
        &mut self,
        message: &PreKeySignalMessage,
    ) -> Result<Option<u32>, SessionError> {
        if !self
            .store
            .is_trusted_identity(self.address, message.identity_key())
        {
            return Err(SessionError::UntrustedIdentity(self.address.to_string()));
        }

        let mut session = self.store.load_session(self.address).unwrap_or_default();
        if session.has_state(CIPHERTEXT_VERSION, message.base_key()) {
            // Retransmitted establishment; the state already exists.
            return Ok(None);
        }

        let signed_prekey = self
            .store
            .signed_prekey(message.signed_pre_key_id())
            .ok_or(SessionError::NoSuchPreKey(message.signed_pre_key_id()))?;
        let onetime_prekey = message
            .pre_key_id()
            .map(|id| {
                self.store
                    .prekey(id)
                    .map(|record| (id, record))
                    .ok_or(SessionError::NoSuchPreKey(id))
            })
            .transpose()?;

        let our_identity = self.store.identity_key_pair().clone();

        // Same agreements as the initiator, with the roles flipped.
        let mut secrets = Vec::with_capacity(32 * 5);
        secrets.extend_from_slice(&DISCONTINUITY);
        secrets.extend_from_slice(
            &signed_prekey
                .key_pair()
                .secret()
                .calculate_agreement(message.identity_key()),
        );
        secrets.extend_from_slice(
            &our_identity
                .secret()
                .calculate_agreement(message.base_key()),
        );
        secrets.extend_from_slice(
            &signed_prekey
                .key_pair()
                .secret()
                .calculate_agreement(message.base_key()),
        );
        if let Some((_, record)) = &onetime_prekey {
            secrets.extend_from_slice(
                &record
                    .key_pair()
                    .secret()
                    .calculate_agreement(message.base_key()),
            );
        }

        let (root_key, sender_chain_key) = derive_initial_keys(&secrets);

        // Our signed pre-key is the ratchet key the initiator derived their
        // first receiving chain from; the first incoming message triggers the
        // DH step that opens our receiving side.
        let state = SessionState {
            version: CIPHERTEXT_VERSION,
            local_identity: *our_identity.public(),
            remote_identity: *message.identity_key(),
            root_key,
            sender_chain: SenderChain {
                ratchet_key_pair: signed_prekey.key_pair().clone(),
                chain_key: sender_chain_key,
            },
            receiver_chains: VecDeque::new(),
            previous_counter: 0,
            pending_prekey: None,
            base_key: *message.base_key(),
            remote_registration_id: message.registration_id(),
            closed: false,
        };

        session.push_state(state);
        self.store.store_session(self.address, session);
        self.store
            .save_identity(self.address, message.identity_key());

        let used_prekey_id = onetime_prekey.map(|(id, _)| id);
        if let Some(id) = used_prekey_id {
            self.store.remove_prekey(id);
        }
        Ok(used_prekey_id)
    }
}

fn derive_initial_keys(secrets: &[u8]) -> (RootKey, ChainKey) {
    let okm: [u8; 64] = kdf::derive(Derivation::Initial, b"", secrets);
    (
        RootKey::new(okm[..32].try_into().expect("split size")),
        ChainKey::new(okm[32..].try_into().expect("split size"), 0),
    )
}
