// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message-level encrypt/decrypt against established session state.
use wamd_core::SignalAddress;

use crate::crypto::{aes_cbc, Rng};
use crate::keypair::KeyPair;
use crate::session::builder::SessionBuilder;
use crate::session::state::{check_jump, MessageKeys, ReceiverChain, SessionState};
use crate::session::{SessionError, MAX_SKIPPED_KEYS};
use crate::traits::{IdentityStore, PreKeyStore, SessionStore};
use crate::wire::{PreKeySignalMessage, SignalMessage};

/// Outcome of an encrypt: which stanza-level type tag the ciphertext carries.
#[derive(Clone, Debug)]
pub enum EncryptedMessage {
    /// `pkmsg` — session establishment still pending acknowledgement.
    PreKey(PreKeySignalMessage),
    /// `msg` — ongoing session.
    Whisper(SignalMessage),
}

impl EncryptedMessage {
    pub fn is_prekey(&self) -> bool {
        matches!(self, EncryptedMessage::PreKey(_))
    }

    /// The stanza `type` attribute for this ciphertext.
    pub fn type_attribute(&self) -> &'static str {
        match self {
            EncryptedMessage::PreKey(_) => "pkmsg",
            EncryptedMessage::Whisper(_) => "msg",
        }
    }

    pub fn serialized(&self) -> &[u8] {
        match self {
            EncryptedMessage::PreKey(message) => message.serialized(),
            EncryptedMessage::Whisper(message) => message.serialized(),
        }
    }
}

/// Encrypts and decrypts one message at a time for one address.
///
/// Every mutation happens on a working copy of the state; the store is only
/// written back after MAC verification and decryption succeeded.
pub struct SessionCipher<'a, S> {
    address: &'a SignalAddress,
    store: &'a mut S,
}

impl<'a, S> SessionCipher<'a, S>
where
    S: IdentityStore + SessionStore + PreKeyStore,
{
    pub fn new(address: &'a SignalAddress, store: &'a mut S) -> Self {
        Self { address, store }
    }

    /// Encrypts `plaintext` under the current session state, advancing the
    /// sending chain by one.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<EncryptedMessage, SessionError> {
        let mut session = self
            .store
            .load_session(self.address)
            .ok_or_else(|| SessionError::SessionMissing(self.address.to_string()))?;
        let registration_id = self.store.registration_id();
        let local_identity = *self.store.identity_key_pair().public();
        let state = session
            .current_state_mut()
            .ok_or_else(|| SessionError::SessionMissing(self.address.to_string()))?;

        let chain_key = state.sender_chain.chain_key.clone();
        let keys = chain_key.message_keys();
        let ciphertext = aes_cbc::encrypt(keys.cipher_key(), keys.iv(), plaintext);

        let message = SignalMessage::new(
            keys.mac_key(),
            &local_identity,
            &state.remote_identity,
            *state.sender_chain.ratchet_key_pair.public(),
            chain_key.index(),
            state.previous_counter,
            ciphertext,
        );
        state.sender_chain.chain_key = chain_key.next();

        let result = match &state.pending_prekey {
            Some(pending) => EncryptedMessage::PreKey(PreKeySignalMessage::new(
                registration_id,
                pending.prekey_id,
                pending.signed_prekey_id,
                pending.base_key,
                local_identity,
                message,
            )),
            None => EncryptedMessage::Whisper(message),
        };

        self.store.store_session(self.address, session);
        Ok(result)
    }

    /// Decrypts an ongoing-session message. States are tried most recent
    /// first so late ciphertexts of a superseded session still decrypt.
    pub fn decrypt(&mut self, message: &SignalMessage, rng: &Rng) -> Result<Vec<u8>, SessionError> {
        let mut session = self
            .store
            .load_session(self.address)
            .ok_or_else(|| SessionError::SessionMissing(self.address.to_string()))?;

        let mut first_error = None;
        for index in 0..session.states.len() {
            let mut candidate = session.states[index].clone();
            match decrypt_with_state(&mut candidate, message, rng) {
                Ok(plaintext) => {
                    // The peer evidently holds the session; the X3DH echo is
                    // no longer needed.
                    candidate.pending_prekey = None;
                    session.states[index] = candidate;
                    self.store.store_session(self.address, session);
                    return Ok(plaintext);
                }
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }

        Err(first_error
            .unwrap_or_else(|| SessionError::SessionMissing(self.address.to_string())))
    }

    /// Processes a session-establishing message, then decrypts the enclosed
    /// ciphertext under the (possibly freshly prepended) state.
    pub fn decrypt_prekey(
        &mut self,
        message: &PreKeySignalMessage,
        rng: &Rng,
    ) -> Result<Vec<u8>, SessionError> {
        SessionBuilder::new(self.address, self.store).process_prekey_message(message)?;
        self.decrypt(message.message(), rng)
    }
}

/// Runs the full receive path against one (cloned) state: ratchet step if the
/// sender moved to a new chain, skipped-key lookup or fast-forward, MAC
/// verification, decryption.
fn decrypt_with_state(
    state: &mut SessionState,
    message: &SignalMessage,
    rng: &Rng,
) -> Result<Vec<u8>, SessionError> {
    let their_ratchet = *message.ratchet_key();
    let counter = message.counter();

    if state.receiver_chain_mut(&their_ratchet).is_none() {
        // Unknown ratchet key: the sender stepped the DH ratchet. Derive
        // their new receiving chain and immediately take our own step so the
        // next outgoing message uses a fresh chain as well.
        let (root_key, receiver_chain_key) = state
            .root_key
            .create_chain(&their_ratchet, &state.sender_chain.ratchet_key_pair);
        let new_sending_ratchet = KeyPair::generate(rng)?;
        let (root_key, sender_chain_key) =
            root_key.create_chain(&their_ratchet, &new_sending_ratchet);

        state.root_key = root_key;
        state.previous_counter = state.sender_chain.chain_key.index();
        state.add_receiver_chain(ReceiverChain::new(their_ratchet, receiver_chain_key));
        state.sender_chain = crate::session::state::SenderChain {
            ratchet_key_pair: new_sending_ratchet,
            chain_key: sender_chain_key,
        };
    }

    let keys = take_message_keys(state, &their_ratchet, counter)?;

    if !message.verify_mac(keys.mac_key(), &state.remote_identity, &state.local_identity) {
        return Err(SessionError::BadMac);
    }

    let plaintext = aes_cbc::decrypt(keys.cipher_key(), keys.iv(), message.ciphertext())?;
    Ok(plaintext)
}

/// Produces the message keys for `counter` on the chain opened by
/// `their_ratchet`, advancing the chain and recording skipped keys.
fn take_message_keys(
    state: &mut SessionState,
    their_ratchet: &crate::crypto::x25519::PublicKey,
    counter: u32,
) -> Result<MessageKeys, SessionError> {
    let chain = state
        .receiver_chain_mut(their_ratchet)
        .expect("chain exists after ratchet step");

    if counter < chain.chain_key.index() {
        // Late delivery: the key was set aside when we jumped over it.
        return chain
            .take_skipped(counter)
            .ok_or(SessionError::DuplicateMessage(counter));
    }

    check_jump(counter, chain.chain_key.index())?;

    while chain.chain_key.index() < counter {
        let skipped = chain.chain_key.message_keys();
        chain.skipped.push_back(skipped);
        if chain.skipped.len() > MAX_SKIPPED_KEYS {
            chain.skipped.pop_front();
        }
        chain.chain_key = chain.chain_key.next();
    }

    let keys = chain.chain_key.message_keys();
    chain.chain_key = chain.chain_key.next();
    state.enforce_skipped_cap();
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use wamd_core::SignalAddress;

    use crate::crypto::Rng;
    use crate::session::{SessionBuilder, SessionError, MAX_JUMP};
    use crate::test_store::TestStore;
    use crate::wire::{PreKeySignalMessage, SignalMessage};

    use super::{EncryptedMessage, SessionCipher};

    fn new_peer(name: &str, rng: &Rng) -> (SignalAddress, TestStore) {
        let address = SignalAddress::new(name, 0);
        let store = TestStore::new(rng);
        (address, store)
    }

    /// Alice establishes towards Bob from his published bundle; Bob completes
    /// from her first `pkmsg`. Returns both ends ready to message.
    fn establish(
        rng: &Rng,
    ) -> (
        (SignalAddress, TestStore),
        (SignalAddress, TestStore),
    ) {
        let (alice_address, mut alice_store) = new_peer("alice", rng);
        let (bob_address, mut bob_store) = new_peer("bob", rng);

        let bundle = bob_store.bundle(Some(1));
        SessionBuilder::new(&bob_address, &mut alice_store)
            .create_outgoing(&bundle, rng)
            .unwrap();

        ((alice_address, alice_store), (bob_address, bob_store))
    }

    fn encrypt(
        store: &mut TestStore,
        address: &SignalAddress,
        plaintext: &[u8],
    ) -> EncryptedMessage {
        SessionCipher::new(address, store).encrypt(plaintext).unwrap()
    }

    fn decrypt_any(
        store: &mut TestStore,
        address: &SignalAddress,
        message: &EncryptedMessage,
        rng: &Rng,
    ) -> Result<Vec<u8>, SessionError> {
        let mut cipher = SessionCipher::new(address, store);
        match message {
            EncryptedMessage::PreKey(inner) => {
                let parsed = PreKeySignalMessage::deserialize(inner.serialized()).unwrap();
                cipher.decrypt_prekey(&parsed, rng)
            }
            EncryptedMessage::Whisper(inner) => {
                let parsed = SignalMessage::deserialize(inner.serialized()).unwrap();
                cipher.decrypt(&parsed, rng)
            }
        }
    }

    #[test]
    fn round_trip_and_ratchet_ping_pong() {
        let rng = Rng::from_seed([1; 32]);
        let ((alice_address, mut alice_store), (bob_address, mut bob_store)) = establish(&rng);

        // First message is a pkmsg.
        let first = encrypt(&mut alice_store, &bob_address, b"hi bob");
        assert!(first.is_prekey());
        assert_eq!(
            decrypt_any(&mut bob_store, &alice_address, &first, &rng).unwrap(),
            b"hi bob"
        );

        // Bob replies; the reply acknowledges the session, so Alice's next
        // message drops the pre-key wrapper.
        let reply = encrypt(&mut bob_store, &alice_address, b"hi alice");
        assert!(!reply.is_prekey());
        assert_eq!(
            decrypt_any(&mut alice_store, &bob_address, &reply, &rng).unwrap(),
            b"hi alice"
        );

        let second = encrypt(&mut alice_store, &bob_address, b"how are you");
        assert!(!second.is_prekey());
        assert_eq!(
            decrypt_any(&mut bob_store, &alice_address, &second, &rng).unwrap(),
            b"how are you"
        );

        // Several full DH ratchet turns keep decrypting.
        for turn in 0u32..6 {
            let ping = encrypt(&mut alice_store, &bob_address, b"ping");
            assert_eq!(
                decrypt_any(&mut bob_store, &alice_address, &ping, &rng).unwrap(),
                b"ping"
            );
            let pong = encrypt(&mut bob_store, &alice_address, b"pong");
            assert_eq!(
                decrypt_any(&mut alice_store, &bob_address, &pong, &rng).unwrap(),
                b"pong",
                "turn {turn}"
            );
        }
    }

    #[test]
    fn out_of_order_delivery_uses_skipped_keys() {
        let rng = Rng::from_seed([2; 32]);
        let ((alice_address, mut alice_store), (bob_address, mut bob_store)) = establish(&rng);

        // Counters 0, 1, 2 delivered as 2, 0, 1.
        let m0 = encrypt(&mut alice_store, &bob_address, b"zero");
        let m1 = encrypt(&mut alice_store, &bob_address, b"one");
        let m2 = encrypt(&mut alice_store, &bob_address, b"two");

        assert_eq!(
            decrypt_any(&mut bob_store, &alice_address, &m2, &rng).unwrap(),
            b"two"
        );
        assert_eq!(
            decrypt_any(&mut bob_store, &alice_address, &m0, &rng).unwrap(),
            b"zero"
        );
        assert_eq!(
            decrypt_any(&mut bob_store, &alice_address, &m1, &rng).unwrap(),
            b"one"
        );

        // After draining the skipped keys the chain has moved past counter 2
        // and replays are rejected.
        assert!(matches!(
            decrypt_any(&mut bob_store, &alice_address, &m1, &rng),
            Err(SessionError::DuplicateMessage(_))
        ));

        let state_check = bob_store.session_snapshot(&alice_address);
        assert_eq!(state_check.receiving_index, 3);
        assert_eq!(state_check.skipped_keys, 0);
    }

    #[test]
    fn counter_jump_is_bounded() {
        let rng = Rng::from_seed([3; 32]);
        let ((alice_address, mut alice_store), (bob_address, mut bob_store)) = establish(&rng);

        // Establish the receive chain on Bob's side first.
        let first = encrypt(&mut alice_store, &bob_address, b"first");
        decrypt_any(&mut bob_store, &alice_address, &first, &rng).unwrap();

        // Burn keys far past the allowed jump, deliver only the last one.
        let mut last = None;
        for _ in 0..(MAX_JUMP + 2) {
            last = Some(encrypt(&mut alice_store, &bob_address, b"skipped"));
        }
        assert!(matches!(
            decrypt_any(&mut bob_store, &alice_address, &last.unwrap(), &rng),
            Err(SessionError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_mac() {
        let rng = Rng::from_seed([4; 32]);
        let ((alice_address, mut alice_store), (bob_address, mut bob_store)) = establish(&rng);

        let first = encrypt(&mut alice_store, &bob_address, b"first");
        decrypt_any(&mut bob_store, &alice_address, &first, &rng).unwrap();
        let message = encrypt(&mut alice_store, &bob_address, b"genuine");

        // Flip the last ciphertext byte, right before the 8-byte MAC.
        let mut bytes = message.serialized().to_vec();
        let flip = bytes.len() - 9;
        bytes[flip] ^= 0x01;
        let tampered = SignalMessage::deserialize(&bytes).unwrap();

        let before = bob_store.session_snapshot(&alice_address);
        let result = SessionCipher::new(&alice_address, &mut bob_store).decrypt(&tampered, &rng);
        assert!(matches!(result, Err(SessionError::BadMac)));

        // A forged message must not have advanced persisted state.
        let after = bob_store.session_snapshot(&alice_address);
        assert_eq!(before.receiving_index, after.receiving_index);
        assert_eq!(before.skipped_keys, after.skipped_keys);

        // The genuine message still decrypts.
        assert_eq!(
            decrypt_any(&mut bob_store, &alice_address, &message, &rng).unwrap(),
            b"genuine"
        );
    }

    #[test]
    fn new_prekey_session_keeps_old_state_addressable() {
        let rng = Rng::from_seed([5; 32]);
        let ((alice_address, mut alice_store), (bob_address, mut bob_store)) = establish(&rng);

        let old = encrypt(&mut alice_store, &bob_address, b"old session");
        decrypt_any(&mut bob_store, &alice_address, &old, &rng).unwrap();

        // A second initiator (same identity, fresh base key) establishes a
        // new session towards Bob, e.g. after Alice reinstalled.
        let bundle = bob_store.bundle(Some(2));
        SessionBuilder::new(&bob_address, &mut alice_store)
            .create_outgoing(&bundle, &rng)
            .unwrap();

        // A ciphertext from the old state, delivered late.
        let late = encrypt(&mut bob_store, &alice_address, b"late reply");

        let fresh = encrypt(&mut alice_store, &bob_address, b"new session");
        assert!(fresh.is_prekey());
        assert_eq!(
            decrypt_any(&mut bob_store, &alice_address, &fresh, &rng).unwrap(),
            b"new session"
        );

        // Alice still decrypts the late ciphertext via the archived state.
        assert_eq!(
            decrypt_any(&mut alice_store, &bob_address, &late, &rng).unwrap(),
            b"late reply"
        );
    }

    #[test]
    fn untrusted_identity_is_rejected() {
        let rng = Rng::from_seed([6; 32]);
        let bob_address = SignalAddress::new("bob", 0);
        let mut bob_store = TestStore::new(&rng);
        let mut alice_store = TestStore::new(&rng);

        // Pin one identity for Bob, then present a bundle under another.
        let bundle = bob_store.bundle(Some(3));
        SessionBuilder::new(&bob_address, &mut alice_store)
            .create_outgoing(&bundle, &rng)
            .unwrap();

        let mut imposter = TestStore::new(&rng);
        let forged = imposter.bundle(Some(4));
        let result = SessionBuilder::new(&bob_address, &mut alice_store)
            .create_outgoing(&forged, &rng);
        assert!(matches!(result, Err(SessionError::UntrustedIdentity(_))));
    }

    #[test]
    fn missing_session_and_missing_prekey() {
        let rng = Rng::from_seed([7; 32]);
        let (alice_address, mut alice_store) = new_peer("alice", &rng);

        let result = SessionCipher::new(&SignalAddress::new("nobody", 0), &mut alice_store)
            .encrypt(b"void");
        assert!(matches!(result, Err(SessionError::SessionMissing(_))));

        // Bob references a one-time pre-key Alice never published.
        let (bob_address, mut bob_store) = new_peer("bob", &rng);
        let bundle = alice_store.bundle(Some(1));
        SessionBuilder::new(&alice_address, &mut bob_store)
            .create_outgoing(&bundle, &rng)
            .unwrap();
        let message = encrypt(&mut bob_store, &alice_address, b"hello");

        alice_store.drop_prekeys();
        let parsed = PreKeySignalMessage::deserialize(message.serialized()).unwrap();
        let result = SessionCipher::new(&bob_address, &mut alice_store)
            .decrypt_prekey(&parsed, &rng);
        assert!(matches!(result, Err(SessionError::NoSuchPreKey(_))));
    }

    /// Messages sent before the sender processed our reply (i.e. on the old
    /// chain of a completed ratchet turn) must still decrypt.
    #[test]
    fn old_chain_survives_ratchet_turn() {
        let rng = Rng::from_seed([8; 32]);
        let ((alice_address, mut alice_store), (bob_address, mut bob_store)) = establish(&rng);

        let first = encrypt(&mut alice_store, &bob_address, b"first");
        decrypt_any(&mut bob_store, &alice_address, &first, &rng).unwrap();

        // Alice writes two more on her current chain, but only the first is
        // delivered before Bob replies.
        let stale = encrypt(&mut alice_store, &bob_address, b"stale");
        let reply = encrypt(&mut bob_store, &alice_address, b"reply");
        decrypt_any(&mut alice_store, &bob_address, &reply, &rng).unwrap();

        // Alice has ratcheted; her new message opens a new chain for Bob.
        let fresh = encrypt(&mut alice_store, &bob_address, b"fresh");
        assert_eq!(
            decrypt_any(&mut bob_store, &alice_address, &fresh, &rng).unwrap(),
            b"fresh"
        );

        // The stale message from the previous chain still decrypts.
        assert_eq!(
            decrypt_any(&mut bob_store, &alice_address, &stale, &rng).unwrap(),
            b"stale"
        );
    }
}
