// SPDX-License-Identifier: MIT OR Apache-2.0

//! Group message encrypt/decrypt against sender-key state.
use wamd_core::SenderKeyName;

use crate::crypto::{aes_cbc, Rng};
use crate::group::state::{SenderKeyState, SenderMessageKey, MAX_SENDER_MESSAGE_KEYS};
use crate::group::GroupError;
use crate::traits::SenderKeyStore;
use crate::wire::SenderKeyMessage;

/// Encrypts and decrypts broadcasts for one (group, sender) chain.
///
/// Signature verification happens before any state is touched; chain
/// advancement is computed on a working copy and only persisted after the
/// ciphertext decrypted.
pub struct GroupCipher<'a, S> {
    sender_name: &'a SenderKeyName,
    store: &'a mut S,
}

impl<'a, S> GroupCipher<'a, S>
where
    S: SenderKeyStore,
{
    pub fn new(sender_name: &'a SenderKeyName, store: &'a mut S) -> Self {
        Self { sender_name, store }
    }

    /// Encrypts one broadcast under our chain, advancing it by one.
    pub fn encrypt(&mut self, plaintext: &[u8], rng: &Rng) -> Result<SenderKeyMessage, GroupError> {
        let mut state = self
            .store
            .load_sender_key(self.sender_name)
            .ok_or_else(|| GroupError::NoSenderKeyState(self.sender_name.to_string()))?;
        let signing_secret = state
            .signing_secret
            .clone()
            .ok_or_else(|| GroupError::NoSigningKey(self.sender_name.to_string()))?;

        let keys = state.chain_key.message_key();
        let ciphertext = aes_cbc::encrypt(keys.cipher_key(), keys.iv(), plaintext);
        let message = SenderKeyMessage::new(
            state.key_id,
            keys.iteration(),
            ciphertext,
            &signing_secret,
            rng,
        )?;

        state.chain_key = state.chain_key.next();
        self.store.store_sender_key(self.sender_name, state);
        Ok(message)
    }

    /// Verifies and decrypts one broadcast.
    pub fn decrypt(&mut self, serialized: &[u8]) -> Result<Vec<u8>, GroupError> {
        let message = SenderKeyMessage::deserialize(serialized)?;
        let mut state = self
            .store
            .load_sender_key(self.sender_name)
            .ok_or_else(|| GroupError::NoSenderKeyState(self.sender_name.to_string()))?;

        message
            .verify_signature(&state.signing_public)
            .map_err(|_| GroupError::InvalidSignature)?;

        let keys = take_message_key(&mut state, message.iteration())?;
        let plaintext = aes_cbc::decrypt(keys.cipher_key(), keys.iv(), message.ciphertext())?;

        self.store.store_sender_key(self.sender_name, state);
        Ok(plaintext)
    }
}

/// Message key for `iteration`: served from the ring of past keys when the
/// chain already moved past it, otherwise by fast-forwarding the chain.
fn take_message_key(
    state: &mut SenderKeyState,
    iteration: u32,
) -> Result<SenderMessageKey, GroupError> {
    let current = state.chain_key.iteration();

    if iteration < current {
        return state
            .take_past_key(iteration)
            .ok_or(GroupError::DuplicateMessage(iteration));
    }

    if iteration - current > MAX_SENDER_MESSAGE_KEYS as u32 {
        return Err(GroupError::OutOfBounds { iteration, current });
    }

    while state.chain_key.iteration() < iteration {
        let skipped = state.chain_key.message_key();
        state.store_past_key(skipped);
        state.chain_key = state.chain_key.next();
    }

    let keys = state.chain_key.message_key();
    state.chain_key = state.chain_key.next();
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use wamd_core::{SenderKeyName, SignalAddress};

    use crate::crypto::Rng;
    use crate::group::{GroupBuilder, GroupError};
    use crate::test_store::TestStore;
    use crate::wire::SenderKeyDistributionMessage;

    use super::GroupCipher;

    fn sender_name() -> SenderKeyName {
        SenderKeyName::new("group@g.us", SignalAddress::new("alice", 0))
    }

    /// Alice creates her chain and Bob installs it from the distribution.
    fn distribute(rng: &Rng) -> (TestStore, TestStore, SenderKeyName) {
        let name = sender_name();
        let mut alice = TestStore::new(rng);
        let mut bob = TestStore::new(rng);

        let distribution = GroupBuilder::new(&mut alice)
            .create_outgoing(&name, rng)
            .unwrap();
        let parsed =
            SenderKeyDistributionMessage::deserialize(distribution.serialized()).unwrap();
        GroupBuilder::new(&mut bob).create_incoming(&name, &parsed);

        (alice, bob, name)
    }

    #[test]
    fn ordered_round_trip() {
        let rng = Rng::from_seed([1; 32]);
        let (mut alice, mut bob, name) = distribute(&rng);

        for text in [&b"one"[..], b"two", b"three"] {
            let message = GroupCipher::new(&name, &mut alice)
                .encrypt(text, &rng)
                .unwrap();
            let plaintext = GroupCipher::new(&name, &mut bob)
                .decrypt(message.serialized())
                .unwrap();
            assert_eq!(plaintext, text);
        }
    }

    #[test]
    fn shuffled_delivery_uses_past_keys() {
        let rng = Rng::from_seed([2; 32]);
        let (mut alice, mut bob, name) = distribute(&rng);

        let m1 = GroupCipher::new(&name, &mut alice).encrypt(b"p1", &rng).unwrap();
        let m2 = GroupCipher::new(&name, &mut alice).encrypt(b"p2", &rng).unwrap();
        let m3 = GroupCipher::new(&name, &mut alice).encrypt(b"p3", &rng).unwrap();

        // Delivered as (p3, p1, p2).
        let mut bob_cipher = GroupCipher::new(&name, &mut bob);
        assert_eq!(bob_cipher.decrypt(m3.serialized()).unwrap(), b"p3");
        assert_eq!(bob_cipher.decrypt(m1.serialized()).unwrap(), b"p1");
        assert_eq!(bob_cipher.decrypt(m2.serialized()).unwrap(), b"p2");

        // Each key is consumed exactly once.
        assert!(matches!(
            bob_cipher.decrypt(m1.serialized()),
            Err(GroupError::DuplicateMessage(0))
        ));
    }

    #[test]
    fn repeated_distribution_resumes_at_current_iteration() {
        let rng = Rng::from_seed([3; 32]);
        let (mut alice, _, name) = distribute(&rng);

        GroupCipher::new(&name, &mut alice).encrypt(b"a", &rng).unwrap();
        GroupCipher::new(&name, &mut alice).encrypt(b"b", &rng).unwrap();

        // A later distribution (for a new member) starts at the advanced
        // chain position, not at iteration zero.
        let distribution = GroupBuilder::new(&mut alice)
            .create_outgoing(&name, &rng)
            .unwrap();
        assert_eq!(distribution.iteration(), 2);

        let mut carol = TestStore::new(&rng);
        GroupBuilder::new(&mut carol).create_incoming(&name, &distribution);

        let m3 = GroupCipher::new(&name, &mut alice).encrypt(b"c", &rng).unwrap();
        assert_eq!(
            GroupCipher::new(&name, &mut carol)
                .decrypt(m3.serialized())
                .unwrap(),
            b"c"
        );
    }

    #[test]
    fn signature_tampering_is_rejected() {
        let rng = Rng::from_seed([4; 32]);
        let (mut alice, mut bob, name) = distribute(&rng);

        let message = GroupCipher::new(&name, &mut alice)
            .encrypt(b"signed", &rng)
            .unwrap();
        let mut bytes = message.serialized().to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        assert!(matches!(
            GroupCipher::new(&name, &mut bob).decrypt(&bytes),
            Err(GroupError::InvalidSignature)
        ));

        // The genuine message still works afterwards.
        assert_eq!(
            GroupCipher::new(&name, &mut bob)
                .decrypt(message.serialized())
                .unwrap(),
            b"signed"
        );
    }

    #[test]
    fn unknown_sender_fails() {
        let rng = Rng::from_seed([5; 32]);
        let (mut alice, _, name) = distribute(&rng);

        let message = GroupCipher::new(&name, &mut alice)
            .encrypt(b"lost", &rng)
            .unwrap();

        let mut stranger = TestStore::new(&rng);
        assert!(matches!(
            GroupCipher::new(&name, &mut stranger).decrypt(message.serialized()),
            Err(GroupError::NoSenderKeyState(_))
        ));
    }

    #[test]
    fn receiver_cannot_encrypt() {
        let rng = Rng::from_seed([6; 32]);
        let (_, mut bob, name) = distribute(&rng);

        assert!(matches!(
            GroupCipher::new(&name, &mut bob).encrypt(b"nope", &rng),
            Err(GroupError::NoSigningKey(_))
        ));
    }
}
