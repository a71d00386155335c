// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serializable double-ratchet state.
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::{self, Derivation};
use crate::crypto::x25519::PublicKey;
use crate::crypto::KeyMaterial;
use crate::keypair::KeyPair;
use crate::session::SessionError;

/// Sessions archived per address; the oldest is evicted beyond this.
pub const MAX_ARCHIVED_STATES: usize = 40;

/// Maximum counter distance a message may jump ahead of its chain.
pub const MAX_JUMP: u32 = 2000;

/// Skipped message keys retained, per chain and in total across chains.
pub const MAX_SKIPPED_KEYS: usize = 2000;

/// Receiver chains kept around for late ciphertexts of superseded ratchets.
pub const MAX_RECEIVER_CHAINS: usize = 5;

pub(crate) const CIPHER_KEY_SIZE: usize = 32;
pub(crate) const MAC_KEY_SIZE: usize = 32;
pub(crate) const IV_SIZE: usize = 16;

/// Root of the DH ratchet. Every ratchet step mixes a fresh agreement into
/// it, yielding the next root and a chain key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct RootKey(KeyMaterial);

impl RootKey {
    pub(crate) fn new(bytes: [u8; 32]) -> Self {
        Self(KeyMaterial::new(bytes))
    }

    /// One DH ratchet step: `(next_root, chain)` from the agreement between
    /// `our_ratchet` and `their_ratchet`.
    pub(crate) fn create_chain(
        &self,
        their_ratchet: &PublicKey,
        our_ratchet: &KeyPair,
    ) -> (RootKey, ChainKey) {
        let agreement = our_ratchet.secret().calculate_agreement(their_ratchet);
        let okm: [u8; 64] = kdf::derive(Derivation::Ratchet, self.0.bytes(), &agreement);
        let root = RootKey::new(okm[..32].try_into().expect("split size"));
        let chain = ChainKey::new(okm[32..].try_into().expect("split size"), 0);
        (root, chain)
    }
}

/// Symmetric ratchet position: the chain key at `index`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct ChainKey {
    key: KeyMaterial,
    index: u32,
}

impl ChainKey {
    pub(crate) fn new(bytes: [u8; 32], index: u32) -> Self {
        Self {
            key: KeyMaterial::new(bytes),
            index,
        }
    }

    pub(crate) fn index(&self) -> u32 {
        self.index
    }

    pub(crate) fn next(&self) -> Self {
        Self {
            key: self.key.chain_step(),
            index: self.index + 1,
        }
    }

    /// Message keys for this chain position.
    pub(crate) fn message_keys(&self) -> MessageKeys {
        MessageKeys::derive(&self.key.message_seed(), self.index)
    }
}

/// Expanded key material for exactly one message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct MessageKeys {
    counter: u32,
    cipher_key: KeyMaterial,
    mac_key: KeyMaterial,
    #[serde(with = "serde_bytes")]
    iv: [u8; IV_SIZE],
}

impl MessageKeys {
    fn derive(seed: &[u8; 32], counter: u32) -> Self {
        let okm: [u8; CIPHER_KEY_SIZE + MAC_KEY_SIZE + IV_SIZE] =
            kdf::derive(Derivation::MessageKeys, b"", seed);
        Self {
            counter,
            cipher_key: KeyMaterial::new(okm[..32].try_into().expect("split size")),
            mac_key: KeyMaterial::new(okm[32..64].try_into().expect("split size")),
            iv: okm[64..].try_into().expect("split size"),
        }
    }

    pub(crate) fn counter(&self) -> u32 {
        self.counter
    }

    pub(crate) fn cipher_key(&self) -> &[u8; CIPHER_KEY_SIZE] {
        self.cipher_key.bytes()
    }

    pub(crate) fn mac_key(&self) -> &[u8; MAC_KEY_SIZE] {
        self.mac_key.bytes()
    }

    pub(crate) fn iv(&self) -> &[u8; IV_SIZE] {
        &self.iv
    }
}

/// Our half of the ratchet: the current sending chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct SenderChain {
    pub(crate) ratchet_key_pair: KeyPair,
    pub(crate) chain_key: ChainKey,
}

/// One receiving chain, keyed by the remote ratchet key that opened it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct ReceiverChain {
    pub(crate) ratchet_key: PublicKey,
    pub(crate) chain_key: ChainKey,
    /// Message keys skipped over for out-of-order delivery, oldest first.
    pub(crate) skipped: VecDeque<MessageKeys>,
}

impl ReceiverChain {
    pub(crate) fn new(ratchet_key: PublicKey, chain_key: ChainKey) -> Self {
        Self {
            ratchet_key,
            chain_key,
            skipped: VecDeque::new(),
        }
    }

    pub(crate) fn take_skipped(&mut self, counter: u32) -> Option<MessageKeys> {
        let position = self
            .skipped
            .iter()
            .position(|keys| keys.counter() == counter)?;
        self.skipped.remove(position)
    }
}

/// X3DH parameters echoed in every outgoing message until the peer's first
/// reply proves the session was accepted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct PendingPreKey {
    pub(crate) prekey_id: Option<u32>,
    pub(crate) signed_prekey_id: u32,
    pub(crate) base_key: PublicKey,
}

/// Full ratchet state against one remote device.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionState {
    pub(crate) version: u8,
    pub(crate) local_identity: PublicKey,
    pub(crate) remote_identity: PublicKey,
    pub(crate) root_key: RootKey,
    pub(crate) sender_chain: SenderChain,
    pub(crate) receiver_chains: VecDeque<ReceiverChain>,
    /// Length of the sending chain before the last DH ratchet step.
    pub(crate) previous_counter: u32,
    pub(crate) pending_prekey: Option<PendingPreKey>,
    /// Alice's base key; identifies the X3DH round this state came from.
    pub(crate) base_key: PublicKey,
    pub(crate) remote_registration_id: u32,
    pub(crate) closed: bool,
}

impl SessionState {
    pub(crate) fn matches(&self, version: u8, base_key: &PublicKey) -> bool {
        self.version == version && &self.base_key == base_key
    }

    pub(crate) fn receiver_chain_mut(
        &mut self,
        ratchet_key: &PublicKey,
    ) -> Option<&mut ReceiverChain> {
        self.receiver_chains
            .iter_mut()
            .find(|chain| &chain.ratchet_key == ratchet_key)
    }

    /// Prepends a fresh receiving chain, evicting the oldest beyond the cap.
    pub(crate) fn add_receiver_chain(&mut self, chain: ReceiverChain) {
        self.receiver_chains.push_front(chain);
        if self.receiver_chains.len() > MAX_RECEIVER_CHAINS {
            self.receiver_chains.pop_back();
        }
    }

    /// Total skipped keys across all receiving chains.
    pub(crate) fn skipped_key_count(&self) -> usize {
        self.receiver_chains
            .iter()
            .map(|chain| chain.skipped.len())
            .sum()
    }

    /// Drops the globally oldest skipped keys until the total cap holds.
    pub(crate) fn enforce_skipped_cap(&mut self) {
        while self.skipped_key_count() > MAX_SKIPPED_KEYS {
            if let Some(chain) = self
                .receiver_chains
                .iter_mut()
                .rev()
                .find(|chain| !chain.skipped.is_empty())
            {
                chain.skipped.pop_front();
            } else {
                break;
            }
        }
    }
}

/// All states for one address, most recent first. Only the first non-closed
/// state is current; older states linger to decrypt late ciphertexts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Session {
    pub(crate) states: VecDeque<SessionState>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn current_state(&self) -> Option<&SessionState> {
        self.states.iter().find(|state| !state.closed)
    }

    pub(crate) fn current_state_mut(&mut self) -> Option<&mut SessionState> {
        self.states.iter_mut().find(|state| !state.closed)
    }

    pub(crate) fn has_state(&self, version: u8, base_key: &PublicKey) -> bool {
        self.states
            .iter()
            .any(|state| state.matches(version, base_key))
    }

    pub(crate) fn close_current_state(&mut self) {
        if let Some(state) = self.current_state_mut() {
            state.closed = true;
        }
    }

    /// Prepends a state, evicting the oldest archived state beyond the cap.
    pub(crate) fn push_state(&mut self, state: SessionState) {
        self.states.push_front(state);
        if self.states.len() > MAX_ARCHIVED_STATES {
            self.states.pop_back();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Guards a counter jump against running the chain unboundedly forward.
pub(crate) fn check_jump(counter: u32, index: u32) -> Result<(), SessionError> {
    if counter > index && counter - index > MAX_JUMP {
        return Err(SessionError::OutOfBounds { counter, index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use crate::crypto::x25519::SecretKey;
    use crate::crypto::Rng;
    use crate::keypair::KeyPair;

    use super::{
        ChainKey, ReceiverChain, RootKey, Session, SessionState, MAX_ARCHIVED_STATES,
        MAX_RECEIVER_CHAINS,
    };

    fn stub_state(rng: &Rng, closed: bool) -> SessionState {
        let identity = KeyPair::generate(rng).unwrap();
        let base = SecretKey::generate(rng).unwrap().public_key();
        SessionState {
            version: 3,
            local_identity: *identity.public(),
            remote_identity: *identity.public(),
            root_key: RootKey::new(rng.key_bytes().unwrap()),
            sender_chain: super::SenderChain {
                ratchet_key_pair: KeyPair::generate(rng).unwrap(),
                chain_key: ChainKey::new(rng.key_bytes().unwrap(), 0),
            },
            receiver_chains: VecDeque::new(),
            previous_counter: 0,
            pending_prekey: None,
            base_key: base,
            remote_registration_id: 0,
            closed,
        }
    }

    #[test]
    fn chain_key_ratchets_forward() {
        let chain = ChainKey::new([1; 32], 0);
        let next = chain.next();
        assert_eq!(next.index(), 1);
        assert_ne!(
            chain.message_keys().cipher_key(),
            next.message_keys().cipher_key()
        );
    }

    #[test]
    fn root_step_is_deterministic() {
        let rng = Rng::from_seed([5; 32]);
        let ours = KeyPair::generate(&rng).unwrap();
        let theirs = SecretKey::generate(&rng).unwrap().public_key();

        let root = RootKey::new([2; 32]);
        let (root_1, chain_1) = root.create_chain(&theirs, &ours);
        let (root_2, chain_2) = root.create_chain(&theirs, &ours);
        assert_eq!(root_1, root_2);
        assert_eq!(chain_1.message_keys().iv(), chain_2.message_keys().iv());
    }

    #[test]
    fn current_state_skips_closed() {
        let rng = Rng::from_seed([6; 32]);
        let mut session = Session::new();
        session.push_state(stub_state(&rng, false));
        session.push_state(stub_state(&rng, true));

        // Front is closed, so the archived one is current.
        let current = session.current_state().unwrap();
        assert!(!current.closed);

        session.close_current_state();
        assert!(session.current_state().is_none());
    }

    #[test]
    fn archived_states_are_bounded() {
        let rng = Rng::from_seed([7; 32]);
        let mut session = Session::new();
        for _ in 0..MAX_ARCHIVED_STATES + 3 {
            session.push_state(stub_state(&rng, false));
        }
        assert_eq!(session.states.len(), MAX_ARCHIVED_STATES);
    }

    #[test]
    fn receiver_chains_are_bounded() {
        let rng = Rng::from_seed([8; 32]);
        let mut state = stub_state(&rng, false);
        for _ in 0..MAX_RECEIVER_CHAINS + 2 {
            let key = SecretKey::generate(&rng).unwrap().public_key();
            state.add_receiver_chain(ReceiverChain::new(
                key,
                ChainKey::new(rng.key_bytes().unwrap(), 0),
            ));
        }
        assert_eq!(state.receiver_chains.len(), MAX_RECEIVER_CHAINS);
    }
}
