// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serializable sender-key chain state.
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::{self, Derivation};
use crate::crypto::x25519::{PublicKey, SecretKey};
use crate::crypto::KeyMaterial;
use crate::keypair::KeyPair;

/// Past message keys retained per chain for out-of-order delivery, and the
/// furthest a single message may fast-forward the chain.
pub const MAX_SENDER_MESSAGE_KEYS: usize = 2000;

/// Chain position of one sender in one group.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct SenderChainKey {
    iteration: u32,
    seed: KeyMaterial,
}

impl SenderChainKey {
    pub(crate) fn new(iteration: u32, seed: [u8; 32]) -> Self {
        Self {
            iteration,
            seed: KeyMaterial::new(seed),
        }
    }

    pub(crate) fn iteration(&self) -> u32 {
        self.iteration
    }

    pub(crate) fn seed_bytes(&self) -> [u8; 32] {
        *self.seed.bytes()
    }

    pub(crate) fn next(&self) -> Self {
        Self {
            iteration: self.iteration + 1,
            seed: self.seed.chain_step(),
        }
    }

    /// Message key for the current iteration.
    pub(crate) fn message_key(&self) -> SenderMessageKey {
        SenderMessageKey::derive(self.iteration, &self.seed.message_seed())
    }
}

/// Expanded key material for one group message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct SenderMessageKey {
    iteration: u32,
    #[serde(with = "serde_bytes")]
    iv: [u8; 16],
    cipher_key: KeyMaterial,
}

impl SenderMessageKey {
    fn derive(iteration: u32, seed: &[u8; 32]) -> Self {
        let okm: [u8; 48] = kdf::derive(Derivation::Group, b"", seed);
        Self {
            iteration,
            iv: okm[..16].try_into().expect("split size"),
            cipher_key: KeyMaterial::new(okm[16..].try_into().expect("split size")),
        }
    }

    pub(crate) fn iteration(&self) -> u32 {
        self.iteration
    }

    pub(crate) fn iv(&self) -> &[u8; 16] {
        &self.iv
    }

    pub(crate) fn cipher_key(&self) -> &[u8; 32] {
        self.cipher_key.bytes()
    }
}

/// Everything known about one sender's chain in one group.
///
/// On the sending side `signing_secret` holds the signature key; receivers
/// only ever see the public half.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SenderKeyState {
    pub(crate) key_id: u32,
    pub(crate) chain_key: SenderChainKey,
    pub(crate) signing_public: PublicKey,
    pub(crate) signing_secret: Option<SecretKey>,
    /// Message keys of skipped iterations, oldest first.
    pub(crate) past_keys: VecDeque<SenderMessageKey>,
}

impl SenderKeyState {
    pub(crate) fn new_outgoing(key_id: u32, seed: [u8; 32], signing: &KeyPair) -> Self {
        Self {
            key_id,
            chain_key: SenderChainKey::new(0, seed),
            signing_public: *signing.public(),
            signing_secret: Some(signing.secret().clone()),
            past_keys: VecDeque::new(),
        }
    }

    pub(crate) fn new_incoming(
        key_id: u32,
        iteration: u32,
        seed: [u8; 32],
        signing_public: PublicKey,
    ) -> Self {
        Self {
            key_id,
            chain_key: SenderChainKey::new(iteration, seed),
            signing_public,
            signing_secret: None,
            past_keys: VecDeque::new(),
        }
    }

    pub(crate) fn store_past_key(&mut self, key: SenderMessageKey) {
        self.past_keys.push_back(key);
        if self.past_keys.len() > MAX_SENDER_MESSAGE_KEYS {
            self.past_keys.pop_front();
        }
    }

    pub(crate) fn take_past_key(&mut self, iteration: u32) -> Option<SenderMessageKey> {
        let position = self
            .past_keys
            .iter()
            .position(|key| key.iteration() == iteration)?;
        self.past_keys.remove(position)
    }
}
