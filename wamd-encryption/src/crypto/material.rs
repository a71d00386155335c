// SPDX-License-Identifier: MIT OR Apache-2.0

//! Symmetric key material of the ratchet protocols.
//!
//! Every symmetric secret this crate handles — root keys, chain keys,
//! sender-key seeds, cipher and MAC keys — is exactly 256 bits, so
//! [`KeyMaterial`] is a fixed-size container rather than a generic one. It
//! also owns the two HMAC labels of the symmetric ratchet: `0x01` derives
//! the message-key seed at the current position, `0x02` advances the chain.
//!
//! Values zeroise their memory on drop, compare in constant time and never
//! reveal themselves in debug output. Retrieving the raw bytes is limited to
//! this crate.
use std::fmt;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::ZeroizeOnDrop;

use crate::crypto::hmac::hmac_sha256;

pub(crate) const KEY_MATERIAL_SIZE: usize = 32;

const MESSAGE_SEED_LABEL: &[u8] = &[0x01];
const CHAIN_STEP_LABEL: &[u8] = &[0x02];

/// One 256-bit symmetric secret.
#[derive(Clone, Serialize, Deserialize, ZeroizeOnDrop)]
pub(crate) struct KeyMaterial(#[serde(with = "serde_bytes")] [u8; KEY_MATERIAL_SIZE]);

impl KeyMaterial {
    pub(crate) fn new(bytes: [u8; KEY_MATERIAL_SIZE]) -> Self {
        Self(bytes)
    }

    pub(crate) fn bytes(&self) -> &[u8; KEY_MATERIAL_SIZE] {
        &self.0
    }

    /// Seed of the message key at the current chain position. Deriving the
    /// seed does not move the chain; pair with [`KeyMaterial::chain_step`].
    pub(crate) fn message_seed(&self) -> [u8; KEY_MATERIAL_SIZE] {
        hmac_sha256(&self.0, &[MESSAGE_SEED_LABEL])
    }

    /// The next chain key. The previous one is dropped by the caller, which
    /// is what gives the ratchet its forward secrecy.
    pub(crate) fn chain_step(&self) -> KeyMaterial {
        Self(hmac_sha256(&self.0, &[CHAIN_STEP_LABEL]))
    }
}

impl PartialEq for KeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        bool::from(self.0.ct_eq(&other.0))
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secrets, not even in test output.
        write!(f, "KeyMaterial(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::KeyMaterial;

    #[test]
    fn ratchet_labels_are_disjoint() {
        let chain = KeyMaterial::new([7; 32]);
        let seed = chain.message_seed();
        let next = chain.chain_step();

        // Message-key seed and next chain key come from different labels.
        assert_ne!(&seed, next.bytes());
        // Stepping is deterministic but never a fixed point.
        assert_eq!(next, chain.chain_step());
        assert_ne!(next, chain);
    }

    #[test]
    fn seed_is_stable_until_the_chain_moves() {
        let chain = KeyMaterial::new([1; 32]);
        assert_eq!(chain.message_seed(), chain.message_seed());
        assert_ne!(chain.message_seed(), chain.chain_step().message_seed());
    }

    #[test]
    fn debug_is_redacted() {
        assert_eq!(format!("{:?}", KeyMaterial::new([3; 32])), "KeyMaterial(..)");
    }
}
