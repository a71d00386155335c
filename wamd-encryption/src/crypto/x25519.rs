// SPDX-License-Identifier: MIT OR Apache-2.0

//! Elliptic-curve Diffie–Hellman key agreement (X25519).
//!
//! Public keys appear on the wire in "djb" format: a `0x05` curve-type byte
//! followed by the 32 key bytes. Bundle responses occasionally strip the
//! header, so decoding accepts both forms.
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::ZeroizeOnDrop;

use crate::crypto::{Rng, RngError};

pub const SECRET_KEY_SIZE: usize = 32;
pub const PUBLIC_KEY_SIZE: usize = 32;
pub const AGREEMENT_SIZE: usize = 32;

/// Curve-type byte prefixing wire-format public keys.
pub const DJB_TYPE: u8 = 0x05;

#[derive(Clone, Debug, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct SecretKey(#[serde(with = "serde_bytes")] [u8; SECRET_KEY_SIZE]);

impl SecretKey {
    pub fn from_bytes(bytes: [u8; SECRET_KEY_SIZE]) -> Self {
        // Clamping
        let mut bytes = bytes;
        bytes[0] &= 248u8;
        bytes[31] &= 127u8;
        bytes[31] |= 64u8;
        SecretKey(bytes)
    }

    pub fn generate(rng: &Rng) -> Result<Self, RngError> {
        Ok(Self::from_bytes(rng.key_bytes()?))
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_KEY_SIZE] {
        &self.0
    }

    pub fn public_key(&self) -> PublicKey {
        let secret = x25519_dalek::StaticSecret::from(self.0);
        PublicKey(x25519_dalek::PublicKey::from(&secret).to_bytes())
    }

    pub fn calculate_agreement(&self, their_public: &PublicKey) -> [u8; AGREEMENT_SIZE] {
        let secret = x25519_dalek::StaticSecret::from(self.0);
        let their_public = x25519_dalek::PublicKey::from(their_public.0);
        secret.diffie_hellman(&their_public).to_bytes()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "serde_bytes")] [u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    pub fn from_bytes(public_key: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(public_key)
    }

    /// Decodes a wire-format key, with or without the `0x05` header.
    pub fn from_djb_bytes(bytes: &[u8]) -> Result<Self, X25519Error> {
        match bytes.len() {
            33 if bytes[0] == DJB_TYPE => Ok(Self(
                bytes[1..].try_into().expect("tail is 32 bytes"),
            )),
            32 => Ok(Self(bytes.try_into().expect("checked length"))),
            _ => Err(X25519Error::InvalidKeyFormat(bytes.len())),
        }
    }

    /// Wire-format key with the `0x05` header.
    pub fn to_djb_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PUBLIC_KEY_SIZE + 1);
        bytes.push(DJB_TYPE);
        bytes.extend_from_slice(&self.0);
        bytes
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum X25519Error {
    #[error("public key must be 32 or 0x05-prefixed 33 bytes, got {0}")]
    InvalidKeyFormat(usize),
}

#[cfg(test)]
mod tests {
    use crate::crypto::Rng;

    use super::{PublicKey, SecretKey, DJB_TYPE};

    #[test]
    fn diffie_hellman() {
        let rng = Rng::from_seed([1; 32]);

        let alice_secret_key = SecretKey::generate(&rng).unwrap();
        let alice_public_key = alice_secret_key.public_key();

        let bob_secret_key = SecretKey::generate(&rng).unwrap();
        let bob_public_key = bob_secret_key.public_key();

        assert_eq!(
            alice_secret_key.calculate_agreement(&bob_public_key),
            bob_secret_key.calculate_agreement(&alice_public_key),
        );
    }

    #[test]
    fn djb_framing() {
        let rng = Rng::from_seed([2; 32]);
        let public_key = SecretKey::generate(&rng).unwrap().public_key();

        let framed = public_key.to_djb_bytes();
        assert_eq!(framed.len(), 33);
        assert_eq!(framed[0], DJB_TYPE);

        assert_eq!(PublicKey::from_djb_bytes(&framed).unwrap(), public_key);
        assert_eq!(PublicKey::from_djb_bytes(&framed[1..]).unwrap(), public_key);
        assert!(PublicKey::from_djb_bytes(&framed[2..]).is_err());
    }
}
