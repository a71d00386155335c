// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key pairs and pre-key bundles.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::x25519::{PublicKey, SecretKey};
use crate::crypto::xeddsa::{xeddsa_sign, xeddsa_verify, XEdDSAError, XSignature};
use crate::crypto::{Rng, RngError};

/// X25519 key pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    pub fn generate(rng: &Rng) -> Result<Self, RngError> {
        let secret = SecretKey::generate(rng)?;
        let public = secret.public_key();
        Ok(Self { secret, public })
    }

    pub fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }
}

/// The long-lived identity key pair of this device.
pub type IdentityKeyPair = KeyPair;

/// Our medium-lived signed pre-key: rotated periodically, its public part
/// signed with the identity key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedPreKeyRecord {
    id: u32,
    key_pair: KeyPair,
    signature: XSignature,
}

impl SignedPreKeyRecord {
    pub fn generate(id: u32, identity: &IdentityKeyPair, rng: &Rng) -> Result<Self, KeyPairError> {
        let key_pair = KeyPair::generate(rng)?;
        let signature = xeddsa_sign(&key_pair.public().to_djb_bytes(), identity.secret(), rng)?;
        Ok(Self {
            id,
            key_pair,
            signature,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    pub fn signature(&self) -> &XSignature {
        &self.signature
    }
}

/// One of our one-time pre-keys, uploaded to the server and consumed by a
/// single session establishment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreKeyRecord {
    id: u32,
    key_pair: KeyPair,
}

impl PreKeyRecord {
    pub fn generate(id: u32, rng: &Rng) -> Result<Self, RngError> {
        Ok(Self {
            id,
            key_pair: KeyPair::generate(rng)?,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }
}

/// A remote device's published keys, fetched from the server to establish an
/// outgoing session without an online handshake.
#[derive(Clone, Debug, PartialEq)]
pub struct PreKeyBundle {
    pub registration_id: u32,
    pub identity_key: PublicKey,
    pub signed_prekey_id: u32,
    pub signed_prekey: PublicKey,
    pub signed_prekey_signature: XSignature,
    pub onetime_prekey: Option<(u32, PublicKey)>,
}

impl PreKeyBundle {
    /// Checks the signed pre-key signature against the bundle's identity key.
    pub fn verify(&self) -> Result<(), KeyPairError> {
        xeddsa_verify(
            &self.signed_prekey.to_djb_bytes(),
            &self.identity_key,
            &self.signed_prekey_signature,
        )?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum KeyPairError {
    #[error(transparent)]
    Rng(#[from] RngError),

    #[error(transparent)]
    XEdDSA(#[from] XEdDSAError),
}

#[cfg(test)]
mod tests {
    use crate::crypto::Rng;

    use super::{IdentityKeyPair, KeyPair, PreKeyBundle, SignedPreKeyRecord};

    #[test]
    fn bundle_verification() {
        let rng = Rng::from_seed([1; 32]);

        let identity = IdentityKeyPair::generate(&rng).unwrap();
        let signed = SignedPreKeyRecord::generate(1, &identity, &rng).unwrap();

        let bundle = PreKeyBundle {
            registration_id: 123,
            identity_key: *identity.public(),
            signed_prekey_id: signed.id(),
            signed_prekey: *signed.key_pair().public(),
            signed_prekey_signature: *signed.signature(),
            onetime_prekey: None,
        };
        assert!(bundle.verify().is_ok());

        // A bundle claiming a different identity fails verification.
        let other_identity = KeyPair::generate(&rng).unwrap();
        let forged = PreKeyBundle {
            identity_key: *other_identity.public(),
            ..bundle
        };
        assert!(forged.verify().is_err());
    }
}
