// SPDX-License-Identifier: MIT OR Apache-2.0

//! XEdDSA: Ed25519-style signatures issued with an X25519 key pair, so the
//! same identity key serves both key agreement and signing.
//!
//! Used for signed pre-keys and for authenticating sender-key messages.
//!
//! <https://signal.org/docs/specifications/xeddsa/>
use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::{EdwardsPoint, MontgomeryPoint, Scalar};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::crypto::x25519::{PublicKey, SecretKey};
use crate::crypto::{Rng, RngError};

pub const SIGNATURE_SIZE: usize = 64;

/// Domain separator of `hash1`: a block of `0xFF` with the first byte
/// replaced by `0xFE`.
const HASH_1_PREFIX: [u8; 32] = [
    0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF,
];

/// 512-bit XEdDSA signature (`R || s`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct XSignature(#[serde(with = "serde_bytes")] [u8; SIGNATURE_SIZE]);

impl XSignature {
    pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, XEdDSAError> {
        let bytes: [u8; SIGNATURE_SIZE] =
            bytes.try_into().map_err(|_| XEdDSAError::InvalidArgument)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.as_bytes())
    }
}

fn sha512(parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Derives the Ed25519 key pair `(A, a)` from a Montgomery secret: `A` is the
/// Edwards point with the sign bit forced to zero, `a` the (possibly negated)
/// scalar matching it.
fn calculate_key_pair(secret_key: &SecretKey) -> ([u8; 32], Scalar) {
    let k = Scalar::from_bytes_mod_order(*secret_key.as_bytes());
    let cap_e = &k * ED25519_BASEPOINT_TABLE;
    let mut cap_a = cap_e.compress();
    let sign_bit = cap_a.0[31] >> 7;
    cap_a.0[31] &= 0b0111_1111;
    let a = if sign_bit == 1 { -k } else { k };
    (cap_a.0, a)
}

/// Signs `bytes` with an X25519 secret key.
pub fn xeddsa_sign(
    bytes: &[u8],
    secret_key: &SecretKey,
    rng: &Rng,
) -> Result<XSignature, XEdDSAError> {
    // Z = 64 bytes secure random data
    let cap_z = rng.signature_nonce()?;
    let (cap_a, a) = calculate_key_pair(secret_key);

    // r = hash1(a || M || Z) (mod q)
    let r = Scalar::from_bytes_mod_order_wide(&sha512(&[
        &HASH_1_PREFIX,
        a.as_bytes(),
        bytes,
        &cap_z,
    ]));

    // R = rB
    let cap_r = (&r * ED25519_BASEPOINT_TABLE).compress();

    // h = hash(R || A || M) (mod q)
    let h = Scalar::from_bytes_mod_order_wide(&sha512(&[cap_r.as_bytes(), &cap_a, bytes]));

    // s = r + ha (mod q)
    let s = r + (h * a);

    let mut signature = [0u8; SIGNATURE_SIZE];
    signature[..32].copy_from_slice(cap_r.as_bytes());
    signature[32..].copy_from_slice(s.as_bytes());
    Ok(XSignature::from_bytes(signature))
}

/// Verifies a signature against the X25519 public counterpart of the signer.
pub fn xeddsa_verify(
    bytes: &[u8],
    their_public_key: &PublicKey,
    signature: &XSignature,
) -> Result<(), XEdDSAError> {
    let mut cap_r = [0u8; 32];
    cap_r.copy_from_slice(&signature.as_bytes()[..32]);
    let mut s = [0u8; 32];
    s.copy_from_slice(&signature.as_bytes()[32..]);
    s[31] &= 0b0111_1111;

    // Reject s with excess bits.
    if (s[31] & 0b1110_0000) != 0 {
        return Err(XEdDSAError::InvalidArgument);
    }

    // convert_mont(u): interpret the Montgomery key as the Edwards point with
    // sign bit zero, rejecting off-curve keys.
    let a = MontgomeryPoint(their_public_key.to_bytes())
        .to_edwards(0)
        .ok_or(XEdDSAError::InvalidArgument)?;
    let cap_a = a.compress();

    // h = hash(R || A || M) (mod q)
    let h = Scalar::from_bytes_mod_order_wide(&sha512(&[&cap_r, cap_a.as_bytes(), bytes]));

    // Rcheck = sB - hA
    let cap_r_check = EdwardsPoint::vartime_double_scalar_mul_basepoint(
        &h,
        &(-a),
        &Scalar::from_bytes_mod_order(s),
    )
    .compress();

    if bool::from(cap_r_check.as_bytes().ct_eq(&cap_r)) {
        Ok(())
    } else {
        Err(XEdDSAError::VerificationFailed)
    }
}

#[derive(Debug, Error)]
pub enum XEdDSAError {
    #[error(transparent)]
    Rng(#[from] RngError),

    #[error("invalid xeddsa public key or signature")]
    InvalidArgument,

    #[error("signature does not match public key and bytes")]
    VerificationFailed,
}

#[cfg(test)]
mod tests {
    use crate::crypto::x25519::SecretKey;
    use crate::crypto::Rng;

    use super::{xeddsa_sign, xeddsa_verify, XEdDSAError};

    #[test]
    fn sign_and_verify() {
        let rng = Rng::from_seed([1; 32]);

        let secret_key = SecretKey::generate(&rng).unwrap();
        let public_key = secret_key.public_key();

        let signature = xeddsa_sign(b"signed prekey bytes", &secret_key, &rng).unwrap();
        assert!(xeddsa_verify(b"signed prekey bytes", &public_key, &signature).is_ok());
    }

    #[test]
    fn verification_failures() {
        let rng = Rng::from_seed([2; 32]);

        let secret_key = SecretKey::generate(&rng).unwrap();
        let public_key = secret_key.public_key();
        let signature = xeddsa_sign(b"payload", &secret_key, &rng).unwrap();

        let other_public_key = SecretKey::generate(&rng).unwrap().public_key();

        assert!(matches!(
            xeddsa_verify(b"other payload", &public_key, &signature),
            Err(XEdDSAError::VerificationFailed)
        ));
        assert!(matches!(
            xeddsa_verify(b"payload", &other_public_key, &signature),
            Err(XEdDSAError::VerificationFailed)
        ));
    }
}
