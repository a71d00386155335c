// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key derivation for the ratchet protocols.
//!
//! Every expansion in the protocol is HKDF-SHA256 under one of four fixed
//! info labels; which label is in use decides what the output bytes mean.
//! Output sizes are fixed by the wire format and far below the HKDF limit,
//! so derivation itself cannot fail.
use hkdf::Hkdf;
use sha2::Sha256;

/// The protocol's HKDF invocations, by their wire-format info label.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Derivation {
    /// X3DH master secret → initial root key and chain key.
    Initial,
    /// DH ratchet step → next root key and chain key.
    Ratchet,
    /// Message-key seed → cipher key, MAC key and IV.
    MessageKeys,
    /// Sender-key seed → group IV and cipher key.
    Group,
}

impl Derivation {
    fn info(self) -> &'static [u8] {
        match self {
            Derivation::Initial => b"WhisperText",
            Derivation::Ratchet => b"WhisperRatchet",
            Derivation::MessageKeys => b"WhisperMessageKeys",
            Derivation::Group => b"WhisperGroup",
        }
    }
}

/// Expands `ikm` into `N` bytes under `label`. The salt is the previous root
/// key on ratchet steps and empty everywhere else; an empty salt behaves
/// like the RFC 5869 default of a hash-length block of zeros.
pub(crate) fn derive<const N: usize>(label: Derivation, salt: &[u8], ikm: &[u8]) -> [u8; N] {
    let salt = (!salt.is_empty()).then_some(salt);
    let mut okm = [0u8; N];
    Hkdf::<Sha256>::new(salt, ikm)
        .expand(label.info(), &mut okm)
        .expect("fixed-size outputs fit a single hkdf expand");
    okm
}
