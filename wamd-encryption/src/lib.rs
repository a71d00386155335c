// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wamd-encryption` implements the Signal end-to-end protocol state machines
//! the messaging core runs on: per-device double-ratchet sessions with X3DH
//! establishment, and per-(group, sender) symmetric sender-key chains.
//!
//! The crate is free of any transport or async concern. Ciphers and builders
//! operate against the storage traits in [`traits`]; every ratchet mutation
//! is computed on a working copy and only written back after authentication
//! succeeded, so a forged ciphertext can never advance persisted state. The
//! caller (the engine) is responsible for serializing access — all of this
//! code expects to run under the core's single-writer lock.
//!
//! ## Wire compatibility
//!
//! Messages use the libsignal version 3 framing: one version byte
//! (`0x33`), a protobuf body and either an 8-byte truncated HMAC-SHA256
//! (1:1 messages) or a 64-byte XEdDSA signature (sender-key messages).
//! Key agreement is X25519, message encryption AES-256-CBC with PKCS#7
//! padding, key derivation HKDF-SHA256 with the `WhisperText` /
//! `WhisperRatchet` / `WhisperMessageKeys` / `WhisperGroup` info labels.
pub mod crypto;
pub mod group;
pub mod keypair;
pub mod session;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_store;
pub mod traits;
pub mod wire;

pub use crypto::{Rng, RngError};
pub use keypair::{IdentityKeyPair, KeyPair, PreKeyBundle, PreKeyRecord, SignedPreKeyRecord};
pub use session::{
    EncryptedMessage, Session, SessionBuilder, SessionCipher, SessionError, SessionState,
};
pub use group::{GroupBuilder, GroupCipher, GroupError, SenderKeyState};
