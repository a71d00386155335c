// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-device double-ratchet sessions.
//!
//! [`SessionBuilder`] establishes sessions: outgoing from a fetched pre-key
//! bundle (X3DH), incoming from the X3DH parameters carried by a
//! `PreKeySignalMessage`. [`SessionCipher`] encrypts and decrypts individual
//! messages against the established state, performing DH ratchet steps and
//! skipped-key bookkeeping as counters demand.
//!
//! A [`Session`] keeps up to [`MAX_ARCHIVED_STATES`](state::MAX_ARCHIVED_STATES)
//! states, most recent first, so ciphertexts addressed to a superseded state
//! can still be decrypted after a re-keying.
mod builder;
mod cipher;
mod state;

pub use builder::SessionBuilder;
pub use cipher::{EncryptedMessage, SessionCipher};
pub use state::{Session, SessionState, MAX_ARCHIVED_STATES, MAX_JUMP, MAX_SKIPPED_KEYS};

use thiserror::Error;

use crate::crypto::aes_cbc::AesCbcError;
use crate::crypto::x25519::X25519Error;
use crate::crypto::RngError;
use crate::wire::WireError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("remote identity for {0} does not match the pinned identity")]
    UntrustedIdentity(String),

    #[error("pre-key bundle carries an invalid signed pre-key signature")]
    InvalidSignature,

    #[error("no stored pre-key with id {0}")]
    NoSuchPreKey(u32),

    #[error("no session established with {0}")]
    SessionMissing(String),

    #[error("message authentication failed")]
    BadMac,

    #[error("message key for counter {0} already consumed")]
    DuplicateMessage(u32),

    #[error("message counter {counter} jumps too far ahead of chain index {index}")]
    OutOfBounds { counter: u32, index: u32 },

    #[error(transparent)]
    InvalidKey(#[from] X25519Error),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error(transparent)]
    Cipher(#[from] AesCbcError),
}
