// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-(group, sender) symmetric ratchets.
//!
//! A group sender encrypts each broadcast once under their own chain and
//! signs it; recipients hold a copy of the chain (received through a
//! [`SenderKeyDistributionMessage`](crate::wire::SenderKeyDistributionMessage))
//! and derive the same message keys. Past message keys are kept in a bounded
//! ring for out-of-order delivery.
mod builder;
mod cipher;
mod state;

pub use builder::GroupBuilder;
pub use cipher::GroupCipher;
pub use state::{SenderKeyState, MAX_SENDER_MESSAGE_KEYS};

use thiserror::Error;

use crate::crypto::aes_cbc::AesCbcError;
use crate::crypto::RngError;
use crate::wire::WireError;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("no sender key state for {0}")]
    NoSenderKeyState(String),

    #[error("sender key for {0} has no signing secret; we are not its sender")]
    NoSigningKey(String),

    #[error("sender key message signature does not verify")]
    InvalidSignature,

    #[error("sender key message for iteration {0} already consumed")]
    DuplicateMessage(u32),

    #[error("iteration {iteration} jumps too far ahead of chain iteration {current}")]
    OutOfBounds { iteration: u32, current: u32 },

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error(transparent)]
    Cipher(#[from] AesCbcError),
}
