// SPDX-License-Identifier: MIT OR Apache-2.0

//! Randomness, shaped to the protocol's consumers: fresh key material,
//! XEdDSA signature nonces, wire-format key ids and payload pad bytes.
//! Backed by a ChaCha20 stream cipher seeded from the operating system.
use std::sync::Mutex;

use rand_chacha::rand_core::{SeedableRng, TryRngCore};
use thiserror::Error;

#[derive(Debug)]
pub struct Rng {
    chacha: Mutex<rand_chacha::ChaCha20Rng>,
}

impl Default for Rng {
    fn default() -> Self {
        Self {
            chacha: Mutex::new(rand_chacha::ChaCha20Rng::from_os_rng()),
        }
    }
}

#[cfg(any(test, feature = "test_utils"))]
impl Rng {
    /// Deterministic generator for tests.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            chacha: Mutex::new(rand_chacha::ChaCha20Rng::from_seed(seed)),
        }
    }
}

impl Rng {
    /// Fresh 256-bit secret: identity, pre-key, base and ratchet keys,
    /// sender-key seeds.
    pub fn key_bytes(&self) -> Result<[u8; 32], RngError> {
        let mut out = [0u8; 32];
        self.fill(&mut out)?;
        Ok(out)
    }

    /// Nonce bytes for one XEdDSA signature.
    pub fn signature_nonce(&self) -> Result<[u8; 64], RngError> {
        let mut out = [0u8; 64];
        self.fill(&mut out)?;
        Ok(out)
    }

    /// Key id in the range the wire format reserves for them, `[0, 2^31)`.
    pub fn key_id(&self) -> Result<u32, RngError> {
        let mut out = [0u8; 4];
        self.fill(&mut out)?;
        Ok(u32::from_be_bytes(out) & 0x7FFF_FFFF)
    }

    /// One byte driving the random pad length of an encrypted payload.
    pub fn pad_byte(&self) -> Result<u8, RngError> {
        let mut out = [0u8; 1];
        self.fill(&mut out)?;
        Ok(out[0])
    }

    fn fill(&self, out: &mut [u8]) -> Result<(), RngError> {
        let mut chacha = self
            .chacha
            .lock()
            .map_err(|_| RngError("generator lock poisoned"))?;
        chacha
            .try_fill_bytes(out)
            .map_err(|_| RngError("stream exhausted"))?;
        Ok(())
    }
}

/// The generator could not produce bytes.
#[derive(Debug, Error)]
#[error("randomness unavailable: {0}")]
pub struct RngError(&'static str);
