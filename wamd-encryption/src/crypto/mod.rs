// SPDX-License-Identifier: MIT OR Apache-2.0

//! Leaf cryptographic utilities.
//!
//! Algorithms fixed by the wire format:
//! - X25519 ECDH key agreement
//! - XEdDSA signatures over X25519 keys
//! - HKDF-SHA256 under the protocol's four info labels ([`kdf`])
//! - HMAC-SHA256 chain ratcheting ([`material`]) and authentication
//! - AES-256-CBC with PKCS#7 padding
//!
//! Randomness comes from a ChaCha20 stream cipher seeded from the operating
//! system, exposed through the protocol-shaped [`Rng`] surface.
pub mod aes_cbc;
pub mod hmac;
pub(crate) mod kdf;
mod material;
mod rng;
pub mod x25519;
pub mod xeddsa;

pub(crate) use material::KeyMaterial;
pub use rng::{Rng, RngError};
