// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-CBC with PKCS#7 padding, the symmetric cipher of the version 3
//! message format.
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use thiserror::Error;

pub const KEY_SIZE: usize = 32;
pub const IV_SIZE: usize = 16;

type Encryptor = cbc::Encryptor<aes::Aes256>;
type Decryptor = cbc::Decryptor<aes::Aes256>;

/// Encrypts and pads `plaintext`.
pub fn encrypt(key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE], plaintext: &[u8]) -> Vec<u8> {
    Encryptor::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypts `ciphertext` and strips padding.
pub fn decrypt(
    key: &[u8; KEY_SIZE],
    iv: &[u8; IV_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, AesCbcError> {
    Decryptor::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| AesCbcError::InvalidCiphertext)
}

#[derive(Debug, Error)]
pub enum AesCbcError {
    #[error("ciphertext length or padding is invalid")]
    InvalidCiphertext,
}
