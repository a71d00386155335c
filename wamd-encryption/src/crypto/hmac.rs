// SPDX-License-Identifier: MIT OR Apache-2.0

//! HMAC-SHA256, used for chain-key ratcheting and message authentication.
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const HMAC_SIZE: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over the concatenation of `parts`.
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; HMAC_SIZE] {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

#[cfg(test)]
mod tests {
    use super::hmac_sha256;

    #[test]
    fn concatenation_equivalence() {
        let joined = hmac_sha256(b"key", &[b"hello world"]);
        let split = hmac_sha256(b"key", &[b"hello", b" ", b"world"]);
        assert_eq!(joined, split);

        assert_ne!(hmac_sha256(b"key", &[b"a"]), hmac_sha256(b"other", &[b"a"]));
    }
}
