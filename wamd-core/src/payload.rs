// SPDX-License-Identifier: MIT OR Apache-2.0

//! Padded payload codec.
//!
//! Encrypted payloads carry the protobuf-encoded container followed by
//! 1..=16 padding bytes, each holding the padding length. The pad length is
//! derived from a random byte supplied by the caller so this crate stays free
//! of randomness.
use thiserror::Error;

use crate::message::MessageContainer;

const MAX_PADDING: u8 = 16;

/// Serializes a container and appends protocol padding. `random` is a fresh
/// random byte; only its low nibble contributes to the pad length.
pub fn message_to_bytes(message: &MessageContainer, random: u8) -> Vec<u8> {
    let mut bytes = message.encode_to_vec();
    let pad_length = (random % MAX_PADDING) + 1;
    bytes.extend(std::iter::repeat(pad_length).take(pad_length as usize));
    bytes
}

/// Strips protocol padding and decodes the container.
pub fn bytes_to_message(bytes: &[u8]) -> Result<MessageContainer, PayloadError> {
    let pad_length = *bytes.last().ok_or(PayloadError::Empty)?;
    if pad_length == 0 || pad_length > MAX_PADDING || (pad_length as usize) > bytes.len() {
        return Err(PayloadError::InvalidPadding(pad_length));
    }
    let body = &bytes[..bytes.len() - pad_length as usize];
    MessageContainer::decode_from_slice(body).map_err(PayloadError::Decode)
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("empty payload")]
    Empty,

    #[error("invalid payload padding length {0}")]
    InvalidPadding(u8),

    #[error("malformed message payload: {0}")]
    Decode(#[source] prost::DecodeError),
}

#[cfg(test)]
mod tests {
    use crate::message::MessageContainer;

    use super::{bytes_to_message, message_to_bytes, PayloadError};

    #[test]
    fn round_trip_at_every_pad_length() {
        let message = MessageContainer::text("padded");
        for random in [0u8, 5, 15, 16, 255] {
            let bytes = message_to_bytes(&message, random);
            assert_eq!(bytes_to_message(&bytes).unwrap(), message);
        }
    }

    #[test]
    fn rejects_bad_padding() {
        assert!(matches!(bytes_to_message(&[]), Err(PayloadError::Empty)));
        assert!(matches!(
            bytes_to_message(&[0]),
            Err(PayloadError::InvalidPadding(0))
        ));
        assert!(matches!(
            bytes_to_message(&[42]),
            Err(PayloadError::InvalidPadding(42))
        ));
    }
}
