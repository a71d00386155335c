// SPDX-License-Identifier: MIT OR Apache-2.0

//! Version 3 wire framing of protocol messages.
//!
//! Every message is one version byte (high nibble: message version, low
//! nibble: minimum supported version), a protobuf body, and a trailer
//! authenticating it: an 8-byte truncated HMAC-SHA256 for 1:1 messages, a
//! 64-byte XEdDSA signature for sender-key messages. Distribution messages
//! carry no trailer; they only travel inside already-authenticated payloads.
use prost::Message as _;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::crypto::hmac::hmac_sha256;
use crate::crypto::x25519::{PublicKey, X25519Error};
use crate::crypto::xeddsa::{
    xeddsa_sign, xeddsa_verify, XEdDSAError, XSignature, SIGNATURE_SIZE,
};
use crate::crypto::x25519::SecretKey;
use crate::crypto::Rng;

pub const CIPHERTEXT_VERSION: u8 = 3;
pub const MAC_SIZE: usize = 8;

const VERSION_BYTE: u8 = (CIPHERTEXT_VERSION << 4) | CIPHERTEXT_VERSION;

fn check_version(byte: u8) -> Result<(), WireError> {
    if byte >> 4 != CIPHERTEXT_VERSION {
        return Err(WireError::UnsupportedVersion(byte >> 4));
    }
    Ok(())
}

#[derive(Clone, PartialEq, prost::Message)]
struct SignalMessageProto {
    #[prost(bytes = "vec", optional, tag = "1")]
    ratchet_key: Option<Vec<u8>>,
    #[prost(uint32, optional, tag = "2")]
    counter: Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    previous_counter: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "4")]
    ciphertext: Option<Vec<u8>>,
}

/// An ongoing-session message (`msg` on the stanza level).
#[derive(Clone, Debug)]
pub struct SignalMessage {
    ratchet_key: PublicKey,
    counter: u32,
    previous_counter: u32,
    ciphertext: Vec<u8>,
    serialized: Vec<u8>,
}

impl SignalMessage {
    /// Builds and MACs a message. The MAC binds both identities to the body.
    pub fn new(
        mac_key: &[u8],
        sender_identity: &PublicKey,
        receiver_identity: &PublicKey,
        ratchet_key: PublicKey,
        counter: u32,
        previous_counter: u32,
        ciphertext: Vec<u8>,
    ) -> Self {
        let proto = SignalMessageProto {
            ratchet_key: Some(ratchet_key.to_djb_bytes()),
            counter: Some(counter),
            previous_counter: Some(previous_counter),
            ciphertext: Some(ciphertext.clone()),
        };
        let mut serialized = vec![VERSION_BYTE];
        serialized.extend(proto.encode_to_vec());
        let mac = compute_mac(mac_key, sender_identity, receiver_identity, &serialized);
        serialized.extend_from_slice(&mac);
        Self {
            ratchet_key,
            counter,
            previous_counter,
            ciphertext,
            serialized,
        }
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() < 1 + MAC_SIZE {
            return Err(WireError::MessageTooShort(bytes.len()));
        }
        check_version(bytes[0])?;
        let body = &bytes[1..bytes.len() - MAC_SIZE];
        let proto = SignalMessageProto::decode(body)?;
        Ok(Self {
            ratchet_key: PublicKey::from_djb_bytes(&proto.ratchet_key.unwrap_or_default())?,
            counter: proto.counter.unwrap_or(0),
            previous_counter: proto.previous_counter.unwrap_or(0),
            ciphertext: proto.ciphertext.unwrap_or_default(),
            serialized: bytes.to_vec(),
        })
    }

    /// Constant-time check of the trailing MAC.
    pub fn verify_mac(
        &self,
        mac_key: &[u8],
        sender_identity: &PublicKey,
        receiver_identity: &PublicKey,
    ) -> bool {
        let body = &self.serialized[..self.serialized.len() - MAC_SIZE];
        let expected = compute_mac(mac_key, sender_identity, receiver_identity, body);
        let actual = &self.serialized[self.serialized.len() - MAC_SIZE..];
        bool::from(expected.ct_eq(actual))
    }

    pub fn ratchet_key(&self) -> &PublicKey {
        &self.ratchet_key
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn previous_counter(&self) -> u32 {
        self.previous_counter
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn serialized(&self) -> &[u8] {
        &self.serialized
    }
}

fn compute_mac(
    mac_key: &[u8],
    sender_identity: &PublicKey,
    receiver_identity: &PublicKey,
    body: &[u8],
) -> [u8; MAC_SIZE] {
    let full = hmac_sha256(
        mac_key,
        &[
            &sender_identity.to_djb_bytes(),
            &receiver_identity.to_djb_bytes(),
            body,
        ],
    );
    full[..MAC_SIZE].try_into().expect("truncated mac size")
}

#[derive(Clone, PartialEq, prost::Message)]
struct PreKeySignalMessageProto {
    #[prost(uint32, optional, tag = "1")]
    pre_key_id: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "2")]
    base_key: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "3")]
    identity_key: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "4")]
    message: Option<Vec<u8>>,
    #[prost(uint32, optional, tag = "5")]
    registration_id: Option<u32>,
    #[prost(uint32, optional, tag = "6")]
    signed_pre_key_id: Option<u32>,
}

/// A session-establishing message (`pkmsg`): the sender's X3DH parameters
/// wrapped around an ordinary [`SignalMessage`].
#[derive(Clone, Debug)]
pub struct PreKeySignalMessage {
    registration_id: u32,
    pre_key_id: Option<u32>,
    signed_pre_key_id: u32,
    base_key: PublicKey,
    identity_key: PublicKey,
    message: SignalMessage,
    serialized: Vec<u8>,
}

impl PreKeySignalMessage {
    pub fn new(
        registration_id: u32,
        pre_key_id: Option<u32>,
        signed_pre_key_id: u32,
        base_key: PublicKey,
        identity_key: PublicKey,
        message: SignalMessage,
    ) -> Self {
        let proto = PreKeySignalMessageProto {
            pre_key_id,
            base_key: Some(base_key.to_djb_bytes()),
            identity_key: Some(identity_key.to_djb_bytes()),
            message: Some(message.serialized().to_vec()),
            registration_id: Some(registration_id),
            signed_pre_key_id: Some(signed_pre_key_id),
        };
        let mut serialized = vec![VERSION_BYTE];
        serialized.extend(proto.encode_to_vec());
        Self {
            registration_id,
            pre_key_id,
            signed_pre_key_id,
            base_key,
            identity_key,
            message,
            serialized,
        }
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.is_empty() {
            return Err(WireError::MessageTooShort(0));
        }
        check_version(bytes[0])?;
        let proto = PreKeySignalMessageProto::decode(&bytes[1..])?;
        Ok(Self {
            registration_id: proto.registration_id.unwrap_or(0),
            pre_key_id: proto.pre_key_id,
            signed_pre_key_id: proto.signed_pre_key_id.unwrap_or(0),
            base_key: PublicKey::from_djb_bytes(&proto.base_key.unwrap_or_default())?,
            identity_key: PublicKey::from_djb_bytes(&proto.identity_key.unwrap_or_default())?,
            message: SignalMessage::deserialize(&proto.message.unwrap_or_default())?,
            serialized: bytes.to_vec(),
        })
    }

    pub fn registration_id(&self) -> u32 {
        self.registration_id
    }

    pub fn pre_key_id(&self) -> Option<u32> {
        self.pre_key_id
    }

    pub fn signed_pre_key_id(&self) -> u32 {
        self.signed_pre_key_id
    }

    pub fn base_key(&self) -> &PublicKey {
        &self.base_key
    }

    pub fn identity_key(&self) -> &PublicKey {
        &self.identity_key
    }

    pub fn message(&self) -> &SignalMessage {
        &self.message
    }

    pub fn serialized(&self) -> &[u8] {
        &self.serialized
    }
}

#[derive(Clone, PartialEq, prost::Message)]
struct SenderKeyMessageProto {
    #[prost(uint32, optional, tag = "1")]
    id: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    iteration: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "3")]
    ciphertext: Option<Vec<u8>>,
}

/// A group message (`skmsg`), signed with the sender's chain signing key.
#[derive(Clone, Debug)]
pub struct SenderKeyMessage {
    key_id: u32,
    iteration: u32,
    ciphertext: Vec<u8>,
    serialized: Vec<u8>,
}

impl SenderKeyMessage {
    pub fn new(
        key_id: u32,
        iteration: u32,
        ciphertext: Vec<u8>,
        signing_key: &SecretKey,
        rng: &Rng,
    ) -> Result<Self, WireError> {
        let proto = SenderKeyMessageProto {
            id: Some(key_id),
            iteration: Some(iteration),
            ciphertext: Some(ciphertext.clone()),
        };
        let mut serialized = vec![VERSION_BYTE];
        serialized.extend(proto.encode_to_vec());
        let signature = xeddsa_sign(&serialized, signing_key, rng)?;
        serialized.extend_from_slice(signature.as_bytes());
        Ok(Self {
            key_id,
            iteration,
            ciphertext,
            serialized,
        })
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() < 1 + SIGNATURE_SIZE {
            return Err(WireError::MessageTooShort(bytes.len()));
        }
        check_version(bytes[0])?;
        let body = &bytes[1..bytes.len() - SIGNATURE_SIZE];
        let proto = SenderKeyMessageProto::decode(body)?;
        Ok(Self {
            key_id: proto.id.unwrap_or(0),
            iteration: proto.iteration.unwrap_or(0),
            ciphertext: proto.ciphertext.unwrap_or_default(),
            serialized: bytes.to_vec(),
        })
    }

    /// Verifies the trailing signature with the sender's signing key.
    pub fn verify_signature(&self, signing_key: &PublicKey) -> Result<(), WireError> {
        let body = &self.serialized[..self.serialized.len() - SIGNATURE_SIZE];
        let signature =
            XSignature::from_slice(&self.serialized[self.serialized.len() - SIGNATURE_SIZE..])?;
        xeddsa_verify(body, signing_key, &signature)?;
        Ok(())
    }

    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn serialized(&self) -> &[u8] {
        &self.serialized
    }
}

#[derive(Clone, PartialEq, prost::Message)]
struct SenderKeyDistributionMessageProto {
    #[prost(uint32, optional, tag = "1")]
    id: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    iteration: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "3")]
    chain_key: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "4")]
    signing_key: Option<Vec<u8>>,
}

/// Hands a group sender's current chain state to a recipient.
#[derive(Clone, Debug)]
pub struct SenderKeyDistributionMessage {
    id: u32,
    iteration: u32,
    chain_key: [u8; 32],
    signing_key: PublicKey,
    serialized: Vec<u8>,
}

impl SenderKeyDistributionMessage {
    pub fn new(id: u32, iteration: u32, chain_key: [u8; 32], signing_key: PublicKey) -> Self {
        let proto = SenderKeyDistributionMessageProto {
            id: Some(id),
            iteration: Some(iteration),
            chain_key: Some(chain_key.to_vec()),
            signing_key: Some(signing_key.to_djb_bytes()),
        };
        let mut serialized = vec![VERSION_BYTE];
        serialized.extend(proto.encode_to_vec());
        Self {
            id,
            iteration,
            chain_key,
            signing_key,
            serialized,
        }
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.is_empty() {
            return Err(WireError::MessageTooShort(0));
        }
        check_version(bytes[0])?;
        let proto = SenderKeyDistributionMessageProto::decode(&bytes[1..])?;
        let chain_key: [u8; 32] = proto
            .chain_key
            .unwrap_or_default()
            .try_into()
            .map_err(|_| WireError::MessageTooShort(0))?;
        Ok(Self {
            id: proto.id.unwrap_or(0),
            iteration: proto.iteration.unwrap_or(0),
            chain_key,
            signing_key: PublicKey::from_djb_bytes(&proto.signing_key.unwrap_or_default())?,
            serialized: bytes.to_vec(),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn chain_key(&self) -> &[u8; 32] {
        &self.chain_key
    }

    pub fn signing_key(&self) -> &PublicKey {
        &self.signing_key
    }

    pub fn serialized(&self) -> &[u8] {
        &self.serialized
    }
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("serialized message too short ({0} bytes)")]
    MessageTooShort(usize),

    #[error("unsupported message version {0}")]
    UnsupportedVersion(u8),

    #[error("malformed message body: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error(transparent)]
    InvalidKey(#[from] X25519Error),

    #[error(transparent)]
    Signature(#[from] XEdDSAError),
}

#[cfg(test)]
mod tests {
    use crate::crypto::x25519::SecretKey;
    use crate::crypto::Rng;

    use super::{
        PreKeySignalMessage, SenderKeyDistributionMessage, SenderKeyMessage, SignalMessage,
        WireError,
    };

    #[test]
    fn signal_message_round_trip_and_mac() {
        let rng = Rng::from_seed([1; 32]);
        let sender = SecretKey::generate(&rng).unwrap().public_key();
        let receiver = SecretKey::generate(&rng).unwrap().public_key();
        let ratchet = SecretKey::generate(&rng).unwrap().public_key();
        let mac_key = [9u8; 32];

        let message = SignalMessage::new(&mac_key, &sender, &receiver, ratchet, 7, 3, vec![1, 2]);
        let parsed = SignalMessage::deserialize(message.serialized()).unwrap();

        assert_eq!(parsed.counter(), 7);
        assert_eq!(parsed.previous_counter(), 3);
        assert_eq!(parsed.ratchet_key(), &ratchet);
        assert!(parsed.verify_mac(&mac_key, &sender, &receiver));
        assert!(!parsed.verify_mac(&[0u8; 32], &sender, &receiver));
        assert!(!parsed.verify_mac(&mac_key, &receiver, &sender));
    }

    #[test]
    fn prekey_message_round_trip() {
        let rng = Rng::from_seed([2; 32]);
        let identity = SecretKey::generate(&rng).unwrap().public_key();
        let base = SecretKey::generate(&rng).unwrap().public_key();
        let ratchet = SecretKey::generate(&rng).unwrap().public_key();

        let inner =
            SignalMessage::new(&[0u8; 32], &identity, &identity, ratchet, 0, 0, vec![42]);
        let message = PreKeySignalMessage::new(55, Some(17), 2, base, identity, inner);
        let parsed = PreKeySignalMessage::deserialize(message.serialized()).unwrap();

        assert_eq!(parsed.registration_id(), 55);
        assert_eq!(parsed.pre_key_id(), Some(17));
        assert_eq!(parsed.signed_pre_key_id(), 2);
        assert_eq!(parsed.base_key(), &base);
        assert_eq!(parsed.message().ciphertext(), &[42]);
    }

    #[test]
    fn sender_key_message_signature() {
        let rng = Rng::from_seed([3; 32]);
        let signing = SecretKey::generate(&rng).unwrap();

        let message = SenderKeyMessage::new(1, 4, vec![5, 6, 7], &signing, &rng).unwrap();
        let parsed = SenderKeyMessage::deserialize(message.serialized()).unwrap();

        assert_eq!(parsed.iteration(), 4);
        assert!(parsed.verify_signature(&signing.public_key()).is_ok());

        let other = SecretKey::generate(&rng).unwrap().public_key();
        assert!(parsed.verify_signature(&other).is_err());
    }

    #[test]
    fn distribution_round_trip() {
        let rng = Rng::from_seed([4; 32]);
        let signing = SecretKey::generate(&rng).unwrap().public_key();

        let message = SenderKeyDistributionMessage::new(10, 0, [8u8; 32], signing);
        let parsed =
            SenderKeyDistributionMessage::deserialize(message.serialized()).unwrap();
        assert_eq!(parsed.id(), 10);
        assert_eq!(parsed.chain_key(), &[8u8; 32]);
        assert_eq!(parsed.signing_key(), &signing);
    }

    #[test]
    fn version_rejected() {
        let mut bytes = vec![0x23u8];
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(matches!(
            SignalMessage::deserialize(&bytes),
            Err(WireError::UnsupportedVersion(2))
        ));
    }
}
