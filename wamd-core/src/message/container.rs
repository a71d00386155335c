// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message container and its variants.
//!
//! Wire layout follows the protocol's `Message` protobuf: one optional field
//! per variant, at most one populated. Variants the engine never inspects
//! carry only the fields needed to round-trip them faithfully.
use prost::Message as _;

use crate::message::protocol::ProtocolMessage;

/// Container over every logical message variant.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MessageContainer {
    #[prost(
        oneof = "Message",
        tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 12, 13, 14, 16, 18, 22, 23, 24, 25, 26, 28, 29, 30, 31, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47"
    )]
    pub message: Option<Message>,
}

/// The populated variant of a [`MessageContainer`].
#[derive(Clone, PartialEq, prost::Oneof)]
pub enum Message {
    /// Plain text without any context attached.
    #[prost(string, tag = "1")]
    Conversation(String),
    #[prost(message, tag = "2")]
    SenderKeyDistribution(SenderKeyDistributionMessage),
    #[prost(message, tag = "3")]
    Image(ImageMessage),
    #[prost(message, tag = "4")]
    Contact(ContactMessage),
    #[prost(message, tag = "5")]
    Location(LocationMessage),
    /// Text with preview/formatting context.
    #[prost(message, tag = "6")]
    ExtendedText(ExtendedTextMessage),
    #[prost(message, tag = "7")]
    Document(DocumentMessage),
    #[prost(message, tag = "8")]
    Audio(AudioMessage),
    #[prost(message, tag = "9")]
    Video(VideoMessage),
    #[prost(message, tag = "10")]
    Call(CallInfo),
    /// Server-driven side effects (revoke, history sync, key share, …).
    #[prost(message, tag = "12")]
    Protocol(ProtocolMessage),
    #[prost(message, tag = "13")]
    ContactsArray(ContactsArrayMessage),
    #[prost(message, tag = "14")]
    HighlyStructured(HighlyStructuredMessage),
    #[prost(message, tag = "16")]
    SendPayment(SendPaymentMessage),
    #[prost(message, tag = "18")]
    LiveLocation(LiveLocationMessage),
    #[prost(message, tag = "22")]
    RequestPayment(RequestPaymentMessage),
    #[prost(message, tag = "23")]
    DeclinePaymentRequest(DeclinePaymentRequestMessage),
    #[prost(message, tag = "24")]
    CancelPaymentRequest(DeclinePaymentRequestMessage),
    #[prost(message, tag = "25")]
    Template(TemplateMessage),
    #[prost(message, tag = "26")]
    Sticker(StickerMessage),
    #[prost(message, tag = "28")]
    GroupInvite(GroupInviteMessage),
    #[prost(message, tag = "29")]
    TemplateButtonReply(TemplateButtonReplyMessage),
    #[prost(message, tag = "30")]
    Product(ProductMessage),
    /// Mirror of a message sent from another of our own devices.
    #[prost(message, tag = "31")]
    DeviceSent(DeviceSentMessage),
    #[prost(message, tag = "35")]
    MessageContextInfo(MessageContextInfo),
    #[prost(message, tag = "36")]
    List(ListMessage),
    /// Wraps an inner container shown exactly once.
    #[prost(message, tag = "37")]
    ViewOnce(FutureMessageContainer),
    #[prost(message, tag = "38")]
    Order(OrderMessage),
    #[prost(message, tag = "39")]
    ListResponse(ListResponseMessage),
    /// Wraps an inner container with a disappearing-messages timer.
    #[prost(message, tag = "40")]
    Ephemeral(FutureMessageContainer),
    #[prost(message, tag = "41")]
    Invoice(InvoiceMessage),
    #[prost(message, tag = "42")]
    Buttons(ButtonsMessage),
    #[prost(message, tag = "43")]
    ButtonsResponse(ButtonsResponseMessage),
    #[prost(message, tag = "44")]
    PaymentInvite(PaymentInviteMessage),
    #[prost(message, tag = "45")]
    Interactive(InteractiveMessage),
    #[prost(message, tag = "46")]
    Reaction(ReactionMessage),
    #[prost(message, tag = "47")]
    StickerSyncRmr(StickerSyncRmrMessage),
}

impl MessageContainer {
    pub fn of(content: Message) -> Self {
        Self {
            message: Some(content),
        }
    }

    /// Plain text container.
    pub fn text(text: impl Into<String>) -> Self {
        Self::of(Message::Conversation(text.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.message.is_none()
    }

    /// The populated variant, without unboxing wrappers.
    pub fn content(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// The populated variant with `view-once` and `ephemeral` wrappers
    /// unboxed down to the innermost content.
    pub fn deep_content(&self) -> Option<&Message> {
        let mut content = self.message.as_ref()?;
        loop {
            match content {
                Message::ViewOnce(inner) | Message::Ephemeral(inner) => {
                    content = inner.message.as_deref()?.message.as_ref()?;
                }
                other => return Some(other),
            }
        }
    }

    /// Replaces a device-sent wrapper by the mirrored inner message.
    pub fn unbox_device_sent(self) -> Self {
        match self.message {
            Some(Message::DeviceSent(device_sent)) => device_sent
                .message
                .map(|inner| *inner)
                .unwrap_or_default(),
            _ => self,
        }
    }

    pub fn encode_to_vec(&self) -> Vec<u8> {
        prost::Message::encode_to_vec(self)
    }

    pub fn decode_from_slice(bytes: &[u8]) -> Result<Self, prost::DecodeError> {
        MessageContainer::decode(bytes)
    }
}

/// Sender-key distribution payload fanned out to group participants which
/// have not yet seen our sender key.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SenderKeyDistributionMessage {
    #[prost(string, optional, tag = "1")]
    pub group_id: Option<String>,
    /// Serialized distribution message of the Signal layer.
    #[prost(bytes = "vec", optional, tag = "2")]
    pub axolotl_sender_key_distribution_message: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceSentMessage {
    /// Chat the original message was sent to.
    #[prost(string, optional, tag = "1")]
    pub destination_jid: Option<String>,
    #[prost(message, optional, boxed, tag = "2")]
    pub message: Option<Box<MessageContainer>>,
    #[prost(string, optional, tag = "3")]
    pub phash: Option<String>,
}

/// Wrapper around a nested container (`view-once`, `ephemeral`).
#[derive(Clone, PartialEq, prost::Message)]
pub struct FutureMessageContainer {
    #[prost(message, optional, boxed, tag = "1")]
    pub message: Option<Box<MessageContainer>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ImageMessage {
    #[prost(string, optional, tag = "1")]
    pub url: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub mimetype: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub caption: Option<String>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub file_sha256: Option<Vec<u8>>,
    #[prost(uint64, optional, tag = "5")]
    pub file_length: Option<u64>,
    #[prost(bytes = "vec", optional, tag = "8")]
    pub media_key: Option<Vec<u8>>,
    #[prost(string, optional, tag = "17")]
    pub direct_path: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ContactMessage {
    #[prost(string, optional, tag = "1")]
    pub display_name: Option<String>,
    #[prost(string, optional, tag = "16")]
    pub vcard: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LocationMessage {
    #[prost(double, optional, tag = "1")]
    pub degrees_latitude: Option<f64>,
    #[prost(double, optional, tag = "2")]
    pub degrees_longitude: Option<f64>,
    #[prost(string, optional, tag = "3")]
    pub name: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub address: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ExtendedTextMessage {
    #[prost(string, optional, tag = "1")]
    pub text: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub matched_text: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub canonical_url: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub description: Option<String>,
    #[prost(string, optional, tag = "6")]
    pub title: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DocumentMessage {
    #[prost(string, optional, tag = "1")]
    pub url: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub mimetype: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub title: Option<String>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub file_sha256: Option<Vec<u8>>,
    #[prost(uint64, optional, tag = "5")]
    pub file_length: Option<u64>,
    #[prost(string, optional, tag = "8")]
    pub file_name: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AudioMessage {
    #[prost(string, optional, tag = "1")]
    pub url: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub mimetype: Option<String>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub file_sha256: Option<Vec<u8>>,
    #[prost(uint64, optional, tag = "4")]
    pub file_length: Option<u64>,
    #[prost(uint32, optional, tag = "5")]
    pub seconds: Option<u32>,
    #[prost(bool, optional, tag = "6")]
    pub ptt: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VideoMessage {
    #[prost(string, optional, tag = "1")]
    pub url: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub mimetype: Option<String>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub file_sha256: Option<Vec<u8>>,
    #[prost(uint64, optional, tag = "4")]
    pub file_length: Option<u64>,
    #[prost(uint32, optional, tag = "5")]
    pub seconds: Option<u32>,
    #[prost(string, optional, tag = "7")]
    pub caption: Option<String>,
    #[prost(bool, optional, tag = "8")]
    pub gif_playback: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CallInfo {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub call_key: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ContactsArrayMessage {
    #[prost(string, optional, tag = "1")]
    pub display_name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    pub contacts: Vec<ContactMessage>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HighlyStructuredMessage {
    #[prost(string, optional, tag = "1")]
    pub namespace: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub element_name: Option<String>,
    #[prost(string, repeated, tag = "3")]
    pub params: Vec<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SendPaymentMessage {
    #[prost(message, optional, boxed, tag = "2")]
    pub note_message: Option<Box<MessageContainer>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LiveLocationMessage {
    #[prost(double, optional, tag = "1")]
    pub degrees_latitude: Option<f64>,
    #[prost(double, optional, tag = "2")]
    pub degrees_longitude: Option<f64>,
    #[prost(uint32, optional, tag = "3")]
    pub accuracy_in_meters: Option<u32>,
    #[prost(int64, optional, tag = "7")]
    pub sequence_number: Option<i64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestPaymentMessage {
    #[prost(string, optional, tag = "1")]
    pub currency_code_iso4217: Option<String>,
    #[prost(uint64, optional, tag = "2")]
    pub amount1000: Option<u64>,
    #[prost(string, optional, tag = "3")]
    pub requested_from_jid: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeclinePaymentRequestMessage {
    #[prost(message, optional, tag = "1")]
    pub key: Option<crate::message::protocol::MessageKeyProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TemplateMessage {
    #[prost(string, optional, tag = "9")]
    pub template_id: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StickerMessage {
    #[prost(string, optional, tag = "1")]
    pub url: Option<String>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub file_sha256: Option<Vec<u8>>,
    #[prost(string, optional, tag = "4")]
    pub mimetype: Option<String>,
    #[prost(bool, optional, tag = "13")]
    pub is_animated: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GroupInviteMessage {
    #[prost(string, optional, tag = "1")]
    pub group_jid: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub invite_code: Option<String>,
    #[prost(int64, optional, tag = "3")]
    pub invite_expiration: Option<i64>,
    #[prost(string, optional, tag = "4")]
    pub group_name: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TemplateButtonReplyMessage {
    #[prost(string, optional, tag = "1")]
    pub selected_id: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub selected_display_text: Option<String>,
    #[prost(uint32, optional, tag = "4")]
    pub selected_index: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ProductMessage {
    #[prost(string, optional, tag = "2")]
    pub business_owner_jid: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MessageContextInfo {
    #[prost(int32, optional, tag = "1")]
    pub device_list_metadata_version: Option<i32>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub message_secret: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListMessage {
    #[prost(string, optional, tag = "1")]
    pub title: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub description: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub button_text: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OrderMessage {
    #[prost(string, optional, tag = "1")]
    pub order_id: Option<String>,
    #[prost(int32, optional, tag = "4")]
    pub item_count: Option<i32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListResponseMessage {
    #[prost(string, optional, tag = "1")]
    pub title: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub description: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct InvoiceMessage {
    #[prost(string, optional, tag = "1")]
    pub note: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub token: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ButtonsMessage {
    #[prost(string, optional, tag = "1")]
    pub content_text: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub footer_text: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ButtonsResponseMessage {
    #[prost(string, optional, tag = "1")]
    pub selected_button_id: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub selected_display_text: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PaymentInviteMessage {
    #[prost(int32, optional, tag = "1")]
    pub service_type: Option<i32>,
    #[prost(int64, optional, tag = "2")]
    pub expiry_timestamp: Option<i64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct InteractiveMessage {
    #[prost(string, optional, tag = "3")]
    pub footer_text: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReactionMessage {
    #[prost(message, optional, tag = "1")]
    pub key: Option<crate::message::protocol::MessageKeyProto>,
    #[prost(string, optional, tag = "2")]
    pub text: Option<String>,
    #[prost(int64, optional, tag = "4")]
    pub sender_timestamp_ms: Option<i64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StickerSyncRmrMessage {
    #[prost(string, repeated, tag = "1")]
    pub filehash: Vec<String>,
    #[prost(string, optional, tag = "2")]
    pub rmr_source: Option<String>,
}
