// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logical message model.
//!
//! [`MessageContainer`] is the protobuf container every encrypted payload
//! decodes into: a `oneof` over all message variants the protocol knows, of
//! which at most one is populated. [`MessageInfo`] pairs a container with its
//! [`MessageKey`] (chat, sender, direction, stanza id) and envelope metadata.
//!
//! History-sync and protocol-message payloads live in their own submodules;
//! they are ordinary container variants on the wire but drive engine side
//! effects instead of being shown to the user.
mod container;
mod history;
mod info;
mod protocol;

pub use container::{
    AudioMessage, ButtonsMessage, ButtonsResponseMessage, CallInfo, ContactMessage,
    ContactsArrayMessage, DeclinePaymentRequestMessage, DeviceSentMessage, DocumentMessage,
    ExtendedTextMessage, FutureMessageContainer, GroupInviteMessage, HighlyStructuredMessage,
    ImageMessage, InteractiveMessage, InvoiceMessage, ListMessage, ListResponseMessage,
    LiveLocationMessage, LocationMessage, Message, MessageContainer, MessageContextInfo,
    OrderMessage, PaymentInviteMessage, ProductMessage, ReactionMessage, RequestPaymentMessage,
    SendPaymentMessage, SenderKeyDistributionMessage, StickerMessage, StickerSyncRmrMessage,
    TemplateButtonReplyMessage, TemplateMessage, VideoMessage,
};
pub use history::{Conversation, HistorySync, HistorySyncMsg, HistorySyncType, Pushname, WebMessageInfo};
pub use info::{MessageCategory, MessageInfo, MessageKey};
pub use protocol::{
    AppStateSyncKey, AppStateSyncKeyShare, HistorySyncNotification, MessageKeyProto,
    ProtocolMessage, ProtocolType,
};
