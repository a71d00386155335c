// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wamd-core` provides the data model shared by all crates of the wamd
//! messaging core: structured JIDs and signal addresses, the binary
//! attribute-tree ("node") representation of stanzas, the protobuf message
//! container with every logical message variant, and the chat/contact state
//! the engine maintains.
//!
//! This crate is transport- and crypto-agnostic. The Signal protocol itself
//! lives in `wamd-encryption`, orchestration in `wamd-engine`.
pub mod address;
pub mod chat;
pub mod jid;
pub mod message;
pub mod node;
pub mod payload;

pub use address::{SenderKeyName, SignalAddress};
pub use chat::{Chat, ChatEphemeralTimer, Contact, ContactAction, EphemeralSetting, GroupMetadata};
pub use jid::{Jid, JidError, JidKind, Server};
pub use node::{Attributes, Node, NodeContent, NodeError};
