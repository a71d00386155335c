// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage traits consumed by the wamd engine, plus in-memory
//! implementations.
//!
//! [`KeyStore`] owns every piece of cryptographic state (identity, pre-keys,
//! sessions, sender keys, app-state keys); [`ChatStore`] owns the
//! conversational state (chats, contacts, statuses) and bookkeeping such as
//! stanza tags. Durable serialization is triggered through the stores but its
//! format is an implementation concern.
mod memory;
mod traits;

pub use memory::{MemoryKeys, MemoryStore};
pub use traits::{ChatStore, KeyStore};
