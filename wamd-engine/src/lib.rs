// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wamd-engine` is the encrypted messaging core: it fans outbound logical
//! messages out to every participant device, wraps each copy in the Signal
//! protocol and assembles the `<message>` stanza; inbound, it decrypts each
//! `<enc>` child, reconstructs the logical message, reacts to embedded
//! protocol events and persists the result.
//!
//! The engine talks to its collaborators through traits: the transport
//! ([`Socket`]), the listener surface ([`Events`]) and the stores
//! (`wamd-store`). All ratchet mutations are serialized through a one-permit
//! lock held across each encode and each decrypt step; caches are safe to
//! read outside of it.
mod cache;
mod devices;
mod error;
mod groups;
mod handler;
mod history;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
mod traits;

pub use cache::TtlCache;
pub use devices::DeviceRegistry;
pub use error::{EngineError, Location};
pub use groups::GroupRegistry;
pub use handler::{EngineConfig, MessageHandler};
pub use history::HistoryCache;
pub use traits::{Events, Socket, SocketError};
