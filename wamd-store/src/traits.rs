// SPDX-License-Identifier: MIT OR Apache-2.0

use wamd_core::message::{AppStateSyncKey, MessageInfo};
use wamd_core::{Chat, Contact, Jid};
use wamd_encryption::traits::{IdentityStore, PreKeyStore, SenderKeyStore, SessionStore};

/// Cryptographic state of this client.
///
/// Extends the Signal-layer store traits with the companion identity this
/// device pairs under and the app-state sync keys shared by the primary.
pub trait KeyStore:
    IdentityStore + SessionStore + PreKeyStore + SenderKeyStore + Send
{
    /// JID of this companion device.
    fn companion(&self) -> &Jid;

    /// Serialized companion identity certificate, attached to stanzas which
    /// carry a `pkmsg`.
    fn companion_identity(&self) -> &[u8];

    fn add_app_state_keys(&mut self, keys: Vec<AppStateSyncKey>);
}

/// Conversational state of this client.
pub trait ChatStore: Send {
    /// Monotonic stanza tag, used as USync session id.
    fn next_tag(&mut self) -> String;

    /// Connection epoch; messages older than this never count as unread.
    fn initialization_timestamp(&self) -> u64;

    /// Whether an incoming message clears a chat's archived flag.
    fn unarchive_chats(&self) -> bool;

    fn set_has_snapshot(&mut self, has_snapshot: bool);

    fn add_chat(&mut self, chat: Chat);

    fn chat(&self, jid: &Jid) -> Option<&Chat>;

    fn chat_mut(&mut self, jid: &Jid) -> Option<&mut Chat>;

    /// The chat for `jid`, created on first touch.
    fn chat_or_insert(&mut self, jid: &Jid) -> &mut Chat;

    fn add_status(&mut self, info: MessageInfo);

    fn contact(&self, jid: &Jid) -> Option<&Contact>;

    /// The contact for `jid`, created on first touch.
    fn contact_or_insert(&mut self, jid: &Jid) -> &mut Contact;

    /// Persistence trigger; called after protocol side effects so a crash
    /// cannot desynchronize ratchets from processed messages.
    fn serialize(&mut self);
}
