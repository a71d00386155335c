// SPDX-License-Identifier: MIT OR Apache-2.0

//! Creation and consumption of sender-key distributions.
use wamd_core::SenderKeyName;

use crate::crypto::Rng;
use crate::group::state::SenderKeyState;
use crate::group::GroupError;
use crate::keypair::KeyPair;
use crate::traits::SenderKeyStore;
use crate::wire::SenderKeyDistributionMessage;

/// Manages sender-key chains: ours when we broadcast to a group, remote ones
/// announced through distribution messages.
pub struct GroupBuilder<'a, S> {
    store: &'a mut S,
}

impl<'a, S> GroupBuilder<'a, S>
where
    S: SenderKeyStore,
{
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Returns the distribution message announcing our chain for
    /// `sender_name`, creating chain and signing key on first use. The
    /// distribution always reflects the current chain position, so late
    /// joiners cannot read earlier messages.
    pub fn create_outgoing(
        &mut self,
        sender_name: &SenderKeyName,
        rng: &Rng,
    ) -> Result<SenderKeyDistributionMessage, GroupError> {
        let state = match self.store.load_sender_key(sender_name) {
            Some(state) => state,
            None => {
                let state = SenderKeyState::new_outgoing(
                    rng.key_id()?,
                    rng.key_bytes()?,
                    &KeyPair::generate(rng)?,
                );
                self.store.store_sender_key(sender_name, state.clone());
                state
            }
        };

        Ok(SenderKeyDistributionMessage::new(
            state.key_id,
            state.chain_key.iteration(),
            state.chain_key.seed_bytes(),
            state.signing_public,
        ))
    }

    /// Installs a remote sender's chain. The signing key is trusted on first
    /// use; every subsequent message is verified against it.
    pub fn create_incoming(
        &mut self,
        sender_name: &SenderKeyName,
        message: &SenderKeyDistributionMessage,
    ) {
        let state = SenderKeyState::new_incoming(
            message.id(),
            message.iteration(),
            *message.chain_key(),
            *message.signing_key(),
        );
        self.store.store_sender_key(sender_name, state);
    }
}
