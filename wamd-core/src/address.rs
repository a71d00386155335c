// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keys under which the Signal layer partitions its ratchet state.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Address of one remote device. At most one session record exists per
/// address; at most one of its states is active.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalAddress {
    name: String,
    device_id: u32,
}

impl SignalAddress {
    pub fn new(name: impl Into<String>, device_id: u32) -> Self {
        Self {
            name: name.into(),
            device_id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }
}

impl fmt::Display for SignalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.device_id)
    }
}

/// Key of one sender-key chain: a group and one sending device in it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SenderKeyName {
    group_id: String,
    sender: SignalAddress,
}

impl SenderKeyName {
    pub fn new(group_id: impl Into<String>, sender: SignalAddress) -> Self {
        Self {
            group_id: group_id.into(),
            sender,
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn sender(&self) -> &SignalAddress {
        &self.sender
    }
}

impl fmt::Display for SenderKeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.group_id, self.sender)
    }
}
