// SPDX-License-Identifier: MIT OR Apache-2.0

//! Jabber-style identities (`user[:device]@server`) as used by the
//! multi-device protocol.
//!
//! A JID addresses either a whole account (`device == 0`, the primary handle)
//! or one concrete companion device. Sessions of the Signal layer are keyed
//! by the [`SignalAddress`](crate::address::SignalAddress) derived from a
//! device JID.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::SignalAddress;

/// Well-known server parts of a JID.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Server {
    /// Legacy user server (`c.us`).
    User,

    /// Standard account server (`s.whatsapp.net`).
    Whatsapp,

    /// Group chats (`g.us`).
    Group,

    /// Broadcast lists, including the status broadcast (`broadcast`).
    Broadcast,

    /// Group calls (`call`).
    Call,
}

impl Server {
    pub fn as_str(&self) -> &'static str {
        match self {
            Server::User => "c.us",
            Server::Whatsapp => "s.whatsapp.net",
            Server::Group => "g.us",
            Server::Broadcast => "broadcast",
            Server::Call => "call",
        }
    }
}

impl FromStr for Server {
    type Err = JidError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "c.us" => Ok(Server::User),
            "s.whatsapp.net" => Ok(Server::Whatsapp),
            "g.us" => Ok(Server::Group),
            "broadcast" => Ok(Server::Broadcast),
            "call" => Ok(Server::Call),
            other => Err(JidError::UnknownServer(other.to_string())),
        }
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What kind of conversation a JID addresses, derived from the server part
/// and, for the status account, the user part.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JidKind {
    User,
    Status,
    Group,
    Broadcast,
    Call,
}

/// Structured identity `user[:device]@server`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Jid {
    user: String,
    server: Server,
    device: u32,
}

/// User part of the status broadcast account (`status@broadcast`).
const STATUS_USER: &str = "status";

impl Jid {
    pub fn new(user: impl Into<String>, server: Server) -> Self {
        Self {
            user: user.into(),
            server,
            device: 0,
        }
    }

    /// JID of one concrete device of an account.
    pub fn device(user: impl Into<String>, device: u32) -> Self {
        Self {
            user: user.into(),
            server: Server::Whatsapp,
            device,
        }
    }

    /// The status broadcast account.
    pub fn status_account() -> Self {
        Self::new(STATUS_USER, Server::Broadcast)
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn server(&self) -> Server {
        self.server
    }

    pub fn device_id(&self) -> u32 {
        self.device
    }

    /// Strips the device part, addressing the whole account.
    pub fn to_user_jid(&self) -> Jid {
        Jid {
            user: self.user.clone(),
            server: self.server,
            device: 0,
        }
    }

    pub fn kind(&self) -> JidKind {
        match self.server {
            Server::User | Server::Whatsapp => JidKind::User,
            Server::Group => JidKind::Group,
            Server::Broadcast if self.user == STATUS_USER => JidKind::Status,
            Server::Broadcast => JidKind::Broadcast,
            Server::Call => JidKind::Call,
        }
    }

    /// A conversation JID is one a 1:1 message thread hangs off.
    pub fn is_conversation(&self) -> bool {
        matches!(self.kind(), JidKind::User | JidKind::Status)
    }

    pub fn is_group(&self) -> bool {
        self.kind() == JidKind::Group
    }

    /// Address under which the Signal layer partitions session state for
    /// this device.
    pub fn signal_address(&self) -> SignalAddress {
        SignalAddress::new(self.user.clone(), self.device)
    }
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (account, server) = value
            .split_once('@')
            .ok_or_else(|| JidError::MissingServer(value.to_string()))?;
        let (user, device) = match account.split_once(':') {
            Some((user, device)) => {
                let device = device
                    .parse::<u32>()
                    .map_err(|_| JidError::InvalidDevice(value.to_string()))?;
                (user, device)
            }
            None => (account, 0),
        };
        Ok(Jid {
            user: user.to_string(),
            server: server.parse()?,
            device,
        })
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.device == 0 {
            write!(f, "{}@{}", self.user, self.server)
        } else {
            write!(f, "{}:{}@{}", self.user, self.device, self.server)
        }
    }
}

#[derive(Debug, Error)]
pub enum JidError {
    #[error("jid without server part: {0}")]
    MissingServer(String),

    #[error("unknown jid server: {0}")]
    UnknownServer(String),

    #[error("invalid device part in jid: {0}")]
    InvalidDevice(String),
}

#[cfg(test)]
mod tests {
    use super::{Jid, JidKind, Server};

    #[test]
    fn parse_and_display() {
        let jid: Jid = "alice@s.whatsapp.net".parse().unwrap();
        assert_eq!(jid.user(), "alice");
        assert_eq!(jid.server(), Server::Whatsapp);
        assert_eq!(jid.device_id(), 0);
        assert_eq!(jid.to_string(), "alice@s.whatsapp.net");

        let device: Jid = "alice:3@s.whatsapp.net".parse().unwrap();
        assert_eq!(device.device_id(), 3);
        assert_eq!(device.to_string(), "alice:3@s.whatsapp.net");
        assert_eq!(device.to_user_jid(), jid);
    }

    #[test]
    fn parse_failures() {
        assert!("alice".parse::<Jid>().is_err());
        assert!("alice@nowhere.example".parse::<Jid>().is_err());
        assert!("alice:x@s.whatsapp.net".parse::<Jid>().is_err());
    }

    #[test]
    fn kinds() {
        assert_eq!(Jid::new("alice", Server::Whatsapp).kind(), JidKind::User);
        assert_eq!(Jid::new("chat", Server::Group).kind(), JidKind::Group);
        assert_eq!(Jid::status_account().kind(), JidKind::Status);
        assert_eq!(
            Jid::new("list", Server::Broadcast).kind(),
            JidKind::Broadcast
        );
        assert!(Jid::status_account().is_conversation());
        assert!(!Jid::new("chat", Server::Group).is_conversation());
    }

    #[test]
    fn signal_address_keeps_device() {
        let jid = Jid::device("alice", 7);
        let address = jid.signal_address();
        assert_eq!(address.name(), "alice");
        assert_eq!(address.device_id(), 7);
    }
}
