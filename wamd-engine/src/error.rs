// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

use wamd_core::jid::JidError;
use wamd_core::node::NodeError;
use wamd_core::payload::PayloadError;
use wamd_encryption::group::GroupError;
use wamd_encryption::session::SessionError;
use wamd_encryption::wire::WireError;
use wamd_encryption::RngError;

use crate::traits::SocketError;

/// Where in the pipeline a failure surfaced. Reported alongside every error
/// routed through [`Events::on_failure`](crate::Events::on_failure).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Location {
    Message,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Socket(#[from] SocketError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Jid(#[from] JidError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Group(#[from] GroupError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error("unsupported enc type \"{0}\"")]
    UnsupportedType(String),

    #[error("group stanza without participant attribute")]
    MissingParticipant,

    #[error("pre-key bundle response flagged an error for {0}")]
    ErroneousBundle(String),

    #[error("protocol message without its {0} payload")]
    MalformedProtocolMessage(&'static str),

    #[error("cannot inflate history sync blob: {0}")]
    Inflate(#[source] std::io::Error),

    #[error("cannot parse history sync blob: {0}")]
    HistoryDecode(#[source] prost::DecodeError),

    #[error("store lock poisoned")]
    LockPoisoned,
}
