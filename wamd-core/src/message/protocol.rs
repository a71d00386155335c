// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol messages: payloads addressed to the client itself rather than to
//! the user. Decoding one triggers engine side effects (message revocation,
//! history sync download, app-state key installation, ephemeral settings).

/// Protobuf form of a message key, as embedded in protocol payloads.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MessageKeyProto {
    #[prost(string, optional, tag = "1")]
    pub remote_jid: Option<String>,
    #[prost(bool, optional, tag = "2")]
    pub from_me: Option<bool>,
    #[prost(string, optional, tag = "3")]
    pub id: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub participant: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ProtocolMessage {
    #[prost(message, optional, tag = "1")]
    pub key: Option<MessageKeyProto>,
    #[prost(enumeration = "ProtocolType", optional, tag = "2")]
    pub r#type: Option<i32>,
    #[prost(uint32, optional, tag = "4")]
    pub ephemeral_expiration: Option<u32>,
    #[prost(int64, optional, tag = "5")]
    pub ephemeral_setting_timestamp: Option<i64>,
    #[prost(message, optional, tag = "6")]
    pub history_sync_notification: Option<HistorySyncNotification>,
    #[prost(message, optional, tag = "12")]
    pub app_state_sync_key_share: Option<AppStateSyncKeyShare>,
}

impl ProtocolMessage {
    /// The protocol type, defaulting to `Revoke` for unknown tags the same
    /// way the protobuf codec does for unlisted enum values.
    pub fn protocol_type(&self) -> ProtocolType {
        self.r#type
            .and_then(|value| ProtocolType::try_from(value).ok())
            .unwrap_or(ProtocolType::Revoke)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ProtocolType {
    Revoke = 0,
    EphemeralSetting = 3,
    EphemeralSyncResponse = 4,
    HistorySyncNotification = 5,
    AppStateSyncKeyShare = 6,
    AppStateSyncKeyRequest = 7,
    MsgFanoutBackfillRequest = 8,
    InitialSecurityNotificationSettingSync = 9,
    AppStateFatalExceptionNotification = 10,
}

/// Pointer to an encrypted, compressed history-sync blob on the media CDN.
#[derive(Clone, PartialEq, prost::Message)]
pub struct HistorySyncNotification {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub file_sha256: Option<Vec<u8>>,
    #[prost(uint64, optional, tag = "2")]
    pub file_length: Option<u64>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub media_key: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub file_enc_sha256: Option<Vec<u8>>,
    #[prost(string, optional, tag = "5")]
    pub direct_path: Option<String>,
    #[prost(enumeration = "super::HistorySyncType", optional, tag = "6")]
    pub sync_type: Option<i32>,
    #[prost(uint32, optional, tag = "7")]
    pub chunk_order: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AppStateSyncKeyShare {
    #[prost(message, repeated, tag = "1")]
    pub keys: Vec<AppStateSyncKey>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AppStateSyncKey {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub key_id: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub key_data: Option<Vec<u8>>,
    #[prost(int64, optional, tag = "3")]
    pub timestamp: Option<i64>,
}
