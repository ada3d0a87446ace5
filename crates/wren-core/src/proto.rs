use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Decrypted application payload. Only the sub-payloads this pipeline acts
/// on are modelled; everything else rides through to the event sink.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    pub text: Option<String>,
    pub sender_key_distribution: Option<SenderKeyDistribution>,
    pub protocol: Option<ProtocolMessage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SenderKeyDistribution {
    pub group_id: String,
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolMessage {
    pub history_sync: Option<HistorySyncNotification>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistorySyncNotification {
    pub direct_path: String,
    pub media_key: Vec<u8>,
    pub file_enc_hash: Vec<u8>,
    pub file_length: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistorySync {
    pub conversations: Vec<Conversation>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Conversation {
    pub id: String,
    pub name: Option<String>,
    pub messages: Vec<HistoricalMessage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoricalMessage {
    pub id: String,
    pub sender: String,
    pub timestamp: i64,
    pub text: Option<String>,
}

pub fn decode_message(bytes: &[u8]) -> Result<Message, CoreError> {
    serde_json::from_slice(bytes).map_err(|_| CoreError::Serialization)
}

pub fn decode_history_sync(bytes: &[u8]) -> Result<HistorySync, CoreError> {
    serde_json::from_slice(bytes).map_err(|_| CoreError::Serialization)
}
