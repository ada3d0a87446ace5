use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Encryption type of one ciphertext-bearing sub-unit. Closed set: anything
/// else on the wire is an unsupported sub-unit, not a decrypt failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncKind {
    /// Session-initiating pairwise handshake message.
    PreKey,
    /// Ongoing pairwise session message.
    Message,
    /// Group sender-key message.
    SenderKey,
}

impl EncKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "pkmsg" => Some(Self::PreKey),
            "msg" => Some(Self::Message),
            "skmsg" => Some(Self::SenderKey),
            _ => None,
        }
    }
}

/// Prekey-bearing handshake envelope: carries the material to establish a
/// fresh pairwise session plus a first ordinary message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreKeyEnvelope {
    pub registration_id: u32,
    pub prekey_id: Option<u32>,
    pub signed_prekey_id: u32,
    pub base_key: [u8; 32],
    pub identity_key: [u8; 32],
    pub message: MessageEnvelope,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageEnvelope {
    pub ratchet_key: [u8; 32],
    pub counter: u32,
    pub previous_counter: u32,
    pub ciphertext: Vec<u8>,
    pub mac: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SenderKeyEnvelope {
    pub key_id: u32,
    pub iteration: u32,
    pub ciphertext: Vec<u8>,
    pub mac: Vec<u8>,
}

impl PreKeyEnvelope {
    pub fn parse(bytes: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(bytes).map_err(|_| CoreError::MalformedCiphertext)
    }
}

impl MessageEnvelope {
    pub fn parse(bytes: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(bytes).map_err(|_| CoreError::MalformedCiphertext)
    }
}

impl SenderKeyEnvelope {
    pub fn parse(bytes: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(bytes).map_err(|_| CoreError::MalformedCiphertext)
    }
}
