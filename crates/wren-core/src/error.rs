use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("malformed ciphertext")]
    MalformedCiphertext,
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("unsupported sub-unit type `{0}`")]
    UnsupportedSubUnit(String),
    #[error("bad padding")]
    BadPadding,
    #[error("serialization")]
    Serialization,
    #[error("transport {0}")]
    Transport(String),
    #[error("media {0}")]
    Media(String),
}

impl CoreError {
    /// Failures the retry protocol can repair by asking the sender to resend
    /// or re-establish the session.
    pub fn triggers_retry(&self) -> bool {
        matches!(
            self,
            Self::MalformedCiphertext | Self::DecryptionFailed(_) | Self::BadPadding
        )
    }
}
