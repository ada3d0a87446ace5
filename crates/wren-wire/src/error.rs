use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("invalid jid `{0}`")]
    InvalidJid(String),
}

pub type Result<T> = std::result::Result<T, WireError>;
