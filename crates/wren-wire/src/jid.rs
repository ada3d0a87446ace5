use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::error::{Result, WireError};

/// Namespace for direct user endpoints.
pub const USER_SERVER: &str = "wren.net";
/// Namespace for group endpoints.
pub const GROUP_SERVER: &str = "g.wren.net";

/// Addressable protocol endpoint: `user@server`, with an optional device
/// qualifier rendered as `user.device@server` when non-zero.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Jid {
    pub user: String,
    pub device: u16,
    pub server: String,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            device: 0,
            server: server.into(),
        }
    }

    pub fn with_device(user: impl Into<String>, device: u16, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            device,
            server: server.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let (user_part, server) = raw
            .split_once('@')
            .ok_or_else(|| WireError::InvalidJid(raw.to_string()))?;
        if user_part.is_empty() || server.is_empty() {
            return Err(WireError::InvalidJid(raw.to_string()));
        }
        let (user, device) = match user_part.rsplit_once('.') {
            Some((user, suffix)) => match suffix.parse::<u16>() {
                Ok(device) if !user.is_empty() => (user, device),
                _ => (user_part, 0),
            },
            None => (user_part, 0),
        };
        Ok(Self {
            user: user.to_string(),
            device,
            server: server.to_string(),
        })
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }

    /// Pairwise session address for this endpoint, one per (user, device).
    pub fn signal_address(&self) -> String {
        format!("{}.{}", self.user, self.device)
    }
}

impl Display for Jid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.device == 0 {
            write!(f, "{}@{}", self.user, self.server)
        } else {
            write!(f, "{}.{}@{}", self.user, self.device, self.server)
        }
    }
}
