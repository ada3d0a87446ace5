mod error;
mod jid;
mod node;

pub use crate::error::{Result, WireError};
pub use crate::jid::{Jid, GROUP_SERVER, USER_SERVER};
pub use crate::node::{Node, NodeContent};
