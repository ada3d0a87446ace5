use serde::{Deserialize, Serialize};
use wren_wire::{Jid, Node};

use crate::error::CoreError;

/// Normalized addressing and metadata of one inbound message unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    pub from: Jid,
    pub chat: Option<Jid>,
    pub id: String,
    pub recipient: Option<Jid>,
    pub notify: Option<String>,
    pub timestamp: i64,
    pub category: Option<String>,
}

impl MessageInfo {
    pub fn is_group(&self) -> bool {
        self.chat.is_some()
    }

    pub fn from_string(&self) -> String {
        match &self.chat {
            Some(chat) => format!("{} in {}", self.from, chat),
            None => self.from.to_string(),
        }
    }
}

/// Group-addressed units carry the group in `from` and the real sender in
/// `participant`; direct units carry the sender in `from`.
pub fn parse_message_info(node: &Node) -> Result<MessageInfo, CoreError> {
    let from = node.jid_attr("from").ok_or_else(|| malformed("from"))?;
    let recipient = node.jid_attr("recipient");
    let (from, chat) = if from.is_group() {
        let participant = node
            .jid_attr("participant")
            .ok_or_else(|| malformed("participant"))?;
        (participant, Some(from))
    } else {
        (from, None)
    };
    let id = node
        .attr("id")
        .filter(|value| !value.is_empty())
        .ok_or_else(|| malformed("id"))?
        .to_string();
    let timestamp = node
        .attr("t")
        .and_then(|value| value.parse::<i64>().ok())
        .ok_or_else(|| malformed("t"))?;
    let notify = node.attr("notify").map(str::to_string);
    let category = node.attr("category").map(str::to_string);
    Ok(MessageInfo {
        from,
        chat,
        id,
        recipient,
        notify,
        timestamp,
        category,
    })
}

fn malformed(attr: &str) -> CoreError {
    CoreError::MalformedMessage(format!("missing or invalid `{}` attribute", attr))
}
