use std::sync::Arc;
use tracing::warn;
use wren_wire::{Jid, Node, USER_SERVER};

use crate::info::MessageInfo;
use crate::transport::UnitSink;

/// Batch-level delivery receipt, sent once per inbound unit with at least
/// one decrypted sub-unit.
pub async fn send_delivery_receipt(sink: &Arc<dyn UnitSink>, local: &Jid, info: &MessageInfo) {
    let from_me = info.from.user == local.user;
    let mut receipt = Node::new("receipt")
        .with_attr("id", info.id.clone())
        .with_attr("type", if from_me { "sender" } else { "inactive" });
    match &info.chat {
        Some(chat) => {
            receipt = receipt
                .with_attr("to", chat.to_string())
                .with_attr("participant", info.from.to_string());
        }
        None => {
            receipt = receipt.with_attr("to", info.from.to_string());
            if from_me {
                if let Some(recipient) = &info.recipient {
                    receipt = receipt.with_attr("recipient", recipient.to_string());
                }
            }
        }
    }
    if let Err(err) = sink.send_unit(receipt).await {
        warn!("failed to send receipt for {}: {}", info.id, err);
    }
}

/// Narrow acknowledgement for recognized protocol messages (history sync,
/// peer-category), keyed by message id only.
pub async fn send_protocol_receipt(
    sink: &Arc<dyn UnitSink>,
    local: &Jid,
    id: &str,
    receipt_type: &str,
) {
    if id.is_empty() {
        return;
    }
    let receipt = Node::new("receipt")
        .with_attr("id", id)
        .with_attr("type", receipt_type)
        .with_attr("to", Jid::new(local.user.clone(), USER_SERVER).to_string());
    if let Err(err) = sink.send_unit(receipt).await {
        warn!(
            "failed to send acknowledgement for protocol message {}: {}",
            id, err
        );
    }
}

/// Transport-level acknowledgement of the inbound unit itself.
pub async fn send_ack(sink: &Arc<dyn UnitSink>, local: &Jid, node: &Node) {
    let mut ack = Node::new("ack")
        .with_attr("class", node.tag.clone())
        .with_attr("to", Jid::new(local.user.clone(), USER_SERVER).to_string());
    if let Some(id) = node.attr("id") {
        ack = ack.with_attr("id", id);
    }
    if let Err(err) = sink.send_unit(ack).await {
        warn!(
            "failed to send acknowledgement for {}: {}",
            node.attr("id").unwrap_or("<no id>"),
            err
        );
    }
}
