use std::sync::Arc;
use tracing::warn;
use wren_wire::Jid;

use crate::event::{DecryptedMessage, EventBus};
use crate::history;
use crate::info::MessageInfo;
use crate::proto::{Message, ProtocolMessage};
use crate::receipts;
use crate::session::{GroupSender, SignalStore};
use crate::transport::{MediaDownload, UnitSink};

/// Routes one fully decrypted message: sender-key distribution payloads feed
/// the group session builder, protocol payloads get their narrow handling,
/// and the message itself is always published to the event sink.
pub async fn handle_decrypted_message(
    store: &Arc<dyn SignalStore>,
    sink: &Arc<dyn UnitSink>,
    media: &Arc<dyn MediaDownload>,
    events: &EventBus,
    local: &Jid,
    info: &MessageInfo,
    message: Message,
) {
    if let Some(distribution) = message.sender_key_distribution.as_ref() {
        match info.chat.as_ref() {
            Some(chat) => {
                let sender = GroupSender::new(chat, &info.from);
                if let Err(err) = store
                    .process_distribution(&sender, &distribution.payload)
                    .await
                {
                    warn!(
                        "failed to process sender key distribution from {}: {}",
                        info.from_string(),
                        err
                    );
                }
            }
            None => warn!(
                "sender key distribution outside a group from {}",
                info.from_string()
            ),
        }
    }
    if let Some(protocol) = message.protocol.as_ref() {
        handle_protocol_message(sink, media, local, info, protocol).await;
    }
    events.publish(DecryptedMessage {
        info: info.clone(),
        message,
    });
}

async fn handle_protocol_message(
    sink: &Arc<dyn UnitSink>,
    media: &Arc<dyn MediaDownload>,
    local: &Jid,
    info: &MessageInfo,
    protocol: &ProtocolMessage,
) {
    if let Some(notification) = protocol.history_sync.as_ref() {
        history::handle_history_sync(media, notification).await;
        receipts::send_protocol_receipt(sink, local, &info.id, "hist_sync").await;
    }
    if info.category.as_deref() == Some("peer") {
        receipts::send_protocol_receipt(sink, local, &info.id, "peer_msg").await;
    }
}
