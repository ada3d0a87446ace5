use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::info::MessageInfo;
use crate::proto::Message;

/// Fully decrypted application message handed to event consumers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedMessage {
    pub info: MessageInfo,
    pub message: Message,
}

pub type EventReceiver = broadcast::Receiver<DecryptedMessage>;

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DecryptedMessage>,
}

impl EventBus {
    pub fn new(size: usize) -> Self {
        let (tx, _) = broadcast::channel(size);
        Self { tx }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: DecryptedMessage) {
        let _ = self.tx.send(event);
    }
}
