pub mod decrypt;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod event;
pub mod history;
pub mod info;
pub mod padding;
pub mod policy;
pub mod pool;
pub mod proto;
pub mod receipts;
pub mod retry;
pub mod session;
pub mod time;
pub mod transport;

use std::sync::Arc;
use tracing::{debug, warn};
use wren_wire::{Jid, Node};

use event::{EventBus, EventReceiver};
use info::{parse_message_info, MessageInfo};
use policy::Policy;
use pool::UnitPool;
use retry::RetryCounters;
use session::SignalStore;
use transport::{MediaDownload, UnitSink};

/// Encrypted-message ingestion pipeline. Each inbound unit is processed on
/// its own pooled task; sub-units within a unit are processed sequentially
/// and the whole batch is abandoned on the first decrypt failure.
#[derive(Clone)]
pub struct Client {
    local: Jid,
    policy: Policy,
    store: Arc<dyn SignalStore>,
    transport: Arc<dyn UnitSink>,
    media: Arc<dyn MediaDownload>,
    retries: Arc<RetryCounters>,
    events: EventBus,
    pool: UnitPool,
}

impl Client {
    pub fn new(
        local: Jid,
        policy: Policy,
        store: Arc<dyn SignalStore>,
        transport: Arc<dyn UnitSink>,
        media: Arc<dyn MediaDownload>,
    ) -> Self {
        let retries = Arc::new(RetryCounters::new(policy.retry_counter_capacity));
        let pool = UnitPool::new(policy.max_concurrent_units);
        Self {
            local,
            policy,
            store,
            transport,
            media,
            retries,
            events: EventBus::new(256),
            pool,
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub fn local_jid(&self) -> &Jid {
        &self.local
    }

    /// Receive-path entry point. Returns whether the node was consumed.
    /// Processing happens on a pooled task; this never blocks on crypto.
    pub fn handle_unit(&self, node: Node) -> bool {
        if node.tag != "message" {
            return false;
        }
        let info = match parse_message_info(&node) {
            Ok(info) => info,
            Err(err) => {
                warn!("failed to parse message: {}", err);
                return true;
            }
        };
        let client = self.clone();
        self.pool
            .spawn(async move { client.process_unit(info, node).await });
        true
    }

    /// Waits for every in-flight unit task to finish. Shutdown hook; new
    /// units may still be submitted afterwards.
    pub async fn drain(&self) {
        self.pool.drain().await;
    }

    async fn process_unit(&self, info: MessageInfo, node: Node) {
        let children = node.children();
        let unavailable = node.children_by_tag("unavailable").count();
        if !children.is_empty() && unavailable == children.len() {
            retry::send_retry_receipt(&self.retries, &self.store, &self.transport, &node).await;
            return;
        }
        debug!(
            "decrypting {} sub-units from {}",
            children.len(),
            info.from_string()
        );
        let mut decrypted = Vec::new();
        for child in children {
            let Some(kind) = decrypt::classify(&info, child) else {
                continue;
            };
            match decrypt::decrypt_sub_unit(&self.store, &self.policy, &info, kind, child).await {
                Ok(plaintext) => match proto::decode_message(&plaintext) {
                    Ok(message) => decrypted.push(message),
                    Err(err) => warn!(
                        "failed to decode decrypted message from {}: {}",
                        info.from_string(),
                        err
                    ),
                },
                Err(err) if err.triggers_retry() => {
                    warn!(
                        "failed to decrypt message from {}: {}",
                        info.from_string(),
                        err
                    );
                    retry::send_retry_receipt(&self.retries, &self.store, &self.transport, &node)
                        .await;
                    return;
                }
                Err(err) => warn!(
                    "skipping sub-unit from {}: {}",
                    info.from_string(),
                    err
                ),
            }
        }
        if decrypted.is_empty() {
            return;
        }
        for message in decrypted {
            dispatch::handle_decrypted_message(
                &self.store,
                &self.transport,
                &self.media,
                &self.events,
                &self.local,
                &info,
                message,
            )
            .await;
        }
        receipts::send_delivery_receipt(&self.transport, &self.local, &info).await;
        receipts::send_ack(&self.transport, &self.local, &node).await;
    }
}

#[cfg(test)]
mod tests;
