use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, warn};
use wren_wire::Node;

use crate::error::CoreError;
use crate::session::{SignalStore, CURVE_TYPE_DJB};
use crate::time::now_ms;
use crate::transport::UnitSink;

struct RetryEntry {
    count: u32,
    last_ms: u64,
}

/// Per-message retry counters shared across all concurrent unit tasks.
/// Counts are monotonic while an id is resident; when the map is full the
/// stalest id is evicted to bound memory over the process lifetime.
pub struct RetryCounters {
    capacity: usize,
    entries: Mutex<HashMap<String, RetryEntry>>,
}

impl RetryCounters {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically increments and reads the counter for `id`. The whole
    /// read-modify-write runs under one lock acquisition so no two triggers
    /// observe the same pre-increment value.
    pub async fn bump(&self, id: &str) -> u32 {
        let mut entries = self.entries.lock().await;
        if self.capacity > 0 && !entries.contains_key(id) && entries.len() >= self.capacity {
            let stalest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_ms)
                .map(|(key, _)| key.clone());
            if let Some(key) = stalest {
                entries.remove(&key);
            }
        }
        let entry = entries.entry(id.to_string()).or_insert(RetryEntry {
            count: 0,
            last_ms: 0,
        });
        entry.count = entry.count.saturating_add(1);
        entry.last_ms = now_ms();
        entry.count
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Emits one escalating retry receipt for an inbound unit that could not be
/// decrypted (or arrived with its ciphertext unavailable). The first retry
/// for an id only asks for a resend; later retries also bundle fresh key
/// material so the sender can re-establish a working session.
pub async fn send_retry_receipt(
    counters: &RetryCounters,
    store: &Arc<dyn SignalStore>,
    sink: &Arc<dyn UnitSink>,
    node: &Node,
) {
    let Some(id) = node.attr("id") else {
        warn!("retry requested for a unit without an id");
        return;
    };
    let Some(from) = node.attr("from") else {
        warn!("retry requested for a unit without a sender: {}", id);
        return;
    };
    let count = counters.bump(id).await;

    let mut registration = [0u8; 4];
    registration[2..].copy_from_slice(&store.registration_id().to_be_bytes());

    let mut receipt = Node::new("receipt")
        .with_attr("id", id)
        .with_attr("type", "retry")
        .with_attr("to", from);
    for attr in ["recipient", "participant"] {
        if let Some(value) = node.attr(attr) {
            receipt = receipt.with_attr(attr, value);
        }
    }
    let mut retry = Node::new("retry")
        .with_attr("count", count.to_string())
        .with_attr("id", id)
        .with_attr("v", "1");
    if let Some(t) = node.attr("t") {
        retry = retry.with_attr("t", t);
    }
    receipt.push_child(retry);
    receipt.push_child(Node::bytes("registration", registration.to_vec()));

    if count > 1 {
        match key_bundle(store).await {
            Ok(keys) => receipt.push_child(keys),
            Err(err) => {
                error!("failed to build retry key bundle for {}: {}", id, err);
                return;
            }
        }
    }
    if let Err(err) = sink.send_unit(receipt).await {
        error!("failed to send retry receipt for {}: {}", id, err);
    }
}

async fn key_bundle(store: &Arc<dyn SignalStore>) -> Result<Node, CoreError> {
    let prekey = store.generate_prekey().await?;
    let signed = store.signed_prekey().await;
    let account = store.serialized_account().await?;
    let mut keys = Node::new("keys");
    keys.push_child(Node::bytes("type", vec![CURVE_TYPE_DJB]));
    keys.push_child(Node::bytes("identity", store.identity_key().await.to_vec()));
    keys.push_child(prekey_node("key", prekey.id, &prekey.public_key, None));
    keys.push_child(prekey_node(
        "skey",
        signed.id,
        &signed.public_key,
        Some(&signed.signature),
    ));
    keys.push_child(Node::bytes("device-identity", account));
    Ok(keys)
}

fn prekey_node(tag: &str, id: u32, public_key: &[u8; 32], signature: Option<&[u8]>) -> Node {
    let mut node = Node::new(tag);
    node.push_child(Node::bytes("id", id.to_be_bytes()[1..].to_vec()));
    node.push_child(Node::bytes("value", public_key.to_vec()));
    if let Some(sig) = signature {
        node.push_child(Node::bytes("signature", sig.to_vec()));
    }
    node
}
