pub mod decrypt_tests;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use wren_wire::{Jid, Node, GROUP_SERVER, USER_SERVER};

use crate::error::CoreError;
use crate::event::EventReceiver;
use crate::policy::Policy;
use crate::proto::Message;
use crate::session::MemorySignalStore;
use crate::transport::{MediaDownload, MediaKind, RecordingSink};
use crate::Client;

pub struct TestClient {
    pub client: Client,
    pub store: Arc<MemorySignalStore>,
    pub sink: RecordingSink,
    pub media: Arc<MockMedia>,
    pub events: EventReceiver,
}

pub fn local_jid() -> Jid {
    Jid::new("local", USER_SERVER)
}

pub fn peer_jid() -> Jid {
    Jid::new("peer", USER_SERVER)
}

pub fn group_jid() -> Jid {
    Jid::new("launch", GROUP_SERVER)
}

pub fn test_client() -> TestClient {
    test_client_with_policy(Policy::default())
}

pub fn test_client_with_policy(policy: Policy) -> TestClient {
    let store = Arc::new(MemorySignalStore::new());
    let sink = RecordingSink::new();
    let media = Arc::new(MockMedia::default());
    let client = Client::new(
        local_jid(),
        policy,
        store.clone(),
        Arc::new(sink.clone()),
        media.clone(),
    );
    let events = client.subscribe();
    TestClient {
        client,
        store,
        sink,
        media,
        events,
    }
}

#[derive(Default)]
pub struct MockMedia {
    blob: Mutex<Option<Vec<u8>>>,
    downloads: AtomicUsize,
}

impl MockMedia {
    pub async fn set_blob(&self, blob: Vec<u8>) {
        *self.blob.lock().await = Some(blob);
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaDownload for MockMedia {
    async fn download(
        &self,
        _path: &str,
        _enc_hash: &[u8],
        _media_key: &[u8],
        _length: u64,
        _kind: MediaKind,
    ) -> Result<Vec<u8>, CoreError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.blob
            .lock()
            .await
            .clone()
            .ok_or_else(|| CoreError::Media("no blob staged".to_string()))
    }
}

pub fn message_node(from: &Jid, id: &str, children: Vec<Node>) -> Node {
    Node::with_children("message", children)
        .with_attr("from", from.to_string())
        .with_attr("id", id)
        .with_attr("t", "1720000000")
}

pub fn group_message_node(chat: &Jid, participant: &Jid, id: &str, children: Vec<Node>) -> Node {
    message_node(chat, id, children).with_attr("participant", participant.to_string())
}

pub fn enc_child(enc_type: &str, bytes: Vec<u8>) -> Node {
    Node::bytes("enc", bytes).with_attr("type", enc_type)
}

pub fn pad_with(mut bytes: Vec<u8>, value: u8) -> Vec<u8> {
    bytes.extend(std::iter::repeat(value).take(value as usize));
    bytes
}

pub fn text_message(text: &str) -> Message {
    Message {
        text: Some(text.to_string()),
        ..Default::default()
    }
}

pub fn sealed_payload(message: &Message) -> Vec<u8> {
    pad_with(serde_json::to_vec(message).expect("payload"), 4)
}

pub fn prekey_child(base_key: &[u8; 32], message: &Message) -> Node {
    let envelope = MemorySignalStore::seal_prekey_message(base_key, 7, &sealed_payload(message));
    enc_child("pkmsg", serde_json::to_vec(&envelope).expect("envelope"))
}

pub fn message_child(base_key: &[u8; 32], counter: u32, message: &Message) -> Node {
    let envelope = MemorySignalStore::seal_message(base_key, counter, &sealed_payload(message));
    enc_child("msg", serde_json::to_vec(&envelope).expect("envelope"))
}
