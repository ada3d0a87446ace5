use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use wren_wire::Node;

use crate::error::CoreError;

/// Outbound protocol unit sink. Fire-and-forget from the pipeline's side:
/// send errors are logged by callers, never retried here.
#[async_trait]
pub trait UnitSink: Send + Sync {
    async fn send_unit(&self, unit: Node) -> Result<(), CoreError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    History,
}

/// Encrypted blob download capability (history-sync payloads).
#[async_trait]
pub trait MediaDownload: Send + Sync {
    async fn download(
        &self,
        path: &str,
        enc_hash: &[u8],
        media_key: &[u8],
        length: u64,
        kind: MediaKind,
    ) -> Result<Vec<u8>, CoreError>;
}

/// In-memory sink that records every unit it is asked to send.
#[derive(Clone, Default)]
pub struct RecordingSink {
    units: Arc<Mutex<Vec<Node>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Node> {
        self.units.lock().await.clone()
    }

    pub async fn take(&self) -> Vec<Node> {
        std::mem::take(&mut *self.units.lock().await)
    }
}

#[async_trait]
impl UnitSink for RecordingSink {
    async fn send_unit(&self, unit: Node) -> Result<(), CoreError> {
        self.units.lock().await.push(unit);
        Ok(())
    }
}
