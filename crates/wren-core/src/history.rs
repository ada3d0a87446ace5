use flate2::read::ZlibDecoder;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::CoreError;
use crate::proto::{decode_history_sync, HistorySyncNotification};
use crate::transport::{MediaDownload, MediaKind};

/// Fetches, inflates, and decodes a history-sync blob. Every step logs its
/// own failure; nothing here escalates past this handler.
pub async fn handle_history_sync(
    media: &Arc<dyn MediaDownload>,
    notification: &HistorySyncNotification,
) {
    let data = match media
        .download(
            &notification.direct_path,
            &notification.file_enc_hash,
            &notification.media_key,
            notification.file_length,
            MediaKind::History,
        )
        .await
    {
        Ok(data) => data,
        Err(err) => {
            error!("failed to download history sync data: {}", err);
            return;
        }
    };
    let raw = match inflate(&data) {
        Ok(raw) => raw,
        Err(err) => {
            error!("failed to decompress history sync data: {}", err);
            return;
        }
    };
    let history = match decode_history_sync(&raw) {
        Ok(history) => history,
        Err(err) => {
            error!("failed to decode history sync data: {}", err);
            return;
        }
    };
    debug!(
        "received history sync with {} conversations",
        history.conversations.len()
    );
    for conversation in history.conversations.iter() {
        debug!(
            "history sync conversation {} ({} messages)",
            conversation.id,
            conversation.messages.len()
        );
    }
}

pub fn inflate(bytes: &[u8]) -> Result<Vec<u8>, CoreError> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|_| CoreError::Serialization)?;
    Ok(out)
}
