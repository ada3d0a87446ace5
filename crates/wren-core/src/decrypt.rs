use std::sync::Arc;
use tracing::warn;
use wren_wire::Node;

use crate::envelope::{EncKind, MessageEnvelope, PreKeyEnvelope, SenderKeyEnvelope};
use crate::error::CoreError;
use crate::info::MessageInfo;
use crate::padding::unpad;
use crate::policy::Policy;
use crate::session::{GroupSender, SessionAddress, SignalStore};

/// Decides whether a child node is a decryptable sub-unit. Non-`enc`
/// children and unsupported encryption types are skipped without aborting
/// the batch; only the returned kinds ever reach the session store.
pub fn classify(info: &MessageInfo, child: &Node) -> Option<EncKind> {
    if child.tag != "enc" {
        return None;
    }
    let enc_type = child.attr("type")?;
    let Some(kind) = EncKind::from_tag(enc_type) else {
        warn!(
            "unhandled encrypted sub-unit (type {}) from {}",
            enc_type,
            info.from_string()
        );
        return None;
    };
    if kind == EncKind::SenderKey && info.chat.is_none() {
        warn!(
            "sender-key sub-unit outside a group from {}",
            info.from_string()
        );
        return None;
    }
    Some(kind)
}

/// Decrypts one sub-unit via the session matching its kind, then unpads.
/// Envelope parse failures and cryptographic failures both surface to the
/// caller's retry protocol; nothing is retried here.
pub async fn decrypt_sub_unit(
    store: &Arc<dyn SignalStore>,
    policy: &Policy,
    info: &MessageInfo,
    kind: EncKind,
    child: &Node,
) -> Result<Vec<u8>, CoreError> {
    let ciphertext = child.content_bytes().ok_or(CoreError::MalformedCiphertext)?;
    let address = SessionAddress::from_jid(&info.from);
    let plaintext = match kind {
        EncKind::PreKey => {
            let envelope = PreKeyEnvelope::parse(ciphertext)?;
            store.establish_and_decrypt(&address, &envelope).await?
        }
        EncKind::Message => {
            let envelope = MessageEnvelope::parse(ciphertext)?;
            store.decrypt_message(&address, &envelope).await?
        }
        EncKind::SenderKey => {
            let chat = info
                .chat
                .as_ref()
                .ok_or_else(|| CoreError::UnsupportedSubUnit("skmsg".to_string()))?;
            let envelope = SenderKeyEnvelope::parse(ciphertext)?;
            let sender = GroupSender::new(chat, &info.from);
            store.decrypt_group_message(&sender, &envelope).await?
        }
    };
    unpad(plaintext, policy.check_padding)
}
