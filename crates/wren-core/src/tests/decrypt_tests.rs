use super::{
    enc_child, group_jid, group_message_node, message_child, message_node, pad_with, peer_jid,
    prekey_child, sealed_payload, test_client, text_message,
};
use crate::proto::{Message, SenderKeyDistribution};
use crate::session::MemorySignalStore;
use uuid::Uuid;
use wren_wire::Node;

#[tokio::test]
async fn prekey_message_decrypts_dispatches_and_acks() {
    let mut tc = test_client();
    let base_key = [7u8; 32];
    let node = message_node(
        &peer_jid(),
        "m1",
        vec![prekey_child(&base_key, &text_message("hello"))],
    );
    assert!(tc.client.handle_unit(node));
    tc.client.drain().await;

    let event = tc.events.try_recv().expect("event");
    assert_eq!(event.message.text.as_deref(), Some("hello"));
    assert!(event.info.chat.is_none());
    assert_eq!(event.info.from, peer_jid());

    let sent = tc.sink.sent().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].tag, "receipt");
    assert_eq!(sent[0].attr("type"), Some("inactive"));
    assert_eq!(sent[0].attr("to"), Some("peer@wren.net"));
    assert_eq!(sent[1].tag, "ack");
    assert_eq!(sent[1].attr("class"), Some("message"));
    assert_eq!(sent[1].attr("id"), Some("m1"));
}

#[tokio::test]
async fn session_follows_handshake_for_ongoing_messages() {
    let mut tc = test_client();
    let base_key = [3u8; 32];
    tc.client.handle_unit(message_node(
        &peer_jid(),
        "m1",
        vec![prekey_child(&base_key, &text_message("first"))],
    ));
    tc.client.drain().await;
    tc.sink.take().await;
    tc.events.try_recv().expect("first event");

    tc.client.handle_unit(message_node(
        &peer_jid(),
        "m2",
        vec![message_child(&base_key, 1, &text_message("second"))],
    ));
    tc.client.drain().await;
    let event = tc.events.try_recv().expect("second event");
    assert_eq!(event.message.text.as_deref(), Some("second"));
    assert_eq!(tc.sink.sent().await.len(), 2);
}

#[tokio::test]
async fn ongoing_message_without_session_triggers_retry() {
    let mut tc = test_client();
    let node = message_node(
        &peer_jid(),
        "m1",
        vec![message_child(&[9u8; 32], 0, &text_message("lost"))],
    );
    tc.client.handle_unit(node);
    tc.client.drain().await;

    assert!(tc.events.try_recv().is_err());
    let sent = tc.sink.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].tag, "receipt");
    assert_eq!(sent[0].attr("type"), Some("retry"));
    let retry = sent[0].child("retry").expect("retry child");
    assert_eq!(retry.attr("count"), Some("1"));
    assert_eq!(retry.attr("id"), Some("m1"));
    assert_eq!(retry.attr("v"), Some("1"));
}

#[tokio::test]
async fn failing_sub_unit_abandons_the_whole_batch() {
    let mut tc = test_client();
    let base_key = [5u8; 32];
    tc.client.handle_unit(message_node(
        &peer_jid(),
        "setup",
        vec![prekey_child(&base_key, &text_message("setup"))],
    ));
    tc.client.drain().await;
    tc.sink.take().await;
    tc.events.try_recv().expect("setup event");

    let mut corrupt =
        MemorySignalStore::seal_message(&base_key, 2, &sealed_payload(&text_message("bad")));
    corrupt.mac[0] ^= 1;
    let id = Uuid::new_v4().to_string();
    let node = message_node(
        &peer_jid(),
        &id,
        vec![
            message_child(&base_key, 1, &text_message("one")),
            enc_child("msg", serde_json::to_vec(&corrupt).expect("envelope")),
            message_child(&base_key, 3, &text_message("three")),
        ],
    );
    tc.client.handle_unit(node);
    tc.client.drain().await;

    assert!(tc.events.try_recv().is_err());
    let sent = tc.sink.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].attr("type"), Some("retry"));
    assert_eq!(sent[0].child("retry").and_then(|r| r.attr("id")), Some(id.as_str()));
}

#[tokio::test]
async fn unknown_enc_type_is_skipped_without_aborting() {
    let mut tc = test_client();
    let base_key = [11u8; 32];
    let node = message_node(
        &peer_jid(),
        "m1",
        vec![
            Node::new("meta"),
            enc_child("future", vec![1, 2, 3]),
            prekey_child(&base_key, &text_message("still here")),
        ],
    );
    tc.client.handle_unit(node);
    tc.client.drain().await;

    let event = tc.events.try_recv().expect("event");
    assert_eq!(event.message.text.as_deref(), Some("still here"));
    let sent = tc.sink.sent().await;
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|n| n.attr("type") != Some("retry")));
}

#[tokio::test]
async fn group_message_before_distribution_fails_with_retry() {
    let mut tc = test_client();
    let chain = [21u8; 32];
    let envelope =
        MemorySignalStore::seal_group_message(&chain, 4, 0, &sealed_payload(&text_message("g")));
    let node = group_message_node(
        &group_jid(),
        &peer_jid(),
        "g1",
        vec![enc_child("skmsg", serde_json::to_vec(&envelope).expect("envelope"))],
    );
    tc.client.handle_unit(node);
    tc.client.drain().await;

    assert_eq!(tc.store.decrypt_attempts(), 1);
    assert!(tc.events.try_recv().is_err());
    let sent = tc.sink.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].attr("type"), Some("retry"));
}

#[tokio::test]
async fn distribution_enables_group_decryption() {
    let mut tc = test_client();
    let base_key = [13u8; 32];
    let chain = [22u8; 32];
    let distribution = Message {
        sender_key_distribution: Some(SenderKeyDistribution {
            group_id: group_jid().to_string(),
            payload: MemorySignalStore::distribution_payload(4, &chain).expect("payload"),
        }),
        ..Default::default()
    };
    tc.client.handle_unit(group_message_node(
        &group_jid(),
        &peer_jid(),
        "d1",
        vec![prekey_child(&base_key, &distribution)],
    ));
    tc.client.drain().await;
    tc.sink.take().await;
    tc.events.try_recv().expect("distribution event");

    let envelope = MemorySignalStore::seal_group_message(
        &chain,
        4,
        0,
        &sealed_payload(&text_message("to the group")),
    );
    tc.client.handle_unit(group_message_node(
        &group_jid(),
        &peer_jid(),
        "g2",
        vec![enc_child("skmsg", serde_json::to_vec(&envelope).expect("envelope"))],
    ));
    tc.client.drain().await;

    let event = tc.events.try_recv().expect("group event");
    assert_eq!(event.message.text.as_deref(), Some("to the group"));
    assert_eq!(event.info.chat, Some(group_jid()));
    let sent = tc.sink.sent().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].attr("to"), Some("launch@g.wren.net"));
}

#[tokio::test]
async fn undecodable_payload_is_skipped_without_retry() {
    let mut tc = test_client();
    let base_key = [17u8; 32];
    tc.client.handle_unit(message_node(
        &peer_jid(),
        "setup",
        vec![prekey_child(&base_key, &text_message("setup"))],
    ));
    tc.client.drain().await;
    tc.sink.take().await;
    tc.events.try_recv().expect("setup event");

    let envelope =
        MemorySignalStore::seal_message(&base_key, 1, &pad_with(b"not json".to_vec(), 4));
    tc.client.handle_unit(message_node(
        &peer_jid(),
        "m9",
        vec![enc_child("msg", serde_json::to_vec(&envelope).expect("envelope"))],
    ));
    tc.client.drain().await;

    assert!(tc.events.try_recv().is_err());
    assert!(tc.sink.sent().await.is_empty());
}

#[tokio::test]
async fn non_message_units_are_not_consumed() {
    let tc = test_client();
    assert!(!tc.client.handle_unit(Node::new("presence")));
    tc.client.drain().await;
    assert!(tc.sink.sent().await.is_empty());
}

#[tokio::test]
async fn malformed_message_is_dropped_without_retry() {
    let tc = test_client();
    let node = Node::new("message").with_attr("from", group_jid().to_string());
    assert!(tc.client.handle_unit(node));
    tc.client.drain().await;
    assert!(tc.sink.sent().await.is_empty());
}
