//! Same-device broadcast between sessions sharing one identity

use murmur_client::{ChatConfig, DEFAULT_GROUP_NAME};
use murmur_core::{ConversationKind, MemoryIdentityStore};
use murmur_harness::{SimSession, SimWorld};
use murmur_proto::{BroadcastRecord, MessageKind};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Two tabs of one user. The second uses `config`.
async fn tabs(world: &SimWorld, config: ChatConfig) -> (SimSession, SimSession) {
    let store = MemoryIdentityStore::new();
    let (mut first, _) = world.session_with(ChatConfig::default(), store.clone());
    let (mut second, _) = world.session_with(config, store);

    let a = first.init().await;
    let b = second.init().await;
    assert_eq!(a, b, "tabs share the stored identity");

    (first, second)
}

fn no_history() -> ChatConfig {
    ChatConfig { store_messages: false, ..ChatConfig::default() }
}

#[tokio::test]
async fn second_tab_auto_joins_group() {
    init_tracing();
    let world = SimWorld::new(30);
    let (mut first, mut second) = tabs(&world, no_history()).await;

    first.join_group("team-42", Some("Team".into())).await.unwrap();
    let sent = first.send_message("team-42", "from tab one").await.unwrap();

    assert_eq!(second.pump_broadcast().await, 1);

    let conversation = second.get_conversation("team-42").unwrap();
    assert_eq!(conversation.kind, ConversationKind::Group);
    assert_eq!(conversation.display_name.as_deref(), Some(DEFAULT_GROUP_NAME));

    let mirrored = second.get_messages("team-42");
    assert_eq!(mirrored.len(), 1);
    assert_eq!(mirrored[0].id, sent);
}

#[tokio::test]
async fn second_tab_auto_joins_direct() {
    init_tracing();
    let world = SimWorld::new(31);
    let (mut first, mut second) = tabs(&world, no_history()).await;
    let (mut bob, _) = world.session();
    let b = bob.init().await;

    let conversation = first
        .create_conversation(&[b.public_id().clone()], ConversationKind::Direct, None, None)
        .await
        .unwrap();
    first.send_message(&conversation.id, "hello bob").await.unwrap();

    assert_eq!(second.pump_broadcast().await, 1);

    let joined = second.get_conversation(&conversation.id).unwrap();
    assert_eq!(joined.kind, ConversationKind::Direct);
    assert_eq!(joined.participants, conversation.participants);
}

#[tokio::test]
async fn leave_notice_reaches_sibling_tab() {
    init_tracing();
    let world = SimWorld::new(39);
    let (mut first, mut second) = tabs(&world, no_history()).await;

    first.join_group("team-7", None).await.unwrap();
    second.join_group("team-7", None).await.unwrap();
    let before = world.bus.posted();

    first.leave_conversation("team-7").await.unwrap();

    assert_eq!(world.bus.posted(), before + 1);
    assert_eq!(second.pump_broadcast().await, 1);

    let mirrored = second.get_messages("team-7");
    assert_eq!(mirrored.len(), 1);
    assert_eq!(mirrored[0].kind(), MessageKind::Leave);
    assert!(first.get_conversation("team-7").is_none());
}

#[tokio::test]
async fn broadcast_and_transport_copies_store_once() {
    let world = SimWorld::new(32);
    let (mut first, mut second) = tabs(&world, ChatConfig::default()).await;

    first.join_group("team", None).await.unwrap();
    second.join_group("team", None).await.unwrap();
    first.send_message("team", "twice delivered").await.unwrap();

    assert_eq!(second.pump_broadcast().await, 1);
    assert_eq!(second.pump_inbound().await, 0);
    assert_eq!(second.get_messages("team").len(), 1);
}

#[tokio::test]
async fn history_and_broadcast_overlap_stores_once() {
    let world = SimWorld::new(33);
    let (mut first, mut second) = tabs(&world, ChatConfig::default()).await;

    first.join_group("team", None).await.unwrap();
    first.send_message("team", "seen via history first").await.unwrap();

    // Auto-join queries history, so the broadcast copy is a duplicate.
    assert_eq!(second.pump_broadcast().await, 0);
    assert_eq!(second.get_messages("team").len(), 1);
}

#[tokio::test]
async fn stale_copy_does_not_rejoin_left_conversation() {
    let world = SimWorld::new(40);
    let (mut first, mut second) = tabs(&world, no_history()).await;

    first.join_group("team", None).await.unwrap();
    first.send_message("team", "old news").await.unwrap();
    assert_eq!(second.pump_broadcast().await, 1);

    second.leave_conversation("team").await.unwrap();

    let replay = BroadcastRecord::new_message(
        first.get_messages("team").remove(0),
        world.env.peek_millis(),
    );
    assert!(!second.accept_broadcast(replay).await);
    assert!(second.get_conversation("team").is_none());
}

#[tokio::test]
async fn auto_join_disabled_discards_record() {
    let world = SimWorld::new(34);
    let config = ChatConfig { auto_join_on_broadcast: false, ..ChatConfig::default() };
    let (mut first, mut second) = tabs(&world, config).await;

    first.join_group("team", None).await.unwrap();
    first.send_message("team", "ignored").await.unwrap();

    assert_eq!(second.pump_broadcast().await, 0);
    assert!(second.get_conversation("team").is_none());
    assert!(second.get_messages("team").is_empty());
}

#[tokio::test]
async fn tampered_record_is_rejected() {
    init_tracing();
    let world = SimWorld::new(35);
    let (mut first, mut second) = tabs(&world, no_history()).await;

    first.join_group("team", None).await.unwrap();
    first.send_message("team", "original").await.unwrap();

    let mut message = first.get_messages("team").remove(0);
    if let Some(payload) = message.payload.as_mut() {
        payload[0] ^= 0xff;
    }
    let forged = BroadcastRecord::new_message(message, world.env.peek_millis());

    assert!(!second.accept_broadcast(forged).await);
    assert!(second.get_messages("team").is_empty());
}

#[tokio::test]
async fn record_without_payload_is_rejected() {
    let world = SimWorld::new(36);
    let (mut first, mut second) = tabs(&world, no_history()).await;

    first.join_group("team", None).await.unwrap();
    first.send_message("team", "original").await.unwrap();

    let mut message = first.get_messages("team").remove(0);
    message.payload = None;
    let stripped = BroadcastRecord::new_message(message, world.env.peek_millis());

    assert!(!second.accept_broadcast(stripped).await);
}

#[tokio::test]
async fn uninitialized_session_ignores_broadcast() {
    let world = SimWorld::new(37);
    let (mut first, _) = world.session();
    let (mut idle, _) = world.session();
    first.init().await;

    first.join_group("team", None).await.unwrap();
    first.send_message("team", "nobody home").await.unwrap();

    assert_eq!(idle.pump_broadcast().await, 0);
    assert!(idle.get_all_conversations().is_empty());
}

#[tokio::test]
async fn broadcast_failure_does_not_block_send() {
    let world = SimWorld::new(38);
    let (mut first, first_node) = world.session();
    first.init().await;
    first.join_group("team", None).await.unwrap();

    world.bus.set_failing(true);
    first.send_message("team", "still sent").await.unwrap();

    assert_eq!(world.bus.posted(), 0);
    assert_eq!(world.network.published(first_node), 1);
    assert_eq!(first.get_messages("team").len(), 1);
}
