/// Feed reconciliation tests
/// End-to-end scenarios across the submit, confirmation and broadcast paths

// In integration tests, the package is available as an external crate
extern crate boardlink_core;

use boardlink_core::types::EVENT_POST_RECEIVED;
use boardlink_core::{BoardClient, BroadcastPayload, Config, Post, Transport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::sleep;

fn test_config() -> Config {
    // RUST_LOG=trace shows the engine's drop/replace decisions
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    Config {
        submit_min_interval: Duration::from_millis(10),
        ..Default::default()
    }
}

fn foreign_post(server_id: i64, content: &str, author: &str) -> Post {
    Post {
        server_id: Some(server_id),
        transaction_id: None,
        content: content.to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
        author_label: author.to_string(),
    }
}

#[tokio::test]
async fn test_optimistic_then_confirm_then_broadcast() {
    let transport = Transport::new();
    let client = BoardClient::new(test_config(), transport.clone());

    // Submit: one optimistic entity, no server id
    let optimistic = client.submit("hi", "sam").unwrap();
    let tx = optimistic.transaction_id.clone().unwrap();
    let feed = client.feed();
    assert_eq!(feed.len(), 1);
    assert!(feed[0].server_id.is_none());

    // HTTP confirmation: still one entity, now with the server id
    client.apply_confirmation(Post {
        server_id: Some(42),
        ..optimistic.clone()
    });
    let feed = client.feed();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].server_id, Some(42));

    // Broadcast for the same post: still one entity
    let payload = BroadcastPayload {
        post: Post {
            server_id: Some(42),
            transaction_id: None,
            ..optimistic
        },
        origin: client.client_id().to_string(),
        transaction_id: Some(tx),
        event_id: None,
    };
    transport.publish_broadcast(EVENT_POST_RECEIVED, &payload);
    sleep(Duration::from_millis(50)).await;

    let feed = client.feed();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].server_id, Some(42));
}

#[tokio::test]
async fn test_broadcast_before_confirmation() {
    let transport = Transport::new();
    let client = BoardClient::new(test_config(), transport.clone());

    let optimistic = client.submit("hi", "sam").unwrap();
    let tx = optimistic.transaction_id.clone().unwrap();

    // Broadcast wins the race against the HTTP response
    let payload = BroadcastPayload {
        post: Post {
            server_id: Some(42),
            ..optimistic.clone()
        },
        origin: client.client_id().to_string(),
        transaction_id: Some(tx),
        event_id: None,
    };
    transport.publish_broadcast(EVENT_POST_RECEIVED, &payload);
    sleep(Duration::from_millis(50)).await;

    let feed = client.feed();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].server_id, Some(42));

    // The late confirmation changes nothing
    client.apply_confirmation(Post {
        server_id: Some(42),
        ..optimistic
    });
    let feed = client.feed();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].server_id, Some(42));
}

#[tokio::test]
async fn test_foreign_broadcast_on_empty_feed() {
    let transport = Transport::new();
    let client = BoardClient::new(test_config(), transport.clone());

    let payload = BroadcastPayload {
        post: foreign_post(7, "x", "alex"),
        origin: "some-other-device".to_string(),
        transaction_id: None,
        event_id: None,
    };
    transport.publish_broadcast(EVENT_POST_RECEIVED, &payload);
    sleep(Duration::from_millis(50)).await;

    let feed = client.feed();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].server_id, Some(7));

    // A foreign post raises a toast
    let notices = client.notices().visible();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].text.contains("alex"));
}

#[tokio::test]
async fn test_foreign_posts_order_most_recent_first() {
    let transport = Transport::new();
    let client = BoardClient::new(test_config(), transport.clone());

    for (id, content) in [(1, "first"), (2, "second")] {
        let payload = BroadcastPayload {
            post: foreign_post(id, content, "alex"),
            origin: "other".to_string(),
            transaction_id: None,
            event_id: None,
        };
        transport.publish_broadcast(EVENT_POST_RECEIVED, &payload);
    }
    sleep(Duration::from_millis(50)).await;

    let feed = client.feed();
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0].server_id, Some(2));
    assert_eq!(feed[1].server_id, Some(1));
}

#[tokio::test]
async fn test_three_views_one_subscription_one_visible_entity() {
    let transport = Transport::new();
    let client = BoardClient::new(test_config(), transport.clone());

    // Two more views mount and each routes events into its own upsert over
    // a shared collection; the client itself already holds the first
    let upsert_calls = Arc::new(AtomicUsize::new(0));
    let shared: Arc<RwLock<Vec<Post>>> = Arc::new(RwLock::new(Vec::new()));
    for _ in 0..2 {
        let upsert_calls = upsert_calls.clone();
        let shared = shared.clone();
        client.registry().ensure_listener(EVENT_POST_RECEIVED, move |value| {
            let payload: BroadcastPayload = serde_json::from_value(value.clone()).unwrap();
            upsert_calls.fetch_add(1, Ordering::SeqCst);
            let mut list = shared.write().unwrap();
            *list = boardlink_core::upsert(&list, payload.post);
        });
    }

    assert_eq!(client.registry().subscription_count(EVENT_POST_RECEIVED), 1);
    assert_eq!(client.registry().handler_count(EVENT_POST_RECEIVED), 3);

    let payload = BroadcastPayload {
        post: foreign_post(9, "hello", "alex"),
        origin: "other".to_string(),
        transaction_id: None,
        event_id: None,
    };
    transport.publish_broadcast(EVENT_POST_RECEIVED, &payload);
    transport.publish_broadcast(EVENT_POST_RECEIVED, &payload);
    sleep(Duration::from_millis(50)).await;

    // Each extra handler saw both deliveries, and dedup kept one entity
    assert_eq!(upsert_calls.load(Ordering::SeqCst), 4);
    assert_eq!(shared.read().unwrap().len(), 1);
    assert_eq!(client.feed().len(), 1);
}

#[tokio::test]
async fn test_own_broadcast_does_not_duplicate_optimistic_post() {
    let transport = Transport::new();
    let client = BoardClient::new(test_config(), transport.clone());

    let optimistic = client.submit("mine", "sam").unwrap();
    let tx = optimistic.transaction_id.clone().unwrap();

    // The server's broadcast for our own post omits the transaction id
    // inside the post but carries it at the payload level
    let payload = BroadcastPayload {
        post: foreign_post(88, "mine", "sam"),
        origin: client.client_id().to_string(),
        transaction_id: Some(tx),
        event_id: None,
    };
    transport.publish_broadcast(EVENT_POST_RECEIVED, &payload);
    sleep(Duration::from_millis(50)).await;

    let feed = client.feed();
    assert_eq!(feed.len(), 1, "own broadcast must resolve to one entity");
    assert_eq!(feed[0].server_id, Some(88));
}

#[tokio::test]
async fn test_malformed_broadcast_is_ignored() {
    let transport = Transport::new();
    let client = BoardClient::new(test_config(), transport.clone());

    transport.publish(EVENT_POST_RECEIVED, serde_json::json!({"not": "a payload"}));
    sleep(Duration::from_millis(50)).await;

    assert!(client.feed().is_empty());
}
