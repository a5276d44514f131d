/// Main board client implementation
///
/// Wires the identity service, listener registry, notice queue and
/// reconciliation engine into the submit / confirm / broadcast data flow.
/// The client owns the feed collection; every change replaces the whole
/// collection, never mutates it in place.
use crate::config::Config;
use crate::identity::IdentityService;
use crate::listeners::{ListenerRegistry, Transport};
use crate::notices::NoticeQueue;
use crate::reconcile::upsert;
use crate::types::{BroadcastPayload, FeedEvent, Post, EVENT_POST_RECEIVED};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct BoardClient {
    config: Config,
    identity: IdentityService,
    registry: Arc<ListenerRegistry>,
    notices: NoticeQueue,
    feed: Arc<RwLock<Vec<Post>>>,
    last_submit: Arc<RwLock<Option<Instant>>>,
    events: broadcast::Sender<FeedEvent>,
}

impl BoardClient {
    /// Create a client bound to the given push transport.
    ///
    /// Must be called from within a tokio runtime: the feed listener and
    /// notice timers run as spawned tasks.
    pub fn new(config: Config, transport: Transport) -> Self {
        let identity = match &config.data_dir {
            Some(dir) => IdentityService::load_or_create(dir),
            None => IdentityService::new(),
        };
        let registry = Arc::new(ListenerRegistry::new(transport));
        let notices = NoticeQueue::new(&config);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        info!("Created board client {}", identity.client_id());

        let client = Self {
            config,
            identity,
            registry,
            notices,
            feed: Arc::new(RwLock::new(Vec::new())),
            last_submit: Arc::new(RwLock::new(None)),
            events,
        };
        client.register_feed_listener();
        client
    }

    /// Route broadcast payloads into the reconciliation engine and the
    /// notice queue. The notice queue is fed in parallel; it never gates
    /// the engine.
    fn register_feed_listener(&self) {
        let feed = self.feed.clone();
        let notices = self.notices.clone();
        let own_id = self.identity.client_id().to_string();
        let events = self.events.clone();

        self.registry.ensure_listener(EVENT_POST_RECEIVED, move |value| {
            let payload: BroadcastPayload = match serde_json::from_value(value.clone()) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Ignoring malformed broadcast payload: {}", e);
                    return;
                }
            };

            let mut post = payload.post.clone();
            // The payload-level transaction id lets the engine match our own
            // optimistic entry even when the embedded post omits it
            if post.transaction_id.is_none() {
                post.transaction_id = payload.transaction_id.clone();
            }

            {
                let mut feed = feed.write().unwrap_or_else(|e| e.into_inner());
                *feed = upsert(&feed, post);
            }

            if payload.origin != own_id {
                notices.push(format!("New post from {}", payload.post.author_label));
            } else {
                notices.push("Your post is live");
            }
            let _ = events.send(FeedEvent::PostReceived { payload });
        });
    }

    /// Submit a new post: mint a transaction id, insert the optimistic
    /// entry, and return it for the HTTP layer to send.
    ///
    /// Returns `None` when the submission falls inside the debounce window
    /// of the previous one; rapid repeated clicks must not mint duplicate
    /// transactions.
    pub fn submit(&self, content: &str, author_label: &str) -> Option<Post> {
        {
            let mut last = self.last_submit.write().unwrap_or_else(|e| e.into_inner());
            if let Some(at) = *last {
                if at.elapsed() < self.config.submit_min_interval {
                    debug!("Submission dropped by debounce guard");
                    let _ = self.events.send(FeedEvent::SubmissionDebounced);
                    return None;
                }
            }
            *last = Some(Instant::now());
        }

        let post = Post {
            server_id: None,
            transaction_id: Some(self.identity.new_transaction_id()),
            content: content.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            author_label: author_label.to_string(),
        };

        let mut feed = self.feed.write().unwrap_or_else(|e| e.into_inner());
        *feed = upsert(&feed, post.clone());
        Some(post)
    }

    /// HTTP completion path: fold the server-confirmed version into the feed
    pub fn apply_confirmation(&self, confirmed: Post) {
        debug!(
            "Applying confirmation for server id {:?}, tx {:?}",
            confirmed.server_id, confirmed.transaction_id
        );
        if let Some(server_id) = confirmed.server_id {
            let _ = self.events.send(FeedEvent::PostConfirmed { server_id });
        }
        let mut feed = self.feed.write().unwrap_or_else(|e| e.into_inner());
        *feed = upsert(&feed, confirmed);
    }

    /// Snapshot of the current feed, most recent first
    pub fn feed(&self) -> Vec<Post> {
        self.feed.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the feed with an upstream merge (e.g. a freshly fetched
    /// page combined with the local list); duplicates are collapsed.
    pub fn replace_feed(&self, posts: Vec<Post>) {
        let mut feed = self.feed.write().unwrap_or_else(|e| e.into_inner());
        *feed = crate::reconcile::dedup(&posts);
    }

    pub fn client_id(&self) -> &str {
        self.identity.client_id()
    }

    pub fn notices(&self) -> &NoticeQueue {
        &self.notices
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    /// Subscribe to the client's own event stream (for diagnostics panels)
    pub fn subscribe_events(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_config() -> Config {
        Config {
            submit_min_interval: Duration::from_millis(50),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_submit_inserts_optimistic_post() {
        let client = BoardClient::new(fast_config(), Transport::new());
        let post = client.submit("hello quad", "sam").unwrap();

        assert!(post.server_id.is_none());
        assert!(post.transaction_id.is_some());

        let feed = client.feed();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].content, "hello quad");
    }

    #[tokio::test]
    async fn test_debounce_drops_rapid_resubmission() {
        let client = BoardClient::new(fast_config(), Transport::new());

        assert!(client.submit("first", "sam").is_some());
        assert!(client.submit("second", "sam").is_none());
        assert_eq!(client.feed().len(), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(client.submit("third", "sam").is_some());
        assert_eq!(client.feed().len(), 2);
    }

    #[tokio::test]
    async fn test_confirmation_resolves_optimistic_entry() {
        let client = BoardClient::new(fast_config(), Transport::new());
        let optimistic = client.submit("hi", "sam").unwrap();

        let confirmed = Post {
            server_id: Some(42),
            ..optimistic
        };
        client.apply_confirmation(confirmed);

        let feed = client.feed();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].server_id, Some(42));
    }

    #[tokio::test]
    async fn test_event_stream_reports_confirmation_and_debounce() {
        let client = BoardClient::new(fast_config(), Transport::new());
        let mut events = client.subscribe_events();

        let optimistic = client.submit("hi", "sam").unwrap();
        assert!(client.submit("again", "sam").is_none());
        client.apply_confirmation(Post {
            server_id: Some(5),
            ..optimistic
        });

        match events.recv().await.unwrap() {
            crate::types::FeedEvent::SubmissionDebounced => {}
            other => panic!("Expected debounce event, got {:?}", other),
        }
        match events.recv().await.unwrap() {
            crate::types::FeedEvent::PostConfirmed { server_id } => assert_eq!(server_id, 5),
            other => panic!("Expected confirmation event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_replace_feed_collapses_duplicates() {
        let client = BoardClient::new(fast_config(), Transport::new());
        let post = Post {
            server_id: Some(1),
            transaction_id: None,
            content: "x".to_string(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
            author_label: "anon".to_string(),
        };

        client.replace_feed(vec![post.clone(), post]);
        assert_eq!(client.feed().len(), 1);
    }
}
