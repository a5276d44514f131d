/// Shared types for the board client layer
use serde::{Deserialize, Serialize};

/// One post-like entity as seen by the feed.
///
/// A post starts life optimistic (no `server_id`) and acquires its server
/// identity when the confirmation or a broadcast for it arrives. Posts that
/// originate on another device arrive with a `server_id` and no
/// `transaction_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Server-assigned id; present once the server has accepted the post
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<i64>,

    /// Client-minted correlation token for one submission attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    /// Display payload, opaque to the reconciliation engine
    pub content: String,

    /// RFC3339 timestamp of creation
    pub created_at: String,

    /// Display name of the author
    pub author_label: String,
}

impl Post {
    /// A post with neither an identifier nor content cannot be reconciled
    pub fn is_actionable(&self) -> bool {
        self.server_id.is_some() || self.transaction_id.is_some() || !self.content.is_empty()
    }
}

/// Push payload announcing a post change originated by any client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastPayload {
    pub post: Post,

    /// Client id of the originating device (decides toast wording, not identity)
    pub origin: String,

    /// Transaction id of the originating submission, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    /// Opaque transport-level dedup hint; unused by the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// Event-type string for post broadcasts on the push channel
pub const EVENT_POST_RECEIVED: &str = "post_received";

/// Real-time events observed by the client (for toasts and diagnostics)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// A new post arrived via broadcast
    PostReceived { payload: BroadcastPayload },
    /// A submission of ours was confirmed by the server
    PostConfirmed { server_id: i64 },
    /// A submission was dropped by the debounce guard
    SubmissionDebounced,
}
