/// BoardLink - campus discussion-board client core
///
/// The mutation reconciliation engine and its collaborators: session
/// identity, layered dedup keys, the channel listener registry and the
/// ephemeral notice queue. Transport, HTTP and rendering live outside this
/// crate and hand raw payloads in.

pub mod error;
pub mod config;
pub mod types;
pub mod identity;
pub mod signature;
pub mod reconcile;
pub mod listeners;
pub mod notices;
pub mod client;

pub use client::BoardClient;
pub use config::Config;
pub use error::{BoardError, Result};
pub use identity::IdentityService;
pub use listeners::{ListenerRegistry, Transport};
pub use notices::NoticeQueue;
pub use reconcile::{dedup, upsert};
pub use signature::{fingerprint, resolve_identity_key, IdentityKey};
pub use types::{BroadcastPayload, FeedEvent, Post};
