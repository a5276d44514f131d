/// Ephemeral notice queue: short-lived toasts with automatic expiry
///
/// Entries self-evict after a fixed TTL; a drop-oldest cap bounds burst
/// size, since the TTL alone does not.
use crate::config::Config;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

/// One visible toast
#[derive(Debug, Clone, Serialize)]
pub struct NoticeEntry {
    pub id: u64,
    pub text: String,
    /// RFC3339 timestamp of creation
    pub created_at: String,
}

#[derive(Clone)]
pub struct NoticeQueue {
    entries: Arc<RwLock<Vec<NoticeEntry>>>,
    next_id: Arc<AtomicU64>,
    ttl: Duration,
    cap: usize,
}

impl NoticeQueue {
    pub fn new(config: &Config) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            ttl: config.notice_ttl,
            cap: config.notice_cap.max(1),
        }
    }

    /// Append a notice and schedule its automatic dismissal.
    ///
    /// Must be called from within a tokio runtime (the expiry timer is a
    /// spawned task).
    pub fn push(&self, text: impl Into<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = NoticeEntry {
            id,
            text: text.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            entries.push(entry);
            while entries.len() > self.cap {
                let dropped = entries.remove(0);
                debug!("Notice cap reached, dropping oldest notice {}", dropped.id);
            }
        }

        let queue = self.clone();
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            queue.dismiss(id);
        });

        id
    }

    /// Remove a notice; dismissing an unknown or already-dismissed id is a
    /// no-op
    pub fn dismiss(&self, id: u64) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|entry| entry.id != id);
    }

    /// Snapshot of the currently visible notices, in insertion order
    pub fn visible(&self) -> Vec<NoticeEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
