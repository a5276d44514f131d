/// Layered identity keys for post deduplication
///
/// Three channels can describe the same logical post through three different
/// identifiers: the server's integer id, the submitting client's transaction
/// id, and (as a last resort) a fingerprint of the visible content. The key
/// is layered so no channel needs to know about the others' identifiers.
use crate::types::Post;
use sha2::{Digest, Sha256};

/// Resolved identity of a post, in decreasing confidence order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    /// Server-assigned id: globally unique and stable
    Server(i64),
    /// Client-minted transaction id: unique per submission attempt
    Transaction(String),
    /// Content fingerprint: deterministic but collision-prone fallback
    Content(String),
}

/// Pick the strongest identifier available on the post
pub fn resolve_identity_key(post: &Post) -> IdentityKey {
    if let Some(id) = post.server_id {
        return IdentityKey::Server(id);
    }
    if let Some(tx) = &post.transaction_id {
        return IdentityKey::Transaction(tx.clone());
    }
    IdentityKey::Content(fingerprint(
        &post.content,
        &post.created_at,
        &post.author_label,
        post.transaction_id.as_deref(),
    ))
}

/// Deterministic content fingerprint (base58-encoded SHA-256).
///
/// Fields are length-delimited before hashing so adjacent fields cannot
/// bleed into each other. Two distinct posts with identical content,
/// timestamp and author from different devices will collide; that is an
/// accepted approximation in the absence of a server id.
pub fn fingerprint(
    content: &str,
    created_at: &str,
    author_label: &str,
    transaction_id: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    for field in [content, created_at, author_label, transaction_id.unwrap_or("")] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    let hash = hasher.finalize();
    bs58::encode(&hash[..]).into_string()
}
