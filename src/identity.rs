/// Session identity: per-device client id + per-submission transaction ids
///
/// The client id is minted once per session and persisted under the
/// configured data directory so every component of the same session agrees
/// on it. The directory is expected to be session-scoped (cleared between
/// sessions); nothing here survives a session boundary by design.
use crate::error::{BoardError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct SessionFileV1 {
    version: u8,
    client_id: String,
    created_at: String,
}

fn session_path(data_dir: &Path) -> PathBuf {
    data_dir.join("session.json")
}

/// Mints and holds the session identity.
///
/// Construction never fails: if the data directory cannot be read or
/// written, the service falls back to an in-memory client id for the rest
/// of the session.
#[derive(Debug, Clone)]
pub struct IdentityService {
    client_id: String,
}

impl IdentityService {
    /// In-memory identity, no persistence
    pub fn new() -> Self {
        let client_id = Uuid::new_v4().to_string();
        debug!("Minted in-memory client id {}", client_id);
        Self { client_id }
    }

    /// Load the session identity from `data_dir`, creating it on first use
    pub fn load_or_create(data_dir: &Path) -> Self {
        match Self::try_load_or_create(data_dir) {
            Ok(service) => service,
            Err(e) => {
                warn!(
                    "Session storage unavailable ({}), using in-memory client id",
                    e
                );
                Self::new()
            }
        }
    }

    fn try_load_or_create(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).map_err(BoardError::Io)?;
        let path = session_path(data_dir);

        if path.exists() {
            let raw = fs::read_to_string(&path).map_err(BoardError::Io)?;
            if let Ok(parsed) = serde_json::from_str::<SessionFileV1>(&raw) {
                if parsed.version == 1 {
                    debug!("Loaded session client id {}", parsed.client_id);
                    return Ok(Self {
                        client_id: parsed.client_id,
                    });
                }
            }
            // Unreadable or wrong version: re-mint below
            warn!("Session file at {:?} unreadable, re-minting identity", path);
        }

        let client_id = Uuid::new_v4().to_string();
        let file = SessionFileV1 {
            version: 1,
            client_id: client_id.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(BoardError::Serialization)?;
        fs::write(&path, json).map_err(BoardError::Io)?;

        debug!("Created session client id {}", client_id);
        Ok(Self { client_id })
    }

    /// Stable per-session device identifier
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Fresh correlation token for one submission attempt
    pub fn new_transaction_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

impl Default for IdentityService {
    fn default() -> Self {
        Self::new()
    }
}
