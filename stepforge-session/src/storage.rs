//! Session persistence: `snapshot()` / `restore()` over a pluggable
//! store, with both an in-memory and a file-backed implementation —
//! every persisted concept in this workspace ships both.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use stepforge_types::{SessionId, StateError};

/// One turn's worth of recorded conversation, opaque to the session
/// manager beyond the prompt/response pair it assembled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// The fully-assembled user content for the turn (steering
    /// fragments already prepended).
    pub prompt: String,
    /// The backing's rendered response content.
    pub response: String,
}

/// `{transcript, id}`: a session's replayable history, without the
/// tool-call records a live turn produces — `restore` recreates a
/// session without replaying tool calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// The session this snapshot was taken from.
    pub id: SessionId,
    /// Turns recorded so far, oldest first.
    pub transcript: Vec<TranscriptEntry>,
}

/// Trait for persisting and loading session snapshots.
pub trait SessionStore: Send + Sync {
    /// Save a snapshot (create or overwrite).
    fn save(&self, snapshot: &SessionSnapshot) -> impl Future<Output = Result<(), StateError>> + Send;

    /// Load a snapshot by session id.
    fn load(&self, id: &SessionId) -> impl Future<Output = Result<SessionSnapshot, StateError>> + Send;

    /// List the ids of every stored snapshot.
    fn list(&self) -> impl Future<Output = Result<Vec<SessionId>, StateError>> + Send;

    /// Delete a snapshot by session id.
    fn delete(&self, id: &SessionId) -> impl Future<Output = Result<(), StateError>> + Send;
}

/// In-memory snapshot store backed by a concurrent hash map. Suitable
/// for testing and short-lived processes.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    snapshots: Arc<RwLock<HashMap<String, SessionSnapshot>>>,
}

impl InMemorySessionStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StateError> {
        let mut map = self.snapshots.write().await;
        map.insert(snapshot.id.as_str().to_string(), snapshot.clone());
        Ok(())
    }

    async fn load(&self, id: &SessionId) -> Result<SessionSnapshot, StateError> {
        let map = self.snapshots.read().await;
        map.get(id.as_str())
            .cloned()
            .ok_or_else(|| StateError::CheckpointNotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<SessionId>, StateError> {
        let map = self.snapshots.read().await;
        Ok(map.keys().map(|id| SessionId::new(id.clone())).collect())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StateError> {
        let mut map = self.snapshots.write().await;
        map.remove(id.as_str())
            .ok_or_else(|| StateError::CheckpointNotFound(id.to_string()))?;
        Ok(())
    }
}

/// File-based snapshot store storing one JSON file per session, at
/// `{directory}/{session_id}.json`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    directory: PathBuf,
}

impl FileSessionStore {
    /// Create a new file-based store rooted at `directory`. The
    /// directory is created on first `save()` if it does not exist.
    #[must_use]
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    /// Build the on-disk path for `id`, rejecting ids that aren't a
    /// single safe path component — `SessionId` enforces no format of
    /// its own, and a caller-controlled id such as `"../../etc/passwd"`
    /// must not be allowed to escape `self.directory`.
    fn path_for(&self, id: &SessionId) -> Result<PathBuf, StateError> {
        let raw = id.as_str();
        let safe = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(StateError::PathNotFound(format!("invalid session id: {raw:?}")));
        }
        Ok(self.directory.join(format!("{raw}.json")))
    }
}

impl SessionStore for FileSessionStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StateError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| StateError::RestoreFailed {
                path: self.directory.display().to_string(),
                cause: e.to_string(),
            })?;
        let path = self.path_for(&snapshot.id)?;
        let json = serde_json::to_string_pretty(snapshot).map_err(|e| StateError::RestoreFailed {
            path: path.display().to_string(),
            cause: e.to_string(),
        })?;
        tokio::fs::write(&path, json).await.map_err(|e| StateError::RestoreFailed {
            path: path.display().to_string(),
            cause: e.to_string(),
        })
    }

    async fn load(&self, id: &SessionId) -> Result<SessionSnapshot, StateError> {
        let path = self.path_for(id)?;
        let data = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StateError::CheckpointNotFound(id.to_string())
            } else {
                StateError::PathNotFound(path.display().to_string())
            }
        })?;
        serde_json::from_str(&data).map_err(|e| StateError::RestoreFailed {
            path: path.display().to_string(),
            cause: e.to_string(),
        })
    }

    async fn list(&self) -> Result<Vec<SessionId>, StateError> {
        let mut ids = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(_) => return Err(StateError::PathNotFound(self.directory.display().to_string())),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StateError::PathNotFound(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(SessionId::new(stem.to_string()));
                }
            }
        }
        Ok(ids)
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StateError> {
        let path = self.path_for(id)?;
        tokio::fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StateError::CheckpointNotFound(id.to_string())
            } else {
                StateError::PathNotFound(path.display().to_string())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_round_trips_a_snapshot() {
        let dir = std::env::temp_dir().join(format!("stepforge-storage-test-{}", std::process::id()));
        let store = FileSessionStore::new(dir.clone());
        let snapshot = SessionSnapshot {
            id: SessionId::new("session-1"),
            transcript: vec![TranscriptEntry {
                prompt: "hi".to_string(),
                response: "hello".to_string(),
            }],
        };

        store.save(&snapshot).await.unwrap();
        let loaded = store.load(&snapshot.id).await.unwrap();
        assert_eq!(loaded.transcript.len(), 1);
        assert!(store.list().await.unwrap().contains(&snapshot.id));

        store.delete(&snapshot.id).await.unwrap();
        assert!(matches!(
            store.load(&snapshot.id).await,
            Err(StateError::CheckpointNotFound(_))
        ));
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn file_store_rejects_a_path_traversing_session_id() {
        let dir = std::env::temp_dir().join(format!("stepforge-storage-test-{}-traversal", std::process::id()));
        let store = FileSessionStore::new(dir.clone());
        let snapshot = SessionSnapshot {
            id: SessionId::new("../../etc/passwd"),
            transcript: Vec::new(),
        };

        assert!(matches!(
            store.save(&snapshot).await,
            Err(StateError::PathNotFound(_))
        ));
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
