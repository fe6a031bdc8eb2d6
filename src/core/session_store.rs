//! 会话存储抽象层
//!
//! load 不到即视为新会话；运行停机（任何原因）时由引擎 save。内存实现用于测试与单进程，
//! 文件实现每个会话一个 JSON 文件。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::{HiveError, SessionState};
use crate::memory::JsonFile;

/// 会话存储接口
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>, HiveError>;

    async fn save(&self, session_id: &str, state: &SessionState) -> Result<(), HiveError>;
}

/// 进程内会话存储
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>, HiveError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn save(&self, session_id: &str, state: &SessionState) -> Result<(), HiveError> {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), state.clone());
        Ok(())
    }
}

/// 文件会话存储：`<dir>/<session_id>.json`
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn file_for(&self, session_id: &str) -> JsonFile {
        JsonFile::new(self.dir.join(format!("{}.json", file_stem(session_id))))
    }
}

/// session_id 来自调用方：安全字符原样保留，其余字节（包括 '%' 本身）编码为 %XX，
/// 不同的 id 必然得到不同的文件名
fn file_stem(session_id: &str) -> String {
    let mut stem = String::with_capacity(session_id.len());
    for byte in session_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("%{byte:02X}"));
        }
    }
    stem
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>, HiveError> {
        let state: Option<SessionState> = self
            .file_for(session_id)
            .load()
            .await
            .map_err(|e| HiveError::Store(e.to_string()))?;
        match state {
            Some(state) if state.session_id != session_id => Err(HiveError::Store(format!(
                "session file for '{session_id}' holds session '{}'",
                state.session_id
            ))),
            other => Ok(other),
        }
    }

    async fn save(&self, session_id: &str, state: &SessionState) -> Result<(), HiveError> {
        self.file_for(session_id)
            .save(state)
            .await
            .map_err(|e| HiveError::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Category, RoutingDecision};
    use crate::memory::Message;

    #[tokio::test]
    async fn test_memory_store_absent_session_is_none() {
        let store = MemorySessionStore::new();
        assert!(store.load("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_save_then_load() {
        let store = MemorySessionStore::new();
        let mut state = SessionState::seed("s1", "hello");
        state.step_count = 3;
        store.save("s1", &state).await.unwrap();
        assert_eq!(store.load("s1").await.unwrap(), Some(state));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_file_store_persists_full_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let mut state = SessionState::seed("user/42", "chart TSLA");
        state
            .messages
            .append(Message::assistant("Chart saved").with_author("chart_specialist"));
        state.pending_route = Some(RoutingDecision::Route(Category::Report));
        state
            .analysis_context
            .insert("last_agent".into(), serde_json::json!("chart_specialist"));
        store.save("user/42", &state).await.unwrap();

        assert!(dir.path().join("user%2F42.json").exists());
        let reopened = FileSessionStore::new(dir.path());
        assert_eq!(reopened.load("user/42").await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn test_file_store_keeps_similar_ids_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store
            .save("user/42", &SessionState::seed("user/42", "alice private request"))
            .await
            .unwrap();

        assert!(store.load("user_42").await.unwrap().is_none());
        assert!(store.load("user.42").await.unwrap().is_none());

        store
            .save("user_42", &SessionState::seed("user_42", "bob request"))
            .await
            .unwrap();
        let alice = store.load("user/42").await.unwrap().unwrap();
        let bob = store.load("user_42").await.unwrap().unwrap();
        assert_eq!(alice.session_id, "user/42");
        assert_eq!(alice.history()[0].content, "alice private request");
        assert_eq!(bob.session_id, "user_42");
        assert_eq!(bob.history()[0].content, "bob request");
    }

    #[test]
    fn test_file_stem_is_injective_on_lookalikes() {
        assert_eq!(file_stem("user_42"), "user_42");
        assert_eq!(file_stem("user/42"), "user%2F42");
        assert_eq!(file_stem("user.42"), "user%2E42");
        assert_eq!(file_stem("user%2F42"), "user%252F42");
    }

    #[tokio::test]
    async fn test_file_store_rejects_foreign_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        // 文件名属于 s2，内容却是 s1
        store.save("s2", &SessionState::seed("s1", "hello")).await.unwrap();
        let err = store.load("s2").await.unwrap_err();
        assert!(matches!(err, HiveError::Store(_)));
    }
}
