use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use canho_core::ConversationState;
use tokio::sync::Mutex;

/// Session-store collaborator that owns the persisted `ConversationState`.
/// A missing session yields a fresh default state rather than an error.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<ConversationState>;
    async fn save(&self, session_id: &str, state: &ConversationState) -> Result<()>;
}

/// Process-local store used by the CLI and by tests. State lives only as
/// long as the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    states: Mutex<HashMap<String, ConversationState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<ConversationState> {
        let states = self.states.lock().await;
        Ok(states.get(session_id).cloned().unwrap_or_default())
    }

    async fn save(&self, session_id: &str, state: &ConversationState) -> Result<()> {
        let mut states = self.states.lock().await;
        states.insert(session_id.to_string(), state.clone());
        Ok(())
    }
}
