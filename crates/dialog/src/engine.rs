//! The turn orchestrator: Understanding, Decision and Response wired in
//! sequence over a session store.
//!
//! The engine itself holds no per-session locks. Callers that can receive
//! overlapping messages for one session must serialize turns per session id
//! themselves, or last-write-wins on the saved state.

use std::sync::Arc;

use canho_core::{ConversationState, ListingHit, SlotKey};
use chrono::Utc;
use tracing::{debug, info};

use crate::decision::{Action, AskTarget, Decision};
use crate::errors::EngineError;
use crate::llm::LlmClient;
use crate::response::Response;
use crate::search::ListingSearch;
use crate::session::SessionStore;
use crate::understanding::Understanding;

#[derive(Clone, Copy, Debug)]
pub struct EngineOptions {
    /// NLU results below this are treated as not understood.
    pub confidence_threshold: f64,
    /// Maximum listings surfaced per search turn.
    pub result_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { confidence_threshold: 0.6, result_limit: 5 }
    }
}

/// What one turn hands back to the caller.
#[derive(Clone, Debug)]
pub struct TurnReply {
    pub reply: String,
    pub action_key: &'static str,
    pub listings: Vec<ListingHit>,
}

pub struct DialogEngine {
    understanding: Understanding,
    decision: Decision,
    response: Response,
    sessions: Arc<dyn SessionStore>,
}

impl DialogEngine {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn ListingSearch>,
        sessions: Arc<dyn SessionStore>,
        options: EngineOptions,
    ) -> Self {
        Self {
            understanding: Understanding::new(llm),
            decision: Decision::new(options.confidence_threshold),
            response: Response::new(search, options.result_limit),
            sessions,
        }
    }

    /// Runs one full turn for the session and persists the updated state.
    pub async fn run_turn(
        &self,
        session_id: &str,
        message: &str,
    ) -> Result<TurnReply, EngineError> {
        if session_id.trim().is_empty() {
            return Err(EngineError::MissingSession);
        }

        let mut state = self
            .sessions
            .load(session_id)
            .await
            .map_err(|error| EngineError::Store(error.to_string()))?;

        let nlu = self.understanding.process(message, &mut state).await;
        let action = self.decision.decide(&state, &nlu);
        debug!(
            session_id,
            intent = nlu.intent.label(),
            confidence = nlu.confidence,
            action = action.action_key(),
            "turn decided"
        );

        let outcome = self.response.execute(&action, &state).await;

        state.apply_patch(&outcome.patch);
        state.last_action = Some(action.action_key().to_string());
        state.missing_slots = missing_slots_for(&action, &state);
        state.updated_at = Utc::now();

        self.sessions
            .save(session_id, &state)
            .await
            .map_err(|error| EngineError::Store(error.to_string()))?;

        info!(
            session_id,
            action = action.action_key(),
            listings = outcome.listings.len(),
            "turn completed"
        );
        Ok(TurnReply {
            reply: outcome.reply,
            action_key: action.action_key(),
            listings: outcome.listings,
        })
    }
}

/// Advisory list of what the conversation still needs, derived from the
/// action just taken.
fn missing_slots_for(action: &Action, state: &ConversationState) -> Vec<SlotKey> {
    match action {
        Action::AskSlot { target: AskTarget::Slot(key) } => vec![*key],
        Action::AskSlot { target: AskTarget::Criteria } => SlotKey::ALL
            .iter()
            .copied()
            .filter(|key| key.is_search_criterion() && !state.slots.contains(*key))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::bail;
    use async_trait::async_trait;
    use canho_core::{ConversationState, DialogState, ListingFilter, ListingHit, SlotKey};
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::{DialogEngine, EngineError, EngineOptions};
    use crate::llm::LlmClient;
    use crate::search::ListingSearch;
    use crate::session::{MemorySessionStore, SessionStore};

    struct ScriptedLlm {
        replies: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            let mut replies = self.replies.lock().await;
            match replies.pop() {
                Some(reply) => Ok(reply),
                None => bail!("no scripted reply left"),
            }
        }
    }

    struct StaticSearch {
        hits: Vec<ListingHit>,
    }

    #[async_trait]
    impl ListingSearch for StaticSearch {
        async fn search(
            &self,
            _filter: &ListingFilter,
            _query: &str,
            limit: usize,
        ) -> anyhow::Result<Vec<ListingHit>> {
            Ok(self.hits.iter().take(limit).cloned().collect())
        }

        async fn find_by_unit_code(&self, unit_code: &str) -> anyhow::Result<Option<ListingHit>> {
            Ok(self
                .hits
                .iter()
                .find(|hit| hit.unit_code() == Some(unit_code))
                .cloned())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn load(&self, _session_id: &str) -> anyhow::Result<ConversationState> {
            bail!("store offline")
        }

        async fn save(
            &self,
            _session_id: &str,
            _state: &ConversationState,
        ) -> anyhow::Result<()> {
            bail!("store offline")
        }
    }

    fn sample_hit() -> ListingHit {
        ListingHit {
            score: 0.9,
            fields: json!({
                "ma_can_ho": "V2.31.02",
                "du_an": "Vinhomes Grand Park",
                "so_phong_ngu": 2,
                "gia_ban": 2_500_000_000.0_f64,
            })
            .as_object()
            .unwrap()
            .clone(),
        }
    }

    fn engine(llm: Arc<ScriptedLlm>, store: Arc<MemorySessionStore>) -> DialogEngine {
        DialogEngine::new(
            llm,
            Arc::new(StaticSearch { hits: vec![sample_hit()] }),
            store,
            EngineOptions::default(),
        )
    }

    #[tokio::test]
    async fn empty_session_id_is_rejected() {
        let store = Arc::new(MemorySessionStore::new());
        let engine = engine(ScriptedLlm::new(&[]), store);

        let error = engine.run_turn("  ", "tìm căn 2 phòng ngủ").await.unwrap_err();
        assert!(matches!(error, EngineError::MissingSession));
    }

    #[tokio::test]
    async fn search_turn_persists_merged_slots_and_state() {
        let llm = ScriptedLlm::new(&[r#"{
            "intent": "search_apartment",
            "confidence": 0.92,
            "slots": {"du_an": "Q7 Riverside", "so_phong_ngu": 2}
        }"#]);
        let store = Arc::new(MemorySessionStore::new());
        let engine = engine(llm, store.clone());

        let reply = engine.run_turn("phien-1", "tìm căn 2PN ở Q7 Riverside").await.unwrap();

        assert_eq!(reply.action_key, "dialog.search_listings");
        assert_eq!(reply.listings.len(), 1);

        let state = store.load("phien-1").await.unwrap();
        assert_eq!(state.dialog_state, DialogState::Presenting);
        assert!(state.slots.contains(SlotKey::DuAn));
        assert_eq!(state.last_action.as_deref(), Some("dialog.search_listings"));
        assert!(state.episodic_summary.is_some());
    }

    #[tokio::test]
    async fn low_confidence_turn_asks_for_a_rephrase() {
        let llm = ScriptedLlm::new(&[r#"{
            "intent": "search_apartment",
            "confidence": 0.3,
            "slots": {"du_an": "Sky89"}
        }"#]);
        let store = Arc::new(MemorySessionStore::new());
        let engine = engine(llm, store.clone());

        let reply = engine.run_turn("phien-1", "ờm kiểu kiểu vậy á").await.unwrap();

        assert_eq!(reply.action_key, "dialog.ask_rephrase");
        // Extracted slots still merge even when the turn is not acted on.
        let state = store.load("phien-1").await.unwrap();
        assert!(state.slots.contains(SlotKey::DuAn));
    }

    #[tokio::test]
    async fn broken_store_surfaces_a_store_error() {
        let engine = DialogEngine::new(
            ScriptedLlm::new(&[]),
            Arc::new(StaticSearch { hits: Vec::new() }),
            Arc::new(BrokenStore),
            EngineOptions::default(),
        );

        let error = engine.run_turn("phien-1", "chào em").await.unwrap_err();
        assert!(matches!(error, EngineError::Store(_)));
    }

    #[tokio::test]
    async fn asking_for_criteria_records_the_missing_slots() {
        let llm = ScriptedLlm::new(&[r#"{
            "intent": "search_apartment",
            "confidence": 0.9,
            "slots": {}
        }"#]);
        let store = Arc::new(MemorySessionStore::new());
        let engine = engine(llm, store.clone());

        let reply = engine.run_turn("phien-1", "em ơi tìm nhà giúp anh").await.unwrap();

        assert_eq!(reply.action_key, "dialog.ask_slot");
        let state = store.load("phien-1").await.unwrap();
        assert!(state.missing_slots.contains(&SlotKey::DuAn));
        assert!(state.missing_slots.contains(&SlotKey::GiaBan));
        assert_eq!(state.dialog_state, DialogState::Collecting);
    }
}
