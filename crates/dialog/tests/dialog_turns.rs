//! End-to-end turn sequences over the full engine, with a scripted LLM and
//! an in-memory listing index standing in for the real collaborators.

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use canho_core::{DialogState, ListingFilter, ListingHit, SlotKey};
use canho_dialog::{
    DialogEngine, EngineOptions, ListingSearch, LlmClient, MemorySessionStore, SessionStore,
};
use serde_json::json;
use tokio::sync::Mutex;

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
            None => bail!("scripted conversation exhausted"),
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

fn listings() -> Vec<ListingHit> {
    vec![
        ListingHit {
            score: 0.95,
            fields: json!({
                "ma_can_ho": "V2.31.02",
                "du_an": "Vinhomes Grand Park",
                "so_phong_ngu": 2,
                "dien_tich": 69.0,
                "gia_ban": 2_500_000_000.0_f64,
                "huong": "Đông Nam",
            })
            .as_object()
            .unwrap()
            .clone(),
        },
        ListingHit {
            score: 0.82,
            fields: json!({
                "ma_can_ho": "S1.05.11",
                "du_an": "Q7Riverside",
                "so_phong_ngu": 2,
                "dien_tich": 66.0,
                "gia_ban": 2_300_000_000.0_f64,
            })
            .as_object()
            .unwrap()
            .clone(),
        },
    ]
}

fn build_engine(llm: Arc<ScriptedLlm>, store: Arc<MemorySessionStore>) -> DialogEngine {
    DialogEngine::new(
        llm,
        Arc::new(StaticSearch { hits: listings() }),
        store,
        EngineOptions::default(),
    )
}

#[tokio::test]
async fn search_then_retract_a_criterion() {
    let llm = ScriptedLlm::new(&[
        r#"{"intent": "search_apartment", "confidence": 0.93,
            "slots": {"du_an": "q7 riverside", "so_phong_ngu": 2}}"#,
        r#"{"intent": "search_apartment", "confidence": 0.9,
            "slots": {"du_an": "CLEAR"}}"#,
    ]);
    let store = Arc::new(MemorySessionStore::new());
    let engine = build_engine(llm, store.clone());

    let first = engine
        .run_turn("phien-tim-kiem", "tìm căn 2PN ở Q7 Riverside")
        .await
        .unwrap();
    assert_eq!(first.action_key, "dialog.search_listings");
    assert_eq!(first.listings.len(), 2);

    let second = engine
        .run_turn("phien-tim-kiem", "thôi, dự án nào cũng được")
        .await
        .unwrap();
    assert_eq!(second.action_key, "dialog.search_listings");

    let state = store.load("phien-tim-kiem").await.unwrap();
    assert!(!state.slots.contains(SlotKey::DuAn));
    assert!(state.slots.contains(SlotKey::SoPhongNgu));
    assert_eq!(state.dialog_state, DialogState::Presenting);
}

#[tokio::test]
async fn booking_collects_fields_across_turns() {
    let llm = ScriptedLlm::new(&[
        r#"{"intent": "book_appointment", "confidence": 0.9,
            "slots": {"ma_can_ho": "V2.31.02"}}"#,
        r#"{"intent": "book_appointment", "confidence": 0.88,
            "slots": {"sdt": "0901234567"}}"#,
        r#"{"intent": "book_appointment", "confidence": 0.91,
            "slots": {"thoi_gian": "9h sáng mai"}}"#,
    ]);
    let store = Arc::new(MemorySessionStore::new());
    let engine = build_engine(llm, store.clone());
    let session = "phien-dat-lich";

    let first = engine.run_turn(session, "đặt lịch xem căn V2.31.02").await.unwrap();
    assert_eq!(first.action_key, "dialog.ask_slot");
    assert!(first.reply.contains("số điện thoại"));

    let second = engine.run_turn(session, "số anh là 0901234567").await.unwrap();
    assert_eq!(second.action_key, "dialog.ask_slot");
    assert!(second.reply.contains("thời gian"));

    let third = engine.run_turn(session, "9h sáng mai nhé").await.unwrap();
    assert_eq!(third.action_key, "dialog.book_appointment");
    assert!(third.reply.contains("V2.31.02"));
    assert!(third.reply.contains("9h sáng mai"));

    let state = store.load(session).await.unwrap();
    assert_eq!(state.dialog_state, DialogState::Booked);
}

#[tokio::test]
async fn detail_lookup_then_low_confidence_followup() {
    let llm = ScriptedLlm::new(&[
        r#"{"intent": "show_details", "confidence": 0.9,
            "slots": {"ma_can_ho": "S1.05.11"}}"#,
        r#"{"intent": "general_chat", "confidence": 0.2, "slots": {}}"#,
    ]);
    let store = Arc::new(MemorySessionStore::new());
    let engine = build_engine(llm, store.clone());
    let session = "phien-chi-tiet";

    let first = engine.run_turn(session, "cho anh xem căn S1.05.11").await.unwrap();
    assert_eq!(first.action_key, "dialog.show_details");
    assert!(first.reply.contains("Q7Riverside"));

    let state = store.load(session).await.unwrap();
    assert_eq!(state.last_viewed_apartment.as_deref(), Some("S1.05.11"));
    assert_eq!(state.dialog_state, DialogState::Detail);

    let second = engine.run_turn(session, "ờm...").await.unwrap();
    assert_eq!(second.action_key, "dialog.ask_rephrase");

    // A bad turn never loses what the session already knows.
    let state = store.load(session).await.unwrap();
    assert_eq!(state.last_viewed_apartment.as_deref(), Some("S1.05.11"));
}

#[tokio::test]
async fn llm_outage_degrades_to_a_clarifying_reply() {
    let llm = ScriptedLlm::new(&[]);
    let store = Arc::new(MemorySessionStore::new());
    let engine = build_engine(llm, store);

    let reply = engine.run_turn("phien-loi", "tìm căn 2 phòng ngủ").await.unwrap();
    assert_eq!(reply.action_key, "dialog.ask_rephrase");
    assert!(reply.listings.is_empty());
}
