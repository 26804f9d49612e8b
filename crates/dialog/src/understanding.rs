//! NLU stage: asks the language model for `{intent, confidence, slots}`,
//! treats the reply as untrusted input, normalizes whatever survives, and
//! merges it into the carried conversation state.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use canho_core::{ConversationState, Normalizer, SlotKey, SlotMap, SlotValue};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::llm::LlmClient;

/// Coarse goal classification of one utterance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    SearchApartment,
    ShowDetails,
    BookAppointment,
    GeneralChat,
    Other(String),
}

impl Intent {
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "search_apartment" => Self::SearchApartment,
            "show_details" => Self::ShowDetails,
            "book_appointment" => Self::BookAppointment,
            "general_chat" => Self::GeneralChat,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::SearchApartment => "search_apartment",
            Self::ShowDetails => "show_details",
            Self::BookAppointment => "book_appointment",
            Self::GeneralChat => "general_chat",
            Self::Other(label) => label,
        }
    }
}

/// What one turn of Understanding produced. `slots` holds only this turn's
/// extraction (already normalized); the merged view lives on the state.
#[derive(Clone, Debug, PartialEq)]
pub struct NluResult {
    pub intent: Intent,
    pub confidence: f64,
    pub slots: SlotMap,
}

impl NluResult {
    /// Degraded result used whenever the model call or its reply cannot be
    /// used: lowest confidence, nothing extracted. The turn still completes.
    pub fn fallback() -> Self {
        Self { intent: Intent::SearchApartment, confidence: 0.0, slots: SlotMap::new() }
    }
}

pub struct Understanding {
    llm: Arc<dyn LlmClient>,
    normalizer: Normalizer,
}

impl Understanding {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm, normalizer: Normalizer::new() }
    }

    /// Run NLU for one utterance and merge the extraction into `state`.
    ///
    /// Any failure (transport, non-JSON reply) degrades to the fallback
    /// result and leaves `state` untouched; this stage never aborts a turn.
    pub async fn process(&self, message: &str, state: &mut ConversationState) -> NluResult {
        let result = match self.extract(message).await {
            Ok(result) => result,
            Err(error) => {
                warn!(error = %error, "nlu extraction degraded to fallback");
                return NluResult::fallback();
            }
        };

        state.slots.merge(&result.slots);
        state.last_intent = Some(result.intent.label().to_string());
        state.last_intent_confidence = result.confidence;

        debug!(
            intent = result.intent.label(),
            confidence = result.confidence,
            extracted = result.slots.0.len(),
            "nlu extraction merged"
        );
        result
    }

    async fn extract(&self, message: &str) -> Result<NluResult> {
        let prompt = build_prompt(message);
        let reply = self.llm.complete(&prompt).await.context("llm completion failed")?;
        let raw = parse_reply(&reply)?;

        let intent =
            raw.intent.as_deref().map(Intent::from_label).unwrap_or(Intent::SearchApartment);
        let confidence = raw.confidence.unwrap_or(0.0).clamp(0.0, 1.0);
        let slots = self.normalize_extracted(raw.slots.unwrap_or_default());

        Ok(NluResult { intent, confidence, slots })
    }

    /// Convert the model's untyped slot map into typed values, dropping every
    /// key the engine does not recognize.
    fn normalize_extracted(&self, raw_slots: Map<String, Value>) -> SlotMap {
        let mut slots = SlotMap::new();
        for (name, value) in raw_slots {
            let Ok(key) = SlotKey::from_str(&name) else {
                debug!(slot = %name, "dropping unrecognized slot key");
                continue;
            };
            if let Some(slot_value) = self.convert_value(key, value) {
                slots.insert(key, slot_value);
            }
        }
        slots
    }

    fn convert_value(&self, key: SlotKey, value: Value) -> Option<SlotValue> {
        match value {
            Value::Null => None,
            Value::String(text) if is_clear_sentinel(&text) => Some(SlotValue::Clear),
            Value::String(text) => Some(self.normalize_text_value(key, text)),
            Value::Number(number) => {
                let number = number.as_f64()?;
                if expects_number(key) {
                    Some(SlotValue::Number(number))
                } else {
                    // Phone digits, unit codes and the like sometimes come
                    // back as bare numbers; keep them as text.
                    Some(SlotValue::Text(render_number(number)))
                }
            }
            Value::Object(bounds) => {
                let min = self.bound_value(key, bounds.get("min"));
                let max = self.bound_value(key, bounds.get("max"));
                if min.is_none() && max.is_none() {
                    None
                } else {
                    Some(SlotValue::range(min, max))
                }
            }
            other => {
                debug!(slot = %key, value = %other, "dropping slot value of unsupported shape");
                None
            }
        }
    }

    fn normalize_text_value(&self, key: SlotKey, text: String) -> SlotValue {
        match key {
            SlotKey::DuAn => match self.normalizer.project(&text) {
                Some(canonical) => SlotValue::Text(canonical.to_string()),
                None => SlotValue::Text(text),
            },
            SlotKey::Huong => match self.normalizer.direction(&text) {
                Some(canonical) => SlotValue::Text(canonical.to_string()),
                None => SlotValue::Text(text),
            },
            SlotKey::NoiThat => match self.normalizer.furniture(&text) {
                Some(canonical) => SlotValue::Text(canonical.to_string()),
                None => SlotValue::Text(text),
            },
            SlotKey::GiaBan => match self.normalizer.price(&text) {
                Some(vnd) => SlotValue::Number(vnd as f64),
                None => SlotValue::Text(text),
            },
            SlotKey::DienTich => match self.normalizer.area(&text) {
                Some(square_meters) => SlotValue::Number(square_meters),
                None => SlotValue::Text(text),
            },
            SlotKey::SoPhongNgu | SlotKey::SoPhongWc | SlotKey::Tang => {
                match text.trim().parse::<f64>() {
                    Ok(number) => SlotValue::Number(number),
                    Err(_) => SlotValue::Text(text),
                }
            }
            _ => SlotValue::Text(text),
        }
    }

    fn bound_value(&self, key: SlotKey, bound: Option<&Value>) -> Option<f64> {
        match bound? {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => match key {
                SlotKey::GiaBan => self.normalizer.price(text).map(|vnd| vnd as f64),
                SlotKey::DienTich => self.normalizer.area(text),
                _ => text.trim().parse::<f64>().ok(),
            },
            _ => None,
        }
    }
}

fn expects_number(key: SlotKey) -> bool {
    matches!(
        key,
        SlotKey::Tang
            | SlotKey::GiaBan
            | SlotKey::DienTich
            | SlotKey::SoPhongNgu
            | SlotKey::SoPhongWc
    )
}

fn render_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

fn is_clear_sentinel(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("clear")
}

#[derive(Debug, Default, Deserialize)]
struct RawNlu {
    intent: Option<String>,
    confidence: Option<f64>,
    #[serde(default)]
    slots: Option<Map<String, Value>>,
}

fn parse_reply(reply: &str) -> Result<RawNlu> {
    let cleaned = strip_code_fences(reply);
    serde_json::from_str(cleaned).with_context(|| format!("nlu reply is not valid JSON: {reply}"))
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Instruction set sent with every utterance: the full slot schema, the
/// range shape, and the CLEAR retraction convention.
fn build_prompt(message: &str) -> String {
    format!(
        r#"Bạn là chuyên gia NLU bất động sản. Phân tích câu nói của người dùng và trả về DUY NHẤT một object JSON hợp lệ theo mẫu:
{{
  "intent": "search_apartment" | "show_details" | "book_appointment" | "general_chat",
  "confidence": <số 0..1>,
  "slots": {{
    "du_an": string | null,
    "toa": string | null,
    "tang": number | null,
    "gia_ban": number | {{"min": number, "max": number}} | null,
    "dien_tich": number | {{"min": number, "max": number}} | null,
    "so_phong_ngu": number | {{"min": number, "max": number}} | null,
    "so_phong_wc": number | null,
    "huong": string | null,
    "noi_that": string | null,
    "view": string | null,
    "ma_can_ho": string | null,
    "sdt": string | null,
    "thoi_gian": string | null
  }}
}}

Quy tắc:
- Giá bán: chuyển về VNĐ (tỷ -> 000,000,000). "dưới 3 tỷ" -> {{"max": 3000000000}}. "trên 2 tỷ" -> {{"min": 2000000000}}. "tầm 2 tỷ" -> {{"min": 1900000000, "max": 2100000000}}.
- Số phòng ngủ: "2 đến 3 phòng ngủ" -> {{"min": 2, "max": 3}}. "2 phòng ngủ" -> 2.
- Nếu người dùng PHỦ NHẬN hoặc muốn BỎ một tiêu chí đã nói trước đó (VD: "không phải quận 7 nữa", "bỏ tiêu chí hướng đi"), đặt slot đó bằng chuỗi "CLEAR".
- Nếu không có thông tin cho một slot, trả về null hoặc bỏ qua slot đó.
- Không thêm bất kỳ văn bản nào ngoài object JSON.

Câu nói: "{message}""#
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use canho_core::{ConversationState, SlotKey, SlotValue};

    use super::{strip_code_fences, Intent, NluResult, Understanding};
    use crate::llm::LlmClient;

    struct FakeLlm {
        reply: Result<String, String>,
    }

    impl FakeLlm {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self { reply: Ok(reply.to_string()) })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self { reply: Err(message.to_string()) })
        }
    }

    #[async_trait]
    impl LlmClient for FakeLlm {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(message) => Err(anyhow!("{message}")),
            }
        }
    }

    #[tokio::test]
    async fn extraction_normalizes_and_merges() {
        let llm = FakeLlm::replying(
            r#"{"intent": "search_apartment", "confidence": 0.92,
                "slots": {"du_an": "q7 riverside", "so_phong_ngu": 2,
                          "gia_ban": {"min": 2000000000, "max": 3000000000},
                          "huong": "đn"}}"#,
        );
        let understanding = Understanding::new(llm);
        let mut state = ConversationState::default();

        let result = understanding.process("...", &mut state).await;

        assert_eq!(result.intent, Intent::SearchApartment);
        assert!((result.confidence - 0.92).abs() < 1e-9);
        assert_eq!(
            state.slots.get(SlotKey::DuAn),
            Some(&SlotValue::Text("Q7Riverside".to_string()))
        );
        assert_eq!(state.slots.get(SlotKey::SoPhongNgu), Some(&SlotValue::Number(2.0)));
        assert_eq!(
            state.slots.get(SlotKey::GiaBan),
            Some(&SlotValue::range(Some(2_000_000_000.0), Some(3_000_000_000.0)))
        );
        assert_eq!(state.slots.get(SlotKey::Huong), Some(&SlotValue::Text("Đông Nam".to_string())));
        assert_eq!(state.last_intent.as_deref(), Some("search_apartment"));
    }

    #[tokio::test]
    async fn code_fenced_reply_is_accepted() {
        let llm = FakeLlm::replying(
            "```json\n{\"intent\": \"show_details\", \"confidence\": 0.8, \"slots\": {\"ma_can_ho\": \"V2.31.02\"}}\n```",
        );
        let understanding = Understanding::new(llm);
        let mut state = ConversationState::default();

        let result = understanding.process("...", &mut state).await;

        assert_eq!(result.intent, Intent::ShowDetails);
        assert_eq!(
            state.slots.get(SlotKey::MaCanHo),
            Some(&SlotValue::Text("V2.31.02".to_string()))
        );
    }

    #[tokio::test]
    async fn garbage_reply_degrades_and_leaves_state_untouched() {
        let llm = FakeLlm::replying("em nghĩ là khách muốn mua nhà ạ");
        let understanding = Understanding::new(llm);
        let mut state = ConversationState::default();
        state.slots.insert(SlotKey::DuAn, SlotValue::Text("Sky89".to_string()));
        state.last_intent = Some("search_apartment".to_string());
        let before = state.clone();

        let result = understanding.process("...", &mut state).await;

        assert_eq!(result, NluResult::fallback());
        assert_eq!(state, before);
    }

    #[tokio::test]
    async fn llm_failure_degrades_and_leaves_state_untouched() {
        let llm = FakeLlm::failing("connection refused");
        let understanding = Understanding::new(llm);
        let mut state = ConversationState::default();
        state.slots.insert(SlotKey::SoPhongNgu, SlotValue::Number(2.0));
        let before = state.clone();

        let result = understanding.process("...", &mut state).await;

        assert_eq!(result, NluResult::fallback());
        assert_eq!(state, before);
    }

    #[tokio::test]
    async fn clear_sentinel_removes_carried_slot() {
        let llm = FakeLlm::replying(
            r#"{"intent": "search_apartment", "confidence": 0.9, "slots": {"du_an": "CLEAR"}}"#,
        );
        let understanding = Understanding::new(llm);
        let mut state = ConversationState::default();
        state.slots.insert(SlotKey::DuAn, SlotValue::Text("Q7Riverside".to_string()));

        understanding.process("không phải Q7 nữa", &mut state).await;

        assert!(state.slots.get(SlotKey::DuAn).is_none());
    }

    #[tokio::test]
    async fn unknown_slot_keys_and_nulls_are_dropped() {
        let llm = FakeLlm::replying(
            r#"{"intent": "search_apartment", "confidence": 0.9,
                "slots": {"mau_son": "trắng", "du_an": null, "so_phong_ngu": 2}}"#,
        );
        let understanding = Understanding::new(llm);
        let mut state = ConversationState::default();

        understanding.process("...", &mut state).await;

        assert!(state.slots.get(SlotKey::DuAn).is_none());
        assert_eq!(state.slots.get(SlotKey::SoPhongNgu), Some(&SlotValue::Number(2.0)));
        assert_eq!(state.slots.0.len(), 1);
    }

    #[tokio::test]
    async fn price_text_value_is_normalized_to_vnd() {
        let llm = FakeLlm::replying(
            r#"{"intent": "search_apartment", "confidence": 0.9, "slots": {"gia_ban": "3 tỷ"}}"#,
        );
        let understanding = Understanding::new(llm);
        let mut state = ConversationState::default();

        understanding.process("...", &mut state).await;

        assert_eq!(state.slots.get(SlotKey::GiaBan), Some(&SlotValue::Number(3_000_000_000.0)));
    }

    #[tokio::test]
    async fn bare_number_for_a_textual_slot_is_kept_as_text() {
        let llm = FakeLlm::replying(
            r#"{"intent": "book_appointment", "confidence": 0.9,
                "slots": {"sdt": 901234567, "tang": 12}}"#,
        );
        let understanding = Understanding::new(llm);
        let mut state = ConversationState::default();

        understanding.process("...", &mut state).await;

        assert_eq!(state.slots.get(SlotKey::Sdt), Some(&SlotValue::Text("901234567".to_string())));
        assert_eq!(state.slots.get(SlotKey::Tang), Some(&SlotValue::Number(12.0)));
    }

    #[test]
    fn fence_stripping_variants() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }
}
