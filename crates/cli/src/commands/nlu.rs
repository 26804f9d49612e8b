//! One-shot NLU debugging: run a single message through the Understanding
//! stage and print what was extracted, without touching any session.

use std::sync::Arc;

use canho_core::config::AppConfig;
use canho_core::ConversationState;
use canho_dialog::Understanding;
use serde::Serialize;
use serde_json::json;

use super::CommandResult;
use crate::adapters::HttpLlmClient;

#[derive(Debug, Serialize)]
struct NluReport {
    intent: String,
    confidence: f64,
    slots: serde_json::Value,
}

pub async fn run(config: &AppConfig, message: &str) -> CommandResult {
    let llm = match HttpLlmClient::from_config(&config.llm) {
        Ok(llm) => Arc::new(llm),
        Err(error) => return CommandResult::failure(format!("nlu setup failed: {error:#}")),
    };

    let understanding = Understanding::new(llm);
    let mut state = ConversationState::default();
    let result = understanding.process(message, &mut state).await;

    let report = NluReport {
        intent: result.intent.label().to_string(),
        confidence: result.confidence,
        slots: serde_json::to_value(&result.slots).unwrap_or_else(|_| json!({})),
    };

    match serde_json::to_string_pretty(&report) {
        Ok(output) => CommandResult::success(output),
        Err(error) => CommandResult::failure(format!("could not serialize nlu report: {error}")),
    }
}
