pub mod chat;
pub mod config;
pub mod nlu;

use std::sync::Arc;

use anyhow::{Context, Result};
use canho_core::config::AppConfig;
use canho_dialog::{DialogEngine, EngineOptions, MemorySessionStore};

use crate::adapters::{DatasetListings, HttpLlmClient};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

impl CommandResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self { exit_code: 0, output: output.into() }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self { exit_code: 1, output: output.into() }
    }
}

pub(crate) fn build_engine(config: &AppConfig) -> Result<DialogEngine> {
    let llm = Arc::new(HttpLlmClient::from_config(&config.llm)?);
    let listings = Arc::new(
        DatasetListings::load(&config.listings.dataset_path)
            .context("loading listing dataset")?,
    );
    let sessions = Arc::new(MemorySessionStore::new());
    let options = EngineOptions {
        confidence_threshold: config.dialog.confidence_threshold,
        result_limit: config.listings.result_limit,
    };
    Ok(DialogEngine::new(llm, listings, sessions, options))
}
