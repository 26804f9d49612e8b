use anyhow::Result;
use async_trait::async_trait;

/// Hosted language-model collaborator. The engine only ever sends a full
/// prompt and expects a single text blob back; prompt construction and reply
/// parsing live in the Understanding stage, so any provider that can complete
/// text can sit behind this trait (including the scripted fakes the tests
/// inject).
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
