use crate::actors::messages::AppError;
use crate::brain::prompt::ChatMessage;
use async_trait::async_trait;

/// Defines the public interface for the LLM (Large Language Model) client.
///
/// This trait abstracts the specific inference backend, allowing the turn
/// orchestrator to be exercised against mocks in tests.
#[async_trait]
pub trait LlmClient: Send + Sync + 'static {
    /// Runs one chat completion over an ordered, role-tagged message list and
    /// returns the answer text.
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        temperature: Option<f32>,
    ) -> Result<String, AppError>;
}

/// Defines the public interface for the OCR client.
#[async_trait]
pub trait OcrClient: Send + Sync + 'static {
    /// Extracts question text from an uploaded image.
    async fn extract_text(&self, image: Vec<u8>, mime: String) -> Result<String, AppError>;
}
