use crate::brain::prompt::ChatMessage;
use crate::models::{Conversation, Question, QuestionSource, Solution};
use serde::Serialize;
use tokio::sync::oneshot;

// Re-export AppError for convenience
pub use crate::error::AppError;

/// Messages that can be sent to the `LlmActor`.
#[derive(Debug)]
pub enum LlmMessage {
    /// A request for one chat completion over a role-tagged message list.
    ChatCompletion {
        messages: Vec<ChatMessage>,
        temperature: Option<f32>,
        /// A channel to send the final answer text back.
        responder: oneshot::Sender<Result<String, AppError>>,
    },
}

/// Messages that can be sent to the `OcrActor`.
#[derive(Debug)]
pub enum OcrMessage {
    /// A request to extract question text from an uploaded image.
    ExtractText {
        image: Vec<u8>,
        mime: String,
        /// A channel to send the extracted text back.
        responder: oneshot::Sender<Result<String, AppError>>,
    },
}

/// Everything persisted during one answered question turn.
#[derive(Debug, Serialize)]
pub struct AnswerOutcome {
    pub conversation: Conversation,
    pub question: Question,
    pub solution: Solution,
}

/// Messages that can be sent to the `TutorActor`.
#[derive(Debug)]
pub enum TutorMessage {
    /// A request to run a full question-answer turn for a session.
    AnswerQuestion {
        session_id: String,
        /// User id when the session is authenticated; stamped on a freshly
        /// created conversation.
        user_id: Option<String>,
        /// Display name when the session is authenticated.
        student_name: Option<String>,
        /// Existing conversation to append to; a new one is created when absent.
        conversation_id: Option<String>,
        text: String,
        source: QuestionSource,
        language: Option<String>,
        /// A channel to send the persisted turn back.
        responder: oneshot::Sender<Result<AnswerOutcome, AppError>>,
    },
}
