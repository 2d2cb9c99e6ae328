use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A registered user, written by the external OAuth flow. Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// The unique identifier for the user (UUID).
    pub id: String,
    /// Display name shown to the tutor persona.
    pub display_name: String,
    /// Unique e-mail address.
    pub email: String,
    /// Unix timestamp of account creation.
    pub created_at: i64,
}

/// A thread grouping one or more question/solution pairs.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    /// The unique identifier for the conversation (UUID).
    pub id: String,
    /// Owning user, when the session was authenticated at creation time.
    pub user_id: Option<String>,
    /// Session cookie value the conversation was started under.
    pub session_id: String,
    /// Title derived from the first question.
    pub title: String,
    /// Unix timestamp of creation.
    pub created_at: i64,
}

/// How a question entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
    /// Typed (or voice-transcribed) text.
    Text,
    /// Extracted from an uploaded image via OCR.
    Image,
}

impl QuestionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionSource::Text => "text",
            QuestionSource::Image => "image",
        }
    }
}

/// A single submitted question. Always belongs to exactly one conversation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    /// The unique identifier for the question (UUID).
    pub id: String,
    /// The conversation this question belongs to.
    pub conversation_id: String,
    /// The question text (post-OCR for image submissions).
    pub text: String,
    /// `"text"` or `"image"`.
    pub source: String,
    /// Optional target answer language code (e.g. `"en"`, `"hi"`).
    pub language: Option<String>,
    /// Unix timestamp of submission.
    pub created_at: i64,
}

/// The persisted AI-generated answer to a question.
///
/// Immutable once created except for the `bookmarked` flag.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Solution {
    /// The unique identifier for the solution (UUID).
    pub id: String,
    /// The question this solution answers.
    pub question_id: String,
    /// The full answer text (markdown).
    pub content: String,
    /// Heuristic subject tag (`physics`, `chemistry`, `biology`, `mathematics`, `general`).
    pub subject: String,
    /// Short random identifier exposing the solution via a public link. Globally unique.
    pub share_url: String,
    /// Whether the user bookmarked this solution.
    pub bookmarked: bool,
    /// Unix timestamp of creation.
    pub created_at: i64,
}

/// An exam notification or criteria post, published through the API-key endpoint.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct ExamUpdate {
    /// The unique identifier for the update (UUID).
    pub id: String,
    /// `"NEET"` or `"JEE"`.
    pub exam: String,
    pub title: String,
    pub body: String,
    /// Unix timestamp of publication.
    pub posted_at: i64,
}

// --- Request payloads ---

/// Body of `POST /api/conversations`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateConversationRequest {
    /// Optional explicit title; otherwise derived from the first question.
    #[validate(length(max = 200))]
    pub title: Option<String>,
}

/// Body of `POST /api/questions/text`.
#[derive(Debug, Deserialize, Validate)]
pub struct TextQuestionRequest {
    /// Existing conversation to append to; a fresh one is created when absent.
    pub conversation_id: Option<String>,
    /// The question text.
    #[validate(length(min = 1, max = 8000))]
    pub text: String,
    /// Target answer language code.
    #[validate(length(min = 2, max = 8))]
    pub language: Option<String>,
}

/// Body of `POST /api/exam-updates`.
#[derive(Debug, Deserialize, Validate)]
pub struct ExamUpdateRequest {
    /// Must be `"NEET"` or `"JEE"`; checked in the handler.
    #[validate(length(min = 1, max = 16))]
    pub exam: String,
    #[validate(length(min = 1, max = 300))]
    pub title: String,
    #[validate(length(min = 1, max = 10000))]
    pub body: String,
}
