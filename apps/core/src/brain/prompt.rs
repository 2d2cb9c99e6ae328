//! Prompt construction for the chat-completions call.
//!
//! Pure: turns the classified mode, optional student context, and a short
//! history window into an ordered list of role-tagged messages. No I/O.

use crate::brain::intent::Mode;
use serde::{Deserialize, Serialize};

/// Number of past question/answer exchanges carried into the prompt.
pub const HISTORY_EXCHANGES: usize = 3;

const ACADEMIC_PERSONA: &str = "You are PrepTutor, an expert NEET/JEE tutor. \
Answer the student's question step by step. Structure every answer as: \
Concept (the principle involved), Steps (the worked solution), and \
Final answer. Use exam-appropriate notation and keep derivations explicit.";

const CONVERSATIONAL_PERSONA: &str = "You are PrepTutor, a friendly study \
buddy for NEET/JEE aspirants. Chat naturally, keep replies short and warm, \
and gently steer the student back to their preparation when it fits.";

/// A chat-completions message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message in the order sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One past question/answer pair from the conversation.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

/// Builds the message list for one tutoring turn.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    mode: Mode,
    language: Option<String>,
    student_name: Option<String>,
    history: Vec<Exchange>,
}

impl PromptBuilder {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            language: None,
            student_name: None,
            history: Vec::new(),
        }
    }

    /// Target answer language code (e.g. `"hi"`); English when unset.
    pub fn language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    /// Display name of the signed-in student, woven into the persona.
    pub fn student_name(mut self, name: Option<String>) -> Self {
        self.student_name = name;
        self
    }

    /// Conversation history, oldest first. Only the last
    /// [`HISTORY_EXCHANGES`] exchanges are kept.
    pub fn history(mut self, history: Vec<Exchange>) -> Self {
        self.history = history;
        self
    }

    /// Produces the ordered message list: system persona, trimmed history,
    /// then the current question.
    pub fn build(self, question: &str) -> Vec<ChatMessage> {
        let mut system = match self.mode {
            Mode::Academic => ACADEMIC_PERSONA.to_string(),
            Mode::Conversational => CONVERSATIONAL_PERSONA.to_string(),
        };
        if let Some(name) = &self.student_name {
            system.push_str(&format!(" The student's name is {}.", name));
        }
        if let Some(lang) = &self.language {
            system.push_str(&format!(" Answer in the language with code '{}'.", lang));
        }

        let mut messages = vec![ChatMessage::new(Role::System, system)];

        let skip = self.history.len().saturating_sub(HISTORY_EXCHANGES);
        for exchange in self.history.into_iter().skip(skip) {
            messages.push(ChatMessage::new(Role::User, exchange.user));
            messages.push(ChatMessage::new(Role::Assistant, exchange.assistant));
        }

        messages.push(ChatMessage::new(Role::User, question));
        messages
    }
}
