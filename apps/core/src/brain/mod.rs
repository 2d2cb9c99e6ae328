//! # Brain Module
//!
//! Fast, non-LLM analysis that runs before any inference call.
//!
//! ## Components
//! - `intent`: conversational vs. academic mode heuristic
//! - `subject`: NEET/JEE subject tagging for solutions and progress analytics
//! - `prompt`: role-tagged message list construction for the LLM call
//! - `similarity`: bigram-based fuzzy matching over past questions

pub mod intent;
pub mod prompt;
pub mod similarity;
pub mod subject;

pub use intent::{IntentClassifier, Mode, ModeResult};
pub use prompt::{ChatMessage, Exchange, PromptBuilder, Role};
pub use similarity::{find_matches, ScoredMatch, DEFAULT_THRESHOLD};
pub use subject::{Subject, SubjectTagger};
