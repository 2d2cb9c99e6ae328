//! Message-passing actors wrapping the external services and the
//! question-answer turn orchestration.

pub mod llm;
pub mod messages;
pub mod ocr;
pub mod traits;
pub mod tutor;

pub use llm::LlmActorHandle;
pub use ocr::OcrActorHandle;
pub use tutor::TutorHandle;
