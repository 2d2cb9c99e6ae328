use crate::actors::messages::{AnswerOutcome, AppError, TutorMessage};
use crate::actors::traits::LlmClient;
use crate::brain::intent::IntentClassifier;
use crate::brain::prompt::{Exchange, PromptBuilder};
use crate::brain::subject::SubjectTagger;
use crate::database;
use crate::models::QuestionSource;
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{error, info, instrument};

/// Number of words of the first question used as a conversation title.
const TITLE_WORDS: usize = 8;

/// A handle to the `TutorActor`.
///
/// This is the primary entry point for the question-answer turn. It runs the
/// whole orchestration: persist the question, classify it, build the prompt,
/// call the LLM, and persist the share-able solution.
#[derive(Clone)]
pub struct TutorHandle {
    sender: mpsc::Sender<TutorMessage>,
}

impl TutorHandle {
    /// Creates a new `TutorActor` over the production LLM client and returns
    /// a handle to it.
    pub fn new<L: LlmClient>(pool: SqlitePool, llm: Arc<L>, temperature: f32) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        let actor = TutorRunner::new(receiver, pool, llm, temperature);
        tokio::spawn(async move { actor.run().await });
        Self { sender }
    }

    /// Runs a full question-answer turn and returns everything it persisted.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, text))]
    pub async fn answer_question(
        &self,
        session_id: String,
        user_id: Option<String>,
        student_name: Option<String>,
        conversation_id: Option<String>,
        text: String,
        source: QuestionSource,
        language: Option<String>,
    ) -> Result<AnswerOutcome, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = TutorMessage::AnswerQuestion {
            session_id,
            user_id,
            student_name,
            conversation_id,
            text,
            source,
            language,
            responder: send,
        };
        self.sender
            .send(msg)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        timeout(TURN_TIMEOUT, recv)
            .await?
            .map_err(|e| AppError::Internal(e.to_string()))?
    }
}

const TURN_TIMEOUT: Duration = Duration::from_secs(180);

// --- Actor Runner ---
struct TutorRunner<L>
where
    L: LlmClient,
{
    receiver: mpsc::Receiver<TutorMessage>,
    pool: SqlitePool,
    llm: Arc<L>,
    classifier: IntentClassifier,
    tagger: SubjectTagger,
    temperature: f32,
}

impl<L> TutorRunner<L>
where
    L: LlmClient,
{
    fn new(
        receiver: mpsc::Receiver<TutorMessage>,
        pool: SqlitePool,
        llm: Arc<L>,
        temperature: f32,
    ) -> Self {
        Self {
            receiver,
            pool,
            llm,
            classifier: IntentClassifier::new(),
            tagger: SubjectTagger::new(),
            temperature,
        }
    }

    async fn run(mut self) {
        info!("TutorActor started");
        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg).await;
        }
        info!("TutorActor stopped");
    }

    async fn handle_message(&mut self, msg: TutorMessage) {
        match msg {
            TutorMessage::AnswerQuestion {
                session_id,
                user_id,
                student_name,
                conversation_id,
                text,
                source,
                language,
                responder,
            } => {
                let result = self
                    .answer(
                        &session_id,
                        user_id,
                        student_name,
                        conversation_id,
                        &text,
                        source,
                        language,
                    )
                    .await;
                if let Err(e) = &result {
                    error!("Error answering question: {:?}", e);
                }
                let _ = responder.send(result);
            }
        }
    }

    /// The full turn, awaited sequentially with no retries: failures at any
    /// step surface to the route handler as-is.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, text, user_id, student_name))]
    async fn answer(
        &self,
        session_id: &str,
        user_id: Option<String>,
        student_name: Option<String>,
        conversation_id: Option<String>,
        text: &str,
        source: QuestionSource,
        language: Option<String>,
    ) -> Result<AnswerOutcome, AppError> {
        // --- Conversation ---
        let conversation = match conversation_id {
            Some(id) => {
                let conversation = database::get_conversation(&self.pool, &id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("conversation {} not found", id)))?;
                // Another session's conversation is indistinguishable from a
                // missing one; existence is not leaked.
                if conversation.session_id != session_id {
                    return Err(AppError::NotFound(format!("conversation {} not found", id)));
                }
                conversation
            }
            None => {
                database::create_conversation(
                    &self.pool,
                    session_id,
                    user_id.as_deref(),
                    &derive_title(text),
                )
                .await?
            }
        };

        // --- Question ---
        let question = database::create_question(
            &self.pool,
            &conversation.id,
            text,
            source,
            language.as_deref(),
        )
        .await?;

        // --- Analysis ---
        let mode_result = self.classifier.classify(text);
        let subject = self.tagger.tag(text);
        info!(mode = %mode_result.mode, subject = %subject, "question classified");

        // --- Prompt ---
        // The current question has no solution row yet, so it cannot appear
        // in the exchange join.
        let history = database::recent_exchanges(
            &self.pool,
            &conversation.id,
            crate::brain::prompt::HISTORY_EXCHANGES as i64,
        )
        .await?;
        let exchanges: Vec<Exchange> = history
            .into_iter()
            .map(|entry| Exchange {
                user: entry.question_text,
                assistant: entry.content,
            })
            .collect();

        let messages = PromptBuilder::new(mode_result.mode)
            .language(language)
            .student_name(student_name)
            .history(exchanges)
            .build(text);

        // --- Generation ---
        let content = self.llm.chat(messages, Some(self.temperature)).await?;

        // --- Solution ---
        let solution =
            database::create_solution(&self.pool, &question.id, &content, subject.label()).await?;

        Ok(AnswerOutcome {
            conversation,
            question,
            solution,
        })
    }
}

/// First words of the question, used to title a fresh conversation.
fn derive_title(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().take(TITLE_WORDS).collect();
    if words.is_empty() {
        return "New conversation".to_string();
    }
    let mut title = words.join(" ");
    if text.split_whitespace().count() > TITLE_WORDS {
        title.push('…');
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::traits::LlmClient;
    use crate::database::init_db;
    use async_trait::async_trait;
    use crate::brain::prompt::{ChatMessage, Role};
    use std::sync::Mutex;

    // --- Mock LLM ---

    struct MockLlm {
        response: Result<String, AppError>,
        seen_messages: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl MockLlm {
        fn new(response: Result<String, AppError>) -> Self {
            Self {
                response,
                seen_messages: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for MockLlm {
        async fn chat(
            &self,
            messages: Vec<ChatMessage>,
            _temperature: Option<f32>,
        ) -> Result<String, AppError> {
            self.seen_messages.lock().unwrap().push(messages);
            match &self.response {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(AppError::Upstream(e.to_string())),
            }
        }
    }

    // A file-backed pool: one `:memory:` database per pool connection would
    // not share tables.
    async fn setup(
        response: Result<String, AppError>,
    ) -> (tempfile::TempDir, TutorHandle, SqlitePool, Arc<MockLlm>) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.sqlite");
        let pool = init_db(db_path.to_str()).await.unwrap();
        let llm = Arc::new(MockLlm::new(response));
        let handle = TutorHandle::new(pool.clone(), llm.clone(), 0.4);
        (dir, handle, pool, llm)
    }

    #[tokio::test]
    async fn test_turn_creates_conversation_question_and_solution() {
        let (_dir, handle, pool, _llm) = setup(Ok("Concept: … Steps: … Final answer: 125/3".into())).await;

        let outcome = handle
            .answer_question(
                "session-1".to_string(),
                None,
                None,
                None,
                "Solve: ∫ x²dx from 0 to 5".to_string(),
                QuestionSource::Text,
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome.question.conversation_id, outcome.conversation.id);
        assert_eq!(outcome.solution.question_id, outcome.question.id);
        assert_eq!(outcome.solution.subject, "mathematics");
        assert_eq!(outcome.solution.share_url.len(), 10);
        assert!(!outcome.solution.bookmarked);

        // The conversation is titled from the question.
        assert!(outcome.conversation.title.starts_with("Solve:"));

        // Everything landed in the database.
        let history = database::session_history(&pool, "session-1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].subject, "mathematics");
    }

    #[tokio::test]
    async fn test_turn_appends_to_existing_conversation_with_history() {
        let (_dir, handle, _pool, llm) = setup(Ok("answer".into())).await;

        let first = handle
            .answer_question(
                "session-2".to_string(),
                None,
                None,
                None,
                "Explain Newton's first law".to_string(),
                QuestionSource::Text,
                None,
            )
            .await
            .unwrap();

        let second = handle
            .answer_question(
                "session-2".to_string(),
                None,
                None,
                Some(first.conversation.id.clone()),
                "And the second law?".to_string(),
                QuestionSource::Text,
                None,
            )
            .await
            .unwrap();

        assert_eq!(second.conversation.id, first.conversation.id);

        // The second prompt carried the first exchange as history.
        let seen = llm.seen_messages.lock().unwrap();
        let second_prompt = &seen[1];
        assert_eq!(second_prompt[0].role, Role::System);
        assert!(second_prompt
            .iter()
            .any(|m| m.role == Role::Assistant && m.content == "answer"));
        assert_eq!(
            second_prompt.last().unwrap().content,
            "And the second law?"
        );
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_not_found() {
        let (_dir, handle, _pool, _llm) = setup(Ok("answer".into())).await;

        let result = handle
            .answer_question(
                "session-3".to_string(),
                None,
                None,
                Some("no-such-conversation".to_string()),
                "Solve x".to_string(),
                QuestionSource::Text,
                None,
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_other_sessions_conversation_is_not_found() {
        let (_dir, handle, pool, _llm) = setup(Ok("answer".into())).await;

        let owner = database::create_conversation(&pool, "session-owner", None, "Private")
            .await
            .unwrap();

        let result = handle
            .answer_question(
                "session-intruder".to_string(),
                None,
                None,
                Some(owner.id.clone()),
                "What did they ask?".to_string(),
                QuestionSource::Text,
                None,
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));

        // Nothing was appended to the other session's conversation.
        let questions = database::list_session_questions(&pool, "session-owner")
            .await
            .unwrap();
        assert!(questions.is_empty());
    }

    #[tokio::test]
    async fn test_llm_error_propagates_and_persists_no_solution() {
        let (_dir, handle, pool, _llm) =
            setup(Err(AppError::Upstream("LLM simulation error".into()))).await;

        let result = handle
            .answer_question(
                "session-4".to_string(),
                None,
                None,
                None,
                "Solve x² = 4".to_string(),
                QuestionSource::Text,
                None,
            )
            .await;

        assert!(matches!(result, Err(AppError::Upstream(_))));

        // The question row exists, but no solution was written.
        let history = database::session_history(&pool, "session-4").await.unwrap();
        assert!(history.is_empty());
        let questions = database::list_session_questions(&pool, "session-4")
            .await
            .unwrap();
        assert_eq!(questions.len(), 1);
    }

    #[test]
    fn test_derive_title_truncates() {
        assert_eq!(derive_title("Solve x"), "Solve x");
        let long = "one two three four five six seven eight nine ten";
        let title = derive_title(long);
        assert!(title.starts_with("one two three four five six seven eight"));
        assert!(title.ends_with('…'));
        assert_eq!(derive_title("   "), "New conversation");
    }
}
