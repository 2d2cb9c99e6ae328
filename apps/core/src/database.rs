//! SQLite persistence layer.
//!
//! Schema is created on startup with `CREATE TABLE IF NOT EXISTS` statements.
//! All timestamps are Unix seconds (UTC).

use crate::error::AppError;
use crate::models::{Conversation, ExamUpdate, Question, QuestionSource, Solution, User};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

/// Length of the random share-URL token.
const SHARE_URL_LEN: usize = 10;

/// Attempts before giving up on generating a unique share URL.
const SHARE_URL_MAX_ATTEMPTS: usize = 5;

pub async fn init_db(path: Option<&str>) -> Result<SqlitePool, sqlx::Error> {
    let db_url = format!("sqlite://{}", path.unwrap_or("preptutor.sqlite"));

    info!("Initializing database at: {}", db_url);

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS auth_sessions (
            session_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id)
        );
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            user_id TEXT,
            session_id TEXT NOT NULL,
            title TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS questions (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            text TEXT NOT NULL,
            source TEXT NOT NULL,
            language TEXT,
            created_at INTEGER NOT NULL,
            FOREIGN KEY(conversation_id) REFERENCES conversations(id)
        );
        CREATE TABLE IF NOT EXISTS solutions (
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL,
            content TEXT NOT NULL,
            subject TEXT NOT NULL,
            share_url TEXT NOT NULL UNIQUE,
            bookmarked INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            FOREIGN KEY(question_id) REFERENCES questions(id)
        );
        CREATE TABLE IF NOT EXISTS exam_updates (
            id TEXT PRIMARY KEY,
            exam TEXT NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            posted_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS api_keys (
            key TEXT PRIMARY KEY,
            label TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(&pool)
    .await?;

    info!("Database initialized and migrations applied.");

    Ok(pool)
}

// --- Users & auth sessions ---

/// Returns the user bound to a session cookie, if the OAuth flow marked it as
/// authenticated.
pub async fn find_user_by_session(
    pool: &SqlitePool,
    session_id: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.display_name, u.email, u.created_at
        FROM auth_sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.session_id = ?
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
}

/// OAuth-callback seam: registers a user row.
pub async fn create_user(
    pool: &SqlitePool,
    display_name: &str,
    email: &str,
) -> Result<User, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let created_at = Utc::now().timestamp();

    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, display_name, email, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, display_name, email, created_at
        "#,
    )
    .bind(&id)
    .bind(display_name)
    .bind(email)
    .bind(created_at)
    .fetch_one(pool)
    .await
}

/// OAuth-callback seam: binds a session cookie to a user.
pub async fn create_auth_session(
    pool: &SqlitePool,
    session_id: &str,
    user_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO auth_sessions (session_id, user_id, created_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(session_id)
    .bind(user_id)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

// --- Conversations ---

pub async fn create_conversation(
    pool: &SqlitePool,
    session_id: &str,
    user_id: Option<&str>,
    title: &str,
) -> Result<Conversation, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let created_at = Utc::now().timestamp();

    sqlx::query_as::<_, Conversation>(
        r#"
        INSERT INTO conversations (id, user_id, session_id, title, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, user_id, session_id, title, created_at
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(session_id)
    .bind(title)
    .bind(created_at)
    .fetch_one(pool)
    .await
}

pub async fn get_conversation(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<Conversation>, sqlx::Error> {
    sqlx::query_as::<_, Conversation>(
        r#"
        SELECT id, user_id, session_id, title, created_at
        FROM conversations
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_conversations(
    pool: &SqlitePool,
    session_id: &str,
) -> Result<Vec<Conversation>, sqlx::Error> {
    sqlx::query_as::<_, Conversation>(
        r#"
        SELECT id, user_id, session_id, title, created_at
        FROM conversations
        WHERE session_id = ?
        ORDER BY created_at DESC, rowid DESC
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
}

// --- Questions ---

pub async fn create_question(
    pool: &SqlitePool,
    conversation_id: &str,
    text: &str,
    source: QuestionSource,
    language: Option<&str>,
) -> Result<Question, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let created_at = Utc::now().timestamp();

    sqlx::query_as::<_, Question>(
        r#"
        INSERT INTO questions (id, conversation_id, text, source, language, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id, conversation_id, text, source, language, created_at
        "#,
    )
    .bind(&id)
    .bind(conversation_id)
    .bind(text)
    .bind(source.as_str())
    .bind(language)
    .bind(created_at)
    .fetch_one(pool)
    .await
}

/// All questions ever asked under a session, oldest first. Feeds the fuzzy matcher.
pub async fn list_session_questions(
    pool: &SqlitePool,
    session_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(
        r#"
        SELECT q.id, q.conversation_id, q.text, q.source, q.language, q.created_at
        FROM questions q
        JOIN conversations c ON c.id = q.conversation_id
        WHERE c.session_id = ?
        ORDER BY q.created_at ASC, q.rowid ASC
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
}

/// Last `limit` question/solution exchanges of a conversation, oldest first.
/// Feeds the prompt builder's history window. Timestamps have second
/// granularity, so `rowid` breaks ties in insertion order.
pub async fn recent_exchanges(
    pool: &SqlitePool,
    conversation_id: &str,
    limit: i64,
) -> Result<Vec<HistoryEntry>, sqlx::Error> {
    let mut rows = sqlx::query_as::<_, HistoryEntry>(
        r#"
        SELECT q.id AS question_id, q.conversation_id, q.text AS question_text,
               q.source, s.subject, s.content, s.share_url, s.bookmarked,
               s.created_at
        FROM questions q
        JOIN solutions s ON s.question_id = q.id
        WHERE q.conversation_id = ?
        ORDER BY q.created_at DESC, q.rowid DESC
        LIMIT ?
        "#,
    )
    .bind(conversation_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.reverse();
    Ok(rows)
}

// --- Solutions ---

async fn insert_solution(
    pool: &SqlitePool,
    question_id: &str,
    content: &str,
    subject: &str,
    share_url: &str,
) -> Result<Solution, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let created_at = Utc::now().timestamp();

    sqlx::query_as::<_, Solution>(
        r#"
        INSERT INTO solutions (id, question_id, content, subject, share_url, bookmarked, created_at)
        VALUES (?, ?, ?, ?, ?, 0, ?)
        RETURNING id, question_id, content, subject, share_url, bookmarked, created_at
        "#,
    )
    .bind(&id)
    .bind(question_id)
    .bind(content)
    .bind(subject)
    .bind(share_url)
    .bind(created_at)
    .fetch_one(pool)
    .await
}

/// Random alphanumeric share token.
pub fn generate_share_url() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHARE_URL_LEN)
        .map(char::from)
        .collect()
}

/// Persists a solution under a freshly generated share URL, retrying on the
/// (astronomically unlikely) collision with an existing token. Uniqueness is
/// ultimately enforced by the `UNIQUE` constraint on `share_url`.
pub async fn create_solution(
    pool: &SqlitePool,
    question_id: &str,
    content: &str,
    subject: &str,
) -> Result<Solution, AppError> {
    for _ in 0..SHARE_URL_MAX_ATTEMPTS {
        let share_url = generate_share_url();
        match insert_solution(pool, question_id, content, subject, &share_url).await {
            Ok(solution) => return Ok(solution),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(AppError::Internal(
        "could not allocate a unique share URL".to_string(),
    ))
}

pub async fn get_solution(pool: &SqlitePool, id: &str) -> Result<Option<Solution>, sqlx::Error> {
    sqlx::query_as::<_, Solution>(
        r#"
        SELECT id, question_id, content, subject, share_url, bookmarked, created_at
        FROM solutions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn get_solution_by_share_url(
    pool: &SqlitePool,
    share_url: &str,
) -> Result<Option<Solution>, sqlx::Error> {
    sqlx::query_as::<_, Solution>(
        r#"
        SELECT id, question_id, content, subject, share_url, bookmarked, created_at
        FROM solutions
        WHERE share_url = ?
        "#,
    )
    .bind(share_url)
    .fetch_optional(pool)
    .await
}

/// Flips the bookmark flag, the only mutation a solution permits. Keyed by
/// share URL, the only solution identifier the API exposes.
pub async fn toggle_bookmark(
    pool: &SqlitePool,
    share_url: &str,
) -> Result<Option<Solution>, sqlx::Error> {
    sqlx::query_as::<_, Solution>(
        r#"
        UPDATE solutions
        SET bookmarked = NOT bookmarked
        WHERE share_url = ?
        RETURNING id, question_id, content, subject, share_url, bookmarked, created_at
        "#,
    )
    .bind(share_url)
    .fetch_optional(pool)
    .await
}

// --- History & progress ---

/// One answered question, flattened for the history and prompt-history queries.
#[derive(Debug, Serialize, FromRow)]
pub struct HistoryEntry {
    pub question_id: String,
    pub conversation_id: String,
    pub question_text: String,
    pub source: String,
    pub subject: String,
    pub content: String,
    pub share_url: String,
    pub bookmarked: bool,
    pub created_at: i64,
}

pub async fn session_history(
    pool: &SqlitePool,
    session_id: &str,
) -> Result<Vec<HistoryEntry>, sqlx::Error> {
    sqlx::query_as::<_, HistoryEntry>(
        r#"
        SELECT q.id AS question_id, q.conversation_id, q.text AS question_text,
               q.source, s.subject, s.content, s.share_url, s.bookmarked,
               s.created_at
        FROM questions q
        JOIN solutions s ON s.question_id = q.id
        JOIN conversations c ON c.id = q.conversation_id
        WHERE c.session_id = ?
        ORDER BY s.created_at DESC, s.rowid DESC
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
}

/// Solved-question count for one subject tag.
#[derive(Debug, Serialize, FromRow)]
pub struct SubjectCount {
    pub subject: String,
    pub solved: i64,
}

pub async fn subject_counts(
    pool: &SqlitePool,
    session_id: &str,
) -> Result<Vec<SubjectCount>, sqlx::Error> {
    sqlx::query_as::<_, SubjectCount>(
        r#"
        SELECT s.subject, COUNT(*) AS solved
        FROM solutions s
        JOIN questions q ON q.id = s.question_id
        JOIN conversations c ON c.id = q.conversation_id
        WHERE c.session_id = ?
        GROUP BY s.subject
        ORDER BY solved DESC, s.subject ASC
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
}

pub async fn bookmarked_count(pool: &SqlitePool, session_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM solutions s
        JOIN questions q ON q.id = s.question_id
        JOIN conversations c ON c.id = q.conversation_id
        WHERE c.session_id = ? AND s.bookmarked = 1
        "#,
    )
    .bind(session_id)
    .fetch_one(pool)
    .await
}

// --- Exam updates & API keys ---

pub async fn list_exam_updates(
    pool: &SqlitePool,
    exam: Option<&str>,
) -> Result<Vec<ExamUpdate>, sqlx::Error> {
    match exam {
        Some(exam) => {
            sqlx::query_as::<_, ExamUpdate>(
                r#"
                SELECT id, exam, title, body, posted_at
                FROM exam_updates
                WHERE exam = ?
                ORDER BY posted_at DESC, rowid DESC
                "#,
            )
            .bind(exam)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, ExamUpdate>(
                r#"
                SELECT id, exam, title, body, posted_at
                FROM exam_updates
                ORDER BY posted_at DESC, rowid DESC
                "#,
            )
            .fetch_all(pool)
            .await
        }
    }
}

pub async fn create_exam_update(
    pool: &SqlitePool,
    exam: &str,
    title: &str,
    body: &str,
) -> Result<ExamUpdate, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let posted_at = Utc::now().timestamp();

    sqlx::query_as::<_, ExamUpdate>(
        r#"
        INSERT INTO exam_updates (id, exam, title, body, posted_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, exam, title, body, posted_at
        "#,
    )
    .bind(&id)
    .bind(exam)
    .bind(title)
    .bind(body)
    .bind(posted_at)
    .fetch_one(pool)
    .await
}

pub async fn api_key_exists(pool: &SqlitePool, key: &str) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM api_keys WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn create_api_key(
    pool: &SqlitePool,
    key: &str,
    label: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO api_keys (key, label, created_at) VALUES (?, ?, ?)")
        .bind(key)
        .bind(label)
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await?;
    Ok(())
}
