//! HTTP API surface.
//!
//! JSON REST endpoints over the turn orchestrator, the usage limiter, and the
//! persistence layer. Session identity is a `ptsid` cookie; a fresh UUID is
//! minted (and set on the response) when a request arrives without one. A
//! session counts as authenticated when the external OAuth flow has written
//! an `auth_sessions` row for it.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/api/conversations` | Create an empty conversation |
//! | `GET`  | `/api/conversations` | List the session's conversations |
//! | `POST` | `/api/questions/text` | Submit a text question (full turn) |
//! | `POST` | `/api/questions/image` | Submit an image question (OCR, 10 MB cap) |
//! | `GET`  | `/api/questions/search` | Fuzzy-match past questions |
//! | `GET`  | `/api/solutions/{share_url}` | Public solution lookup |
//! | `POST` | `/api/solutions/{share_url}/bookmark` | Toggle the bookmark flag |
//! | `GET`  | `/api/history` | Answered questions, newest first |
//! | `GET`  | `/api/progress` | Per-subject progress analytics |
//! | `GET`  | `/api/exam-updates` | List exam updates |
//! | `POST` | `/api/exam-updates` | Publish an update (`X-API-Key` required) |
//!
//! # Error Contract
//!
//! Every failure returns `{ "error": code, "message": text }`; see
//! [`crate::error::AppError`] for the code-to-status mapping.

use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::actors::traits::OcrClient;
use crate::actors::TutorHandle;
use crate::brain::similarity::{find_matches, DEFAULT_THRESHOLD};
use crate::database;
use crate::error::AppError;
use crate::models::{
    Conversation, CreateConversationRequest, ExamUpdate, ExamUpdateRequest, Question,
    QuestionSource, Solution, TextQuestionRequest, User,
};
use crate::usage_limiter::UsageLimiter;

/// Name of the session cookie.
const SESSION_COOKIE: &str = "ptsid";

/// Upload cap for image questions.
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Shared application state passed to all route handlers via Axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub tutor: TutorHandle,
    pub ocr: Arc<dyn OcrClient>,
    pub limiter: Arc<Mutex<UsageLimiter>>,
}

/// Session cookie value, injected by [`session_layer`].
#[derive(Clone)]
struct SessionId(String);

/// `Json` body extractor whose rejection keeps the `{error, message}`
/// contract instead of axum's plain-text default.
struct AppJson<T>(T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(AppJson(value))
    }
}

/// `Multipart` extractor with the same rejection mapping.
struct AppMultipart(Multipart);

impl<S> FromRequest<S> for AppMultipart
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Multipart::from_request(req, state)
            .await
            .map(AppMultipart)
            .map_err(|rejection| AppError::Validation(rejection.body_text()))
    }
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/api/conversations",
            post(handle_create_conversation).get(handle_list_conversations),
        )
        .route("/api/questions/text", post(handle_text_question))
        .route(
            "/api/questions/image",
            post(handle_image_question).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route("/api/questions/search", get(handle_search_questions))
        .route("/api/solutions/{share_url}", get(handle_shared_solution))
        .route(
            "/api/solutions/{share_url}/bookmark",
            post(handle_toggle_bookmark),
        )
        .route("/api/history", get(handle_history))
        .route("/api/progress", get(handle_progress))
        .route(
            "/api/exam-updates",
            get(handle_list_exam_updates).post(handle_create_exam_update),
        )
        .layer(middleware::from_fn(session_layer))
        .layer(cors)
        .with_state(state)
}

/// Binds and serves the router until the process is terminated.
pub async fn run_server(bind_addr: &str, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("PrepTutor API listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Session middleware ============

/// Ensures every request carries a session id: reads the `ptsid` cookie, or
/// mints a fresh UUID and sets it on the response.
async fn session_layer(mut req: Request, next: Next) -> Response {
    let existing = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(cookie_value);

    let (session_id, fresh) = match existing {
        Some(sid) => (sid, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    req.extensions_mut().insert(SessionId(session_id.clone()));
    let mut res = next.run(req).await;

    if fresh {
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, session_id);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            res.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    res
}

fn cookie_value(cookie_header: &str) -> Option<String> {
    cookie_header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// Looks up the user the OAuth flow bound to this session, if any.
async fn session_user(pool: &SqlitePool, session_id: &str) -> Result<Option<User>, AppError> {
    Ok(database::find_user_by_session(pool, session_id).await?)
}

/// Charges one minute against an unauthenticated session, rejecting once the
/// daily budget is spent. Authenticated sessions bypass the limiter entirely.
fn charge_usage(
    state: &AppState,
    session_id: &str,
    user: &Option<User>,
) -> Result<Option<u32>, AppError> {
    if user.is_some() {
        return Ok(None);
    }
    let accrued = state
        .limiter
        .lock()
        .map_err(|_| AppError::Internal("usage limiter lock poisoned".to_string()))?
        .try_accrue(session_id);
    match accrued {
        Some(minutes) => Ok(Some(minutes)),
        None => Err(AppError::UsageLimitExceeded),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Conversations ============

async fn handle_create_conversation(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    AppJson(payload): AppJson<CreateConversationRequest>,
) -> Result<(StatusCode, Json<Conversation>), AppError> {
    payload.validate()?;
    let user = session_user(&state.pool, &session_id).await?;
    let title = payload.title.as_deref().unwrap_or("New conversation");

    let conversation = database::create_conversation(
        &state.pool,
        &session_id,
        user.as_ref().map(|u| u.id.as_str()),
        title,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(conversation)))
}

async fn handle_list_conversations(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
) -> Result<Json<Vec<Conversation>>, AppError> {
    let conversations = database::list_conversations(&state.pool, &session_id).await?;
    Ok(Json(conversations))
}

// ============ Question submission ============

/// Everything the client needs after one answered turn.
#[derive(Serialize)]
struct AnswerResponse {
    conversation: Conversation,
    question: Question,
    solution: Solution,
    /// Minutes accrued in the current window; absent for authenticated users.
    minutes_used: Option<u32>,
}

async fn handle_text_question(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    AppJson(payload): AppJson<TextQuestionRequest>,
) -> Result<(StatusCode, Json<AnswerResponse>), AppError> {
    payload.validate()?;
    if payload.text.trim().is_empty() {
        return Err(AppError::Validation("question text is empty".to_string()));
    }

    let user = session_user(&state.pool, &session_id).await?;
    let minutes_used = charge_usage(&state, &session_id, &user)?;

    let outcome = state
        .tutor
        .answer_question(
            session_id,
            user.as_ref().map(|u| u.id.clone()),
            user.map(|u| u.display_name),
            payload.conversation_id,
            payload.text,
            QuestionSource::Text,
            payload.language,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AnswerResponse {
            conversation: outcome.conversation,
            question: outcome.question,
            solution: outcome.solution,
            minutes_used,
        }),
    ))
}

async fn handle_image_question(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    AppMultipart(mut multipart): AppMultipart,
) -> Result<(StatusCode, Json<AnswerResponse>), AppError> {
    let mut image: Option<(Vec<u8>, String)> = None;
    let mut conversation_id: Option<String> = None;
    let mut language: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("image") => {
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?.to_vec();
                image = Some((bytes, mime));
            }
            Some("conversation_id") => conversation_id = Some(field.text().await?),
            Some("language") => language = Some(field.text().await?),
            _ => {}
        }
    }

    let (bytes, mime) =
        image.ok_or_else(|| AppError::Validation("missing 'image' part".to_string()))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("uploaded image is empty".to_string()));
    }
    if !mime.starts_with("image/") {
        return Err(AppError::Validation(format!(
            "unsupported content type: {}",
            mime
        )));
    }

    let user = session_user(&state.pool, &session_id).await?;
    let minutes_used = charge_usage(&state, &session_id, &user)?;

    let text = state.ocr.extract_text(bytes, mime).await?;

    let outcome = state
        .tutor
        .answer_question(
            session_id,
            user.as_ref().map(|u| u.id.clone()),
            user.map(|u| u.display_name),
            conversation_id,
            text,
            QuestionSource::Image,
            language,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AnswerResponse {
            conversation: outcome.conversation,
            question: outcome.question,
            solution: outcome.solution,
            minutes_used,
        }),
    ))
}

// ============ GET /api/questions/search ============

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    threshold: Option<f64>,
}

#[derive(Serialize)]
struct QuestionMatch {
    question: Question,
    score: f64,
}

async fn handle_search_questions(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<QuestionMatch>>, AppError> {
    if params.q.trim().is_empty() {
        return Err(AppError::Validation("query must not be empty".to_string()));
    }
    let threshold = params.threshold.unwrap_or(DEFAULT_THRESHOLD);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(AppError::Validation(
            "threshold must be between 0 and 1".to_string(),
        ));
    }

    let questions = database::list_session_questions(&state.pool, &session_id).await?;
    let texts: Vec<String> = questions.iter().map(|q| q.text.clone()).collect();

    let results = find_matches(&params.q, &texts, threshold)
        .into_iter()
        .map(|m| QuestionMatch {
            question: questions[m.index].clone(),
            score: m.score,
        })
        .collect();

    Ok(Json(results))
}

// ============ Solutions ============

async fn handle_shared_solution(
    State(state): State<AppState>,
    Path(share_url): Path<String>,
) -> Result<Json<Solution>, AppError> {
    database::get_solution_by_share_url(&state.pool, &share_url)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no solution at share URL {}", share_url)))
}

async fn handle_toggle_bookmark(
    State(state): State<AppState>,
    Path(share_url): Path<String>,
) -> Result<Json<Solution>, AppError> {
    database::toggle_bookmark(&state.pool, &share_url)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no solution at share URL {}", share_url)))
}

// ============ History & progress ============

async fn handle_history(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
) -> Result<Json<Vec<database::HistoryEntry>>, AppError> {
    let entries = database::session_history(&state.pool, &session_id).await?;
    Ok(Json(entries))
}

#[derive(Serialize)]
struct ProgressResponse {
    total_solved: i64,
    bookmarked: i64,
    by_subject: Vec<database::SubjectCount>,
    /// Minutes accrued in the current free-tier window (0 for authenticated
    /// sessions, which are never charged).
    minutes_used_today: u32,
}

async fn handle_progress(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
) -> Result<Json<ProgressResponse>, AppError> {
    let by_subject = database::subject_counts(&state.pool, &session_id).await?;
    let total_solved = by_subject.iter().map(|c| c.solved).sum();
    let bookmarked = database::bookmarked_count(&state.pool, &session_id).await?;
    let minutes_used_today = state
        .limiter
        .lock()
        .map_err(|_| AppError::Internal("usage limiter lock poisoned".to_string()))?
        .minutes_used(&session_id);

    Ok(Json(ProgressResponse {
        total_solved,
        bookmarked,
        by_subject,
        minutes_used_today,
    }))
}

// ============ Exam updates ============

#[derive(Deserialize)]
struct ExamUpdateParams {
    exam: Option<String>,
}

async fn handle_list_exam_updates(
    State(state): State<AppState>,
    Query(params): Query<ExamUpdateParams>,
) -> Result<Json<Vec<ExamUpdate>>, AppError> {
    let exam = params.exam.map(|e| e.to_uppercase());
    let updates = database::list_exam_updates(&state.pool, exam.as_deref()).await?;
    Ok(Json(updates))
}

async fn handle_create_exam_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(payload): AppJson<ExamUpdateRequest>,
) -> Result<(StatusCode, Json<ExamUpdate>), AppError> {
    let key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidApiKey)?;
    if !database::api_key_exists(&state.pool, key).await? {
        return Err(AppError::InvalidApiKey);
    }

    payload.validate()?;
    let exam = payload.exam.to_uppercase();
    if exam != "NEET" && exam != "JEE" {
        return Err(AppError::Validation(
            "exam must be NEET or JEE".to_string(),
        ));
    }

    let update =
        database::create_exam_update(&state.pool, &exam, &payload.title, &payload.body).await?;
    Ok((StatusCode::CREATED, Json(update)))
}
