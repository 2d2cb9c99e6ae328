// PrepTutor Backend Entry Point
// Question-answer orchestration for NEET/JEE exam preparation.

mod actors;
mod brain;
mod config;
mod database;
mod error;
mod models;
mod server;
mod usage_limiter;

#[cfg(test)]
mod tests;

use actors::{LlmActorHandle, OcrActorHandle, TutorHandle};
use config::AppConfig;
use server::AppState;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;
use usage_limiter::UsageLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    info!(model = %config.llm_model, "starting preptutor-core");

    let pool = database::init_db(Some(&config.database_path)).await?;

    let llm = Arc::new(LlmActorHandle::new(
        config.llm_api_url.clone(),
        config.llm_api_key.clone(),
        config.llm_model.clone(),
    ));
    let ocr = OcrActorHandle::new(config.ocr_api_url.clone(), config.ocr_api_key.clone());
    let tutor = TutorHandle::new(pool.clone(), llm, config.llm_temperature);

    let state = AppState {
        pool,
        tutor,
        ocr: Arc::new(ocr),
        limiter: Arc::new(Mutex::new(UsageLimiter::default())),
    };

    server::run_server(&config.bind_addr, state).await
}
