//! Startup configuration, read once from the environment.
//!
//! `.env` files are honored via `dotenv` before any variable is read.

use crate::error::AppError;
use std::env;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_DB_PATH: &str = "preptutor.sqlite";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LLM_TEMPERATURE: f32 = 0.4;

/// Owned application configuration, assembled in `main` and passed down by value.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Path of the SQLite database file.
    pub database_path: String,
    /// Base URL of the OpenAI-compatible chat-completions service.
    pub llm_api_url: String,
    /// Bearer token for the LLM service. Required.
    pub llm_api_key: String,
    /// Model identifier sent with every completion request.
    pub llm_model: String,
    /// Sampling temperature for tutoring answers.
    pub llm_temperature: f32,
    /// Base URL of the OCR text-extraction service.
    pub ocr_api_url: String,
    /// Optional bearer token for the OCR service.
    pub ocr_api_key: Option<String>,
}

impl AppConfig {
    /// Reads the configuration from environment variables.
    ///
    /// `LLM_API_URL`, `LLM_API_KEY` and `OCR_API_URL` are mandatory; everything
    /// else falls back to a sensible default.
    pub fn from_env() -> Result<Self, AppError> {
        let llm_api_url = require("LLM_API_URL")?;
        let llm_api_key = require("LLM_API_KEY")?;
        let ocr_api_url = require("OCR_API_URL")?;

        let llm_temperature = match env::var("LLM_TEMPERATURE") {
            Ok(raw) => raw.parse::<f32>().map_err(|_| {
                AppError::Config(format!("LLM_TEMPERATURE is not a number: {}", raw))
            })?,
            Err(_) => DEFAULT_LLM_TEMPERATURE,
        };

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| DEFAULT_DB_PATH.to_string()),
            llm_api_url,
            llm_api_key,
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
            llm_temperature,
            ocr_api_url,
            ocr_api_key: env::var("OCR_API_KEY").ok(),
        })
    }
}

fn require(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Config(format!("{} is not set", name)))
}
