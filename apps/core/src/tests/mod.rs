//! Test Module
//!
//! Cross-module test suite for the PrepTutor backend. Unit tests for
//! individual components live next to the code they cover; the modules here
//! exercise behavior that spans layers.
//!
//! ## Test Categories
//! - `brain_tests`: mode classification, subject tagging, prompt assembly,
//!   and fuzzy matching working together on realistic student input
//! - `database_tests`: CRUD and query behavior for conversations, questions,
//!   solutions, exam updates, and API keys
//! - `integration_tests`: full HTTP workflows against a spawned router with
//!   mocked LLM and OCR backends
