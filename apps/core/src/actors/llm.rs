use crate::actors::messages::{AppError, LlmMessage};
use crate::actors::traits::LlmClient;
use crate::brain::prompt::ChatMessage;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::Client;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::info;

/// A handle to the `LlmActor`.
///
/// This struct provides a public, cloneable interface for sending messages to
/// the running LLM actor. It abstracts away the `mpsc::Sender`.
#[derive(Clone)]
pub struct LlmActorHandle {
    sender: mpsc::Sender<LlmMessage>,
}

impl LlmActorHandle {
    /// Creates a new `LlmActor` and returns a handle to it.
    ///
    /// This will spawn the `LlmActorRunner` in a new Tokio task.
    ///
    /// # Arguments
    ///
    /// * `api_url` - Base URL of the OpenAI-compatible inference service.
    /// * `api_key` - Bearer token sent with every request.
    /// * `model` - Model identifier for the `model` field of the payload.
    pub fn new(api_url: String, api_key: String, model: String) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        let actor = LlmActorRunner::new(receiver, api_url, api_key, model);
        tokio::spawn(async move { actor.run().await });
        Self { sender }
    }
}

#[async_trait]
impl LlmClient for LlmActorHandle {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        temperature: Option<f32>,
    ) -> Result<String, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = LlmMessage::ChatCompletion {
            messages,
            temperature,
            responder: send,
        };

        self.sender
            .send(msg)
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;
        timeout(HANDLE_TIMEOUT, recv)
            .await?
            .map_err(|e| AppError::Upstream(e.to_string()))?
    }
}

// --- Constants ---
const HANDLE_TIMEOUT: Duration = Duration::from_secs(150);
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);

// --- Actor Runner (Internal Logic) ---
struct LlmActorRunner {
    receiver: mpsc::Receiver<LlmMessage>,
    api_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl LlmActorRunner {
    fn new(
        receiver: mpsc::Receiver<LlmMessage>,
        api_url: String,
        api_key: String,
        model: String,
    ) -> Self {
        Self {
            receiver,
            api_url,
            api_key,
            model,
            client: Client::new(),
        }
    }

    async fn run(mut self) {
        info!("LlmActor started");

        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg).await;
        }

        info!("LlmActor stopped");
    }

    async fn handle_message(&mut self, msg: LlmMessage) {
        match msg {
            LlmMessage::ChatCompletion {
                messages,
                temperature,
                responder,
            } => {
                let result = self.chat_completion(messages, temperature).await;
                let _ = responder.send(result);
            }
        }
    }

    fn build_request(&self, payload: &serde_json::Value) -> Result<reqwest::RequestBuilder, AppError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", self.api_key);
        headers.insert(
            AUTHORIZATION,
            auth_value
                .parse()
                .map_err(|_| AppError::Config("LLM API key is not a valid header value".to_string()))?,
        );

        Ok(self
            .client
            .post(format!("{}/v1/chat/completions", self.api_url))
            .headers(headers)
            .json(payload))
    }

    async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        temperature: Option<f32>,
    ) -> Result<String, AppError> {
        info!(message_count = messages.len(), "LLM chat completion requested");

        let mut payload = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(temp) = temperature {
            payload["temperature"] = serde_json::json!(temp);
        }

        let request_future = self.build_request(&payload)?.send();

        let res = timeout(COMPLETION_TIMEOUT, request_future).await??;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Completion request failed with status {}: {}",
                status, body
            )));
        }

        let json: serde_json::Value = res
            .json()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                AppError::Upstream("completion response carried no message content".to_string())
            })?;

        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::prompt::Role;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn setup_test_actor(server_url: String) -> LlmActorHandle {
        let (sender, receiver) = mpsc::channel(32);

        let mut actor = LlmActorRunner::new(
            receiver,
            "http://unused".to_string(),
            "test-key".to_string(),
            "test-model".to_string(),
        );

        // Point the runner at the mock server instead of a live service.
        actor.api_url = server_url;

        tokio::spawn(async move {
            while let Some(msg) = actor.receiver.recv().await {
                actor.handle_message(msg).await;
            }
        });

        LlmActorHandle { sender }
    }

    fn user_message(text: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::new(Role::User, text)]
    }

    #[tokio::test]
    async fn test_chat_completion_success() {
        let mock_server = MockServer::start().await;
        let handle = setup_test_actor(mock_server.uri());

        let response = json!({
            "choices": [
                { "message": { "role": "assistant", "content": "x = 3 or x = -3" } }
            ]
        });

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({ "model": "test-model" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&mock_server)
            .await;

        let result = handle.chat(user_message("Solve x² = 9"), Some(0.4)).await;

        assert!(result.is_ok());
        assert_eq!(result.unwrap(), "x = 3 or x = -3");
    }

    #[tokio::test]
    async fn test_chat_completion_server_error() {
        let mock_server = MockServer::start().await;
        let handle = setup_test_actor(mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&mock_server)
            .await;

        let result = handle.chat(user_message("Hello"), None).await;

        assert!(result.is_err());
        if let Err(AppError::Upstream(err_msg)) = result {
            assert!(err_msg.contains("status 500"));
            assert!(err_msg.contains("Internal Server Error"));
        } else {
            panic!("Expected AppError::Upstream, got something else.");
        }
    }

    #[tokio::test]
    async fn test_chat_completion_missing_content() {
        let mock_server = MockServer::start().await;
        let handle = setup_test_actor(mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&mock_server)
            .await;

        let result = handle.chat(user_message("Hello"), None).await;
        assert!(matches!(result, Err(AppError::Upstream(_))));
    }
}
