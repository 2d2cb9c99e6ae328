use crate::actors::messages::{AppError, OcrMessage};
use crate::actors::traits::OcrClient;
use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::Client;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::info;

/// A handle to the `OcrActor`, wrapping the external text-extraction service.
#[derive(Clone)]
pub struct OcrActorHandle {
    sender: mpsc::Sender<OcrMessage>,
}

impl OcrActorHandle {
    /// Creates a new `OcrActor` and returns a handle to it.
    pub fn new(api_url: String, api_key: Option<String>) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        let actor = OcrActorRunner::new(receiver, api_url, api_key);
        tokio::spawn(async move { actor.run().await });
        Self { sender }
    }
}

#[async_trait]
impl OcrClient for OcrActorHandle {
    async fn extract_text(&self, image: Vec<u8>, mime: String) -> Result<String, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = OcrMessage::ExtractText {
            image,
            mime,
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
const HANDLE_TIMEOUT: Duration = Duration::from_secs(90);
const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(60);

// --- Actor Runner (Internal Logic) ---
struct OcrActorRunner {
    receiver: mpsc::Receiver<OcrMessage>,
    api_url: String,
    api_key: Option<String>,
    client: Client,
}

impl OcrActorRunner {
    fn new(receiver: mpsc::Receiver<OcrMessage>, api_url: String, api_key: Option<String>) -> Self {
        Self {
            receiver,
            api_url,
            api_key,
            client: Client::new(),
        }
    }

    async fn run(mut self) {
        info!("OcrActor started");

        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg).await;
        }

        info!("OcrActor stopped");
    }

    async fn handle_message(&mut self, msg: OcrMessage) {
        match msg {
            OcrMessage::ExtractText {
                image,
                mime,
                responder,
            } => {
                let result = self.extract(image, mime).await;
                let _ = responder.send(result);
            }
        }
    }

    async fn extract(&self, image: Vec<u8>, mime: String) -> Result<String, AppError> {
        info!(bytes = image.len(), mime = %mime, "OCR extraction requested");

        let payload = serde_json::json!({
            "image": base64::engine::general_purpose::STANDARD.encode(&image),
            "mime": mime,
        });

        let mut headers = HeaderMap::new();
        if let Some(key) = &self.api_key {
            let auth_value = format!("Bearer {}", key);
            headers.insert(
                AUTHORIZATION,
                auth_value.parse().map_err(|_| {
                    AppError::Config("OCR API key is not a valid header value".to_string())
                })?,
            );
        }

        let request_future = self
            .client
            .post(format!("{}/extract", self.api_url))
            .headers(headers)
            .json(&payload)
            .send();

        let res = timeout(EXTRACTION_TIMEOUT, request_future).await??;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "OCR request failed with status {}: {}",
                status, body
            )));
        }

        let json: serde_json::Value = res
            .json()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let text = json["text"].as_str().unwrap_or("").trim().to_string();
        if text.is_empty() {
            return Err(AppError::Validation(
                "no readable text found in the uploaded image".to_string(),
            ));
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn setup_test_actor(server_url: String) -> OcrActorHandle {
        let (sender, receiver) = mpsc::channel(32);

        let mut actor = OcrActorRunner::new(receiver, "http://unused".to_string(), None);
        actor.api_url = server_url;

        tokio::spawn(async move {
            while let Some(msg) = actor.receiver.recv().await {
                actor.handle_message(msg).await;
            }
        });

        OcrActorHandle { sender }
    }

    #[tokio::test]
    async fn test_extract_text_success() {
        let mock_server = MockServer::start().await;
        let handle = setup_test_actor(mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/extract"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "text": "Solve: 2x + 3 = 11" })),
            )
            .mount(&mock_server)
            .await;

        let result = handle
            .extract_text(vec![1, 2, 3], "image/png".to_string())
            .await;

        assert!(result.is_ok());
        assert_eq!(result.unwrap(), "Solve: 2x + 3 = 11");
    }

    #[tokio::test]
    async fn test_empty_extraction_is_validation_error() {
        let mock_server = MockServer::start().await;
        let handle = setup_test_actor(mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/extract"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "   " })))
            .mount(&mock_server)
            .await;

        let result = handle
            .extract_text(vec![1, 2, 3], "image/png".to_string())
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_ocr_server_error() {
        let mock_server = MockServer::start().await;
        let handle = setup_test_actor(mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/extract"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&mock_server)
            .await;

        let result = handle
            .extract_text(vec![1, 2, 3], "image/png".to_string())
            .await;

        assert!(matches!(result, Err(AppError::Upstream(_))));
    }
}
