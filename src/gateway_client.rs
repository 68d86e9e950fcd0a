use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::cli::chat::conversation_state::Message;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to completion endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("completion endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("completion endpoint returned invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response has no result content")]
    MissingResult,

    #[error("response content is empty")]
    EmptyContent,
}

/// One request/response exchange with the completion backend.
///
/// Implementations are pure transport: the transcript is sent as given and the
/// reply is returned as a single assistant message.
#[async_trait]
pub trait CompletionGateway {
    async fn complete(&self, messages: &[Message]) -> Result<Message, GatewayError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct CompletionResponse {
    result: Option<CompletionResult>,
}

#[derive(Deserialize)]
struct CompletionResult {
    content: Option<String>,
}

pub struct GatewayClient {
    endpoint: Url,
    client: reqwest::Client,
}

impl GatewayClient {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionGateway for GatewayClient {
    async fn complete(&self, messages: &[Message]) -> Result<Message, GatewayError> {
        let request_body = CompletionRequest { messages };

        debug!(
            "Sending {} messages to {}: {}",
            messages.len(),
            self.endpoint,
            serde_json::to_string_pretty(&request_body)?
        );

        // `.json()` also sets `Content-Type: application/json`.
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!("Completion endpoint returned {}", status);
            return Err(GatewayError::Status { status, body });
        }

        debug!("Received response: {}", body);

        parse_completion(&body)
    }
}

/// Extract the assistant reply from a `{"result": {"content": ...}}` body.
pub fn parse_completion(body: &str) -> Result<Message, GatewayError> {
    // Go through `Value` first so that `null` and other non-object bodies land
    // in `MissingResult` rather than a decode error.
    let value: Value = serde_json::from_str(body)?;
    if !value.is_object() {
        return Err(GatewayError::MissingResult);
    }

    let response: CompletionResponse =
        serde_json::from_value(value).map_err(|_| GatewayError::MissingResult)?;

    let content = response
        .result
        .and_then(|result| result.content)
        .ok_or(GatewayError::MissingResult)?;

    if content.trim().is_empty() {
        return Err(GatewayError::EmptyContent);
    }

    Ok(Message::assistant(content))
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::*;
    use crate::cli::chat::conversation_state::Role;

    fn client_for(server: &mockito::Server) -> GatewayClient {
        let endpoint = Url::parse(&format!("{}/api/chat", server.url())).unwrap();
        GatewayClient::new(endpoint)
    }

    fn transcript() -> Vec<Message> {
        vec![
            Message::assistant("Hi there! How can I help?"),
            Message::user("Write a 5-paragraph essay."),
        ]
    }

    #[test]
    fn parses_result_content() {
        let message = parse_completion(r#"{"result":{"role":"assistant","content":"Task 1.1"}}"#)
            .unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "Task 1.1");
    }

    #[test]
    fn rejects_bodies_without_result() {
        assert!(matches!(parse_completion("{}"), Err(GatewayError::MissingResult)));
        assert!(matches!(parse_completion("null"), Err(GatewayError::MissingResult)));
        assert!(matches!(
            parse_completion(r#"{"result":{}}"#),
            Err(GatewayError::MissingResult)
        ));
        assert!(matches!(
            parse_completion(r#"{"result":{"content":42}}"#),
            Err(GatewayError::MissingResult)
        ));
    }

    #[test]
    fn rejects_blank_content() {
        assert!(matches!(
            parse_completion(r#"{"result":{"content":"  "}}"#),
            Err(GatewayError::EmptyContent)
        ));
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(parse_completion("<html>"), Err(GatewayError::Decode(_))));
        assert!(matches!(parse_completion(""), Err(GatewayError::Decode(_))));
    }

    #[tokio::test]
    async fn posts_transcript_as_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "messages": [
                    { "role": "assistant", "content": "Hi there! How can I help?" },
                    { "role": "user", "content": "Write a 5-paragraph essay." }
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result":{"content":"Task 1.1: Outline"}}"#)
            .create_async()
            .await;

        let reply = client_for(&server).complete(&transcript()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(reply, Message::assistant("Task 1.1: Outline"));
    }

    #[tokio::test]
    async fn empty_object_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/chat")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let result = client_for(&server).complete(&transcript()).await;
        assert!(matches!(result, Err(GatewayError::MissingResult)));
    }

    #[tokio::test]
    async fn error_status_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/chat")
            .with_status(500)
            .with_body(r#"{"result":{"content":"ignored"}}"#)
            .create_async()
            .await;

        let result = client_for(&server).complete(&transcript()).await;
        match result {
            Err(GatewayError::Status { status, .. }) => assert_eq!(status.as_u16(), 500),
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refused_connection_is_a_failure() {
        let client = GatewayClient::new(Url::parse("http://127.0.0.1:1/api/chat").unwrap());
        let result = client.complete(&transcript()).await;
        assert!(matches!(result, Err(GatewayError::Transport(_))));
    }
}
