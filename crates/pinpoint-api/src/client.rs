//! Chat-completions API client.

use pinpoint_types::{ApiError, AssistantReply, ChatBackend, ChatRequest, Usage};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// Azure OpenAI deployments work by passing the deployment URL (including
/// the `api-version` query) as the base URL; the credential is sent in the
/// `api-key` header.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

/// Response body of a chat-completions call.
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantReply,
}

impl OpenAiClient {
    /// Create a new client.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }

    async fn send(&self, request: &ChatRequest) -> Result<AssistantReply, ApiError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "api-key",
            HeaderValue::from_str(&self.api_key).map_err(|_| ApiError::Auth {
                message: "Invalid API key format".into(),
            })?,
        );

        tracing::debug!(model = %request.model, messages = request.messages.len(), "POST {url}");

        let response = self
            .http
            .post(&url)
            .headers(headers)
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        if let Some(usage) = &body.usage {
            tracing::debug!(
                prompt = usage.prompt_tokens,
                completion = usage.completion_tokens,
                "chat completion usage"
            );
        }

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| ApiError::Parse("response contained no choices".to_string()))
    }
}

impl ChatBackend for OpenAiClient {
    fn complete<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<AssistantReply, ApiError>> + Send + 'a>> {
        Box::pin(self.send(request))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Classify an HTTP error response into a typed ApiError.
fn classify_error(status: u16, body: &str) -> ApiError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<ErrorDetail>,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: Option<String>,
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status {
        401 | 403 => ApiError::Auth { message },
        400 | 404 | 422 => ApiError::BadRequest { message },
        429 => ApiError::RateLimited,
        _ => ApiError::Server { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinpoint_types::ChatMessage;

    #[test]
    fn client_new() {
        let client = OpenAiClient::new("test-key", "https://api.example.com/openai");
        assert!(client.is_ok());
    }

    #[test]
    fn client_name() {
        let client = OpenAiClient::new("test-key", "https://api.example.com").unwrap();
        assert_eq!(client.name(), "openai");
    }

    #[test]
    fn classify_auth_error() {
        let err = classify_error(401, r#"{"error":{"message":"bad key"}}"#);
        match err {
            ApiError::Auth { message } => assert_eq!(message, "bad key"),
            other => panic!("Expected Auth, got: {other:?}"),
        }
    }

    #[test]
    fn classify_rate_limit() {
        assert!(matches!(classify_error(429, ""), ApiError::RateLimited));
    }

    #[test]
    fn classify_server_error_with_plain_body() {
        let err = classify_error(503, "upstream unavailable");
        match err {
            ApiError::Server { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "upstream unavailable");
            }
            other => panic!("Expected Server, got: {other:?}"),
        }
    }

    #[test]
    fn deserialize_chat_response_with_tool_calls() {
        let json = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "ip_location_lookup", "arguments": "{\"ip\":\"8.8.8.8\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        let reply = &resp.choices[0].message;
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn request_serializes_for_wire() {
        let req = ChatRequest {
            model: "gpt-4o".to_string(),
            messages: vec![
                ChatMessage::system("You are an assistant."),
                ChatMessage::user("Where is Boardman USA?"),
            ],
            tools: None,
            tool_choice: Some("auto".to_string()),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["messages"].as_array().unwrap().len(), 2);
        assert_eq!(json["tool_choice"], "auto");
    }
}
