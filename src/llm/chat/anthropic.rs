use async_trait::async_trait;
use log::{ debug, warn };
use reqwest::{ Client as HttpClient, StatusCode, header::{ HeaderMap, HeaderValue, CONTENT_TYPE } };
use serde::{ Deserialize, Serialize };

use super::{ ChatClient, CompletionRequest, CompletionResponse };
use crate::error::ChatError;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const MESSAGES_ROUTE: &str = "/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the Anthropic Messages API. Holds nothing but the HTTP client
/// with the credential baked into its default headers.
pub struct AnthropicChatClient {
    http: HttpClient,
    base_url: String,
    url: String,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentSegment>,
}

#[derive(Deserialize)]
struct ContentSegment {
    #[serde(rename = "type")]
    segment_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicErrorBody {
    error: AnthropicErrorDetail,
}

#[derive(Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

impl AnthropicChatClient {
    pub fn new(api_key: &str, base_url: Option<String>) -> Result<Self, ChatError> {
        let base_url = base_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = base_url.trim_end_matches('/').to_string();
        let url = format!("{}{}", base_url, MESSAGES_ROUTE);

        let mut key_value = HeaderValue::from_str(api_key).map_err(|e|
            ChatError::Configuration(format!("Invalid API key format: {}", e))
        )?;
        key_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-api-key", key_value);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ChatError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, base_url, url })
    }
}

fn first_text_segment(response: AnthropicResponse) -> Option<String> {
    response.content
        .into_iter()
        .find(|segment| segment.segment_type == "text")
        .and_then(|segment| segment.text)
}

fn describe_error(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<AnthropicErrorBody>(body) {
        Ok(parsed) =>
            format!(
                "Error code: {} - {}: {}",
                status.as_u16(),
                parsed.error.error_type,
                parsed.error.message
            ),
        Err(_) if body.trim().is_empty() =>
            format!(
                "Error code: {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status")
            ),
        Err(_) => format!("Error code: {} - {}", status.as_u16(), body.trim()),
    }
}

#[async_trait]
impl ChatClient for AnthropicChatClient {
    async fn complete(
        &self,
        request: &CompletionRequest
    ) -> Result<CompletionResponse, ChatError> {
        let payload = AnthropicRequest {
            model: request.model.as_str(),
            max_tokens: request.max_tokens,
            system: &request.system,
            messages: request.messages
                .iter()
                .map(|m| AnthropicMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
        };

        debug!(
            "Sending completion request: model={}, messages={}",
            payload.model,
            payload.messages.len()
        );

        let resp = self.http
            .post(&self.url)
            .json(&payload)
            .send().await
            .map_err(|e| ChatError::RemoteCall(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text().await
            .map_err(|e| ChatError::RemoteCall(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            warn!("Anthropic API returned {}", status);
            return Err(ChatError::RemoteCall(describe_error(status, &body)));
        }

        let parsed: AnthropicResponse = serde_json
            ::from_str(&body)
            .map_err(|e| ChatError::RemoteCall(format!("Failed to parse response: {}", e)))?;

        first_text_segment(parsed)
            .map(|response| CompletionResponse { response })
            .ok_or_else(|| ChatError::RemoteCall("Response contained no text content".to_string()))
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }
}
