// src/service/anthropic.rs

//! Captioning through the Anthropic Messages API.

use crate::config::ServiceConfig;
use crate::data_model::{CaptionText, ImagePayload};
use crate::error::{CaptionError, Result};
use crate::service::response::parse_caption_reply;
use crate::service::{CaptionService, ServiceError, ServiceErrorKind};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    kind: String,
    message: Option<String>,
}

pub struct AnthropicCaptionService {
    config: ServiceConfig,
    client: Client,
}

impl AnthropicCaptionService {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(CaptionError::ConfigError(
                "API key is not set (use --api-key or ANTHROPIC_API_KEY)".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CaptionError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.endpoint.trim_end_matches('/'))
    }
}

/// Maps an HTTP failure to a retry class. An explicit `overloaded_error` body
/// wins over the status code.
pub fn classify_http_failure(status: u16, body: &str) -> ServiceError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|env| env.error.message.clone())
        .unwrap_or_else(|| body.chars().take(200).collect());
    let detail = format!("HTTP {}: {}", status, message);

    if let Some(env) = &parsed {
        match env.error.kind.as_str() {
            "overloaded_error" => return ServiceError::new(ServiceErrorKind::Overloaded, detail),
            "rate_limit_error" => return ServiceError::new(ServiceErrorKind::RateLimited, detail),
            _ => {}
        }
    }

    let kind = match status {
        529 => ServiceErrorKind::Overloaded,
        429 => ServiceErrorKind::RateLimited,
        408 | 504 => ServiceErrorKind::Timeout,
        401 | 403 => ServiceErrorKind::Authentication,
        400..=499 => ServiceErrorKind::InvalidRequest,
        _ => ServiceErrorKind::Unclassified,
    };
    ServiceError::new(kind, detail)
}

fn classify_transport_error(err: &reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::timeout(err.to_string())
    } else {
        ServiceError::new(ServiceErrorKind::Unclassified, err.to_string())
    }
}

#[async_trait]
impl CaptionService for AnthropicCaptionService {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    #[instrument(skip_all, fields(model = %self.config.model, bytes = image.bytes.len()))]
    async fn caption(
        &self,
        image: &ImagePayload,
        prompt: &str,
    ) -> std::result::Result<CaptionText, ServiceError> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentPart::Text { text: prompt },
                    ContentPart::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: image.media_type,
                            data: BASE64.encode(&image.bytes),
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(status.as_u16(), &body));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::timeout(e.to_string())
            } else {
                ServiceError::incomplete(format!("unreadable response body: {}", e))
            }
        })?;

        let text = parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| ServiceError::incomplete("response has no text block"))?;

        debug!(reply_len = text.len(), "Caption reply received");
        parse_caption_reply(&text)
    }
}
