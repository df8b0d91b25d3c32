//! HTTP client for an OpenAI-compatible chat-completions endpoint.

use crate::prompt::{user_prompt, SYSTEM_PROMPT};
use async_trait::async_trait;
use emr_core::{EmrError, EmrResult, ExtractionClient, ExtractionConfig, GenerationRequest};
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

/// Extraction client that sends one system and one user message per request.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    api_url: String,
    model: String,
    api_key: String,
}

impl ChatCompletionsClient {
    /// # Errors
    ///
    /// Returns `EmrError::MissingCredentials` when the configuration carries no API key.
    pub fn from_config(cfg: &ExtractionConfig) -> EmrResult<Self> {
        let api_key = cfg.api_key().ok_or(EmrError::MissingCredentials)?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_url: cfg.api_url().to_string(),
            model: cfg.model().to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn body(&self, request: &GenerationRequest) -> ChatRequest<'_> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(request),
                },
            ],
        }
    }
}

#[async_trait]
impl ExtractionClient for ChatCompletionsClient {
    async fn extract(&self, request: &GenerationRequest) -> EmrResult<String> {
        info!(url = %self.api_url, model = %self.model, "requesting structured record");

        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "extraction request failed");
                EmrError::UpstreamUnavailable(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_else(|e| {
                error!(error = %e, "failed to read extraction error body");
                String::new()
            });
            error!(status = status.as_u16(), body = %body, "extraction service returned an error");
            return Err(EmrError::UpstreamUnavailable(format!(
                "service returned {status}"
            )));
        }

        let body = resp.text().await.map_err(|e| {
            error!(error = %e, "failed to read extraction response body");
            EmrError::UpstreamUnavailable(e.to_string())
        })?;

        completion_content(&body)
    }
}

/// Parse a raw completion body and read its content.
///
/// # Errors
///
/// Returns `EmrError::UpstreamMalformed` carrying the raw body when it is not JSON, or when
/// [`content_from_completion`] rejects it.
pub fn completion_content(body: &str) -> EmrResult<String> {
    let payload: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        error!(error = %e, body = %body, "extraction response body is not JSON");
        EmrError::UpstreamMalformed {
            reason: format!("response body is not JSON: {e}"),
            raw: body.to_string(),
        }
    })?;

    content_from_completion(&payload)
}

/// Read `choices[0].message.content` from a completion payload.
///
/// # Errors
///
/// Returns `EmrError::UpstreamMalformed` when the content is absent, not a string, or blank.
pub fn content_from_completion(payload: &serde_json::Value) -> EmrResult<String> {
    match payload
        .pointer("/choices/0/message/content")
        .and_then(serde_json::Value::as_str)
    {
        Some(content) if !content.trim().is_empty() => Ok(content.to_string()),
        _ => {
            error!(payload = %payload, "extraction response is empty");
            Err(EmrError::UpstreamMalformed {
                reason: "response is empty".into(),
                raw: payload.to_string(),
            })
        }
    }
}
