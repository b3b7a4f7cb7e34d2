//! xAI chat API client
//!
//! One streamed structured-output call produces the briefing document; the
//! same client serves the single-shot completions used by the script stage.
//! Streamed responses arrive as SSE-framed JSON deltas carrying text
//! fragments plus two side channels: reasoning indicators and tool
//! invocation records.

use crate::services::{ChatService, ChatSignal};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const XAI_API_BASE: &str = "https://api.x.ai/v1";

/// Model for briefing research (web-search tooling enabled)
pub const BRIEFING_MODEL: &str = "grok-4-1-fast";

/// Model for script composition (single-shot, no tooling)
pub const SCRIPT_MODEL: &str = "grok-4";

/// Upstream calls can run for minutes while search tooling executes
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3600);

/// Instruction template for the briefing generation call
const BRIEFING_INSTRUCTION: &str = r#"You are a news analyst. Return ONLY valid JSON with this structure: {"headline": "engaging title", "summary": "2-3 sentence overview", "confirmed_facts": [{"text": "fact", "sourceUrl": "https://x.com/..."}], "unconfirmed_claims": ["claim1", "claim2"], "recent_changes": ["update1"], "watch_next": ["related_topic1", "related_topic2"], "sources": [{"account_handle": "@username", "display_name": "Full Name", "post_url": "https://x.com/...", "label": "official|journalist|eyewitness|other"}], "media": [{"url": "https://...", "type": "image|video", "caption": "short caption", "sourceUrl": "https://x.com/..."}]}"#;

/// Chat client errors
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("Empty response from chat service")]
    EmptyResponse,
}

/// xAI chat API client
pub struct XaiChatClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl XaiChatClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ChatError> {
        Self::with_base_url(api_key, XAI_API_BASE)
    }

    /// Override the API base URL (used by tests)
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl ChatService for XaiChatClient {
    async fn stream_briefing(
        &self,
        topic: &str,
        location: &str,
        signals: mpsc::UnboundedSender<ChatSignal>,
    ) -> Result<String, ChatError> {
        let user_message = format!(
            "Generate a news briefing for: {}. Location focus: {}.",
            topic, location
        );

        let body = json!({
            "model": BRIEFING_MODEL,
            "stream": true,
            "messages": [
                {"role": "user", "content": BRIEFING_INSTRUCTION},
                {"role": "user", "content": user_message},
            ],
            "tools": [{
                "type": "x_search",
                "x_search": {
                    "enable_image_understanding": true,
                    "enable_video_understanding": true,
                },
            }],
        });

        info!(topic = %topic, location = %location, "Starting briefing stream");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChatError::Api(status.as_u16(), error_text));
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut content = String::new();

        'outer: while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ChatError::Network(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line: String = buffer.drain(..=pos).collect();
                let line = line.trim();

                let Some(data) = line.strip_prefix("data:").map(str::trim) else {
                    continue;
                };
                if data == "[DONE]" {
                    break 'outer;
                }

                match serde_json::from_str::<Value>(data) {
                    Ok(payload) => {
                        for signal in delta_signals(&payload) {
                            if let ChatSignal::Content(text) = &signal {
                                content.push_str(text);
                            }
                            // Receiver may be gone (client disconnected);
                            // the stream still runs to completion.
                            let _ = signals.send(signal);
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "Skipping undecodable stream frame");
                    }
                }
            }
        }

        if content.is_empty() {
            warn!(topic = %topic, "Briefing stream produced no content");
            return Err(ChatError::EmptyResponse);
        }

        info!(topic = %topic, bytes = content.len(), "Briefing stream complete");
        Ok(content)
    }

    async fn complete(&self, model: &str, system: &str, user: &str) -> Result<String, ChatError> {
        let body = json!({
            "model": model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChatError::Api(status.as_u16(), error_text));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .filter(|c| !c.is_empty())
            .ok_or(ChatError::EmptyResponse)
    }
}

/// Extract signals from one streamed delta payload
fn delta_signals(payload: &Value) -> Vec<ChatSignal> {
    let mut signals = Vec::new();
    let delta = &payload["choices"][0]["delta"];

    if delta["reasoning_content"]
        .as_str()
        .is_some_and(|r| !r.is_empty())
    {
        signals.push(ChatSignal::Reasoning);
    }

    if let Some(tool_calls) = delta["tool_calls"].as_array() {
        for call in tool_calls {
            let Some(name) = call["function"]["name"].as_str() else {
                continue;
            };
            let query = call["function"]["arguments"]
                .as_str()
                .map(extract_tool_query)
                .unwrap_or_else(|| "processing".to_string());
            signals.push(ChatSignal::Tool {
                name: name.to_string(),
                query,
            });
        }
    }

    if let Some(text) = delta["content"].as_str() {
        if !text.is_empty() {
            signals.push(ChatSignal::Content(text.to_string()));
        }
    }

    signals
}

/// Best-effort query extraction from a JSON-ish tool argument payload
fn extract_tool_query(arguments: &str) -> String {
    serde_json::from_str::<Value>(arguments)
        .ok()
        .and_then(|args| {
            args.get("query")
                .or_else(|| args.get("q"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "processing".to_string())
}
