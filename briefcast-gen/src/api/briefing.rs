//! Non-streaming briefing endpoints
//!
//! REST alternatives to the websocket pipeline: one-shot briefing plus
//! narration audio, and a standalone script generation call. Neither runs
//! the video stages.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{BriefingRequest, ScriptSegment};
use crate::services::{
    join_narration, media_filter::filter_social_video, script_composer,
    chat_client::SCRIPT_MODEL,
};
use crate::{AppState, ServiceClients};

#[derive(Debug, Deserialize)]
pub struct TopicRequest {
    pub topic: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BriefingResponse {
    /// Filtered briefing document plus timed script, serialized as text
    pub script: String,
    /// Client-facing narration audio path, empty when synthesis was skipped
    pub audio_url: String,
}

#[derive(Debug, Serialize)]
pub struct ScriptResponse {
    pub script: String,
}

const SCRIPT_INSTRUCTION: &str = "You are an expert video scriptwriter. Write a concise, \
engaging 60-90 second news briefing script on the given topic. Neutral, professional tone. \
Return the script text only.";

/// POST /generate-briefing
///
/// Runs briefing research and narration synthesis without the websocket.
/// Video stages are not run; progress signals are discarded.
pub async fn generate_briefing(
    State(state): State<AppState>,
    Json(request): Json<TopicRequest>,
) -> ApiResult<Json<BriefingResponse>> {
    let clients = require_clients(&state)?;
    let request = validate(request)?;

    info!(topic = %request.topic, "Briefing requested over REST");

    // no progress consumer here; the client sees only the final document
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    drop(signal_rx);

    let raw = clients
        .chat
        .stream_briefing(&request.topic, &request.location, signal_tx)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let filtered = filter_social_video(&raw);
    let mut briefing: Value = serde_json::from_str(&filtered)
        .map_err(|e| ApiError::Upstream(format!("briefing was not valid JSON: {}", e)))?;
    if !briefing.is_object() {
        return Err(ApiError::Upstream(
            "briefing was not a JSON object".to_string(),
        ));
    }

    let segments = script_composer::compose(clients.chat.as_ref(), &briefing)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let audio_url = synthesize_narration(clients, &segments).await;
    if !segments.is_empty() {
        briefing["script"] = serde_json::to_value(&segments).unwrap_or(Value::Null);
    }

    Ok(Json(BriefingResponse {
        script: briefing.to_string(),
        audio_url,
    }))
}

/// POST /generate-script
///
/// Standalone plain-text script generation, no research tooling.
pub async fn generate_script(
    State(state): State<AppState>,
    Json(request): Json<TopicRequest>,
) -> ApiResult<Json<ScriptResponse>> {
    let clients = require_clients(&state)?;
    let request = validate(request)?;

    info!(topic = %request.topic, "Script requested over REST");

    let script = clients
        .chat
        .complete(SCRIPT_MODEL, SCRIPT_INSTRUCTION, &request.topic)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    Ok(Json(ScriptResponse { script }))
}

fn require_clients(state: &AppState) -> ApiResult<&ServiceClients> {
    state
        .clients
        .as_ref()
        .ok_or_else(|| ApiError::Config("XAI_API_KEY not configured".to_string()))
}

fn validate(request: TopicRequest) -> ApiResult<BriefingRequest> {
    if request.topic.trim().is_empty() {
        return Err(ApiError::BadRequest("topic is required".to_string()));
    }
    Ok(BriefingRequest::new(request.topic, request.location))
}

/// Best-effort narration synthesis; an empty string marks a skipped or
/// failed synthesis
async fn synthesize_narration(clients: &ServiceClients, segments: &[ScriptSegment]) -> String {
    let narration = join_narration(segments);
    if narration.trim().is_empty() {
        return String::new();
    }

    let filename = format!("briefing_{}.wav", Uuid::new_v4().simple());
    match clients.speech.synthesize(&narration, &filename).await {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "Narration synthesis failed; returning briefing without audio");
            String::new()
        }
    }
}

/// Build briefing routes
pub fn briefing_routes() -> Router<AppState> {
    Router::new()
        .route("/generate-briefing", post(generate_briefing))
        .route("/generate-script", post(generate_script))
}
