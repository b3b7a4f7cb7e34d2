//! Script composition: briefing document to timed production script
//!
//! Deterministic prompt templating over the briefing fields, one non-streamed
//! generation call, and a strict JSON parse of the result. A response without
//! usable segments degrades to an empty script (audio/video stages are then
//! skipped); only an unparseable response is an error.

use crate::models::{segments_are_ordered, ScriptSegment};
use crate::services::{ChatError, ChatService};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use super::chat_client::SCRIPT_MODEL;

/// Script composition errors
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("Script response was not valid JSON: {0}")]
    MalformedScript(String),
}

const SYSTEM_PROMPT: &str = r#"You are a senior broadcast news producer and video director.

Your task is to convert structured news data into a timed production script
for a 60-90 second news briefing video.

Rules:
- Output MUST be valid JSON and nothing else.
- Total runtime must be between 60 and 90 seconds.
- Break the video into 5-8 chronological segments.
- Each segment must be no longer than 15 seconds.
- Each segment must include:
  - start_sec (integer)
  - end_sec (integer)
  - narration (spoken voiceover text)
  - visuals (clear, concrete instructions for what appears on screen)
  - overlay_text (short on-screen text, optional)

Editorial rules:
- Neutral, professional, news-style tone.
- Clearly distinguish CONFIRMED facts from UNCONFIRMED or DEVELOPING claims.
- Do NOT invent facts beyond the provided data.
- Visual instructions should be feasible for AI image/video generation
  (maps, timelines, text cards, simple animations).
- Avoid vague visuals like "something dramatic".
- Do not mention JSON, fields, or internal processing in narration."#;

/// Compose the timed script for a parsed briefing document
///
/// Returns an empty vector when the model produced no usable segments.
pub async fn compose(
    chat: &dyn ChatService,
    briefing: &Value,
) -> Result<Vec<ScriptSegment>, ComposeError> {
    let user_prompt = build_user_prompt(briefing);
    let response = chat.complete(SCRIPT_MODEL, SYSTEM_PROMPT, &user_prompt).await?;

    let segments = parse_segments(&response)?;
    info!(segments = segments.len(), "Script composition complete");
    Ok(segments)
}

/// Render the user message from the briefing fields
pub fn build_user_prompt(briefing: &Value) -> String {
    format!(
        r#"You are given verified, structured information about current global events.

Use ONLY the information below.

HEADLINE:
{headline}

SUMMARY:
{summary}

CONFIRMED FACTS:
- {confirmed}

UNCONFIRMED / DEVELOPING CLAIMS:
- {unconfirmed}

RECENT CHANGES:
- {recent}

WHAT TO WATCH NEXT:
- {watch}

TASK:
Create a timed production script for a 60-90 second news briefing video.

Requirements:
- Use 5-8 segments total.
- The first segment should be a headline / opening visual.
- Middle segments should cover confirmed facts, then unconfirmed claims (clearly labelled).
- Include at least one segment highlighting RECENT CHANGES.
- End with a "what to watch next" closing segment.
- Ensure timestamps are continuous and non-overlapping.
- Each segment should last 8-15 seconds.

Visual guidelines:
- Use maps for geography-related stories.
- Use timelines for evolving events.
- Use simple text cards for labels like "CONFIRMED" or "DEVELOPING".
- Do not reference source URLs on screen.

Return ONLY valid JSON."#,
        headline = briefing
            .get("headline")
            .and_then(Value::as_str)
            .unwrap_or("Breaking News"),
        summary = briefing.get("summary").and_then(Value::as_str).unwrap_or(""),
        confirmed = render_list(briefing.get("confirmed_facts")),
        unconfirmed = render_list(briefing.get("unconfirmed_claims")),
        recent = render_list(briefing.get("recent_changes")),
        watch = render_list(briefing.get("watch_next")),
    )
}

/// Render a briefing list for prompt insertion
///
/// Structured entries are reduced to their display text; plain strings pass
/// through; an empty or missing list renders the literal token "None".
fn render_list(items: Option<&Value>) -> String {
    let Some(items) = items.and_then(Value::as_array).filter(|a| !a.is_empty()) else {
        return "None".to_string();
    };

    items
        .iter()
        .map(display_text)
        .collect::<Vec<_>>()
        .join("\n- ")
}

fn display_text(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        Value::Object(map) => ["text", "fact", "claim"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| item.to_string()),
        other => other.to_string(),
    }
}

/// Parse the model response into ordered segments
///
/// The response must be valid JSON. The top-level value must be an object
/// with a non-empty "segments" array; anything else yields an empty script.
pub fn parse_segments(response: &str) -> Result<Vec<ScriptSegment>, ComposeError> {
    let value: Value = serde_json::from_str(response)
        .map_err(|e| ComposeError::MalformedScript(e.to_string()))?;

    let Some(raw_segments) = value
        .get("segments")
        .and_then(Value::as_array)
        .filter(|s| !s.is_empty())
    else {
        warn!("Script response carried no segments; degrading to empty script");
        return Ok(Vec::new());
    };

    let segments: Vec<ScriptSegment> =
        match serde_json::from_value(Value::Array(raw_segments.clone())) {
            Ok(segments) => segments,
            Err(e) => {
                warn!(error = %e, "Segments did not match the expected shape; degrading to empty script");
                return Ok(Vec::new());
            }
        };

    if !segments_are_ordered(&segments) {
        warn!("Segments were not chronologically ordered; degrading to empty script");
        return Ok(Vec::new());
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_list_handles_structured_entries() {
        let items = json!([
            {"text": "magnitude 7.1", "sourceUrl": "https://x.com/usgs"},
            "aftershocks reported",
            {"claim": "bridge damaged"},
        ]);
        let rendered = render_list(Some(&items));
        assert_eq!(
            rendered,
            "magnitude 7.1\n- aftershocks reported\n- bridge damaged"
        );
    }

    #[test]
    fn test_render_list_empty_renders_none_token() {
        assert_eq!(render_list(None), "None");
        assert_eq!(render_list(Some(&json!([]))), "None");
        assert_eq!(render_list(Some(&json!("not a list"))), "None");
    }

    #[test]
    fn test_user_prompt_contains_briefing_fields() {
        let briefing = json!({
            "headline": "Quake hits coast",
            "summary": "A strong quake struck.",
            "confirmed_facts": ["magnitude 7.1"],
            "unconfirmed_claims": [],
        });
        let prompt = build_user_prompt(&briefing);
        assert!(prompt.contains("HEADLINE:\nQuake hits coast"));
        assert!(prompt.contains("- magnitude 7.1"));
        assert!(prompt.contains("UNCONFIRMED / DEVELOPING CLAIMS:\n- None"));
    }

    #[test]
    fn test_user_prompt_defaults_missing_headline() {
        let prompt = build_user_prompt(&json!({}));
        assert!(prompt.contains("Breaking News"));
    }

    #[test]
    fn test_parse_segments_success() {
        let response = json!({
            "segments": [
                {"start_sec": 0, "end_sec": 10, "narration": "a", "visuals": "map"},
                {"start_sec": 10, "end_sec": 22, "narration": "b", "visuals": "timeline",
                 "overlay_text": "CONFIRMED"},
            ]
        })
        .to_string();

        let segments = parse_segments(&response).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].overlay_text.as_deref(), Some("CONFIRMED"));
    }

    #[test]
    fn test_parse_segments_missing_or_empty_degrades() {
        assert!(parse_segments("{\"segments\": []}").unwrap().is_empty());
        assert!(parse_segments("{\"other\": 1}").unwrap().is_empty());
        // top-level array is not the expected object shape
        assert!(parse_segments("[1, 2, 3]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_segments_invalid_json_is_error() {
        assert!(matches!(
            parse_segments("not json at all"),
            Err(ComposeError::MalformedScript(_))
        ));
    }

    #[test]
    fn test_parse_segments_rejects_unordered_output() {
        let response = json!({
            "segments": [
                {"start_sec": 10, "end_sec": 20, "narration": "a", "visuals": "v"},
                {"start_sec": 0, "end_sec": 10, "narration": "b", "visuals": "v"},
            ]
        })
        .to_string();

        assert!(parse_segments(&response).unwrap().is_empty());
    }
}
