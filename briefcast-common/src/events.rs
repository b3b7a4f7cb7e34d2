//! Progress event types streamed to briefing clients
//!
//! One `ProgressEvent` per websocket frame, serialized as JSON with a
//! `type` discriminator. Emission order is part of the contract: clients
//! render the stream as it arrives, and no event may follow a terminal one.

use serde::{Deserialize, Serialize};

/// Progress events for one briefing generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Pipeline stage transition (e.g., "generating script")
    Status { message: String },

    /// Model entered extended reasoning (sent at most once per request)
    Thinking { message: String },

    /// Tool invocation during briefing research (first occurrence per tool)
    Tool { name: String, query: String },

    /// Raw briefing text fragment, in arrival order
    Chunk { text: String },

    /// Combined briefing video is available
    VideoReady { url: String },

    /// Terminal: completed briefing document serialized as JSON text
    Result { briefing: String },

    /// Terminal: request failed with a human-readable message
    Error { message: String },
}

impl ProgressEvent {
    /// Event type string as it appears on the wire
    pub fn event_type(&self) -> &'static str {
        match self {
            ProgressEvent::Status { .. } => "status",
            ProgressEvent::Thinking { .. } => "thinking",
            ProgressEvent::Tool { .. } => "tool",
            ProgressEvent::Chunk { .. } => "chunk",
            ProgressEvent::VideoReady { .. } => "video_ready",
            ProgressEvent::Result { .. } => "result",
            ProgressEvent::Error { .. } => "error",
        }
    }

    /// True for the final event of a stream (result or error)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Result { .. } | ProgressEvent::Error { .. }
        )
    }

    /// Convenience constructor for status events
    pub fn status(message: impl Into<String>) -> Self {
        ProgressEvent::Status {
            message: message.into(),
        }
    }

    /// Convenience constructor for error events
    pub fn error(message: impl Into<String>) -> Self {
        ProgressEvent::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_uses_type_tag() {
        let event = ProgressEvent::Status {
            message: "starting".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["message"], "starting");

        let event = ProgressEvent::VideoReady {
            url: "/videos/final.mp4".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "video_ready");
        assert_eq!(json["url"], "/videos/final.mp4");
    }

    #[test]
    fn test_error_event_wire_shape() {
        let event = ProgressEvent::error("XAI_API_KEY not configured");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "XAI_API_KEY not configured");
    }

    #[test]
    fn test_terminal_classification() {
        assert!(ProgressEvent::Result {
            briefing: "{}".to_string()
        }
        .is_terminal());
        assert!(ProgressEvent::error("boom").is_terminal());
        assert!(!ProgressEvent::status("connected").is_terminal());
        assert!(!ProgressEvent::Chunk {
            text: "x".to_string()
        }
        .is_terminal());
    }

    #[test]
    fn test_round_trip_deserialization() {
        let event = ProgressEvent::Tool {
            name: "x_search".to_string(),
            query: "earthquake".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
