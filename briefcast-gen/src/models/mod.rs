//! Request and pipeline data types

use serde::{Deserialize, Serialize};

/// Location used when the client omits one
pub const DEFAULT_LOCATION: &str = "worldwide";

/// One briefing generation request, created per client connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BriefingRequest {
    pub topic: String,
    pub location: String,
}

impl BriefingRequest {
    /// Build a request; empty or missing location falls back to "worldwide"
    pub fn new(topic: impl Into<String>, location: Option<String>) -> Self {
        let location = location
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        Self {
            topic: topic.into(),
            location,
        }
    }
}

/// One timed slice of the production script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSegment {
    pub start_sec: u32,
    pub end_sec: u32,
    pub narration: String,
    pub visuals: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_text: Option<String>,
}

impl ScriptSegment {
    /// Segment length in seconds (zero when timestamps are inverted)
    pub fn duration_secs(&self) -> u32 {
        self.end_sec.saturating_sub(self.start_sec)
    }
}

/// Check chronological ordering: start < end per segment, sorted, no overlaps
pub fn segments_are_ordered(segments: &[ScriptSegment]) -> bool {
    segments.iter().all(|s| s.start_sec < s.end_sec)
        && segments
            .windows(2)
            .all(|pair| pair[0].end_sec <= pair[1].start_sec)
}

/// Completed video generation for one script segment
///
/// Batches are positionally aligned with the script: failures stay in the
/// batch as `None` holes so indices keep their meaning.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSegmentResult {
    pub index: usize,
    pub remote_url: String,
    pub start_sec: u32,
    pub end_sec: u32,
    pub narration: String,
}
