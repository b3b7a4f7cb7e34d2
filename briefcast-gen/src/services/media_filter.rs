//! Social-video media filtering
//!
//! Generated briefings may cite media hosted on social-video platforms that
//! cannot be embedded downstream. This pass drops those entries from the
//! briefing's `media` list before any later stage reads the document.
//!
//! Invalid JSON input is returned byte-identical: the parse failure surfaces
//! later, at script composition, where it is fatal.

use serde_json::Value;
use tracing::debug;

/// Hosts whose video entries are dropped
const SOCIAL_VIDEO_DOMAINS: &[&str] = &[
    "video.twimg.com",
    "amp.twimg.com",
    "youtube.com",
    "youtu.be",
    "tiktok.com",
    "instagram.com",
];

/// Remove media entries of type "video" hosted on known social-video domains
///
/// Non-video entries always pass through; video entries survive unless their
/// url or sourceUrl matches a blocked domain. Returns the input unchanged if
/// it is not valid JSON.
pub fn filter_social_video(text: &str) -> String {
    let Ok(mut document) = serde_json::from_str::<Value>(text) else {
        return text.to_string();
    };

    if let Some(media) = document.get_mut("media").and_then(Value::as_array_mut) {
        let before = media.len();
        media.retain(|entry| !is_blocked_video(entry));
        let dropped = before - media.len();
        if dropped > 0 {
            debug!(dropped, "Filtered social-video media entries");
        }
    }

    serde_json::to_string(&document).unwrap_or_else(|_| text.to_string())
}

fn is_blocked_video(entry: &Value) -> bool {
    if entry.get("type").and_then(Value::as_str) != Some("video") {
        return false;
    }

    ["url", "sourceUrl"].iter().any(|key| {
        entry
            .get(*key)
            .and_then(Value::as_str)
            .is_some_and(|url| SOCIAL_VIDEO_DOMAINS.iter().any(|domain| url.contains(domain)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn media_of(text: &str) -> Vec<Value> {
        serde_json::from_str::<Value>(text).unwrap()["media"]
            .as_array()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_blocked_video_dropped_image_kept() {
        let input = json!({
            "headline": "h",
            "media": [
                {"url": "https://video.twimg.com/clip.mp4", "type": "video", "caption": "c"},
                {"url": "https://pbs.twimg.com/photo.jpg", "type": "image", "caption": "c"},
            ]
        })
        .to_string();

        let media = media_of(&filter_social_video(&input));
        assert_eq!(media.len(), 1);
        assert_eq!(media[0]["type"], "image");
    }

    #[test]
    fn test_video_matched_by_source_url() {
        let input = json!({
            "media": [{
                "url": "https://cdn.example.com/clip.mp4",
                "sourceUrl": "https://youtube.com/watch?v=1",
                "type": "video",
            }]
        })
        .to_string();

        assert!(media_of(&filter_social_video(&input)).is_empty());
    }

    #[test]
    fn test_unblocked_video_kept_verbatim() {
        let entry = json!({
            "url": "https://cdn.example.com/clip.mp4",
            "type": "video",
            "caption": "footage",
        });
        let input = json!({"media": [entry.clone()]}).to_string();

        let media = media_of(&filter_social_video(&input));
        assert_eq!(media, vec![entry]);
    }

    #[test]
    fn test_non_video_entry_never_removed() {
        // an image hosted on a blocked domain still passes
        let input = json!({
            "media": [{"url": "https://video.twimg.com/thumb.jpg", "type": "image"}]
        })
        .to_string();

        assert_eq!(media_of(&filter_social_video(&input)).len(), 1);
    }

    #[test]
    fn test_invalid_json_is_byte_identical_noop() {
        let input = "this is not json {";
        assert_eq!(filter_social_video(input), input);
    }

    #[test]
    fn test_document_without_media_passes_through() {
        let input = json!({"headline": "h", "summary": "s"}).to_string();
        let output = filter_social_video(&input);
        assert_eq!(
            serde_json::from_str::<Value>(&output).unwrap(),
            serde_json::from_str::<Value>(&input).unwrap()
        );
    }

    #[test]
    fn test_filter_never_increases_video_count() {
        let input = json!({
            "media": [
                {"url": "https://video.twimg.com/a.mp4", "type": "video"},
                {"url": "https://cdn.example.com/b.mp4", "type": "video"},
                {"url": "https://pbs.twimg.com/c.jpg", "type": "image"},
            ]
        })
        .to_string();

        let count_videos = |entries: &[Value]| {
            entries
                .iter()
                .filter(|e| e["type"] == "video")
                .count()
        };

        let before = count_videos(&media_of(&input));
        let after = count_videos(&media_of(&filter_social_video(&input)));
        assert!(after <= before);
    }
}
