//! External generation services
//!
//! Each upstream collaborator sits behind a trait so the pipeline can be
//! exercised with fakes. The xAI-backed implementations live alongside:
//! chat completions (briefing + script), the realtime speech websocket,
//! and the video generation job API.

pub mod audio_synthesizer;
pub mod chat_client;
pub mod media_filter;
pub mod script_composer;
pub mod video_synthesizer;

pub use audio_synthesizer::{join_narration, SpeechError, XaiSpeechClient};
pub use chat_client::{ChatError, XaiChatClient};
pub use script_composer::ComposeError;
pub use video_synthesizer::{VideoError, XaiVideoClient};

use crate::models::{ScriptSegment, VideoSegmentResult};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Side-channel signals surfaced while a briefing generation streams
#[derive(Debug, Clone, PartialEq)]
pub enum ChatSignal {
    /// Model entered extended reasoning
    Reasoning,
    /// Tool invocation with a best-effort extracted query
    Tool { name: String, query: String },
    /// Plain text fragment, in arrival order
    Content(String),
}

/// Generative chat service (briefing and script generation)
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Run one streamed briefing generation with web-search tooling.
    ///
    /// Text fragments, reasoning indicators, and tool records are pushed to
    /// `signals` as they arrive; the fully accumulated text is returned.
    /// Signal delivery is best-effort: a dropped receiver never fails the
    /// call.
    async fn stream_briefing(
        &self,
        topic: &str,
        location: &str,
        signals: mpsc::UnboundedSender<ChatSignal>,
    ) -> Result<String, ChatError>;

    /// Single non-streamed generation call
    async fn complete(&self, model: &str, system: &str, user: &str) -> Result<String, ChatError>;
}

/// Text-to-speech service
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Synthesize `text` into a WAV file named `filename` under the audio
    /// root. Returns the client-facing path (e.g. "/audio/briefing.wav").
    /// No partial file is written on error.
    async fn synthesize(&self, text: &str, filename: &str) -> Result<String, SpeechError>;
}

/// Video generation service
#[async_trait]
pub trait VideoService: Send + Sync {
    /// Submit one generation job for `segment` and poll it to completion.
    /// `None` marks a failed or timed-out job; the caller keeps it as a
    /// positional hole.
    async fn generate_segment(
        &self,
        segment: &ScriptSegment,
        index: usize,
    ) -> Option<VideoSegmentResult>;

    /// Download the surviving segments and concatenate them into `filename`
    /// under the video root. Returns the client-facing path.
    async fn combine(
        &self,
        results: &[Option<VideoSegmentResult>],
        filename: &str,
    ) -> Result<String, VideoError>;
}
