//! Pipeline orchestrator
//!
//! Drives one briefing request through its stages in order: briefing
//! research (streamed), media filtering, script composition, speech
//! synthesis, per-segment video generation, and final concatenation.
//! Progress events are pushed to the caller's channel as stages advance.
//!
//! Failure policy is stage-dependent. Briefing generation and script
//! composition are load-bearing: their failures terminate the request with
//! an error event. Audio and video are enrichments: their failures are
//! reported as status messages and the briefing result is still delivered.
//!
//! Cancellation is cooperative. The token is checked between stages and
//! between video jobs; a cancelled request emits nothing further.

use crate::services::{
    join_narration, media_filter::filter_social_video, script_composer, ChatService, ChatSignal,
    SpeechService, VideoService,
};
use briefcast_common::ProgressEvent;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::StageOutcome;
use crate::models::{BriefingRequest, ScriptSegment, VideoSegmentResult};

/// Orchestrates one briefing generation request end to end
pub struct PipelineOrchestrator {
    chat: Arc<dyn ChatService>,
    speech: Arc<dyn SpeechService>,
    video: Arc<dyn VideoService>,
}

impl PipelineOrchestrator {
    pub fn new(
        chat: Arc<dyn ChatService>,
        speech: Arc<dyn SpeechService>,
        video: Arc<dyn VideoService>,
    ) -> Self {
        Self {
            chat,
            speech,
            video,
        }
    }

    /// Run the full pipeline for one request
    ///
    /// Exactly one terminal event (result or error) is emitted unless the
    /// token is cancelled first. Send failures are ignored: a gone receiver
    /// means the client left, and the worker winds down on the next
    /// cancellation check.
    pub async fn run(
        &self,
        request: BriefingRequest,
        events: mpsc::UnboundedSender<ProgressEvent>,
        cancel: CancellationToken,
    ) {
        info!(topic = %request.topic, location = %request.location, "Pipeline started");

        let _ = events.send(ProgressEvent::status("Starting briefing generation"));

        // Stage 1: streamed briefing research
        let raw_briefing = match self.stream_briefing(&request, &events).await {
            Ok(text) => text,
            Err(message) => {
                error!(topic = %request.topic, error = %message, "Briefing generation failed");
                let _ = events.send(ProgressEvent::error(message));
                return;
            }
        };

        if cancel.is_cancelled() {
            info!(topic = %request.topic, "Pipeline cancelled after briefing stage");
            return;
        }

        // Stage 2: drop non-embeddable social-video media entries
        let filtered = filter_social_video(&raw_briefing);

        let mut briefing: Value = match serde_json::from_str(&filtered) {
            Ok(value) => value,
            Err(e) => {
                error!(topic = %request.topic, error = %e, "Briefing was not valid JSON");
                let _ = events.send(ProgressEvent::error(format!(
                    "Briefing response was not valid JSON: {}",
                    e
                )));
                return;
            }
        };
        if !briefing.is_object() {
            error!(topic = %request.topic, "Briefing JSON was not an object");
            let _ = events.send(ProgressEvent::error(
                "Briefing response was not a JSON object",
            ));
            return;
        }

        // Stage 3: timed production script
        let _ = events.send(ProgressEvent::status("Generating video script"));

        let segments = match script_composer::compose(self.chat.as_ref(), &briefing).await {
            Ok(segments) => segments,
            Err(e) => {
                error!(topic = %request.topic, error = %e, "Script composition failed");
                let _ = events.send(ProgressEvent::error(format!(
                    "Script generation failed: {}",
                    e
                )));
                return;
            }
        };

        if cancel.is_cancelled() {
            info!(topic = %request.topic, "Pipeline cancelled after script stage");
            return;
        }

        if !segments.is_empty() {
            briefing["script"] = serde_json::to_value(&segments).unwrap_or(Value::Null);

            let request_id = Uuid::new_v4().simple().to_string();

            // Stage 4: narration audio
            match self.synthesize_audio(&segments, &request_id, &events).await {
                StageOutcome::Done(url) => {
                    briefing["audio_url"] = Value::String(url);
                }
                StageOutcome::Empty => {}
                StageOutcome::Failed(message) => {
                    warn!(topic = %request.topic, error = %message, "Audio stage failed");
                    let _ = events.send(ProgressEvent::status(format!(
                        "Audio generation failed: {}",
                        message
                    )));
                }
            }

            if cancel.is_cancelled() {
                info!(topic = %request.topic, "Pipeline cancelled after audio stage");
                return;
            }

            // Stage 5: per-segment videos plus concatenation
            match self
                .generate_videos(&segments, &request_id, &events, &cancel)
                .await
            {
                StageOutcome::Done(url) => {
                    let _ = events.send(ProgressEvent::VideoReady { url: url.clone() });
                    briefing["video_url"] = Value::String(url);
                }
                StageOutcome::Empty => {}
                StageOutcome::Failed(message) => {
                    warn!(topic = %request.topic, error = %message, "Video stage failed");
                    let _ = events.send(ProgressEvent::status(format!(
                        "Video generation failed: {}",
                        message
                    )));
                }
            }
        } else {
            info!(topic = %request.topic, "Empty script; skipping audio and video stages");
        }

        if cancel.is_cancelled() {
            info!(topic = %request.topic, "Pipeline cancelled before result delivery");
            return;
        }

        let briefing_text = briefing.to_string();
        info!(topic = %request.topic, bytes = briefing_text.len(), "Pipeline complete");
        let _ = events.send(ProgressEvent::Result {
            briefing: briefing_text,
        });
    }

    /// Stream the briefing, forwarding side-channel signals as events
    ///
    /// A reasoning indicator is surfaced at most once per request; tool
    /// invocations are surfaced on first occurrence per tool name.
    async fn stream_briefing(
        &self,
        request: &BriefingRequest,
        events: &mpsc::UnboundedSender<ProgressEvent>,
    ) -> Result<String, String> {
        let _ = events.send(ProgressEvent::status("Connected to research service"));

        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel::<ChatSignal>();

        let forwarder_events = events.clone();
        let forwarder = tokio::spawn(async move {
            let mut thinking_sent = false;
            let mut seen_tools: HashSet<String> = HashSet::new();

            while let Some(signal) = signal_rx.recv().await {
                match signal {
                    ChatSignal::Reasoning => {
                        if !thinking_sent {
                            thinking_sent = true;
                            let _ = forwarder_events.send(ProgressEvent::Thinking {
                                message: "Analyzing sources".to_string(),
                            });
                        }
                    }
                    ChatSignal::Tool { name, query } => {
                        if seen_tools.insert(name.clone()) {
                            let _ = forwarder_events.send(ProgressEvent::Tool { name, query });
                        }
                    }
                    ChatSignal::Content(text) => {
                        let _ = forwarder_events.send(ProgressEvent::Chunk { text });
                    }
                }
            }
        });

        let result = self
            .chat
            .stream_briefing(&request.topic, &request.location, signal_tx)
            .await;

        // sender side is dropped once stream_briefing returns, so the
        // forwarder drains and exits; awaiting it keeps event order intact
        let _ = forwarder.await;

        result.map_err(|e| format!("Briefing generation failed: {}", e))
    }

    async fn synthesize_audio(
        &self,
        segments: &[ScriptSegment],
        request_id: &str,
        events: &mpsc::UnboundedSender<ProgressEvent>,
    ) -> StageOutcome<String> {
        let narration = join_narration(segments);
        if narration.trim().is_empty() {
            return StageOutcome::Empty;
        }

        let _ = events.send(ProgressEvent::status("Generating narration audio"));

        let filename = format!("briefing_{}.wav", request_id);
        match self.speech.synthesize(&narration, &filename).await {
            Ok(url) => StageOutcome::Done(url),
            Err(e) => StageOutcome::Failed(e.to_string()),
        }
    }

    /// Generate per-segment videos sequentially, then concatenate
    ///
    /// Failed segments stay in the batch as positional holes. The combine
    /// step only fails the stage when no segment survived or assembly
    /// itself failed.
    async fn generate_videos(
        &self,
        segments: &[ScriptSegment],
        request_id: &str,
        events: &mpsc::UnboundedSender<ProgressEvent>,
        cancel: &CancellationToken,
    ) -> StageOutcome<String> {
        let _ = events.send(ProgressEvent::status("Generating video segments"));

        let mut results: Vec<Option<VideoSegmentResult>> = Vec::with_capacity(segments.len());
        for (index, segment) in segments.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Video stage cancelled mid-batch");
                return StageOutcome::Empty;
            }
            results.push(self.video.generate_segment(segment, index).await);
        }

        let survivors = results.iter().flatten().count();
        if survivors == 0 {
            return StageOutcome::Failed("no video segments were generated".to_string());
        }

        if cancel.is_cancelled() {
            return StageOutcome::Empty;
        }

        let _ = events.send(ProgressEvent::status("Combining video segments"));

        let filename = format!("briefing_{}.mp4", request_id);
        match self.video.combine(&results, &filename).await {
            Ok(url) => StageOutcome::Done(url),
            Err(e) => StageOutcome::Failed(e.to_string()),
        }
    }
}
