//! Video generation and concatenation
//!
//! Per segment: submit one generation job, then poll its status endpoint on
//! a fixed interval until it is ready, fails, or exceeds the ceiling. The
//! status contract is the service's: a response without a "status" field
//! means the job is done and carries the result URL. Failed or timed-out
//! segments become positional holes; they never abort the batch.
//!
//! Combining downloads the surviving segments into a per-request scratch
//! directory and concatenates them with ffmpeg, trying a lossless stream
//! copy first and falling back to one transcode attempt.

use crate::models::{ScriptSegment, VideoSegmentResult};
use crate::services::VideoService;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

const XAI_API_BASE: &str = "https://api.x.ai/v1";

const VIDEO_MODEL: &str = "grok-imagine-video-a2";

/// Fixed status polling interval
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Per-job generation ceiling
const JOB_TIMEOUT: Duration = Duration::from_secs(180);

/// The generation API caps clip length; longer segments are truncated in the
/// request only, the script content is unchanged
const MAX_CLIP_SECS: u32 = 15;

/// Video generation errors
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("No video segments were generated")]
    NoSegments,

    #[error("Download failed: {0}")]
    Download(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Concatenation failed: {0}")]
    Concat(String),
}

/// Outcome of one status poll
#[derive(Debug, PartialEq)]
enum PollState {
    Ready(String),
    Pending,
    Failed(String),
    Unknown(String),
}

/// xAI video generation client
pub struct XaiVideoClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    video_dir: PathBuf,
    mux_command: String,
}

impl XaiVideoClient {
    pub fn new(
        api_key: impl Into<String>,
        video_dir: impl Into<PathBuf>,
    ) -> Result<Self, VideoError> {
        Self::with_base_url(api_key, XAI_API_BASE, video_dir)
    }

    /// Override the API base URL (used by tests)
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        video_dir: impl Into<PathBuf>,
    ) -> Result<Self, VideoError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| VideoError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into(),
            video_dir: video_dir.into(),
            mux_command: "ffmpeg".to_string(),
        })
    }

    /// Override the muxing command (used by tests)
    pub fn with_mux_command(mut self, command: impl Into<String>) -> Self {
        self.mux_command = command.into();
        self
    }

    /// Submit one generation job, returning its request id
    async fn submit(&self, prompt: &str, duration_secs: u32) -> Result<String, VideoError> {
        let body = json!({
            "prompt": prompt,
            "model": VIDEO_MODEL,
            "duration": duration_secs,
        });

        let response = self
            .http
            .post(format!("{}/videos/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VideoError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VideoError::Api(status.as_u16(), error_text));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| VideoError::MalformedResponse(e.to_string()))?;

        payload["request_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| VideoError::MalformedResponse("missing request_id".to_string()))
    }

    /// One status poll for a submitted job
    async fn poll(&self, request_id: &str) -> Result<PollState, VideoError> {
        let response = self
            .http
            .get(format!("{}/videos/{}", self.base_url, request_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| VideoError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VideoError::Api(status.as_u16(), error_text));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| VideoError::MalformedResponse(e.to_string()))?;

        Ok(interpret_poll_response(&payload))
    }

    /// Download a remote media file to `dest`
    async fn download(&self, url: &str, dest: &Path) -> Result<(), VideoError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| VideoError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VideoError::Download(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let mut stream = response.bytes_stream();
        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = stream.next().await {
            let data = chunk.map_err(|e| VideoError::Download(e.to_string()))?;
            file.write_all(&data).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl VideoService for XaiVideoClient {
    async fn generate_segment(
        &self,
        segment: &ScriptSegment,
        index: usize,
    ) -> Option<VideoSegmentResult> {
        let prompt = build_segment_prompt(segment);
        let duration = request_duration_secs(segment);

        let request_id = match self.submit(&prompt, duration).await {
            Ok(id) => id,
            Err(e) => {
                warn!(index, error = %e, "Video job submission failed");
                return None;
            }
        };

        info!(index, request_id = %request_id, "Video generation started");

        let started = Instant::now();
        loop {
            if started.elapsed() > JOB_TIMEOUT {
                warn!(index, request_id = %request_id, "Video generation timed out");
                return None;
            }

            match self.poll(&request_id).await {
                Ok(PollState::Ready(url)) => {
                    info!(index, request_id = %request_id, "Video segment ready");
                    return Some(VideoSegmentResult {
                        index,
                        remote_url: url,
                        start_sec: segment.start_sec,
                        end_sec: segment.end_sec,
                        narration: segment.narration.clone(),
                    });
                }
                Ok(PollState::Pending) => {
                    debug!(index, request_id = %request_id, "Video job still pending");
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Ok(PollState::Failed(detail)) => {
                    warn!(index, request_id = %request_id, detail = %detail, "Video generation failed");
                    return None;
                }
                Ok(PollState::Unknown(status)) => {
                    warn!(index, request_id = %request_id, status = %status, "Unknown video job status");
                    return None;
                }
                Err(e) => {
                    warn!(index, request_id = %request_id, error = %e, "Video status poll failed");
                    return None;
                }
            }
        }
    }

    async fn combine(
        &self,
        results: &[Option<VideoSegmentResult>],
        filename: &str,
    ) -> Result<String, VideoError> {
        let survivors: Vec<&VideoSegmentResult> = results.iter().flatten().collect();
        if survivors.is_empty() {
            return Err(VideoError::NoSegments);
        }

        info!(
            survivors = survivors.len(),
            total = results.len(),
            "Combining video segments"
        );

        std::fs::create_dir_all(&self.video_dir)?;

        // per-request scratch directory: concurrent combines never collide
        let scratch = self
            .video_dir
            .join(format!("scratch-{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&scratch)?;

        let result = self.combine_in(&scratch, &survivors, filename).await;

        // cleanup is best-effort on both paths: on success the output file
        // already exists and must not be lost to a failed removal
        if let Err(cleanup) = std::fs::remove_dir_all(&scratch) {
            warn!(error = %cleanup, "Failed to remove scratch directory");
        }

        result
    }
}

impl XaiVideoClient {
    async fn combine_in(
        &self,
        scratch: &Path,
        survivors: &[&VideoSegmentResult],
        filename: &str,
    ) -> Result<String, VideoError> {
        let mut manifest = String::new();
        for (position, result) in survivors.iter().enumerate() {
            let clip_name = format!("seg_{:03}.mp4", position);
            let dest = scratch.join(&clip_name);
            // a failed download aborts the whole combine: unlike generation
            // there is no hole concept at this stage
            self.download(&result.remote_url, &dest).await?;
            manifest.push_str(&format!("file '{}'\n", clip_name));
        }

        let manifest_path = scratch.join("files.txt");
        std::fs::write(&manifest_path, manifest)?;

        // the mux command runs with the scratch dir as cwd, so the output
        // path must be absolute
        let output = std::fs::canonicalize(&self.video_dir)?.join(filename);

        let mux = self.mux_command.as_str();
        run_concat_strategies(|strategy| run_mux(mux, scratch, &output, strategy)).await?;

        info!(output = %output.display(), "Video segments combined");
        Ok(format!("/videos/{}", filename))
    }
}

/// Concatenation strategy, tried in order
#[derive(Debug, Clone, Copy, PartialEq)]
enum ConcatStrategy {
    /// Lossless stream copy
    Copy,
    /// Single transcode retry when stream copy fails
    Transcode,
}

/// Drive the strategy sequence: one copy attempt, then at most one
/// transcode attempt. Launch failures abort without a fallback.
async fn run_concat_strategies<F, Fut>(mut attempt: F) -> Result<(), VideoError>
where
    F: FnMut(ConcatStrategy) -> Fut,
    Fut: std::future::Future<Output = Result<bool, VideoError>>,
{
    if attempt(ConcatStrategy::Copy).await? {
        return Ok(());
    }

    warn!("Stream copy failed; retrying with transcode");
    if attempt(ConcatStrategy::Transcode).await? {
        return Ok(());
    }

    Err(VideoError::Concat(
        "muxing failed after transcode fallback".to_string(),
    ))
}

/// Run one mux invocation over the scratch manifest; false means a
/// non-zero exit
async fn run_mux(
    command: &str,
    scratch: &Path,
    output: &Path,
    strategy: ConcatStrategy,
) -> Result<bool, VideoError> {
    let mut mux = Command::new(command);
    mux.current_dir(scratch)
        .args(["-y", "-f", "concat", "-safe", "0", "-i", "files.txt"]);

    match strategy {
        ConcatStrategy::Copy => mux.args(["-c", "copy"]),
        ConcatStrategy::Transcode => {
            mux.args(["-c:v", "libx264", "-preset", "veryfast", "-c:a", "aac"])
        }
    };
    mux.arg(output);

    let status = mux
        .status()
        .await
        .map_err(|e| VideoError::Concat(format!("failed to launch {}: {}", command, e)))?;

    Ok(status.success())
}

/// Interpret one status-poll payload
///
/// The service's documented contract: an absent "status" field means the job
/// finished and the result URL is at video.url. Anything besides "pending"
/// or "failed" is treated as unknown and gives up rather than polling
/// forever.
fn interpret_poll_response(payload: &Value) -> PollState {
    match payload.get("status").and_then(Value::as_str) {
        None => match payload["video"]["url"].as_str() {
            Some(url) => PollState::Ready(url.to_string()),
            None => PollState::Unknown("ready without video url".to_string()),
        },
        Some("pending") => PollState::Pending,
        Some("failed") => PollState::Failed(
            payload
                .get("error")
                .map(Value::to_string)
                .unwrap_or_else(|| "unspecified".to_string()),
        ),
        Some(other) => PollState::Unknown(other.to_string()),
    }
}

/// Build the generation prompt for one segment
fn build_segment_prompt(segment: &ScriptSegment) -> String {
    let mut prompt = format!(
        "News briefing visual: {}. Narration context: {}",
        segment.visuals, segment.narration
    );
    if let Some(overlay) = &segment.overlay_text {
        prompt.push_str(&format!(". On-screen text: {}", overlay));
    }
    prompt
}

/// Clip duration for the request, capped at the service maximum
fn request_duration_secs(segment: &ScriptSegment) -> u32 {
    segment.duration_secs().clamp(1, MAX_CLIP_SECS)
}
