//! Speech synthesis over the xAI realtime websocket API
//!
//! One duplex session per synthesis: configure the session (voice, PCM
//! 24 kHz mono in both directions, server-side turn detection), send the
//! full narration as a single conversation item, request an audio-only
//! response, then accumulate base64 audio deltas until the service signals
//! completion. The decoded PCM is written as a WAV file.

use crate::models::ScriptSegment;
use crate::services::SpeechService;
use async_trait::async_trait;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
};
use tracing::{debug, info, warn};

const REALTIME_URL: &str = "wss://api.x.ai/v1/realtime";

/// Voice options: Ara, Rex, Sal, Eve, Leo
const TTS_VOICE: &str = "Ara";

const SAMPLE_RATE: u32 = 24_000;

/// Speech synthesis errors
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Speech service error: {0}")]
    Service(String),

    #[error("Audio decode error: {0}")]
    Decode(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// xAI realtime speech client
pub struct XaiSpeechClient {
    api_key: String,
    url: String,
    audio_dir: PathBuf,
}

impl XaiSpeechClient {
    pub fn new(api_key: impl Into<String>, audio_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_key: api_key.into(),
            url: REALTIME_URL.to_string(),
            audio_dir: audio_dir.into(),
        }
    }

    /// Run one synthesis session, returning the raw PCM bytes
    async fn text_to_speech(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| SpeechError::Connect(e.to_string()))?;
        request.headers_mut().insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| SpeechError::Connect(e.to_string()))?,
        );

        let (mut ws, _) = connect_async(request)
            .await
            .map_err(|e| SpeechError::Connect(e.to_string()))?;

        debug!("Realtime session connected");

        let session_config = json!({
            "type": "session.update",
            "session": {
                "voice": TTS_VOICE,
                "instructions": "You are a text-to-speech assistant. Read the text exactly as provided.",
                "turn_detection": {"type": "server_vad"},
                "audio": {
                    "input": {"format": {"type": "audio/pcm", "rate": SAMPLE_RATE}},
                    "output": {"format": {"type": "audio/pcm", "rate": SAMPLE_RATE}},
                },
            },
        });

        let text_message = json!({
            "type": "conversation.item.create",
            "item": {
                "type": "message",
                "role": "user",
                "content": [{"type": "input_text", "text": text}],
            },
        });

        let response_request = json!({
            "type": "response.create",
            "response": {"modalities": ["audio"]},
        });

        for message in [&session_config, &text_message, &response_request] {
            ws.send(Message::Text(message.to_string()))
                .await
                .map_err(|e| SpeechError::Protocol(e.to_string()))?;
        }

        let mut audio_chunks: Vec<String> = Vec::new();

        loop {
            let frame = ws
                .next()
                .await
                .ok_or_else(|| {
                    SpeechError::Protocol("connection closed before audio completed".to_string())
                })?
                .map_err(|e| SpeechError::Protocol(e.to_string()))?;

            let Message::Text(payload) = frame else {
                if matches!(frame, Message::Close(_)) {
                    return Err(SpeechError::Protocol(
                        "connection closed before audio completed".to_string(),
                    ));
                }
                continue;
            };

            let event: Value = serde_json::from_str(&payload)
                .map_err(|e| SpeechError::Protocol(e.to_string()))?;

            match classify_event(&event) {
                SpeechEvent::Delta(delta) => {
                    audio_chunks.push(delta);
                }
                SpeechEvent::Done => break,
                SpeechEvent::ServiceError(detail) => {
                    return Err(SpeechError::Service(detail));
                }
                SpeechEvent::Other => {}
            }
        }

        let _ = ws.close(None).await;

        base64::engine::general_purpose::STANDARD
            .decode(audio_chunks.concat())
            .map_err(|e| SpeechError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SpeechService for XaiSpeechClient {
    async fn synthesize(&self, text: &str, filename: &str) -> Result<String, SpeechError> {
        info!(chars = text.len(), filename = %filename, "Starting speech synthesis");

        let audio_bytes = self.text_to_speech(text).await?;

        std::fs::create_dir_all(&self.audio_dir)
            .map_err(|e| SpeechError::Protocol(format!("create audio dir: {}", e)))?;
        let path = self.audio_dir.join(filename);

        if let Err(e) = write_wav(&path, &audio_bytes) {
            // never leave a partial file behind
            let _ = std::fs::remove_file(&path);
            return Err(e);
        }

        info!(path = %path.display(), bytes = audio_bytes.len(), "Audio saved");
        Ok(format!("/audio/{}", filename))
    }
}

/// Realtime event classification
enum SpeechEvent {
    Delta(String),
    Done,
    ServiceError(String),
    Other,
}

fn classify_event(event: &Value) -> SpeechEvent {
    match event.get("type").and_then(Value::as_str) {
        Some("response.output_audio.delta") => match event.get("delta").and_then(Value::as_str) {
            Some(delta) => SpeechEvent::Delta(delta.to_string()),
            None => {
                warn!("Audio delta event without payload");
                SpeechEvent::Other
            }
        },
        Some("response.output_audio.done") => SpeechEvent::Done,
        Some("error") => SpeechEvent::ServiceError(event.to_string()),
        _ => SpeechEvent::Other,
    }
}

/// Space-join segment narrations into the synthesis input
pub fn join_narration(segments: &[ScriptSegment]) -> String {
    segments
        .iter()
        .map(|s| s.narration.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Write 16-bit little-endian PCM as a mono 24 kHz WAV file
fn write_wav(path: &Path, pcm: &[u8]) -> Result<(), SpeechError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in pcm.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn segment(narration: &str) -> ScriptSegment {
        ScriptSegment {
            start_sec: 0,
            end_sec: 10,
            narration: narration.to_string(),
            visuals: "v".to_string(),
            overlay_text: None,
        }
    }

    #[test]
    fn test_join_narration_space_joins() {
        let segments = vec![segment("First line."), segment("Second line.")];
        assert_eq!(join_narration(&segments), "First line. Second line.");
        assert_eq!(join_narration(&[]), "");
    }

    #[test]
    fn test_classify_delta_and_done() {
        let delta = json!({"type": "response.output_audio.delta", "delta": "AAAA"});
        assert!(matches!(classify_event(&delta), SpeechEvent::Delta(d) if d == "AAAA"));

        let done = json!({"type": "response.output_audio.done"});
        assert!(matches!(classify_event(&done), SpeechEvent::Done));
    }

    #[test]
    fn test_classify_error_and_unknown() {
        let error = json!({"type": "error", "message": "bad session"});
        assert!(matches!(
            classify_event(&error),
            SpeechEvent::ServiceError(_)
        ));

        let other = json!({"type": "session.updated"});
        assert!(matches!(classify_event(&other), SpeechEvent::Other));
    }

    #[test]
    fn test_write_wav_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        // two samples: 1 and -2 in little-endian i16
        let pcm = [0x01, 0x00, 0xFE, 0xFF];
        write_wav(&path, &pcm).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 24_000);
        assert_eq!(spec.bits_per_sample, 16);

        let samples: Vec<i16> = reader.into_samples().map(Result::unwrap).collect();
        assert_eq!(samples, vec![1, -2]);
    }
}
