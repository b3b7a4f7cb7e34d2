//! Shared test fakes for the generation services

#![allow(dead_code)]

use async_trait::async_trait;
use briefcast_gen::models::{ScriptSegment, VideoSegmentResult};
use briefcast_gen::services::{
    ChatError, ChatService, ChatSignal, SpeechError, SpeechService, VideoError, VideoService,
};
use briefcast_gen::ServiceClients;
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Scripted chat service
pub struct FakeChat {
    /// Signals replayed into the caller's channel before the stream returns
    pub signals: Vec<ChatSignal>,
    /// Stream outcome; `Err` becomes a network-level chat error
    pub briefing: Result<String, String>,
    /// `complete` outcome
    pub script_response: Result<String, String>,
}

impl Default for FakeChat {
    fn default() -> Self {
        Self {
            signals: Vec::new(),
            briefing: Ok(sample_briefing().to_string()),
            script_response: Ok(sample_script_response().to_string()),
        }
    }
}

#[async_trait]
impl ChatService for FakeChat {
    async fn stream_briefing(
        &self,
        _topic: &str,
        _location: &str,
        signals: mpsc::UnboundedSender<ChatSignal>,
    ) -> Result<String, ChatError> {
        for signal in &self.signals {
            let _ = signals.send(signal.clone());
        }
        self.briefing
            .clone()
            .map_err(ChatError::Network)
    }

    async fn complete(
        &self,
        _model: &str,
        _system: &str,
        _user: &str,
    ) -> Result<String, ChatError> {
        self.script_response.clone().map_err(ChatError::Network)
    }
}

/// Speech service that records inputs instead of synthesizing
#[derive(Default)]
pub struct FakeSpeech {
    /// Error message to fail with, if any
    pub fail_with: Option<String>,
    /// Narration texts passed to `synthesize`
    pub texts: Mutex<Vec<String>>,
}

#[async_trait]
impl SpeechService for FakeSpeech {
    async fn synthesize(&self, text: &str, filename: &str) -> Result<String, SpeechError> {
        self.texts.lock().unwrap().push(text.to_string());
        match &self.fail_with {
            Some(message) => Err(SpeechError::Service(message.clone())),
            None => Ok(format!("/audio/{}", filename)),
        }
    }
}

/// Video service with scriptable per-index failures
#[derive(Default)]
pub struct FakeVideo {
    /// Segment indices whose generation "fails" (becomes a hole)
    pub fail_indices: HashSet<usize>,
    /// Fail the combine step outright
    pub fail_combine: bool,
    /// Hole layout seen by `combine`: (batch length, hole indices)
    pub combined: Mutex<Vec<(usize, Vec<usize>)>>,
}

#[async_trait]
impl VideoService for FakeVideo {
    async fn generate_segment(
        &self,
        segment: &ScriptSegment,
        index: usize,
    ) -> Option<VideoSegmentResult> {
        if self.fail_indices.contains(&index) {
            return None;
        }
        Some(VideoSegmentResult {
            index,
            remote_url: format!("https://cdn.test/seg_{}.mp4", index),
            start_sec: segment.start_sec,
            end_sec: segment.end_sec,
            narration: segment.narration.clone(),
        })
    }

    async fn combine(
        &self,
        results: &[Option<VideoSegmentResult>],
        filename: &str,
    ) -> Result<String, VideoError> {
        let holes: Vec<usize> = results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.is_none().then_some(i))
            .collect();
        self.combined
            .lock()
            .unwrap()
            .push((results.len(), holes.clone()));

        if self.fail_combine {
            return Err(VideoError::Concat("scripted combine failure".to_string()));
        }
        if holes.len() == results.len() {
            return Err(VideoError::NoSegments);
        }
        Ok(format!("/videos/{}", filename))
    }
}

/// Briefing document returned by the default fake chat stream
pub fn sample_briefing() -> serde_json::Value {
    json!({
        "headline": "Strong earthquake strikes coastal region",
        "summary": "A magnitude 7.1 earthquake struck offshore early Monday.",
        "confirmed_facts": [{"text": "magnitude 7.1", "sourceUrl": "https://x.com/usgs/1"}],
        "unconfirmed_claims": ["bridge damage reported"],
        "recent_changes": ["tsunami advisory lifted"],
        "watch_next": ["aftershock activity"],
        "media": []
    })
}

/// Script response with three well-ordered segments
pub fn sample_script_response() -> serde_json::Value {
    json!({
        "segments": [
            {"start_sec": 0, "end_sec": 10, "narration": "A major quake struck.",
             "visuals": "Map of the coastline", "overlay_text": "BREAKING"},
            {"start_sec": 10, "end_sec": 22, "narration": "Officials confirmed the magnitude.",
             "visuals": "Text card with confirmed facts"},
            {"start_sec": 22, "end_sec": 34, "narration": "Watch for aftershocks.",
             "visuals": "Timeline of seismic activity"},
        ]
    })
}

/// Bundle fakes into the state's client set
pub fn fake_clients(chat: FakeChat, speech: FakeSpeech, video: FakeVideo) -> ServiceClients {
    ServiceClients {
        chat: Arc::new(chat),
        speech: Arc::new(speech),
        video: Arc::new(video),
    }
}
