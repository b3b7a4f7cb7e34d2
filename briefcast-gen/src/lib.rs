//! briefcast-gen library interface
//!
//! Exposes the router, state, and pipeline for integration testing.

pub mod api;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use briefcast_common::AppConfig;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::warn;

use crate::services::{
    ChatService, SpeechService, VideoService, XaiChatClient, XaiSpeechClient, XaiVideoClient,
};

/// Upstream service clients, shared across handlers
///
/// Absent entirely when no API key is configured; endpoints that need the
/// clients report the missing credential per request instead of failing
/// startup.
#[derive(Clone)]
pub struct ServiceClients {
    pub chat: Arc<dyn ChatService>,
    pub speech: Arc<dyn SpeechService>,
    pub video: Arc<dyn VideoService>,
}

impl ServiceClients {
    /// Build the xAI-backed clients, or `None` when no API key is set
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Option<Self>> {
        let api_key = match config.require_api_key() {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Generation endpoints will reject requests");
                return Ok(None);
            }
        };

        let chat = XaiChatClient::new(api_key)?;
        let speech = XaiSpeechClient::new(api_key, &config.audio_dir);
        let video = XaiVideoClient::new(api_key, &config.video_dir)?;

        Ok(Some(Self {
            chat: Arc::new(chat),
            speech: Arc::new(speech),
            video: Arc::new(video),
        }))
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Resolved service configuration
    pub config: Arc<AppConfig>,
    /// Upstream clients, absent when credentials are missing
    pub clients: Option<ServiceClients>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, clients: Option<ServiceClients>) -> Self {
        Self {
            config: Arc::new(config),
            clients,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(api::health_routes())
        .merge(api::briefing_routes())
        .merge(api::ws_routes())
        .nest_service("/audio", ServeDir::new(&state.config.audio_dir))
        .nest_service("/videos", ServeDir::new(&state.config.video_dir))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Skipping unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}
