//! Streaming briefing websocket endpoint
//!
//! One generation request per connection. The client's first text frame
//! carries the request (`{"topic": "...", "location": "..."}`); the server
//! then streams progress events in pipeline order and closes after the
//! terminal event. A client disconnect cancels the in-flight pipeline.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use briefcast_common::ProgressEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::BriefingRequest;
use crate::pipeline::PipelineOrchestrator;
use crate::AppState;

/// GET /ws/briefing
pub async fn briefing_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_briefing_socket(socket, state))
}

async fn handle_briefing_socket(mut socket: WebSocket, state: AppState) {
    let Some(request) = read_request(&mut socket).await else {
        let _ = send_event(
            &mut socket,
            &ProgressEvent::error("topic is required"),
        )
        .await;
        let _ = socket.close().await;
        return;
    };

    let Some(clients) = state.clients.clone() else {
        warn!("Briefing request rejected: service credentials not configured");
        let _ = send_event(
            &mut socket,
            &ProgressEvent::error("XAI_API_KEY not configured"),
        )
        .await;
        let _ = socket.close().await;
        return;
    };

    info!(topic = %request.topic, location = %request.location, "Briefing stream opened");

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let cancel = CancellationToken::new();

    let orchestrator =
        PipelineOrchestrator::new(clients.chat, clients.speech, clients.video);
    let worker_cancel = cancel.clone();
    tokio::spawn(async move {
        orchestrator.run(request, event_tx, worker_cancel).await;
    });

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Some(event) => {
                        let terminal = event.is_terminal();
                        if send_event(&mut socket, &event).await.is_err() {
                            debug!("Client send failed; cancelling pipeline");
                            cancel.cancel();
                            break;
                        }
                        if terminal {
                            break;
                        }
                    }
                    // worker exited without a terminal event (cancelled)
                    None => break,
                }
            }
            frame = socket.recv() => {
                match frame {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client disconnected; cancelling pipeline");
                        cancel.cancel();
                        break;
                    }
                    Some(Ok(_)) => {
                        // frames after the request are ignored
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "Websocket receive error; cancelling pipeline");
                        cancel.cancel();
                        break;
                    }
                }
            }
        }
    }

    let _ = socket.close().await;
}

/// Read the request from the connection's first text frame
async fn read_request(socket: &mut WebSocket) -> Option<BriefingRequest> {
    let frame = loop {
        match socket.recv().await? {
            Ok(Message::Text(text)) => break text,
            Ok(Message::Close(_)) | Err(_) => return None,
            // ping/pong and binary frames before the request are skipped
            Ok(_) => continue,
        }
    };

    let payload: serde_json::Value = serde_json::from_str(&frame).ok()?;
    let topic = payload
        .get("topic")
        .and_then(serde_json::Value::as_str)
        .filter(|t| !t.trim().is_empty())?
        .to_string();
    let location = payload
        .get("location")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);

    Some(BriefingRequest::new(topic, location))
}

async fn send_event(socket: &mut WebSocket, event: &ProgressEvent) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(event)
        .unwrap_or_else(|_| r#"{"type":"error","message":"serialization failed"}"#.to_string());
    socket.send(Message::Text(payload)).await
}

/// Build websocket routes
pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/ws/briefing", get(briefing_ws))
}
