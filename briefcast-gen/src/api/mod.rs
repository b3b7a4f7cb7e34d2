//! HTTP API handlers for briefcast-gen

pub mod briefing;
pub mod health;
pub mod ws;

pub use briefing::briefing_routes;
pub use health::health_routes;
pub use ws::ws_routes;
