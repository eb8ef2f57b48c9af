/// Health check payloads.
pub mod health;
/// Room views for the HTTP API.
pub mod room;
/// Shared validators.
pub mod validation;
/// WebSocket frames.
pub mod ws;
