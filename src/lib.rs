//! Library crate for emoji-quiz-back, exposing modules for the binary and integration tests.

/// Configuration loading.
pub mod config;
/// Persistence and content access.
pub mod dao;
/// Wire payloads.
pub mod dto;
/// Service and HTTP errors.
pub mod error;
/// Room ownership across nodes.
pub mod ring;
/// Live rooms and their rules.
pub mod room;
/// HTTP and WebSocket routes.
pub mod routes;
/// Business services behind the routes.
pub mod services;
/// Shared state, room snapshots and the reducer.
pub mod state;
