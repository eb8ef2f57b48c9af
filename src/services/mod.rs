/// Health check service.
pub mod health_service;
/// Registry of resident rooms.
pub mod lobby;
/// Client frame to room action mapping and back.
pub mod protocol;
/// Eviction of rooms whose ownership moved.
pub mod rebalancer;
/// Read-only room queries.
pub mod room_service;
/// Room snapshot persistence.
pub mod saver;
/// Storage availability watcher.
pub mod storage_supervisor;
/// Idle room deletion.
pub mod supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
