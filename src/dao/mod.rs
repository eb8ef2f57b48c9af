/// Quiz content lookups (categories and answers).
pub mod content;
/// Room snapshot persistence.
pub mod room_store;
/// Storage abstraction layer for database operations.
pub mod storage;
