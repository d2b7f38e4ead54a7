/// Same-origin key-value storage for engine state and the publish cache.
pub mod local_store;
/// Database model definitions and document addressing.
pub mod models;
/// Shared poll document backends.
pub mod poll_store;
/// Storage abstraction layer for database operations.
pub mod storage;
