/// Candidate feed loading and CSV parsing.
pub mod candidates;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Cross-reader transports for publish cache notifications.
pub mod local_broadcast;
/// Client of the shared realtime poll document.
pub mod poll_bridge;
/// Poll lifecycle orchestration.
pub mod poll_service;
/// Same-device mirror of the published poll.
pub mod publish_cache;
/// Reel operations and publishing.
pub mod selection_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Live feed forwarders.
pub mod sync_service;
