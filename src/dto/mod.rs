pub mod admin;
pub mod common;
pub mod health;
pub mod public;
pub mod sse;
pub mod validation;
