//! Library crate for bookclub-poll, exposing modules for binaries and integration tests.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod outcome;
pub mod routes;
pub mod services;
pub mod state;
pub mod subscription;
