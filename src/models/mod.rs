//! Data models for the upload coordinator.
//!
//! Sessions live only in memory (see `services::session_registry`); the
//! remaining types are the JSON shapes exchanged with clients.

pub mod upload;
