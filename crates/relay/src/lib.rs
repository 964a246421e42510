//! Room relay: HTTP fan-out of room messages plus the bootstrap snapshot API.

pub mod app;
pub mod config;
