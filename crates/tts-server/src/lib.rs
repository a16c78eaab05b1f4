//! # tts-server
//!
//! HTTP gateway for request-to-audio synthesis.
//!
//! Provides:
//! - `POST /tts` synthesis endpoint
//! - `GET /download` for synthesized files
//! - `GET /` busy status
//! - Health, info and Prometheus metrics endpoints

pub mod api;
pub mod error;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, TtsServer, router};
