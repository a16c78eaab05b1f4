//! # tts-core
//!
//! Core types, traits, and error definitions for the synthesis gateway.
//!
//! This crate provides the foundational abstractions used across all other crates
//! in the workspace, including:
//!
//! - Request and result types (`SynthesisRequest`, `Mode`, `AudioChunk`, etc.)
//! - The `InferenceEngine` trait implemented by TTS backends
//! - Unified error handling via `TtsError`
//! - Configuration structures

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::ServiceConfig;
pub use error::{TtsError, TtsResult};
pub use traits::{ChunkStream, InferenceEngine, InferenceOptions};
pub use types::{AudioChunk, Mode, ReferenceAudio, SynthesisRequest, SynthesisResult};
