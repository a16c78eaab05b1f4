//! # runtime
//!
//! Synthesis orchestration for the gateway.
//!
//! This crate provides:
//! - The request-to-audio pipeline (`SynthesisOrchestrator`)
//! - Single-slot admission control backing the busy flag
//! - Reference audio download and transcoding
//! - Scratch storage with request-scoped cleanup and a TTL reaper
//! - The bundled `SyntheticEngine`
//! - Structured logging and metrics

pub mod acquire;
pub mod admission;
pub mod engine;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod scratch;

pub use acquire::{AcquiredReference, AudioAcquirer};
pub use admission::{Admission, AdmissionPermit};
pub use engine::{EngineConfig, SyntheticEngine};
pub use metrics::TtsMetrics;
pub use orchestrator::{SynthesisOrchestrator, concatenate_chunks, dispatch};
pub use scratch::{ScratchDir, ScratchFile};
