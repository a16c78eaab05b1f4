//! Trait definitions for inference backends.

use tokio_util::sync::CancellationToken;

use crate::error::TtsResult;
use crate::types::AudioChunk;

/// Lazy, finite, non-restartable sequence of synthesized chunks.
///
/// A `None` item is a malformed frame (the engine produced nothing usable);
/// consumers must reject it rather than skip it.
pub type ChunkStream = Box<dyn Iterator<Item = TtsResult<Option<AudioChunk>>> + Send>;

/// Pretrained speech model exposing one capability per synthesis mode.
///
/// Implementations block the calling thread while producing each chunk, so
/// callers on an async runtime should drive the stream from a blocking task.
pub trait InferenceEngine: Send + Sync {
    /// Native output sample rate, or `None` until the model is loaded.
    fn sample_rate(&self) -> Option<u32>;

    /// Built-in speaker identifiers.
    fn speakers(&self) -> Vec<String>;

    /// Synthesize with a built-in speaker.
    fn pretrained(
        &self,
        text: &str,
        speaker: &str,
        opts: &InferenceOptions,
    ) -> TtsResult<ChunkStream>;

    /// Zero-shot voice clone from a reference clip and its transcript.
    ///
    /// # Arguments
    /// * `prompt_text` - Transcript of the reference clip
    /// * `prompt` - Post-processed 16 kHz reference waveform
    fn zero_shot(
        &self,
        text: &str,
        prompt_text: &str,
        prompt: &[f32],
        opts: &InferenceOptions,
    ) -> TtsResult<ChunkStream>;

    /// Clone a reference voice speaking another language.
    fn cross_lingual(
        &self,
        text: &str,
        prompt: &[f32],
        opts: &InferenceOptions,
    ) -> TtsResult<ChunkStream>;

    /// Reference voice steered by a natural-language instruction.
    fn instruct(
        &self,
        text: &str,
        instruction: &str,
        prompt: &[f32],
        opts: &InferenceOptions,
    ) -> TtsResult<ChunkStream>;
}

/// Per-call inference options.
#[derive(Debug, Clone)]
pub struct InferenceOptions {
    /// Yield audio incrementally instead of one chunk per text segment.
    pub stream: bool,
    /// Speed factor (1.0 = natural pace).
    pub speed: f32,
    /// Seed for every random source the engine owns.
    pub seed: u64,
    /// Cancelled when the caller gives up on the request.
    pub cancel: CancellationToken,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            stream: false,
            speed: 1.0,
            seed: 0,
            cancel: CancellationToken::new(),
        }
    }
}

impl InferenceOptions {
    /// Create new inference options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the streaming flag.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Set the speed factor.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
