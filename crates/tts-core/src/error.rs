//! Unified error types for the synthesis gateway.

/// Main error type for synthesis operations.
#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    /// The requested synthesis mode is not one of the recognized modes.
    #[error("invalid mode: {0}")]
    InvalidMode(String),

    /// Instructed synthesis was requested without instruction text.
    #[error("instruction text is required for instructed synthesis")]
    MissingInstruction,

    /// The mode needs reference audio and none could be resolved.
    #[error("reference audio is required for {mode} synthesis")]
    MissingReference { mode: String },

    /// Reference audio is sampled below the minimum prompt rate.
    #[error("reference audio sample rate {actual} Hz is below the minimum of {min} Hz")]
    SampleRateTooLow { actual: u32, min: u32 },

    /// Fetching reference audio failed.
    #[error("download failed: {0}")]
    Download(String),

    /// Converting reference audio to the canonical container failed.
    #[error("transcode failed: {0}")]
    Transcode(String),

    /// Any failure while acquiring reference audio.
    #[error("reference audio acquisition failed: {0}")]
    ReferenceAcquisition(#[source] Box<TtsError>),

    /// The engine yielded a chunk without usable audio.
    #[error("malformed chunk: {0}")]
    MalformedChunk(String),

    /// Chunks of one request disagree on sample rate.
    #[error("sample rate mismatch: expected {expected} Hz, found {found} Hz")]
    SampleRateMismatch { expected: u32, found: u32 },

    /// The engine produced no chunks.
    #[error("no audio chunks were produced")]
    EmptyResult,

    /// The engine has not been loaded yet.
    #[error("inference engine is not initialized")]
    EngineNotInitialized,

    /// Another synthesis is in flight.
    #[error("service is busy with another synthesis request")]
    Busy,

    /// Timeout during operation.
    #[error("operation timeout after {ms}ms")]
    Timeout { ms: u64 },

    /// Model inference error.
    #[error("inference error: {0}")]
    Inference(String),

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (should not happen in normal operation).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for Results with TtsError.
pub type TtsResult<T> = Result<T, TtsError>;

impl TtsError {
    /// Create an invalid mode error.
    pub fn invalid_mode(mode: impl Into<String>) -> Self {
        Self::InvalidMode(mode.into())
    }

    /// Create a download error with message.
    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    /// Create a transcode error with message.
    pub fn transcode(msg: impl Into<String>) -> Self {
        Self::Transcode(msg.into())
    }

    /// Wrap an acquisition failure.
    pub fn reference_acquisition(cause: TtsError) -> Self {
        Self::ReferenceAcquisition(Box::new(cause))
    }

    /// Create a malformed chunk error with message.
    pub fn malformed_chunk(msg: impl Into<String>) -> Self {
        Self::MalformedChunk(msg.into())
    }

    /// Create an inference error with message.
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create an invalid input error with message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a config error with message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error with message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error was caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidMode(_)
                | Self::MissingInstruction
                | Self::MissingReference { .. }
                | Self::SampleRateTooLow { .. }
                | Self::ReferenceAcquisition(_)
                | Self::Download(_)
                | Self::Transcode(_)
                | Self::InvalidInput(_)
        )
    }
}
