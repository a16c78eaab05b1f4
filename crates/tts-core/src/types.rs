//! Core data types for the synthesis pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{TtsError, TtsResult};

/// Synthesis strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Built-in speaker voice, no reference audio.
    #[serde(rename = "pretrained")]
    PretrainedVoice,
    /// Zero-shot clone from a short reference clip and its transcript.
    #[default]
    #[serde(rename = "zero_shot")]
    QuickClone,
    /// Clone from a reference clip, speaking another language.
    #[serde(rename = "cross_lingual")]
    CrossLingualClone,
    /// Reference voice steered by a natural-language instruction.
    #[serde(rename = "instruct")]
    InstructedControl,
}

impl Mode {
    /// All recognized modes.
    pub const ALL: [Mode; 4] = [
        Mode::PretrainedVoice,
        Mode::QuickClone,
        Mode::CrossLingualClone,
        Mode::InstructedControl,
    ];

    /// Derive the mode from the instruction field: instructed when present,
    /// quick clone otherwise.
    pub fn from_instruction(instruction: Option<&str>) -> Self {
        match instruction {
            Some(text) if !text.trim().is_empty() => Mode::InstructedControl,
            _ => Mode::QuickClone,
        }
    }

    /// Whether this mode conditions on reference audio.
    pub fn needs_reference(self) -> bool {
        !matches!(self, Mode::PretrainedVoice)
    }

    /// Canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::PretrainedVoice => "pretrained",
            Mode::QuickClone => "zero_shot",
            Mode::CrossLingualClone => "cross_lingual",
            Mode::InstructedControl => "instruct",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = TtsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretrained" | "sft" => Ok(Mode::PretrainedVoice),
            "zero_shot" | "clone" => Ok(Mode::QuickClone),
            "cross_lingual" => Ok(Mode::CrossLingualClone),
            "instruct" | "instruct2" => Ok(Mode::InstructedControl),
            _ => Err(TtsError::invalid_mode(s)),
        }
    }
}

/// Slowest accepted speed factor.
pub const MIN_SPEED: f32 = 0.5;

/// Fastest accepted speed factor.
pub const MAX_SPEED: f32 = 2.0;

/// Treat blank strings as absent.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// A synthesis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisRequest {
    /// Unique request identifier (used in logs and nothing else).
    pub request_id: Uuid,
    /// Text to synthesize.
    pub text: String,
    /// Synthesis strategy.
    pub mode: Mode,
    /// Speaker for pretrained-voice synthesis.
    pub speaker_id: String,
    /// Transcript of the reference clip.
    pub reference_text: String,
    /// Where to fetch the reference clip from.
    pub reference_url: Option<String>,
    /// Natural-language instruction for instructed synthesis.
    pub instruction: Option<String>,
    /// Random seed for deterministic generation.
    pub seed: u64,
    /// Speed factor (1.0 = natural pace).
    pub speed: f32,
    /// Ask the engine for incremental chunks.
    pub stream: bool,
}

impl SynthesisRequest {
    /// Create a new synthesis request with default settings.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            text: text.into(),
            mode: Mode::default(),
            speaker_id: "default".to_string(),
            reference_text: String::new(),
            reference_url: None,
            instruction: None,
            seed: 0,
            speed: 1.0,
            stream: false,
        }
    }

    /// Set the mode explicitly.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the mode from the instruction field.
    pub fn with_derived_mode(mut self) -> Self {
        self.mode = Mode::from_instruction(self.instruction.as_deref());
        self
    }

    /// Set the speaker ID.
    pub fn with_speaker(mut self, speaker_id: impl Into<String>) -> Self {
        self.speaker_id = speaker_id.into();
        self
    }

    /// Set the reference transcript.
    pub fn with_reference_text(mut self, text: impl Into<String>) -> Self {
        self.reference_text = text.into();
        self
    }

    /// Set the reference audio URL. Blank values count as absent.
    pub fn with_reference_url(mut self, url: Option<String>) -> Self {
        self.reference_url = present(url);
        self
    }

    /// Set the instruction text. Blank values count as absent.
    pub fn with_instruction(mut self, instruction: Option<String>) -> Self {
        self.instruction = present(instruction);
        self
    }

    /// Set the seed for deterministic generation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the speed factor.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Set the streaming flag.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Check the request before any audio is fetched or generated.
    ///
    /// Reference sample rate is checked later, once the clip is resolved.
    pub fn validate(&self) -> TtsResult<()> {
        if self.text.trim().is_empty() {
            return Err(TtsError::invalid_input("text cannot be empty"));
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&self.speed) {
            return Err(TtsError::invalid_input(format!(
                "speed factor must be between {MIN_SPEED} and {MAX_SPEED}, got {}",
                self.speed
            )));
        }
        if self.mode == Mode::InstructedControl && self.instruction.is_none() {
            return Err(TtsError::MissingInstruction);
        }
        if self.mode.needs_reference() && self.reference_url.is_none() {
            return Err(TtsError::MissingReference {
                mode: self.mode.to_string(),
            });
        }
        Ok(())
    }
}

/// A chunk of synthesized audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// PCM samples (f32, mono).
    pub pcm: Arc<[f32]>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioChunk {
    /// Create a new audio chunk.
    pub fn new(pcm: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            pcm: pcm.into(),
            sample_rate,
        }
    }

    /// Get the number of samples in this chunk.
    pub fn num_samples(&self) -> usize {
        self.pcm.len()
    }

    /// Get the duration of this chunk in milliseconds.
    pub fn duration_ms(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.pcm.len() as f32 * 1000.0 / self.sample_rate as f32
    }
}

/// Reference clip resolved to a local canonical WAV.
#[derive(Debug, Clone)]
pub struct ReferenceAudio {
    /// Transcoded WAV in scratch storage.
    pub local_path: PathBuf,
    /// Native sample rate of the clip.
    pub sample_rate: u32,
    /// Mono waveform at `sample_rate`.
    pub waveform: Vec<f32>,
}

impl ReferenceAudio {
    /// Duration of the clip in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.waveform.len() as f32 / self.sample_rate as f32
    }
}

/// Outcome of a successful synthesis.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisResult {
    /// Request this result belongs to.
    pub request_id: Uuid,
    /// Encoded audio file in scratch storage.
    pub output_path: PathBuf,
    /// Wall-clock time from validation to persisted file.
    pub elapsed_seconds: f64,
    /// Speed factor the audio was generated with.
    pub speed: f32,
    /// Sample rate of the encoded file.
    pub sample_rate: u32,
    /// Number of samples in the encoded file.
    pub num_samples: usize,
}

impl SynthesisResult {
    /// Duration of the encoded audio in seconds.
    pub fn audio_duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_samples as f64 / self.sample_rate as f64
    }

    /// Real-time factor (processing time / audio duration).
    pub fn rtf(&self) -> f64 {
        let duration = self.audio_duration_secs();
        if duration > 0.0 {
            self.elapsed_seconds / duration
        } else {
            0.0
        }
    }
}
