//! Bundled inference engine.
//!
//! [`SyntheticEngine`] renders text as tonal speech-like audio without model
//! weights: one segment per sentence, pitch chosen by speaker or reference
//! clip, with seeded jitter. It implements the full engine contract and is
//! what the server runs unless another [`InferenceEngine`] is plugged in.

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use tts_core::{
    AudioChunk, ChunkStream, InferenceEngine, InferenceOptions, TtsError, TtsResult,
};

/// Name of the optional engine settings file inside the model directory.
pub const ENGINE_CONFIG_FILE: &str = "engine.toml";

/// Engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Native output sample rate.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Built-in speakers.
    #[serde(default = "default_speakers")]
    pub speakers: Vec<String>,
    /// Speaking rate at speed 1.0.
    #[serde(default = "default_chars_per_second")]
    pub chars_per_second: f32,
    /// Output amplitude.
    #[serde(default = "default_amplitude")]
    pub amplitude: f32,
    /// Chunk length in milliseconds when streaming.
    #[serde(default = "default_stream_chunk_ms")]
    pub stream_chunk_ms: u32,
    /// Longest output one call may produce, in seconds.
    #[serde(default = "default_max_output_secs")]
    pub max_output_secs: f32,
}

fn default_sample_rate() -> u32 {
    24000
}

fn default_speakers() -> Vec<String> {
    vec![
        "default".to_string(),
        "female".to_string(),
        "male".to_string(),
    ]
}

fn default_chars_per_second() -> f32 {
    14.0
}

fn default_amplitude() -> f32 {
    0.3
}

fn default_stream_chunk_ms() -> u32 {
    200
}

fn default_max_output_secs() -> f32 {
    600.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            speakers: default_speakers(),
            chars_per_second: default_chars_per_second(),
            amplitude: default_amplitude(),
            stream_chunk_ms: default_stream_chunk_ms(),
            max_output_secs: default_max_output_secs(),
        }
    }
}

/// Deterministic, seedable signal-generator engine.
#[derive(Debug, Clone, Default)]
pub struct SyntheticEngine {
    config: EngineConfig,
}

impl SyntheticEngine {
    /// Create an engine with the given settings.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Load the engine from a model directory.
    ///
    /// The directory must exist. An `engine.toml` inside it, if present,
    /// overrides the default settings.
    #[instrument]
    pub fn from_dir(model_dir: &Path) -> TtsResult<Self> {
        if !model_dir.is_dir() {
            return Err(TtsError::config(format!(
                "model directory not found: {}",
                model_dir.display()
            )));
        }

        let config_path = model_dir.join(ENGINE_CONFIG_FILE);
        let config = if config_path.is_file() {
            let text = std::fs::read_to_string(&config_path)?;
            toml::from_str(&text).map_err(|e| {
                TtsError::config(format!("invalid {}: {e}", config_path.display()))
            })?
        } else {
            EngineConfig::default()
        };

        if config.sample_rate == 0 {
            return Err(TtsError::config("engine sample_rate must be non-zero"));
        }

        info!(
            model_dir = %model_dir.display(),
            sample_rate = config.sample_rate,
            speakers = config.speakers.len(),
            "Synthetic engine loaded"
        );

        Ok(Self::new(config))
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn stream(&self, text: &str, voice: Voice, opts: &InferenceOptions) -> TtsResult<ChunkStream> {
        let segments = split_sentences(text);
        if segments.is_empty() {
            return Err(TtsError::invalid_input("text has nothing to speak"));
        }
        if !opts.speed.is_finite() || opts.speed <= 0.0 {
            return Err(TtsError::invalid_input(format!(
                "speed factor must be positive, got {}",
                opts.speed
            )));
        }

        // Durations are planned before any sample is allocated.
        let durations: Vec<f64> = segments
            .iter()
            .map(|sentence| {
                let chars = sentence.chars().filter(|c| !c.is_whitespace()).count();
                let secs = (chars as f64 / f64::from(self.config.chars_per_second)).max(0.25);
                secs / f64::from(opts.speed)
            })
            .collect();
        let planned_secs: f64 = durations.iter().sum();
        if planned_secs > f64::from(self.config.max_output_secs) {
            return Err(TtsError::invalid_input(format!(
                "output would last {planned_secs:.1}s, limit is {}s",
                self.config.max_output_secs
            )));
        }

        let mut rng = StdRng::seed_from_u64(opts.seed);
        let rate = f64::from(self.config.sample_rate);

        let plan: VecDeque<Segment> = durations
            .iter()
            .map(|secs| {
                let jitter: f32 = rng.gen_range(0.95..1.05);
                Segment {
                    freq: voice.base_freq * jitter,
                    total: (secs * rate) as usize,
                    pos: 0,
                }
            })
            .filter(|segment| segment.total > 0)
            .collect();

        let chunk_len = opts.stream.then(|| {
            (self.config.sample_rate * self.config.stream_chunk_ms / 1000).max(1) as usize
        });

        debug!(
            segments = plan.len(),
            samples = plan.iter().map(|s| s.total).sum::<usize>(),
            base_freq = voice.base_freq,
            stream = opts.stream,
            "Synthesis planned"
        );

        Ok(Box::new(SyntheticStream {
            plan,
            voice,
            rng,
            sample_rate: self.config.sample_rate,
            amplitude: self.config.amplitude,
            chunk_len,
            cancel: opts.cancel.clone(),
            phase: 0.0,
            elapsed: 0,
            done: false,
        }))
    }

    fn speaker_voice(&self, speaker: &str) -> TtsResult<Voice> {
        let index = self
            .config
            .speakers
            .iter()
            .position(|s| s == speaker)
            .ok_or_else(|| TtsError::invalid_input(format!("unknown speaker: {speaker}")))?;

        Ok(Voice {
            base_freq: 110.0 + (fnv1a(speaker.as_bytes()) % 160) as f32 + index as f32 * 10.0,
            vibrato: 0.0,
            overtone: 0.2,
        })
    }
}

impl InferenceEngine for SyntheticEngine {
    fn sample_rate(&self) -> Option<u32> {
        Some(self.config.sample_rate)
    }

    fn speakers(&self) -> Vec<String> {
        self.config.speakers.clone()
    }

    fn pretrained(
        &self,
        text: &str,
        speaker: &str,
        opts: &InferenceOptions,
    ) -> TtsResult<ChunkStream> {
        let voice = self.speaker_voice(speaker)?;
        self.stream(text, voice, opts)
    }

    fn zero_shot(
        &self,
        text: &str,
        _prompt_text: &str,
        prompt: &[f32],
        opts: &InferenceOptions,
    ) -> TtsResult<ChunkStream> {
        self.stream(text, Voice::from_prompt(prompt), opts)
    }

    fn cross_lingual(
        &self,
        text: &str,
        prompt: &[f32],
        opts: &InferenceOptions,
    ) -> TtsResult<ChunkStream> {
        let voice = Voice {
            overtone: 0.35,
            ..Voice::from_prompt(prompt)
        };
        self.stream(text, voice, opts)
    }

    fn instruct(
        &self,
        text: &str,
        instruction: &str,
        prompt: &[f32],
        opts: &InferenceOptions,
    ) -> TtsResult<ChunkStream> {
        // The instruction shapes the vibrato depth.
        let depth = 0.01 + (fnv1a(instruction.as_bytes()) % 5) as f32 * 0.01;
        let voice = Voice {
            vibrato: depth,
            ..Voice::from_prompt(prompt)
        };
        self.stream(text, voice, opts)
    }
}

#[derive(Debug, Clone, Copy)]
struct Voice {
    base_freq: f32,
    vibrato: f32,
    overtone: f32,
}

impl Voice {
    /// Pitch estimated from the zero-crossing rate of a 16 kHz prompt.
    fn from_prompt(prompt: &[f32]) -> Self {
        let crossings = prompt
            .windows(2)
            .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
            .count();
        let base_freq = if prompt.len() < 2 || crossings == 0 {
            160.0
        } else {
            (crossings as f32 / prompt.len() as f32 * 8000.0).clamp(80.0, 400.0)
        };

        Self {
            base_freq,
            vibrato: 0.0,
            overtone: 0.2,
        }
    }
}

#[derive(Debug)]
struct Segment {
    freq: f32,
    total: usize,
    pos: usize,
}

struct SyntheticStream {
    plan: VecDeque<Segment>,
    voice: Voice,
    rng: StdRng,
    sample_rate: u32,
    amplitude: f32,
    chunk_len: Option<usize>,
    cancel: CancellationToken,
    phase: f32,
    elapsed: usize,
    done: bool,
}

impl Iterator for SyntheticStream {
    type Item = TtsResult<Option<AudioChunk>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.cancel.is_cancelled() {
            self.done = true;
            return Some(Err(TtsError::inference("synthesis cancelled")));
        }

        let rate = self.sample_rate as f32;
        let fade = (rate * 0.01) as usize;
        let segment = self.plan.front_mut()?;
        let remaining = segment.total - segment.pos;
        let len = self.chunk_len.map_or(remaining, |n| n.min(remaining));

        let mut pcm = Vec::with_capacity(len);
        for _ in 0..len {
            let edge = segment.pos.min(segment.total - segment.pos);
            let envelope = if fade == 0 {
                1.0
            } else {
                (edge as f32 / fade as f32).min(1.0)
            };

            let t = self.elapsed as f32 / rate;
            let freq = segment.freq * (1.0 + self.voice.vibrato * (2.0 * PI * 5.0 * t).sin());
            self.phase = (self.phase + 2.0 * PI * freq / rate) % (2.0 * PI);

            let tone = self.phase.sin() + self.voice.overtone * (2.0 * self.phase).sin();
            let noise: f32 = self.rng.gen_range(-0.02..0.02);
            pcm.push(self.amplitude * envelope * tone / (1.0 + self.voice.overtone) + noise);

            segment.pos += 1;
            self.elapsed += 1;
        }

        if segment.pos >= segment.total {
            self.plan.pop_front();
        }

        Some(Ok(Some(AudioChunk::new(pcm, self.sample_rate))))
    }
}

/// Split text into sentences on terminal punctuation and newlines.
fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?', ';', '\n', '。', '！', '？', '；'])
        .map(str::trim)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .map(str::to_string)
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
