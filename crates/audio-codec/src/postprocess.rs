//! Reference speech post-processing.
//!
//! Prepares a reference clip for conditioning: trims leading and trailing
//! silence, clamps the peak amplitude, and appends a short silent tail so the
//! engine sees a clean boundary.

use tracing::debug;
use tts_core::config::PostProcessConfig;
use tts_core::{TtsError, TtsResult};

/// Floor applied to frame power before converting to dB.
const POWER_FLOOR: f32 = 1e-10;

/// Silence trimming, peak clamping and tail padding for reference speech.
#[derive(Debug, Clone, Default)]
pub struct SpeechPostProcessor {
    config: PostProcessConfig,
}

impl SpeechPostProcessor {
    /// Create a post-processor with the given settings.
    pub fn new(config: PostProcessConfig) -> Self {
        Self { config }
    }

    /// Get the post-processing configuration.
    pub fn config(&self) -> &PostProcessConfig {
        &self.config
    }

    /// Process a reference waveform.
    ///
    /// # Arguments
    /// * `waveform` - Mono reference samples
    /// * `engine_rate` - Native engine sample rate, `None` if the engine is
    ///   not loaded yet; the silent tail is sized in engine samples
    pub fn process(&self, waveform: &[f32], engine_rate: Option<u32>) -> TtsResult<Vec<f32>> {
        let engine_rate = engine_rate
            .filter(|&rate| rate > 0)
            .ok_or(TtsError::EngineNotInitialized)?;

        let (start, end) = trim_bounds(
            waveform,
            self.config.top_db,
            self.config.frame_length,
            self.config.hop_length,
        );
        let mut speech = waveform[start..end].to_vec();

        let peak = peak_amplitude(&speech);
        if peak > self.config.max_amplitude {
            let scale = self.config.max_amplitude / peak;
            speech.iter_mut().for_each(|s| *s *= scale);
            debug!(peak, scale, "Clamped reference peak");
        }

        let pad = (engine_rate as f32 * self.config.pad_secs) as usize;
        speech.resize(speech.len() + pad, 0.0);

        debug!(
            input = waveform.len(),
            trimmed_start = start,
            trimmed_end = end,
            output = speech.len(),
            "Post-processed reference speech"
        );

        Ok(speech)
    }
}

/// Largest absolute sample value.
pub fn peak_amplitude(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
}

/// Find the non-silent region of a clip.
///
/// Frames are centred on multiples of `hop_length` and zero-padded at the
/// edges. A frame is silent when its mean power is more than `top_db` below
/// the loudest frame. Returns the sample range from the start of the first
/// loud frame to the end of the last one; `(0, 0)` when everything is silent.
pub fn trim_bounds(
    samples: &[f32],
    top_db: f32,
    frame_length: usize,
    hop_length: usize,
) -> (usize, usize) {
    if samples.is_empty() || frame_length == 0 || hop_length == 0 {
        return (0, samples.len());
    }

    let half = frame_length / 2;
    let num_frames = 1 + samples.len() / hop_length;

    let power: Vec<f32> = (0..num_frames)
        .map(|frame| {
            let center = frame * hop_length;
            let lo = center.saturating_sub(half);
            let hi = (center + frame_length - half).min(samples.len());
            let sum_sq: f32 = samples
                .get(lo..hi)
                .map(|window| window.iter().map(|&s| s * s).sum())
                .unwrap_or(0.0);
            sum_sq / frame_length as f32
        })
        .collect();

    let max_power = power.iter().copied().fold(0.0f32, f32::max);
    if max_power <= 0.0 {
        return (0, 0);
    }
    let ref_power = max_power.max(POWER_FLOOR);
    let loud = |p: f32| 10.0 * (p.max(POWER_FLOOR) / ref_power).log10() > -top_db;

    let first = power.iter().position(|&p| loud(p));
    let last = power.iter().rposition(|&p| loud(p));

    match (first, last) {
        (Some(first), Some(last)) => {
            let start = (first * hop_length).min(samples.len());
            let end = ((last + 1) * hop_length).min(samples.len());
            (start, end)
        }
        _ => (0, 0),
    }
}
