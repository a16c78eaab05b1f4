//! Sample-rate conversion.

use rubato::{FftFixedIn, Resampler};
use tts_core::{TtsError, TtsResult};

const CHUNK: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Resample mono audio from `from_rate` to `to_rate`.
///
/// Uses an FFT resampler; the filter delay is compensated so the output is
/// aligned with the input and exactly `len * to / from` samples long
/// (rounded up).
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> TtsResult<Vec<f32>> {
    if from_rate == 0 || to_rate == 0 {
        return Err(TtsError::invalid_input("sample rate must be non-zero"));
    }
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, CHUNK, SUB_CHUNKS, 1)
            .map_err(|e| TtsError::internal(format!("failed to create resampler: {e}")))?;

    let expected_len =
        (samples.len() as f64 * to_rate as f64 / from_rate as f64).ceil() as usize;
    let delay = resampler.output_delay();
    let mut out = Vec::with_capacity(expected_len + delay + CHUNK);

    // Feed zero-padded blocks until the delayed tail has been flushed out.
    let mut pos = 0;
    while out.len() < expected_len + delay {
        let mut block = vec![0.0f32; CHUNK];
        if pos < samples.len() {
            let end = (pos + CHUNK).min(samples.len());
            block[..end - pos].copy_from_slice(&samples[pos..end]);
        }
        pos += CHUNK;

        let frames = resampler
            .process(&[block], None)
            .map_err(|e| TtsError::internal(format!("resampling failed: {e}")))?;
        out.extend_from_slice(&frames[0]);
    }

    Ok(out.into_iter().skip(delay).take(expected_len).collect())
}
