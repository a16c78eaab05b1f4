//! WAV file I/O and PCM quantization.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::io;
use std::path::Path;
use tts_core::{TtsError, TtsResult};

fn wav_err(e: hound::Error) -> TtsError {
    match e {
        hound::Error::IoError(io) => TtsError::Io(io),
        other => TtsError::Io(io::Error::other(other.to_string())),
    }
}

fn mono_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Quantize float samples to 16-bit PCM.
///
/// Samples are clamped to [-1, 1] and scaled by 32767; the cast truncates
/// toward zero.
pub fn quantize(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

/// Write 16-bit PCM samples to a mono WAV file.
pub fn write_wav_i16(path: impl AsRef<Path>, samples: &[i16], sample_rate: u32) -> TtsResult<()> {
    let mut writer = WavWriter::create(path.as_ref(), mono_spec(sample_rate)).map_err(wav_err)?;

    for &sample in samples {
        writer.write_sample(sample).map_err(wav_err)?;
    }

    writer.finalize().map_err(wav_err)?;
    Ok(())
}

/// Write float samples to a mono 16-bit WAV file.
pub fn write_wav_samples(
    path: impl AsRef<Path>,
    samples: &[f32],
    sample_rate: u32,
) -> TtsResult<()> {
    write_wav_i16(path, &quantize(samples), sample_rate)
}

/// Read a WAV file as mono float samples.
///
/// Multichannel files are down-mixed by averaging.
pub fn read_wav(path: impl AsRef<Path>) -> TtsResult<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path.as_ref()).map_err(wav_err)?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()
                .map_err(wav_err)?
        }
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(wav_err)?,
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok((samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_clamps_and_scales() {
        let pcm = quantize(&[0.0, 0.5, -0.5, 1.0, -1.0, 2.0, -2.0]);
        assert_eq!(pcm, vec![0, 16383, -16383, 32767, -32767, 32767, -32767]);
    }

    #[test]
    fn test_write_then_read_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<f32> = (0..480).map(|i| (i as f32 / 480.0) - 0.5).collect();

        write_wav_samples(&path, &samples, 24000).unwrap();

        let (decoded, rate) = read_wav(&path).unwrap();
        assert_eq!(rate, 24000);
        assert_eq!(decoded.len(), samples.len());
        for (a, b) in decoded.iter().zip(&samples) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_read_wav_downmixes_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..10 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let (samples, rate) = read_wav(&path).unwrap();
        assert_eq!(rate, 16000);
        assert_eq!(samples.len(), 10);
        assert!((samples[0] - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let result = read_wav("/nonexistent/missing.wav");
        assert!(matches!(result, Err(TtsError::Io(_))));
    }
}
