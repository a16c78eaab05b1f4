//! MP3 export via LAME.

use std::path::Path;

use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, MonoPcm, Quality, max_required_buffer_size};
use tts_core::{TtsError, TtsResult};

/// Room for the frames LAME still holds when flushed.
const FLUSH_RESERVE: usize = 7200;

fn mp3_err(stage: &str, e: impl std::fmt::Debug) -> TtsError {
    TtsError::internal(format!("mp3 {stage} failed: {e:?}"))
}

/// Constant bitrate for a sample rate. MPEG-2.5 rates top out lower.
fn bitrate_for(sample_rate: u32) -> Bitrate {
    match sample_rate {
        0..=12000 => Bitrate::Kbps64,
        12001..=24000 => Bitrate::Kbps128,
        _ => Bitrate::Kbps192,
    }
}

/// Encode mono 16-bit PCM as an MP3 stream.
pub fn encode_mp3(samples: &[i16], sample_rate: u32) -> TtsResult<Vec<u8>> {
    let mut builder =
        Builder::new().ok_or_else(|| TtsError::internal("cannot create LAME encoder"))?;
    builder.set_num_channels(1).map_err(|e| mp3_err("setup", e))?;
    builder
        .set_sample_rate(sample_rate)
        .map_err(|e| mp3_err("setup", e))?;
    builder
        .set_brate(bitrate_for(sample_rate))
        .map_err(|e| mp3_err("setup", e))?;
    builder
        .set_quality(Quality::Good)
        .map_err(|e| mp3_err("setup", e))?;
    let mut encoder = builder.build().map_err(|e| mp3_err("setup", e))?;

    let mut out = Vec::with_capacity(max_required_buffer_size(samples.len()) + FLUSH_RESERVE);
    encoder
        .encode_to_vec(MonoPcm(samples), &mut out)
        .map_err(|e| mp3_err("encode", e))?;
    encoder
        .flush_to_vec::<FlushNoGap>(&mut out)
        .map_err(|e| mp3_err("flush", e))?;

    Ok(out)
}

/// Write mono 16-bit PCM to an MP3 file.
pub fn write_mp3(path: impl AsRef<Path>, samples: &[i16], sample_rate: u32) -> TtsResult<()> {
    let bytes = encode_mp3(samples, sample_rate)?;
    std::fs::write(path.as_ref(), bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_file;
    use crate::wav::quantize;

    fn tone(freq: f32, sample_rate: u32, secs: f32) -> Vec<i16> {
        let rate = sample_rate as f32;
        let samples: Vec<f32> = (0..(rate * secs) as usize)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / rate).sin())
            .collect();
        quantize(&samples)
    }

    #[test]
    fn test_mp3_decodes_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.mp3");
        let pcm = tone(440.0, 24000, 1.0);

        write_mp3(&path, &pcm, 24000).unwrap();
        let decoded = decode_file(&path).unwrap();

        assert_eq!(decoded.sample_rate, 24000);
        assert_eq!(decoded.channels, 1);
        // Encoder delay and frame padding only ever add samples.
        assert!(decoded.samples.len() >= pcm.len());
        assert!(decoded.samples.len() < pcm.len() + 6000);

        let peak = decoded.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.3 && peak < 0.7, "peak {peak}");
    }

    #[test]
    fn test_mp3_is_smaller_than_pcm() {
        let pcm = tone(220.0, 24000, 2.0);
        let bytes = encode_mp3(&pcm, 24000).unwrap();

        assert!(!bytes.is_empty());
        // 128 kbit/s against 384 kbit/s of raw 24 kHz PCM: under half the bytes.
        assert!(bytes.len() < pcm.len());
    }

    #[test]
    fn test_bitrate_for() {
        assert!(matches!(bitrate_for(8000), Bitrate::Kbps64));
        assert!(matches!(bitrate_for(24000), Bitrate::Kbps128));
        assert!(matches!(bitrate_for(44100), Bitrate::Kbps192));
    }
}
