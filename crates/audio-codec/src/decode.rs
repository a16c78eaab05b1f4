//! Container-agnostic decoding to mono PCM.

use std::fs::File;
use std::io;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;
use tts_core::{TtsError, TtsResult};

/// Decoded audio, down-mixed to mono.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono samples in [-1, 1].
    pub samples: Vec<f32>,
    /// Native sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count of the source.
    pub channels: usize,
}

/// Decode an audio file of any supported container to mono f32.
///
/// The file extension is only a format hint; the content decides.
pub fn decode_file(path: impl AsRef<Path>) -> TtsResult<DecodedAudio> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| TtsError::transcode(format!("cannot open {}: {e}", path.display())))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let detected = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| TtsError::transcode(format!("unrecognized audio format: {e}")))?;
    let mut format = detected.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| TtsError::transcode("no decodable audio track"))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| TtsError::transcode(format!("unsupported codec: {e}")))?;

    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(1);
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(TtsError::transcode(format!("read failed: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                debug!(msg, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(TtsError::transcode(format!("decode failed: {e}"))),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count().max(1);

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend(
            buffer
                .samples()
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
        );
    }

    if sample_rate == 0 {
        return Err(TtsError::transcode("source has no sample rate"));
    }
    if samples.is_empty() {
        return Err(TtsError::transcode("source contains no audio"));
    }

    debug!(
        path = %path.display(),
        samples = samples.len(),
        sample_rate,
        channels,
        "Decoded audio"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::write_wav_samples;

    #[test]
    fn test_decode_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let samples: Vec<f32> = (0..2205)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        write_wav_samples(&path, &samples, 22050).unwrap();

        let decoded = decode_file(&path).unwrap();
        assert_eq!(decoded.sample_rate, 22050);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples.len(), samples.len());
        assert!((decoded.samples[100] - samples[100]).abs() < 1e-3);
    }

    #[test]
    fn test_decode_garbage_is_transcode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp3");
        std::fs::write(&path, b"<html>definitely not audio</html>").unwrap();

        let result = decode_file(&path);
        assert!(matches!(result, Err(TtsError::Transcode(_))));
    }

    #[test]
    fn test_decode_missing_file() {
        let result = decode_file("/nonexistent/clip.wav");
        assert!(matches!(result, Err(TtsError::Transcode(_))));
    }
}
