//! # audio-codec
//!
//! Audio handling for the synthesis gateway.
//!
//! This crate provides:
//! - Decoding of arbitrary containers (mp3, aac, flac, wav, ...) to mono PCM
//! - Resampling to the reference prompt rate
//! - Reference speech post-processing (silence trim, peak clamp, tail pad)
//! - 16-bit PCM quantization with MP3 and WAV export

pub mod decode;
pub mod mp3;
pub mod postprocess;
pub mod resample;
pub mod wav;

pub use decode::{DecodedAudio, decode_file};
pub use mp3::{encode_mp3, write_mp3};
pub use postprocess::SpeechPostProcessor;
pub use resample::resample;
pub use wav::{quantize, read_wav, write_wav_i16, write_wav_samples};
