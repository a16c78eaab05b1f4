//! Reference audio acquisition.
//!
//! Downloads a reference clip into scratch storage and transcodes it to a
//! canonical mono 16-bit WAV. The raw download never outlives the call; the
//! WAV lives as long as the returned [`AcquiredReference`].

use std::path::Path;
use std::time::Duration;

use audio_codec::{decode_file, read_wav, write_wav_samples};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};
use tts_core::config::AcquireConfig;
use tts_core::{ReferenceAudio, TtsError, TtsResult};

use crate::scratch::{ScratchDir, ScratchFile};

/// A transcoded reference clip, deleted from scratch storage on drop.
#[derive(Debug)]
pub struct AcquiredReference {
    audio: ReferenceAudio,
    _file: ScratchFile,
}

impl AcquiredReference {
    /// The decoded clip.
    pub fn audio(&self) -> &ReferenceAudio {
        &self.audio
    }

    /// Path of the canonical WAV.
    pub fn path(&self) -> &Path {
        &self.audio.local_path
    }
}

/// Fetches reference clips over HTTP.
#[derive(Debug, Clone)]
pub struct AudioAcquirer {
    client: Client,
    scratch: ScratchDir,
    config: AcquireConfig,
}

impl AudioAcquirer {
    /// Create an acquirer writing into `scratch`.
    pub fn new(scratch: ScratchDir, config: AcquireConfig) -> TtsResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("tts-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TtsError::internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            scratch,
            config,
        })
    }

    /// Download `url` and transcode it to a canonical WAV.
    ///
    /// Fails with [`TtsError::Download`] when the fetch fails or the payload
    /// is not audio, and with [`TtsError::Transcode`] when it cannot be
    /// decoded.
    #[instrument(skip(self))]
    pub async fn acquire(&self, url: &str) -> TtsResult<AcquiredReference> {
        let url = Url::parse(url.trim())
            .map_err(|e| TtsError::download(format!("invalid URL {url:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TtsError::download(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            )));
        }

        let extension = extension_from_url(&url, &self.config.default_extension);
        let raw = self.scratch.file(&extension);
        let bytes = self.download(&url, raw.path()).await?;
        debug!(bytes, path = %raw.path().display(), "Downloaded reference audio");

        let wav = self.scratch.file("wav");
        let raw_path = raw.path().to_path_buf();
        let wav_path = wav.path().to_path_buf();

        let (waveform, sample_rate) = tokio::task::spawn_blocking(move || {
            let decoded = decode_file(&raw_path)?;
            write_wav_samples(&wav_path, &decoded.samples, decoded.sample_rate)
                .map_err(|e| TtsError::transcode(format!("cannot write canonical wav: {e}")))?;
            read_wav(&wav_path)
                .map_err(|e| TtsError::transcode(format!("cannot read canonical wav: {e}")))
        })
        .await
        .map_err(|e| TtsError::internal(format!("transcode task failed: {e}")))??;

        drop(raw);

        info!(
            sample_rate,
            samples = waveform.len(),
            path = %wav.path().display(),
            "Reference audio acquired"
        );

        Ok(AcquiredReference {
            audio: ReferenceAudio {
                local_path: wav.path().to_path_buf(),
                sample_rate,
                waveform,
            },
            _file: wav,
        })
    }

    /// Stream the response body for `url` into `dest`. Returns the byte count.
    async fn download(&self, url: &Url, dest: &Path) -> TtsResult<u64> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TtsError::download(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TtsError::download(format!("server returned {status}")));
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !is_audio_content_type(content_type) {
                return Err(TtsError::download(format!(
                    "payload is not audio (content-type {content_type})"
                )));
            }
        }

        let max_bytes = self.config.max_bytes;
        if response.content_length().is_some_and(|len| len > max_bytes) {
            return Err(TtsError::download(format!(
                "payload exceeds {max_bytes} bytes"
            )));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| TtsError::download(format!("body read failed: {e}")))?
        {
            written += chunk.len() as u64;
            if written > max_bytes {
                return Err(TtsError::download(format!(
                    "payload exceeds {max_bytes} bytes"
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if written == 0 {
            return Err(TtsError::download("empty response body"));
        }
        Ok(written)
    }
}

/// File extension from the last URL path segment, or `default`.
pub fn extension_from_url(url: &Url, default: &str) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| default.to_string())
}

/// Whether a `Content-Type` header value can carry an audio payload.
pub fn is_audio_content_type(value: &str) -> bool {
    let mime = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("audio/") || mime.starts_with("video/") || mime == "application/octet-stream"
}
