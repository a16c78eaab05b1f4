//! Wire types for the HTTP API.

use serde::{Deserialize, Serialize};
use tts_core::config::RequestDefaults;
use tts_core::{Mode, SynthesisRequest, SynthesisResult, TtsError, TtsResult};

/// `POST /tts` body. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TtsParams {
    /// Text to synthesize.
    pub gen_text: Option<String>,
    /// Natural-language instruction; non-empty selects instructed synthesis.
    pub language: Option<String>,
    /// Transcript of the reference clip.
    pub prompt_text: Option<String>,
    /// URL of the reference clip.
    pub ref_audio_path: Option<String>,
    /// Random seed, as a number or a numeric string.
    pub seed: Option<SeedValue>,
    /// Speed factor.
    pub speed_factor: Option<f32>,
    /// Explicit synthesis mode, overriding the `language` rule.
    pub mode: Option<String>,
    /// Speaker for pretrained-voice synthesis.
    pub speaker: Option<String>,
    /// Ask the engine for incremental chunks.
    pub stream: Option<bool>,
}

/// A seed sent as either a JSON number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SeedValue {
    Number(u64),
    Text(String),
}

impl SeedValue {
    fn parse(&self) -> TtsResult<u64> {
        match self {
            SeedValue::Number(seed) => Ok(*seed),
            SeedValue::Text(text) => text.trim().parse().map_err(|_| {
                TtsError::invalid_input(format!(
                    "seed must be a non-negative integer, got {text:?}"
                ))
            }),
        }
    }
}

impl TtsParams {
    /// Build a synthesis request, filling absent fields from `defaults`.
    ///
    /// An explicit `mode` wins; otherwise a non-empty `language` selects
    /// instructed synthesis and anything else quick clone. A
    /// `ref_audio_path` that is present but blank means no reference.
    pub fn into_request(self, defaults: &RequestDefaults) -> TtsResult<SynthesisRequest> {
        let seed = self.seed.as_ref().map(SeedValue::parse).transpose()?.unwrap_or(0);

        let request = SynthesisRequest::new(self.gen_text.unwrap_or_else(|| defaults.text.clone()))
            .with_instruction(self.language)
            .with_speaker(self.speaker.unwrap_or_else(|| defaults.speaker.clone()))
            .with_reference_text(
                self.prompt_text
                    .unwrap_or_else(|| defaults.prompt_text.clone()),
            )
            .with_reference_url(self.ref_audio_path.or_else(|| defaults.reference_url.clone()))
            .with_seed(seed)
            .with_speed(self.speed_factor.unwrap_or(1.0))
            .with_stream(self.stream.unwrap_or(false));

        Ok(match self.mode {
            Some(name) => request.with_mode(name.parse::<Mode>()?),
            None => request.with_derived_mode(),
        })
    }
}

/// `POST /tts` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsResponse {
    /// Always 1.
    pub success: u8,
    /// Output file, accepted verbatim by `/download`.
    pub path: String,
    /// Processing time in seconds.
    pub time: f64,
    /// Speed factor used.
    pub speed: f32,
}

impl From<&SynthesisResult> for TtsResponse {
    fn from(result: &SynthesisResult) -> Self {
        Self {
            success: 1,
            path: result.output_path.display().to_string(),
            time: result.elapsed_seconds,
            speed: result.speed,
        }
    }
}

/// `GET /` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// 1 while a synthesis is in flight.
    pub is_makeing: u8,
}

/// `GET /download` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadParams {
    pub path: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

/// Info response.
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub sample_rate: Option<u32>,
    pub speakers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(json: &str) -> TtsParams {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_blank_language_means_quick_clone() {
        let request = params(r#"{"gen_text": "Hello", "language": "", "speed_factor": 1.0}"#)
            .into_request(&RequestDefaults::default())
            .unwrap();

        assert_eq!(request.mode, Mode::QuickClone);
        assert_eq!(request.text, "Hello");
        assert!(request.instruction.is_none());
        assert!(request.reference_url.is_none());
        assert_eq!(request.seed, 0);
    }

    #[test]
    fn test_language_means_instructed() {
        let request = params(r#"{"gen_text": "Hello world", "language": "speak slowly"}"#)
            .into_request(&RequestDefaults::default())
            .unwrap();

        assert_eq!(request.mode, Mode::InstructedControl);
        assert_eq!(request.instruction.as_deref(), Some("speak slowly"));
        assert!((request.speed - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_defaults_fill_absent_fields() {
        let defaults = RequestDefaults {
            reference_url: Some("https://example.com/voice.mp3".to_string()),
            ..RequestDefaults::default()
        };
        let request = params("{}").into_request(&defaults).unwrap();

        assert_eq!(request.text, defaults.text);
        assert_eq!(request.reference_text, defaults.prompt_text);
        assert_eq!(request.speaker_id, "default");
        assert_eq!(
            request.reference_url.as_deref(),
            Some("https://example.com/voice.mp3")
        );
        assert!(!request.stream);
    }

    #[test]
    fn test_blank_reference_overrides_default() {
        let defaults = RequestDefaults {
            reference_url: Some("https://example.com/voice.mp3".to_string()),
            ..RequestDefaults::default()
        };
        let request = params(r#"{"ref_audio_path": ""}"#)
            .into_request(&defaults)
            .unwrap();
        assert!(request.reference_url.is_none());
    }

    #[test]
    fn test_seed_forms() {
        let defaults = RequestDefaults::default();
        assert_eq!(params(r#"{"seed": 7}"#).into_request(&defaults).unwrap().seed, 7);
        assert_eq!(params(r#"{"seed": " 42 "}"#).into_request(&defaults).unwrap().seed, 42);
        assert!(matches!(
            params(r#"{"seed": "abc"}"#).into_request(&defaults),
            Err(TtsError::InvalidInput(_))
        ));
        assert!(serde_json::from_str::<TtsParams>(r#"{"seed": -1}"#).is_err());
    }

    #[test]
    fn test_explicit_mode() {
        let defaults = RequestDefaults::default();
        let request = params(r#"{"mode": "sft", "language": "whisper"}"#)
            .into_request(&defaults)
            .unwrap();
        assert_eq!(request.mode, Mode::PretrainedVoice);

        assert!(matches!(
            params(r#"{"mode": "karaoke"}"#).into_request(&defaults),
            Err(TtsError::InvalidMode(_))
        ));
    }

    #[test]
    fn test_response_from_result() {
        let result = SynthesisResult {
            request_id: SynthesisRequest::new("x").request_id,
            output_path: "TEMP/abc.wav".into(),
            elapsed_seconds: 1.5,
            speed: 1.0,
            sample_rate: 24000,
            num_samples: 24000,
        };
        let response = TtsResponse::from(&result);

        assert_eq!(response.success, 1);
        assert_eq!(response.path, "TEMP/abc.wav");
        assert!((response.time - 1.5).abs() < f64::EPSILON);
    }
}
