//! Request-to-audio orchestration.
//!
//! One synthesis flows through
//! `Validating -> (Acquiring ->) PostProcessing -> Inferring -> Concatenating
//! -> Encoding -> Done`; any step can end in `Failed`. Failures are terminal
//! and the admission slot is released on every exit path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use audio_codec::{SpeechPostProcessor, quantize, resample, write_mp3, write_wav_i16};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use tts_core::config::{OrchestratorConfig, OutputFormat, ServiceConfig};
use tts_core::{
    ChunkStream, InferenceEngine, InferenceOptions, Mode, SynthesisRequest, SynthesisResult,
    TtsError, TtsResult,
};

use crate::acquire::AudioAcquirer;
use crate::admission::Admission;
use crate::metrics::TtsMetrics;
use crate::scratch::ScratchDir;

/// Pipeline stage, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Acquiring,
    PostProcessing,
    Inferring,
    Concatenating,
    Encoding,
    Done,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Validating => "validating",
            Stage::Acquiring => "acquiring",
            Stage::PostProcessing => "post_processing",
            Stage::Inferring => "inferring",
            Stage::Concatenating => "concatenating",
            Stage::Encoding => "encoding",
            Stage::Done => "done",
        }
    }
}

/// Drives one synthesis request from validation to a persisted file.
pub struct SynthesisOrchestrator {
    engine: Arc<dyn InferenceEngine>,
    acquirer: AudioAcquirer,
    postprocessor: SpeechPostProcessor,
    scratch: ScratchDir,
    admission: Admission,
    config: OrchestratorConfig,
    metrics: TtsMetrics,
}

impl std::fmt::Debug for SynthesisOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisOrchestrator")
            .field("scratch", &self.scratch)
            .field("config", &self.config)
            .field("busy", &self.admission.is_busy())
            .finish()
    }
}

impl SynthesisOrchestrator {
    /// Create an orchestrator over `engine`, writing into `scratch`.
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        scratch: ScratchDir,
        config: &ServiceConfig,
    ) -> TtsResult<Self> {
        let acquirer = AudioAcquirer::new(scratch.clone(), config.acquire.clone())?;

        Ok(Self {
            engine,
            acquirer,
            postprocessor: SpeechPostProcessor::new(config.postprocess.clone()),
            scratch,
            admission: Admission::new(),
            config: config.orchestrator.clone(),
            metrics: TtsMetrics,
        })
    }

    /// The engine requests are dispatched to.
    pub fn engine(&self) -> &Arc<dyn InferenceEngine> {
        &self.engine
    }

    /// Scratch storage holding outputs.
    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Whether a synthesis is in flight.
    pub fn is_busy(&self) -> bool {
        self.admission.is_busy()
    }

    /// Run one request to completion.
    ///
    /// Fails with [`TtsError::Busy`] without doing any work when another
    /// request holds the slot, and with [`TtsError::Timeout`] when the whole
    /// pipeline exceeds the configured request timeout.
    #[instrument(
        skip(self, request),
        fields(request_id = %request.request_id, mode = %request.mode)
    )]
    pub async fn synthesize(&self, request: SynthesisRequest) -> TtsResult<SynthesisResult> {
        let permit = self.admission.try_acquire().inspect_err(|_| {
            self.metrics.request_rejected_busy();
            debug!("Rejected, another synthesis is in flight");
        })?;

        self.metrics.request_received(request.mode.as_str());
        self.metrics.set_active_requests(1.0);

        let cancel = CancellationToken::new();
        // Cancels the engine if this future is dropped mid-flight.
        let _cancel_on_drop = cancel.clone().drop_guard();

        let timeout = Duration::from_secs(self.config.request_timeout_secs);
        let start = Instant::now();

        let result = match tokio::time::timeout(timeout, self.run(&request, start, cancel.clone()))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(TtsError::Timeout {
                    ms: timeout.as_millis() as u64,
                })
            }
        };

        drop(permit);
        self.metrics.set_active_requests(0.0);

        match &result {
            Ok(output) => {
                self.metrics.request_completed();
                self.metrics
                    .record_total_latency(output.elapsed_seconds * 1000.0);
                self.metrics.record_rtf(output.rtf());
                info!(
                    path = %output.output_path.display(),
                    elapsed_secs = output.elapsed_seconds,
                    audio_secs = output.audio_duration_secs(),
                    "Synthesis complete"
                );
            }
            Err(TtsError::Timeout { ms }) => {
                self.metrics.request_timeout();
                warn!(timeout_ms = ms, "Synthesis timed out");
            }
            Err(e) => {
                self.metrics.request_failed();
                warn!(error = %e, "Synthesis failed");
            }
        }

        result
    }

    async fn run(
        &self,
        request: &SynthesisRequest,
        start: Instant,
        cancel: CancellationToken,
    ) -> TtsResult<SynthesisResult> {
        let request_id = request.request_id;
        let enter = |stage: Stage| debug!(%request_id, stage = stage.as_str(), "Stage");

        enter(Stage::Validating);
        request.validate()?;

        let prompt = if request.mode.needs_reference() {
            Some(self.prepare_reference(request, &enter).await?)
        } else {
            None
        };

        enter(Stage::Inferring);
        let opts = InferenceOptions::new()
            .with_stream(request.stream)
            .with_speed(request.speed)
            .with_seed(request.seed)
            .with_cancel(cancel.clone());
        let engine = Arc::clone(&self.engine);
        let job = request.clone();
        let inference_start = Instant::now();

        let (pcm, sample_rate) = tokio::task::spawn_blocking(move || {
            let stream = dispatch(engine.as_ref(), &job, prompt.as_deref().unwrap_or(&[]), &opts)?;
            debug!(request_id = %job.request_id, stage = Stage::Concatenating.as_str(), "Stage");
            concatenate_chunks(stream, &opts.cancel)
        })
        .await
        .map_err(|e| TtsError::internal(format!("inference task failed: {e}")))??;

        self.metrics
            .record_inference_latency(inference_start.elapsed().as_secs_f64() * 1000.0);

        enter(Stage::Encoding);
        let format = self.config.output_format;
        let output = self.scratch.file(format.extension());
        let path = output.path().to_path_buf();
        let num_samples = pcm.len();
        tokio::task::spawn_blocking(move || match format {
            OutputFormat::Mp3 => write_mp3(&path, &pcm, sample_rate),
            OutputFormat::Wav => write_wav_i16(&path, &pcm, sample_rate),
        })
        .await
        .map_err(|e| TtsError::internal(format!("encode task failed: {e}")))??;
        let output_path = output.keep();

        enter(Stage::Done);
        Ok(SynthesisResult {
            request_id,
            output_path,
            elapsed_seconds: start.elapsed().as_secs_f64(),
            speed: request.speed,
            sample_rate,
            num_samples,
        })
    }

    /// Download, check, resample and post-process the reference clip.
    ///
    /// The transcoded clip is deleted once the prompt waveform is ready.
    async fn prepare_reference(
        &self,
        request: &SynthesisRequest,
        enter: &impl Fn(Stage),
    ) -> TtsResult<Vec<f32>> {
        let url = request
            .reference_url
            .as_deref()
            .ok_or_else(|| TtsError::MissingReference {
                mode: request.mode.to_string(),
            })?;

        enter(Stage::Acquiring);
        let acquire_start = Instant::now();
        let reference = self
            .acquirer
            .acquire(url)
            .await
            .map_err(TtsError::reference_acquisition)?;
        self.metrics
            .record_acquire_latency(acquire_start.elapsed().as_secs_f64() * 1000.0);

        let audio = reference.audio();
        let min = self.config.prompt_sample_rate;
        if audio.sample_rate < min {
            return Err(TtsError::SampleRateTooLow {
                actual: audio.sample_rate,
                min,
            });
        }

        enter(Stage::PostProcessing);
        let waveform = audio.waveform.clone();
        let native_rate = audio.sample_rate;
        let engine_rate = self.engine.sample_rate();
        let postprocessor = self.postprocessor.clone();

        let prompt = tokio::task::spawn_blocking(move || {
            let prompt = resample(&waveform, native_rate, min)?;
            postprocessor.process(&prompt, engine_rate)
        })
        .await
        .map_err(|e| TtsError::internal(format!("post-processing task failed: {e}")))??;

        debug!(
            reference = %reference.path().display(),
            reference_secs = audio.duration_secs(),
            prompt_samples = prompt.len(),
            "Reference prepared"
        );
        Ok(prompt)
    }
}

/// Call the engine capability matching the request's mode.
pub fn dispatch(
    engine: &dyn InferenceEngine,
    request: &SynthesisRequest,
    prompt: &[f32],
    opts: &InferenceOptions,
) -> TtsResult<ChunkStream> {
    match request.mode {
        Mode::PretrainedVoice => engine.pretrained(&request.text, &request.speaker_id, opts),
        Mode::QuickClone => {
            engine.zero_shot(&request.text, &request.reference_text, prompt, opts)
        }
        Mode::CrossLingualClone => engine.cross_lingual(&request.text, prompt, opts),
        Mode::InstructedControl => {
            let instruction = request
                .instruction
                .as_deref()
                .ok_or(TtsError::MissingInstruction)?;
            engine.instruct(&request.text, instruction, prompt, opts)
        }
    }
}

/// Drain a chunk stream into one 16-bit PCM buffer.
///
/// Every chunk must carry audio at a non-zero rate and all chunks must share
/// that rate. Returns the samples in yield order with the shared rate.
pub fn concatenate_chunks(
    stream: ChunkStream,
    cancel: &CancellationToken,
) -> TtsResult<(Vec<i16>, u32)> {
    let mut sample_rate: Option<u32> = None;
    let mut pcm = Vec::new();

    let mut items = stream.enumerate();
    loop {
        // Checked before each pull so a cancelled request stops the engine.
        if cancel.is_cancelled() {
            return Err(TtsError::inference("synthesis cancelled"));
        }
        let Some((index, item)) = items.next() else {
            break;
        };

        let chunk = item?
            .ok_or_else(|| TtsError::malformed_chunk(format!("chunk {index} carries no audio")))?;
        if chunk.sample_rate == 0 {
            return Err(TtsError::malformed_chunk(format!(
                "chunk {index} has no sample rate"
            )));
        }

        match sample_rate {
            None => sample_rate = Some(chunk.sample_rate),
            Some(expected) if expected != chunk.sample_rate => {
                return Err(TtsError::SampleRateMismatch {
                    expected,
                    found: chunk.sample_rate,
                });
            }
            Some(_) => {}
        }

        pcm.extend(quantize(&chunk.pcm));
    }

    let sample_rate = sample_rate.ok_or(TtsError::EmptyResult)?;
    Ok((pcm, sample_rate))
}
