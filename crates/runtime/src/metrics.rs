//! Metrics collection and Prometheus export.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tts_core::{TtsError, TtsResult};

/// Metrics recorder for synthesis requests.
///
/// Calls are no-ops until a recorder is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TtsMetrics;

impl TtsMetrics {
    /// Install the Prometheus recorder as the global recorder.
    ///
    /// Returns the handle used to render the exposition text.
    pub fn install() -> TtsResult<PrometheusHandle> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| TtsError::internal(format!("metrics init failed: {e}")))?;

        Self::register_metrics();
        Ok(handle)
    }

    fn register_metrics() {
        describe_counter!(
            "tts_requests_total",
            "Total number of synthesis requests received"
        );
        describe_counter!(
            "tts_requests_completed",
            "Total number of synthesis requests completed successfully"
        );
        describe_counter!(
            "tts_requests_failed",
            "Total number of synthesis requests that failed"
        );
        describe_counter!(
            "tts_requests_timeout",
            "Total number of synthesis requests that timed out"
        );
        describe_counter!(
            "tts_requests_rejected_busy",
            "Total number of requests rejected while another synthesis was running"
        );

        describe_histogram!(
            "tts_total_latency_ms",
            "Total request latency in milliseconds"
        );
        describe_histogram!(
            "tts_acquire_latency_ms",
            "Reference audio download and transcode latency in milliseconds"
        );
        describe_histogram!(
            "tts_inference_latency_ms",
            "Engine inference latency in milliseconds"
        );
        describe_histogram!(
            "tts_rtf",
            "Real-time factor (processing time / audio duration)"
        );

        describe_gauge!("tts_active_requests", "Number of synthesis requests in flight");
        describe_counter!("tts_scratch_reaped", "Scratch files removed by the reaper");
    }

    /// Record a new request received.
    pub fn request_received(&self, mode: &'static str) {
        counter!("tts_requests_total", "mode" => mode).increment(1);
    }

    /// Record a request completed successfully.
    pub fn request_completed(&self) {
        counter!("tts_requests_completed").increment(1);
    }

    /// Record a request failed.
    pub fn request_failed(&self) {
        counter!("tts_requests_failed").increment(1);
    }

    /// Record a request timeout.
    pub fn request_timeout(&self) {
        counter!("tts_requests_timeout").increment(1);
    }

    /// Record a request turned away because the slot was taken.
    pub fn request_rejected_busy(&self) {
        counter!("tts_requests_rejected_busy").increment(1);
    }

    /// Record total latency.
    pub fn record_total_latency(&self, ms: f64) {
        histogram!("tts_total_latency_ms").record(ms);
    }

    /// Record reference acquisition latency.
    pub fn record_acquire_latency(&self, ms: f64) {
        histogram!("tts_acquire_latency_ms").record(ms);
    }

    /// Record inference latency.
    pub fn record_inference_latency(&self, ms: f64) {
        histogram!("tts_inference_latency_ms").record(ms);
    }

    /// Record real-time factor.
    pub fn record_rtf(&self, rtf: f64) {
        histogram!("tts_rtf").record(rtf);
    }

    /// Set the number of active requests.
    pub fn set_active_requests(&self, count: f64) {
        gauge!("tts_active_requests").set(count);
    }

    /// Record files removed by the reaper.
    pub fn scratch_reaped(&self, count: u64) {
        counter!("tts_scratch_reaped").increment(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder() {
        let metrics = TtsMetrics;

        // No recorder installed: every call is a no-op.
        metrics.request_received("zero_shot");
        metrics.request_completed();
        metrics.request_failed();
        metrics.record_total_latency(12.5);
        metrics.record_rtf(0.4);
        metrics.set_active_requests(1.0);
        metrics.scratch_reaped(3);
    }
}
