//! HTTP gateway: router, handlers and server lifecycle.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tokio::sync::watch;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use runtime::{ScratchDir, SynthesisOrchestrator};
use tts_core::config::RequestDefaults;
use tts_core::{InferenceEngine, ServiceConfig, TtsError, TtsResult};

use crate::api::{
    DownloadParams, HealthResponse, InfoResponse, StatusResponse, TtsParams, TtsResponse,
};
use crate::error::ApiError;

/// Shared handler state.
pub struct AppState {
    orchestrator: SynthesisOrchestrator,
    defaults: RequestDefaults,
    prometheus: Option<PrometheusHandle>,
    start_time: Instant,
}

impl AppState {
    /// Build handler state over `engine`, creating the scratch and output
    /// directories named in `config`.
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        config: &ServiceConfig,
        prometheus: Option<PrometheusHandle>,
    ) -> TtsResult<Self> {
        let scratch = ScratchDir::create(&config.scratch.dir)?;
        std::fs::create_dir_all(&config.scratch.output_dir)?;

        Ok(Self {
            orchestrator: SynthesisOrchestrator::new(engine, scratch, config)?,
            defaults: config.defaults.clone(),
            prometheus,
            start_time: Instant::now(),
        })
    }

    /// The orchestrator requests are handed to.
    pub fn orchestrator(&self) -> &SynthesisOrchestrator {
        &self.orchestrator
    }
}

/// Build the gateway router.
pub fn router(state: Arc<AppState>, max_body_size: usize) -> Router {
    Router::new()
        .route("/", get(status_handler))
        .route("/tts", post(tts_handler))
        .route("/download", get(download_handler))
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The HTTP gateway.
pub struct TtsServer {
    config: ServiceConfig,
    state: Arc<AppState>,
}

impl TtsServer {
    /// Create a server over `engine`.
    pub fn new(
        config: ServiceConfig,
        engine: Arc<dyn InferenceEngine>,
        prometheus: Option<PrometheusHandle>,
    ) -> TtsResult<Self> {
        let state = Arc::new(AppState::new(engine, &config, prometheus)?);
        Ok(Self { config, state })
    }

    /// The router served by [`run`](Self::run).
    pub fn router(&self) -> Router {
        router(Arc::clone(&self.state), self.config.server.max_body_size)
    }

    /// Serve until SIGINT or SIGTERM.
    pub async fn run(self) -> TtsResult<()> {
        let server = &self.config.server;
        let listener = tokio::net::TcpListener::bind((server.host.as_str(), server.port))
            .await
            .map_err(|e| {
                TtsError::config(format!("cannot bind {}:{}: {e}", server.host, server.port))
            })?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let background = CancellationToken::new();

        let scratch = &self.config.scratch;
        if scratch.ttl_secs > 0 {
            self.state.orchestrator.scratch().spawn_reaper(
                Duration::from_secs(scratch.ttl_secs),
                Duration::from_secs(scratch.reap_interval_secs.max(1)),
                background.clone(),
            );
        }

        let app = self.router();
        let http_handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_rx.changed().await.ok();
                })
                .await
        });

        info!(
            addr = %addr,
            workers = self.config.server.workers,
            scratch = %scratch.dir.display(),
            "TTS gateway started"
        );

        shutdown_signal().await;

        info!("Shutdown signal received, stopping server...");

        let _ = shutdown_tx.send(true);
        background.cancel();

        let timeout = Duration::from_secs(self.config.server.shutdown_timeout_secs);
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                warn!("Shutdown timeout, forcing exit");
            }
            result = http_handle => {
                match result {
                    Ok(Ok(())) => info!("Server stopped gracefully"),
                    Ok(Err(e)) => warn!(error = %e, "Server stopped with error"),
                    Err(e) => warn!(error = %e, "Server task failed"),
                }
            }
        }

        Ok(())
    }
}

/// `GET /`: whether a synthesis is in flight.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        is_makeing: u8::from(state.orchestrator.is_busy()),
    })
}

/// `POST /tts`: synthesize and return the output path.
#[instrument(skip_all)]
async fn tts_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TtsResponse>, ApiError> {
    let params: TtsParams = if body.iter().all(u8::is_ascii_whitespace) {
        TtsParams::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?
    };

    let request = params.into_request(&state.defaults)?;
    info!(
        request_id = %request.request_id,
        mode = %request.mode,
        text_len = request.text.len(),
        reference = request.reference_url.as_deref().unwrap_or(""),
        seed = request.seed,
        speed = request.speed,
        "Received synthesis request"
    );

    let result = state.orchestrator.synthesize(request).await?;
    Ok(Json(TtsResponse::from(&result)))
}

/// `GET /download?path=...`: stream a file from scratch storage.
async fn download_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, ApiError> {
    let requested = params.path.unwrap_or_default();
    let path = state
        .orchestrator
        .scratch()
        .resolve(&requested)
        .ok_or(ApiError::NotFound)?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| ApiError::Internal(format!("cannot open file: {e}")))?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("audio");

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&path).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{name}\""),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Info handler.
async fn info_handler(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    let engine = state.orchestrator.engine();
    Json(InfoResponse {
        name: "TTS Gateway",
        version: env!("CARGO_PKG_VERSION"),
        sample_rate: engine.sample_rate(),
        speakers: engine.speakers(),
    })
}

/// Metrics handler (Prometheus format).
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => ApiError::NotFound.into_response(),
    }
}

/// Wait for shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
