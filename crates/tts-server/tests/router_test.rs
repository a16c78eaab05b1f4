//! HTTP-level tests for the gateway router.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use audio_codec::write_wav_samples;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode, header};
use axum::routing::get;
use runtime::SyntheticEngine;
use serde_json::{Value, json};
use tower::ServiceExt;
use tts_core::{
    AudioChunk, ChunkStream, InferenceEngine, InferenceOptions, ServiceConfig, TtsError, TtsResult,
};
use tts_server::{AppState, router};

fn config(root: &Path) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.scratch.dir = root.join("TEMP");
    config.scratch.output_dir = root.join("output");
    config
}

fn app(engine: Arc<dyn InferenceEngine>, config: &ServiceConfig) -> (Arc<AppState>, Router) {
    let state = Arc::new(AppState::new(engine, config, None).unwrap());
    let app = router(Arc::clone(&state), config.server.max_body_size);
    (state, app)
}

async fn post_tts(app: Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/tts")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get_raw(app: Router, uri: &str) -> (StatusCode, header::HeaderMap, Bytes) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, bytes)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, _, bytes) = get_raw(app, uri).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Serves a 22.05 kHz reference clip at `/voice.wav`.
async fn reference_server() -> String {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("voice.wav");
    let samples: Vec<f32> = (0..22050)
        .map(|i| 0.6 * (2.0 * std::f32::consts::PI * 150.0 * i as f32 / 22050.0).sin())
        .collect();
    write_wav_samples(&path, &samples, 22050).unwrap();
    let wav = Bytes::from(std::fs::read(&path).unwrap());

    let app = Router::new().route(
        "/voice.wav",
        get(move || {
            let wav = wav.clone();
            async move { ([(header::CONTENT_TYPE, "audio/wav")], wav) }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Produces silence slowly until cancelled.
struct SlowEngine;

impl SlowEngine {
    fn play(opts: &InferenceOptions) -> TtsResult<ChunkStream> {
        let cancel = opts.cancel.clone();
        Ok(Box::new(std::iter::from_fn(move || {
            if cancel.is_cancelled() {
                return Some(Err(TtsError::inference("cancelled")));
            }
            std::thread::sleep(Duration::from_millis(20));
            Some(Ok(Some(AudioChunk::new(vec![0.0; 240], 24000))))
        })))
    }
}

impl InferenceEngine for SlowEngine {
    fn sample_rate(&self) -> Option<u32> {
        Some(24000)
    }

    fn speakers(&self) -> Vec<String> {
        vec!["default".to_string()]
    }

    fn pretrained(&self, _: &str, _: &str, opts: &InferenceOptions) -> TtsResult<ChunkStream> {
        Self::play(opts)
    }

    fn zero_shot(
        &self,
        _: &str,
        _: &str,
        _: &[f32],
        opts: &InferenceOptions,
    ) -> TtsResult<ChunkStream> {
        Self::play(opts)
    }

    fn cross_lingual(&self, _: &str, _: &[f32], opts: &InferenceOptions) -> TtsResult<ChunkStream> {
        Self::play(opts)
    }

    fn instruct(
        &self,
        _: &str,
        _: &str,
        _: &[f32],
        opts: &InferenceOptions,
    ) -> TtsResult<ChunkStream> {
        Self::play(opts)
    }
}

#[tokio::test]
async fn test_missing_reference_is_400() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, app) = app(Arc::new(SyntheticEngine::default()), &config(tmp.path()));

    let (status, body) = post_tts(
        app,
        json!({"gen_text": "Hello", "language": "", "speed_factor": 1.0}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("reference audio is required"));
}

#[tokio::test]
async fn test_instructed_clone_returns_path() {
    let base = reference_server().await;
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let (state, app) = app(Arc::new(SyntheticEngine::default()), &config);

    let (status, body) = post_tts(
        app.clone(),
        json!({
            "gen_text": "Hello world",
            "language": "speak slowly",
            "ref_audio_path": format!("{base}/voice.wav"),
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], 1);
    assert_eq!(body["speed"], 1.0);
    assert!(body["time"].as_f64().unwrap() >= 0.0);

    let path = body["path"].as_str().unwrap();
    assert!(Path::new(path).starts_with(&config.scratch.dir));
    assert!(path.ends_with(".mp3"));
    assert!(!state.orchestrator().is_busy());

    let (status, headers, bytes) = get_raw(app, &format!("/download?path={path}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        headers[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment")
    );
    assert_eq!(headers[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(bytes.len() as u64, std::fs::metadata(path).unwrap().len());
}

#[tokio::test]
async fn test_pretrained_then_download_by_name() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, app) = app(Arc::new(SyntheticEngine::default()), &config(tmp.path()));

    let (status, body) = post_tts(
        app.clone(),
        json!({"gen_text": "Good morning.", "mode": "sft", "seed": "5", "speed_factor": 1.5}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["speed"], 1.5);

    let name = Path::new(body["path"].as_str().unwrap())
        .file_name()
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let (status, _, _) = get_raw(app, &format!("/download?path={name}")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_download_rejects_traversal() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, app) = app(Arc::new(SyntheticEngine::default()), &config(tmp.path()));

    let (status, body) = get_json(app.clone(), "/download?path=../../etc/passwd").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = get_json(app.clone(), "/download?path=missing.wav").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(app, "/download").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bad_input_is_400() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, app) = app(Arc::new(SyntheticEngine::default()), &config(tmp.path()));

    let (status, _) = post_tts(app.clone(), json!({"mode": "pretrained", "seed": "abc"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_tts(app.clone(), json!({"mode": "karaoke"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid mode"));

    for speed in [-1.0, 1e-5, 3.0] {
        let (status, _) =
            post_tts(app.clone(), json!({"mode": "pretrained", "speed_factor": speed})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "speed {speed}");
    }

    let (status, _) = post_tts(app.clone(), json!({"mode": "instruct", "language": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("POST")
        .uri("/tts")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_busy_is_503_and_timeout_is_504() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config(tmp.path());
    config.orchestrator.request_timeout_secs = 1;
    let (state, app) = app(Arc::new(SlowEngine), &config);

    let (status, body) = get_json(app.clone(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"is_makeing": 0}));

    let first = tokio::spawn(post_tts(app.clone(), json!({"mode": "pretrained"})));
    while !state.orchestrator().is_busy() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let (_, body) = get_json(app.clone(), "/").await;
    assert_eq!(body["is_makeing"], 1);

    let (status, body) = post_tts(app.clone(), json!({"mode": "pretrained"})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());

    let (status, _) = first.await.unwrap();
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

    let (_, body) = get_json(app, "/").await;
    assert_eq!(body["is_makeing"], 0);
}

#[tokio::test]
async fn test_health_info_and_metrics() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, app) = app(Arc::new(SyntheticEngine::default()), &config(tmp.path()));

    let (status, body) = get_json(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = get_json(app.clone(), "/info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sample_rate"], 24000);
    assert!(body["speakers"].as_array().unwrap().contains(&json!("default")));

    // No recorder installed in tests.
    let (status, _, _) = get_raw(app, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_startup_creates_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let _ = app(Arc::new(SyntheticEngine::default()), &config);

    assert!(config.scratch.dir.is_dir());
    assert!(config.scratch.output_dir.is_dir());
}
