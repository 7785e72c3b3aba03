//! HTTP surface of the alphabet voice-cloning service: one upload in, one
//! archive of 26 cloned-voice clips out.

pub mod config;
pub mod error;
pub mod scratch;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer,
};
use tracing::{info, warn};

use cloner_core::{archive, batch, CloningEngine};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::scratch::RequestScratch;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn CloningEngine>,
    pub request_count: Arc<AtomicU64>,
    pub config: ServerConfig,
}

static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Build the application router around `state`.
pub fn app(state: AppState) -> Router {
    let _ = START_TIME.get_or_init(Instant::now);

    // Global rate limit: all requests share one bucket. Works behind
    // proxies where per-IP extraction is unreliable.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second((state.config.rate_limit_per_minute / 60).max(1) as u64)
            .burst_size(state.config.rate_limit_per_minute)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .expect("valid rate limit configuration"),
    );

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(cors_layer(&state.config))
        .into_inner();

    Router::new()
        .route("/", get(index))
        .route("/healthz", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .route("/generate", post(generate))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(middleware_stack)
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    match &config.cors_allowed_origins {
        Some(allowed) => {
            let origins: Vec<HeaderValue> =
                allowed.iter().filter_map(|origin| origin.parse().ok()).collect();
            if origins.is_empty() {
                warn!("CORS_ALLOWED_ORIGINS is empty, falling back to permissive CORS");
                CorsLayer::new()
                    .allow_origin(tower_http::cors::Any)
                    .allow_methods(methods)
                    .allow_headers(tower_http::cors::Any)
            } else {
                info!("CORS configured for {} origin(s)", origins.len());
                CorsLayer::new()
                    .allow_origin(tower_http::cors::AllowOrigin::list(origins))
                    .allow_methods(methods)
                    .allow_headers(tower_http::cors::Any)
            }
        }
        None => {
            warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(methods)
                .allow_headers(tower_http::cors::Any)
        }
    }
}

pub async fn index() -> &'static str {
    "F5-TTS Alphabet Voice Cloning Service is running!"
}

pub async fn health_check() -> &'static str {
    "ok"
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub cpu_usage_percent: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub request_count: u64,
    pub uptime_seconds: u64,
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<MetricsResponse> {
    let mut system = sysinfo::System::new();
    system.refresh_cpu();
    system.refresh_memory();

    Json(MetricsResponse {
        cpu_usage_percent: system.global_cpu_info().cpu_usage(),
        memory_used_mb: system.used_memory() / 1024 / 1024,
        memory_total_mb: system.total_memory() / 1024 / 1024,
        request_count: state.request_count.load(Ordering::Relaxed),
        uptime_seconds: START_TIME
            .get()
            .map(|start| start.elapsed().as_secs())
            .unwrap_or(0),
    })
}

/// `POST /generate`: accept one reference sample as multipart field
/// `audio`, synthesize all 26 alphabet phrases in that voice, and respond
/// with a zip of the clips. The request's scratch namespace is deleted on
/// every exit path when the guard drops.
pub async fn generate(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);

    let audio = read_audio_field(&mut multipart).await?;

    let scratch = RequestScratch::create(&state.config.scratch_dir)
        .map_err(|e| ApiError::Internal(format!("could not create working directory: {e}")))?;

    tokio::fs::write(scratch.ref_audio_path(), &audio)
        .await
        .map_err(|e| ApiError::Internal(format!("could not persist reference audio: {e}")))?;
    info!(token = %scratch.token(), bytes = audio.len(), "reference audio received");

    // The 26-phrase loop is CPU-bound model inference; run it off the
    // async runtime. No timeout: the request runs to completion or failure.
    let engine = state.engine.clone();
    let ref_path = scratch.ref_audio_path();
    let clips_dir = scratch.clips_dir();
    let archive_path = scratch.archive_path();
    tokio::task::spawn_blocking(move || {
        // The reference transcript is intentionally blank: the engine
        // accepts it as pass-through and estimates duration itself.
        let reference = engine
            .preprocess(&ref_path, "")
            .map_err(ApiError::Preprocess)?;
        let clips = batch::generate_alphabet(engine.as_ref(), &reference, &clips_dir)
            .map_err(ApiError::Synthesis)?;
        archive::write_zip(&clips, &archive_path).map_err(ApiError::Synthesis)?;
        Ok::<_, ApiError>(())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("synthesis task failed: {e}")))??;

    let bytes = tokio::fs::read(scratch.archive_path())
        .await
        .map_err(|e| ApiError::Internal(format!("could not read archive: {e}")))?;
    info!(token = %scratch.token(), bytes = bytes.len(), "archive ready");

    let headers = [
        (
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/zip"),
        ),
        (
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"alphabet_audio.zip\""),
        ),
    ];
    Ok((headers, bytes).into_response())
}

/// Pull the `audio` field out of the multipart body.
async fn read_audio_field(multipart: &mut Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Internal(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some("audio") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Internal(format!("failed to read upload: {e}")))?;
            return Ok(bytes.to_vec());
        }
    }
    Err(ApiError::MissingAudio)
}
