use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// API error surface.
///
/// Bodies are plain text, not JSON: callers script against the exact
/// message strings, so the Display impls here are part of the contract.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No audio file provided")]
    MissingAudio,

    #[error("Error preprocessing reference audio: {0}")]
    Preprocess(anyhow::Error),

    #[error("Error during TTS generation: {0}")]
    Synthesis(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingAudio => StatusCode::BAD_REQUEST,
            ApiError::Preprocess(e) => {
                tracing::error!("preprocessing failed: {e:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Synthesis(e) => {
                tracing::error!("generation failed: {e:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}
