// Configuration constants for the server

use std::path::PathBuf;

use cloner_core::{EngineConfig, VocoderKind};

#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub checkpoint_path: PathBuf,
    pub vocab_path: PathBuf,
    pub vocoder: VocoderKind,
    pub vocoder_path: PathBuf,
    pub scratch_dir: PathBuf,
    pub rate_limit_per_minute: u32,
    pub max_upload_bytes: usize,
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let vocoder = VocoderKind::Vocos;
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            checkpoint_path: PathBuf::from("models/f5_tts_base.onnx"),
            vocab_path: PathBuf::from("models/vocab.txt"),
            vocoder_path: PathBuf::from("models").join(vocoder.file_name()),
            vocoder,
            scratch_dir: PathBuf::from("scratch"),
            rate_limit_per_minute: 60,
            max_upload_bytes: 25 * 1024 * 1024,
            cors_allowed_origins: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST").unwrap_or(defaults.host);

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let checkpoint_path = std::env::var("F5_CHECKPOINT")
            .map(PathBuf::from)
            .unwrap_or(defaults.checkpoint_path);

        let vocab_path = std::env::var("F5_VOCAB")
            .map(PathBuf::from)
            .unwrap_or(defaults.vocab_path);

        let vocoder = std::env::var("F5_VOCODER")
            .ok()
            .and_then(|v| match v.parse() {
                Ok(kind) => Some(kind),
                Err(e) => {
                    tracing::warn!("{e}, using default vocoder");
                    None
                }
            })
            .unwrap_or(defaults.vocoder);

        let vocoder_path = std::env::var("F5_VOCODER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("models").join(vocoder.file_name()));

        let scratch_dir = std::env::var("SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.scratch_dir);

        let rate_limit_per_minute = std::env::var("RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.rate_limit_per_minute);

        let max_upload_bytes = std::env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_upload_bytes);

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| origins.split(',').map(|s| s.trim().to_string()).collect());

        Self {
            host,
            port,
            checkpoint_path,
            vocab_path,
            vocoder,
            vocoder_path,
            scratch_dir,
            rate_limit_per_minute,
            max_upload_bytes,
            cors_allowed_origins,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            model_path: self.checkpoint_path.clone(),
            vocab_path: self.vocab_path.clone(),
            vocoder: self.vocoder,
            vocoder_path: self.vocoder_path.clone(),
        }
    }
}
