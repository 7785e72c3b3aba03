//! Shared helpers for the HTTP integration tests: a stub engine behind the
//! real routes, plus multipart request builders.

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::Router;

use cloner_core::{CloningEngine, ReferenceVoice};
use server::config::ServerConfig;
use server::{app, AppState};

pub const BOUNDARY: &str = "cloner-test-boundary";

/// Deterministic stand-in for the ONNX engine. It decodes the uploaded WAV
/// for real, so corrupt uploads genuinely fail preprocessing.
pub struct StubEngine {
    fail_at: Option<usize>,
    synthesized: AtomicUsize,
}

impl StubEngine {
    pub fn new() -> Self {
        Self {
            fail_at: None,
            synthesized: AtomicUsize::new(0),
        }
    }

    /// Fail synthesis at clip index `n` (0-based).
    pub fn failing_at(n: usize) -> Self {
        Self {
            fail_at: Some(n),
            synthesized: AtomicUsize::new(0),
        }
    }
}

impl CloningEngine for StubEngine {
    fn preprocess(
        &self,
        reference_audio: &Path,
        transcript: &str,
    ) -> anyhow::Result<ReferenceVoice> {
        let mut reader = hound::WavReader::open(reference_audio)
            .map_err(|e| anyhow::anyhow!("failed to read reference audio: {e}"))?;
        let sample_rate = reader.spec().sample_rate;
        let samples: Vec<f32> = reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<Result<_, _>>()?;
        anyhow::ensure!(!samples.is_empty(), "reference audio contains no samples");
        Ok(ReferenceVoice {
            samples,
            sample_rate,
            transcript: transcript.to_string(),
        })
    }

    fn synthesize(
        &self,
        _reference: &ReferenceVoice,
        text: &str,
    ) -> anyhow::Result<(Vec<f32>, u32)> {
        let call = self.synthesized.fetch_add(1, Ordering::SeqCst);
        if Some(call) == self.fail_at {
            anyhow::bail!("model rejected input at item {}", call + 1);
        }
        let n = 240 + text.len();
        Ok(((0..n).map(|i| 0.4 * (i as f32 / n as f32)).collect(), 24_000))
    }
}

/// Router wired to a stub engine with scratch space under `scratch_dir`.
pub fn test_app(engine: Arc<dyn CloningEngine>, scratch_dir: &Path) -> Router {
    let config = ServerConfig {
        scratch_dir: scratch_dir.to_path_buf(),
        ..ServerConfig::default()
    };
    app(AppState {
        engine,
        request_count: Arc::new(AtomicU64::new(0)),
        config,
    })
}

/// A well-formed multipart POST to `/generate` carrying one file field.
pub fn multipart_request(field_name: &str, payload: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field_name}\"; filename=\"sample.wav\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/generate")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// 0.1 s of a 440 Hz tone as a 16-bit mono WAV.
pub fn reference_wav_bytes() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 24_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..2_400 {
            let t = i as f32 / 24_000.0;
            let v = (t * 440.0 * std::f32::consts::TAU).sin() * 0.4;
            writer.write_sample((v * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
