//! Inference-engine seam and the ONNX-backed F5-TTS implementation.
//!
//! The synthesis model is an external collaborator with the contract
//! "reference audio + reference transcript + target text in, waveform +
//! sample rate out". Everything in this module is session-running glue;
//! the acoustic model and vocoder graphs themselves are opaque.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use anyhow::Context;
use ndarray::Array2;
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use tracing::{debug, info};

/// Output sample rate of the acoustic model / vocoder pair.
pub const SAMPLE_RATE: u32 = 24_000;

/// Mel hop length of the acoustic model, in samples.
const HOP_LENGTH: usize = 256;

/// References longer than this are truncated before conditioning.
const MAX_REF_SECS: usize = 15;

/// Frame-count heuristic when no reference transcript is available.
const FRAMES_PER_CHAR: usize = 10;

/// Hard ceiling on requested frames, roughly 30 s of audio.
const MAX_FRAMES: usize = 30 * SAMPLE_RATE as usize / HOP_LENGTH;

/// Black-box voice-cloning capability injected into the request handlers.
///
/// Implementations are constructed once at process bootstrap and shared by
/// all requests; tests substitute a stub.
pub trait CloningEngine: Send + Sync {
    /// Normalize one uploaded reference sample. Fails when the audio is
    /// missing, empty, or unreadable. The transcript is optional
    /// pass-through: a blank transcript is accepted and stored verbatim.
    fn preprocess(&self, reference_audio: &Path, transcript: &str)
        -> anyhow::Result<ReferenceVoice>;

    /// Render `text` in the reference speaker's voice. Returns mono f32
    /// samples plus their sample rate.
    fn synthesize(&self, reference: &ReferenceVoice, text: &str)
        -> anyhow::Result<(Vec<f32>, u32)>;
}

/// A normalized reference sample, ready to condition synthesis on.
#[derive(Debug, Clone)]
pub struct ReferenceVoice {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Transcript paired with the reference audio. May be blank; duration
    /// estimation then falls back to a per-character heuristic.
    pub transcript: String,
}

/// Which vocoder graph turns mel frames back into a waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocoderKind {
    Vocos,
    BigVgan,
}

impl VocoderKind {
    /// Conventional file name of the exported vocoder graph.
    pub fn file_name(&self) -> &'static str {
        match self {
            VocoderKind::Vocos => "vocos.onnx",
            VocoderKind::BigVgan => "bigvgan.onnx",
        }
    }
}

impl fmt::Display for VocoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VocoderKind::Vocos => write!(f, "vocos"),
            VocoderKind::BigVgan => write!(f, "bigvgan"),
        }
    }
}

impl FromStr for VocoderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vocos" => Ok(VocoderKind::Vocos),
            "bigvgan" => Ok(VocoderKind::BigVgan),
            other => Err(anyhow::anyhow!(
                "unknown vocoder {other:?} (expected \"vocos\" or \"bigvgan\")"
            )),
        }
    }
}

/// Startup-time constants for the engine: where the exported graphs and
/// the vocabulary live.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model_path: PathBuf,
    pub vocab_path: PathBuf,
    pub vocoder: VocoderKind,
    pub vocoder_path: PathBuf,
}

/// F5-TTS diffusion transformer exported to ONNX, plus its vocoder.
///
/// Both sessions are built once and held for the process lifetime; there is
/// no reload or teardown path.
pub struct F5Engine {
    model: Mutex<Session>,
    vocoder: Mutex<Session>,
    vocab: HashMap<char, i64>,
}

impl F5Engine {
    pub fn load(config: &EngineConfig) -> anyhow::Result<Self> {
        info!(
            "Loading F5-TTS checkpoint from {}",
            config.model_path.display()
        );
        let model = init_session(&config.model_path)?;
        info!(
            "Loading {} vocoder from {}",
            config.vocoder,
            config.vocoder_path.display()
        );
        let vocoder = init_session(&config.vocoder_path)?;
        let vocab = load_vocab(&config.vocab_path)?;
        info!("Engine ready ({} vocabulary entries)", vocab.len());

        Ok(Self {
            model: Mutex::new(model),
            vocoder: Mutex::new(vocoder),
            vocab,
        })
    }

    /// How many mel frames to ask the model for. With a transcript the
    /// reference speaking rate is extrapolated to the target text; without
    /// one a per-character heuristic is used.
    fn estimate_frames(reference: &ReferenceVoice, text: &str) -> usize {
        let ref_secs = reference.samples.len() as f32 / reference.sample_rate as f32;
        let ref_frames = (ref_secs * SAMPLE_RATE as f32 / HOP_LENGTH as f32) as usize;
        let text_chars = text.chars().count();
        let gen_frames = if reference.transcript.trim().is_empty() {
            text_chars * FRAMES_PER_CHAR
        } else {
            let ref_chars = reference.transcript.chars().count().max(1);
            ref_frames * text_chars / ref_chars
        };
        (ref_frames + gen_frames.max(1)).min(MAX_FRAMES)
    }
}

impl CloningEngine for F5Engine {
    fn preprocess(
        &self,
        reference_audio: &Path,
        transcript: &str,
    ) -> anyhow::Result<ReferenceVoice> {
        let (mut samples, sample_rate) = decode_reference(reference_audio)?;

        let max_len = sample_rate as usize * MAX_REF_SECS;
        if samples.len() > max_len {
            debug!("reference audio truncated to {MAX_REF_SECS} s");
            samples.truncate(max_len);
        }
        normalize_peak(&mut samples)?;

        Ok(ReferenceVoice {
            samples,
            sample_rate,
            transcript: transcript.to_string(),
        })
    }

    fn synthesize(
        &self,
        reference: &ReferenceVoice,
        text: &str,
    ) -> anyhow::Result<(Vec<f32>, u32)> {
        anyhow::ensure!(!text.trim().is_empty(), "target text is empty");
        let ids = tokenize(&self.vocab, &reference.transcript, text);
        anyhow::ensure!(
            !ids.is_empty(),
            "no vocabulary tokens produced for text {text:?}"
        );

        let audio = Array2::from_shape_vec((1, reference.samples.len()), reference.samples.clone())?;
        let text_ids = Array2::from_shape_vec((1, ids.len()), ids)?;
        let max_duration = ndarray::arr1(&[Self::estimate_frames(reference, text) as i64]);

        let mel = {
            let mut model = self
                .model
                .lock()
                .map_err(|_| anyhow::anyhow!("model session lock poisoned"))?;
            let outputs = model.run(inputs![
                "audio" => TensorRef::from_array_view(audio.view())?,
                "text_ids" => TensorRef::from_array_view(text_ids.view())?,
                "max_duration" => TensorRef::from_array_view(max_duration.view())?,
            ])?;
            let (_, value) = outputs
                .iter()
                .next()
                .context("acoustic model produced no outputs")?;
            value.try_extract_array::<f32>()?.to_owned()
        };

        let samples = {
            let mut vocoder = self
                .vocoder
                .lock()
                .map_err(|_| anyhow::anyhow!("vocoder session lock poisoned"))?;
            let outputs = vocoder.run(inputs![
                "mel" => TensorRef::from_array_view(mel.view())?,
            ])?;
            let (_, value) = outputs
                .iter()
                .next()
                .context("vocoder produced no outputs")?;
            value.try_extract_array::<f32>()?.as_slice().unwrap_or(&[]).to_vec()
        };
        anyhow::ensure!(!samples.is_empty(), "vocoder produced no audio");

        Ok((samples, SAMPLE_RATE))
    }
}

fn init_session(path: &Path) -> anyhow::Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_execution_providers([CPUExecutionProvider::default().build()])?
        .with_parallel_execution(true)?
        .commit_from_file(path)
        .with_context(|| format!("failed to load ONNX graph {}", path.display()))?;
    Ok(session)
}

/// Load the newline-delimited vocabulary: one token per line, id = line
/// index. Blank lines keep their index so ids stay aligned with the file.
fn load_vocab(path: &Path) -> anyhow::Result<HashMap<char, i64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read vocabulary file {}", path.display()))?;

    let mut vocab = HashMap::new();
    for (idx, line) in text.lines().enumerate() {
        if let Some(ch) = line.chars().next() {
            vocab.entry(ch).or_insert(idx as i64);
        }
    }
    anyhow::ensure!(!vocab.is_empty(), "vocabulary file {} is empty", path.display());
    Ok(vocab)
}

/// Map reference transcript + target text onto vocabulary ids. Characters
/// outside the vocabulary are skipped.
fn tokenize(vocab: &HashMap<char, i64>, transcript: &str, text: &str) -> Vec<i64> {
    let full = if transcript.trim().is_empty() {
        text.to_string()
    } else {
        format!("{transcript} {text}")
    };

    let mut skipped = 0usize;
    let ids: Vec<i64> = full
        .chars()
        .filter_map(|ch| match vocab.get(&ch) {
            Some(&id) => Some(id),
            None => {
                skipped += 1;
                None
            }
        })
        .collect();
    if skipped > 0 {
        debug!(skipped, "characters outside the model vocabulary");
    }
    ids
}

/// Decode a reference WAV into mono f32 samples.
fn decode_reference(path: &Path) -> anyhow::Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to read reference audio {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let max = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<_, _>>()?
        }
    };
    anyhow::ensure!(!samples.is_empty(), "reference audio contains no samples");

    let mono = if channels <= 1 {
        samples
    } else {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };
    Ok((mono, spec.sample_rate))
}

/// Peak-normalize in place. Silent audio is rejected: the model cannot
/// condition on it.
fn normalize_peak(samples: &mut [f32]) -> anyhow::Result<()> {
    let peak = samples.iter().fold(0.0_f32, |acc, &s| acc.max(s.abs()));
    anyhow::ensure!(peak > 0.0, "reference audio is silent");
    if peak > 1.0 {
        let scale = 1.0 / peak;
        for s in samples.iter_mut() {
            *s *= scale;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_wav(path: &Path, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 24_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn vocab_ids_follow_line_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");
        std::fs::write(&path, " \na\nb\nä\n").unwrap();

        let vocab = load_vocab(&path).unwrap();
        assert_eq!(vocab[&' '], 0);
        assert_eq!(vocab[&'a'], 1);
        assert_eq!(vocab[&'ä'], 3);
    }

    #[test]
    fn empty_vocab_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");
        std::fs::write(&path, "").unwrap();
        assert!(load_vocab(&path).is_err());
    }

    #[test]
    fn tokenize_skips_unknown_characters() {
        let vocab: HashMap<char, i64> = [(' ', 0), ('a', 1), ('b', 2)].into_iter().collect();
        assert_eq!(tokenize(&vocab, "", "abba!"), vec![1, 2, 2, 1]);
        // transcript is prepended with a separating space
        assert_eq!(tokenize(&vocab, "ab", "ba"), vec![1, 2, 0, 2, 1]);
    }

    #[test]
    fn decode_downmixes_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_test_wav(&path, 2, &[i16::MAX, 0, 0, i16::MAX]);

        let (mono, sample_rate) = decode_reference(&path).unwrap();
        assert_eq!(sample_rate, 24_000);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn decode_rejects_empty_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_test_wav(&path, 1, &[]);
        assert!(decode_reference(&path).is_err());
    }

    #[test]
    fn decode_rejects_non_wav_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"not a riff container").unwrap();
        assert!(decode_reference(&path).is_err());
    }

    #[test]
    fn silence_is_rejected() {
        let mut silent = vec![0.0_f32; 100];
        assert!(normalize_peak(&mut silent).is_err());

        let mut loud = vec![2.0_f32; 4];
        normalize_peak(&mut loud).unwrap();
        assert!((loud[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn vocoder_kind_parses() {
        assert_eq!("vocos".parse::<VocoderKind>().unwrap(), VocoderKind::Vocos);
        assert_eq!("bigvgan".parse::<VocoderKind>().unwrap(), VocoderKind::BigVgan);
        assert!("wavernn".parse::<VocoderKind>().is_err());
    }

    #[test]
    fn frame_estimate_scales_with_text() {
        let reference = ReferenceVoice {
            samples: vec![0.1; 24_000],
            sample_rate: 24_000,
            transcript: String::new(),
        };
        let short = F5Engine::estimate_frames(&reference, "ab");
        let long = F5Engine::estimate_frames(&reference, &"a".repeat(60));
        assert!(long > short);
        assert!(long <= MAX_FRAMES);
    }
}
