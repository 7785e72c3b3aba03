//! Per-request scratch namespaces.
//!
//! Every transient path of one request (reference sample, clip directory,
//! result archive) lives under `<scratch_root>/<token>/`, where the token
//! is unique per request, so concurrent requests cannot interfere.
//! Dropping the guard deletes the whole namespace on every exit path;
//! deletion is remove-if-present and never fails the request.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

pub struct RequestScratch {
    dir: PathBuf,
    token: String,
}

impl RequestScratch {
    /// Create a fresh namespace under `scratch_root`.
    pub fn create(scratch_root: &Path) -> io::Result<Self> {
        let token = Uuid::new_v4().to_string();
        let dir = scratch_root.join(&token);
        fs::create_dir_all(dir.join("generated_audio"))?;
        Ok(Self { dir, token })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Where the uploaded reference sample is persisted.
    pub fn ref_audio_path(&self) -> PathBuf {
        self.dir.join("ref_audio.wav")
    }

    /// Directory the per-letter clips are written into.
    pub fn clips_dir(&self) -> PathBuf {
        self.dir.join("generated_audio")
    }

    /// Where the result archive is assembled.
    pub fn archive_path(&self) -> PathBuf {
        self.dir.join("alphabet_audio.zip")
    }
}

impl Drop for RequestScratch {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(token = %self.token, "failed to remove scratch dir: {e}"),
        }
    }
}
