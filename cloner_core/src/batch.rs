//! The batch synthesis driver: one clip per alphabet phrase, sequential,
//! no retries. The first failure aborts the remaining items; the caller
//! discards whatever was already written.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::alphabet;
use crate::engine::{CloningEngine, ReferenceVoice};
use crate::wav;

/// Synthesize all 26 alphabet phrases in the reference voice, writing one
/// `<letter>.wav` per phrase into `out_dir`. Returns the clip paths in
/// letter order.
pub fn generate_alphabet(
    engine: &dyn CloningEngine,
    reference: &ReferenceVoice,
    out_dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let mut clips = Vec::with_capacity(26);
    for (letter, phrase) in alphabet::phrases() {
        let (samples, sample_rate) = engine
            .synthesize(reference, &phrase)
            .with_context(|| format!("synthesis failed for {phrase:?}"))?;
        anyhow::ensure!(!samples.is_empty(), "synthesis produced no audio for {phrase:?}");

        let path = out_dir.join(format!("{letter}.wav"));
        wav::write_wav(&path, &samples, sample_rate)?;
        debug!(%letter, samples = samples.len(), "generated clip");
        clips.push(path);
    }
    Ok(clips)
}
