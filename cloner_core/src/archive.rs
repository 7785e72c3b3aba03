//! Result packaging: one deflate-compressed zip holding all generated
//! clips, entries named by bare file name.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::Context;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Bundle `clips` into a zip archive at `zip_path`.
pub fn write_zip(clips: &[PathBuf], zip_path: &Path) -> anyhow::Result<()> {
    let file = File::create(zip_path)
        .with_context(|| format!("failed to create {}", zip_path.display()))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for clip in clips {
        let name = clip
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow::anyhow!("clip path has no file name: {}", clip.display()))?;
        zip.start_file(name, options)?;
        let mut reader = File::open(clip)
            .with_context(|| format!("failed to open clip {}", clip.display()))?;
        io::copy(&mut reader, &mut zip)?;
    }
    zip.finish()?;
    Ok(())
}
