use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::info;

/// Write a gzip copy of `src` to `dest`, leaving `src` in place.
pub fn gzip_file(src: &Path, dest: &Path) -> Result<u64> {
    info!("Gzipping {:?} to {:?}", src, dest);
    let mut input = BufReader::new(
        File::open(src).with_context(|| format!("Failed to open {:?}", src))?,
    );
    let output = BufWriter::new(
        File::create(dest).with_context(|| format!("Failed to create {:?}", dest))?,
    );

    let mut encoder = GzEncoder::new(output, Compression::default());
    let copied = io::copy(&mut input, &mut encoder)?;
    let mut output = encoder.finish()?;
    output.flush()?;
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn compressed_copy_inflates_to_original() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("store.db");
        let dest = dir.path().join("store.db.gz");
        let body: Vec<u8> = (0..10_000u32).flat_map(|i| i.to_le_bytes()).collect();
        std::fs::write(&src, &body).unwrap();

        let copied = gzip_file(&src, &dest).unwrap();
        assert_eq!(copied, body.len() as u64);
        assert!(src.exists());

        let mut inflated = Vec::new();
        GzDecoder::new(File::open(&dest).unwrap()).read_to_end(&mut inflated).unwrap();
        assert_eq!(inflated, body);
    }

    #[test]
    fn missing_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(gzip_file(&dir.path().join("nope.db"), &dir.path().join("nope.gz")).is_err());
    }
}
