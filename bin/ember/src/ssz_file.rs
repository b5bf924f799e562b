use std::{fs, path::Path};

use anyhow::Context;
use snap::raw::{Decoder, Encoder};

const SNAPPY_EXTENSION: &str = "ssz_snappy";

fn is_snappy(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension == SNAPPY_EXTENSION)
}

/// Reads SSZ bytes from `path`, decompressing raw snappy for `.ssz_snappy` files.
pub fn read_ssz(path: &Path) -> anyhow::Result<Vec<u8>> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if !is_snappy(path) {
        return Ok(bytes);
    }
    Decoder::new()
        .decompress_vec(&bytes)
        .with_context(|| format!("Failed to decompress {}", path.display()))
}

/// Writes SSZ bytes to `path`, compressing with raw snappy for `.ssz_snappy` files.
pub fn write_ssz(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let bytes = if is_snappy(path) {
        Encoder::new()
            .compress_vec(bytes)
            .with_context(|| format!("Failed to compress {}", path.display()))?
    } else {
        bytes.to_vec()
    };
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snappy_files_are_compressed_on_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let payload = vec![7u8; 4096];

        let compressed = dir.path().join("state.ssz_snappy");
        write_ssz(&compressed, &payload).expect("writes");
        assert!(fs::read(&compressed).expect("reads").len() < payload.len());
        assert_eq!(read_ssz(&compressed).expect("reads back"), payload);

        let plain = dir.path().join("state.ssz");
        write_ssz(&plain, &payload).expect("writes");
        assert_eq!(fs::read(&plain).expect("reads"), payload);
        assert_eq!(read_ssz(&plain).expect("reads back"), payload);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_ssz(Path::new("/nonexistent/pre.ssz")).expect_err("missing file");
        assert!(format!("{err}").contains("/nonexistent/pre.ssz"));
    }
}
