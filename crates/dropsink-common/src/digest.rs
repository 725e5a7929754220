//! Content digests for batch-file deduplication
//!
//! The digest gates dedup, not integrity or security; an MD5-class hash is
//! sufficient here. Files are streamed in fixed-size chunks so memory stays
//! bounded regardless of file size.

use crate::error::Result;
use md5::{Digest, Md5};
use std::io::Read;
use std::path::Path;

/// Chunk size for streaming file reads.
const CHUNK_SIZE: usize = 8192;

/// Compute the content digest of a file, returned as a lowercase hex string.
pub fn content_digest(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    digest_reader(&mut file)
}

/// Compute the content digest of any readable source.
pub fn digest_reader<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Md5::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Derive a stable name from a file path: the base name without directory or
/// extension, with whitespace normalized to underscores.
pub fn stable_name(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    stem.split_whitespace().collect::<Vec<_>>().join("_")
}
