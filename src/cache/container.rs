//! Compressed cache container.
//!
//! Layout: a 4-byte big-endian decompressed length, followed by a bzip2
//! stream whose `BZh1` magic has been stripped. Decompression either yields
//! exactly the expected number of bytes or fails; a short result would
//! otherwise cut playback short without any error.

use crate::error::{PlayerError, Result};
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::io::{Cursor, Read, Write};

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Upper bound on the up-front output allocation; larger outputs grow as
/// they decode so a bogus prefix cannot reserve gigabytes.
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

/// Stream magic that the container omits (block size 1 = 100k).
const BZIP2_MAGIC: &[u8; 4] = b"BZh1";

/// Reads the decompressed length stored in the container prefix.
///
/// # Errors
///
/// Returns [`PlayerError::Decode`] if `src` is shorter than the prefix.
pub fn embedded_len(src: &[u8]) -> Result<usize> {
    let prefix: [u8; LENGTH_PREFIX_LEN] = src
        .get(..LENGTH_PREFIX_LEN)
        .and_then(|p| p.try_into().ok())
        .ok_or_else(|| {
            PlayerError::decode(format!(
                "container is {} bytes, shorter than its length prefix",
                src.len()
            ))
        })?;
    Ok(u32::from_be_bytes(prefix) as usize)
}

/// Unpacks a container.
///
/// # Arguments
///
/// * `src` - Raw container bytes (length prefix included)
/// * `expected_len` - Decompressed size the caller expects
///
/// # Errors
///
/// Returns [`PlayerError::Decode`] if the embedded length disagrees with
/// `expected_len`, the bzip2 stream is corrupt, or it decompresses to any
/// size other than `expected_len`.
pub fn decompress(src: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let declared = embedded_len(src)?;
    if declared != expected_len {
        return Err(PlayerError::decode(format!(
            "container declares {} decompressed bytes but {} were expected",
            declared, expected_len
        )));
    }

    let stream = Cursor::new(BZIP2_MAGIC.as_slice()).chain(&src[LENGTH_PREFIX_LEN..]);
    // One byte of headroom so an overlong stream is detected instead of truncated
    let mut decoder = BzDecoder::new(stream).take(expected_len as u64 + 1);
    let mut out = Vec::with_capacity(expected_len.min(MAX_PREALLOC));
    decoder
        .read_to_end(&mut out)
        .map_err(|e| PlayerError::decode(format!("bzip2 stream is corrupt: {}", e)))?;

    if out.len() > expected_len {
        return Err(PlayerError::decode(format!(
            "bzip2 stream holds more than the expected {} bytes",
            expected_len
        )));
    }
    if out.len() < expected_len {
        return Err(PlayerError::decode(format!(
            "bzip2 stream ended after {} of {} bytes",
            out.len(),
            expected_len
        )));
    }
    Ok(out)
}

/// Packs `data` into a container.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(data.len()).map_err(|_| {
        PlayerError::decode(format!("{} bytes is too large for a container", data.len()))
    })?;

    let mut encoder = BzEncoder::new(Vec::new(), Compression::new(1));
    encoder.write_all(data)?;
    let stream = encoder.finish()?;

    if !stream.starts_with(BZIP2_MAGIC) {
        return Err(PlayerError::decode("bzip2 encoder produced an unexpected header"));
    }

    let mut out = Vec::with_capacity(LENGTH_PREFIX_LEN + stream.len() - BZIP2_MAGIC.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&stream[BZIP2_MAGIC.len()..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> Vec<u8> {
        (0..2000u32).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_container_layout() {
        let data = payload();
        let packed = compress(&data).unwrap();
        assert_eq!(embedded_len(&packed).unwrap(), data.len());
        // The stripped magic must not appear at the start of the stream
        assert_ne!(&packed[4..8], b"BZh1");
        assert_eq!(decompress(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_length_mismatch_is_decode_error() {
        let data = payload();
        let packed = compress(&data).unwrap();
        let err = decompress(&packed, data.len() + 1).unwrap_err();
        assert!(matches!(err, PlayerError::Decode(_)));
    }

    #[test]
    fn test_prefix_lies_about_length() {
        let data = payload();
        let mut packed = compress(&data).unwrap();

        // Prefix claims fewer bytes than the stream holds: must not truncate
        let short = (data.len() - 10) as u32;
        packed[..4].copy_from_slice(&short.to_be_bytes());
        assert!(matches!(
            decompress(&packed, data.len() - 10),
            Err(PlayerError::Decode(_))
        ));

        // Prefix claims more bytes than the stream holds
        let long = (data.len() + 10) as u32;
        packed[..4].copy_from_slice(&long.to_be_bytes());
        assert!(matches!(
            decompress(&packed, data.len() + 10),
            Err(PlayerError::Decode(_))
        ));
    }

    #[test]
    fn test_corrupt_stream() {
        let data = payload();
        let mut packed = compress(&data).unwrap();
        let mid = packed.len() / 2;
        packed.truncate(mid);
        assert!(matches!(
            decompress(&packed, data.len()),
            Err(PlayerError::Decode(_))
        ));
    }

    #[test]
    fn test_too_short_for_prefix() {
        assert!(matches!(embedded_len(&[0, 1]), Err(PlayerError::Decode(_))));
        assert!(matches!(decompress(&[], 0), Err(PlayerError::Decode(_))));
    }
}
