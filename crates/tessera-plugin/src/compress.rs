//! Record payload compression.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Upper bound for trusting a declared size when preallocating.
const MAX_RESERVE: usize = 16 * 1024 * 1024;

/// Inflate a zlib stream into `output`, reusing its allocation.
///
/// Stops one byte past `expected_size`, so an oversized stream shows up as
/// `output.len() > expected_size` without inflating the rest.
pub(crate) fn inflate(data: &[u8], expected_size: usize, output: &mut Vec<u8>) -> std::io::Result<()> {
    output.clear();
    output.reserve(expected_size.min(MAX_RESERVE));
    ZlibDecoder::new(data)
        .take(expected_size as u64 + 1)
        .read_to_end(output)?;
    Ok(())
}

/// Deflate `data` into a zlib stream.
pub(crate) fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
