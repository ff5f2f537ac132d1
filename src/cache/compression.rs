//! Threshold-gated zlib compression for L2 payloads
//!
//! Every payload written to L2 carries a prefix naming its encoding:
//!
//! - `raw:` followed by the serialized bytes, for payloads at or under the threshold
//! - `compressed:` followed by a zlib stream, for payloads over the threshold
//!
//! Decoding dispatches on the prefix alone, so entries written with a
//! different threshold or level remain readable.

use super::errors::{CacheError, CacheResult};
use flate2::write::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;
use std::io::Write;

pub const RAW_PREFIX: &[u8] = b"raw:";
pub const COMPRESSED_PREFIX: &[u8] = b"compressed:";

/// Encoder/decoder for the prefixed L2 format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionCodec {
    threshold: usize,
    level: u32,
}

impl CompressionCodec {
    /// `level` is clamped into the zlib range 1..=9
    pub fn new(threshold: usize, level: u32) -> Self {
        Self {
            threshold,
            level: level.clamp(1, 9),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Whether a payload of `len` bytes would be stored compressed
    pub fn should_compress(&self, len: usize) -> bool {
        len > self.threshold
    }

    pub fn encode(&self, data: &[u8]) -> CacheResult<Vec<u8>> {
        if !self.should_compress(data.len()) {
            let mut out = Vec::with_capacity(RAW_PREFIX.len() + data.len());
            out.extend_from_slice(RAW_PREFIX);
            out.extend_from_slice(data);
            return Ok(out);
        }

        let mut out = Vec::with_capacity(COMPRESSED_PREFIX.len() + data.len() / 2);
        out.extend_from_slice(COMPRESSED_PREFIX);

        let mut encoder = ZlibEncoder::new(out, Compression::new(self.level));
        encoder
            .write_all(data)
            .map_err(|e| CacheError::Compression(format!("zlib compression failed: {e}")))?;
        encoder
            .finish()
            .map_err(|e| CacheError::Compression(format!("zlib compression finish failed: {e}")))
    }

    pub fn decode(&self, data: &[u8]) -> CacheResult<Vec<u8>> {
        if let Some(raw) = data.strip_prefix(RAW_PREFIX) {
            return Ok(raw.to_vec());
        }

        if let Some(compressed) = data.strip_prefix(COMPRESSED_PREFIX) {
            let mut decoder = ZlibDecoder::new(Vec::new());
            decoder
                .write_all(compressed)
                .map_err(|e| CacheError::Compression(format!("zlib decompression failed: {e}")))?;
            return decoder.finish().map_err(|e| {
                CacheError::Compression(format!("zlib decompression finish failed: {e}"))
            });
        }

        Err(CacheError::Serialization(
            "payload has neither a raw: nor a compressed: prefix".to_string(),
        ))
    }

    pub fn is_compressed(data: &[u8]) -> bool {
        data.starts_with(COMPRESSED_PREFIX)
    }
}

impl Default for CompressionCodec {
    fn default() -> Self {
        Self::new(1000, 6)
    }
}
