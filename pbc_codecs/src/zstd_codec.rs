use pbc_core::{Codec, CodecError};

/// Zstandard block codec.
///
/// Each block becomes one independent zstd frame at the configured level
/// (default: 3).
pub struct ZstdCodec {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Codec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress_bound(&self, raw_len: usize) -> usize {
        zstd::zstd_safe::compress_bound(raw_len)
    }

    fn compress_into(&self, raw: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        zstd::bulk::compress_to_buffer(raw, dst, self.level)
            .map_err(|source| CodecError::Io { codec: "zstd", source })
    }

    fn decompress_into(&self, compressed: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        // The destination is exactly the original length, so an oversized
        // frame fails here instead of growing the buffer.
        zstd::bulk::decompress_to_buffer(compressed, dst)
            .map_err(|source| CodecError::Io { codec: "zstd", source })
    }
}
