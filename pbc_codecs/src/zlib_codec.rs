use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use pbc_core::{Codec, CodecError};

/// Largest dynamic Huffman block header, rounded up.
const HUFFMAN_HEADER_MAX: usize = 352;
/// zlib header, Adler-32 trailer and final padding.
const ZLIB_FRAMING: usize = 16;

/// zlib (RFC 1950) block codec.
///
/// Each block is a complete zlib stream: deflate data wrapped in the zlib
/// header and Adler-32 trailer. Only `Status::StreamEnd` counts as success,
/// in both directions, so a truncated or over-long stream is rejected.
pub struct ZlibCodec {
    /// Compression level (0 = store, 9 = best).
    pub level: u32,
}

impl Default for ZlibCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl ZlibCodec {
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }
}

impl Codec for ZlibCodec {
    fn name(&self) -> &'static str {
        "zlib"
    }

    /// Worst case for the linked deflate backend, which is looser than zlib's
    /// `compressBound`.
    ///
    /// miniz_oxide only falls back to a stored block when the block fits in
    /// its 32 KiB window. Larger blocks on incompressible input stay Huffman
    /// coded, which costs at most 9 bits per byte plus a dynamic header of at
    /// most `HUFFMAN_HEADER_MAX` bytes. A block is never shorter than 16 KiB
    /// of input.
    fn compress_bound(&self, raw_len: usize) -> usize {
        raw_len + (raw_len >> 3) + ((raw_len >> 14) + 1) * HUFFMAN_HEADER_MAX + ZLIB_FRAMING
    }

    fn compress_into(&self, raw: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        let mut stream = Compress::new(Compression::new(self.level), true);
        let status = stream
            .compress(raw, dst, FlushCompress::Finish)
            .map_err(|e| status_error(e.to_string()))?;
        match status {
            Status::StreamEnd => Ok(stream.total_out() as usize),
            Status::Ok | Status::BufError => Err(status_error(format!(
                "compressed stream did not fit in {} bytes ({} of {} input bytes consumed)",
                dst.len(),
                stream.total_in(),
                raw.len()
            ))),
        }
    }

    fn decompress_into(&self, compressed: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        let mut stream = Decompress::new(true);
        let status = stream
            .decompress(compressed, dst, FlushDecompress::Finish)
            .map_err(|e| status_error(e.to_string()))?;
        match status {
            Status::StreamEnd => Ok(stream.total_out() as usize),
            Status::Ok | Status::BufError => Err(status_error(format!(
                "stream did not end after {} of {} input bytes ({} bytes out)",
                stream.total_in(),
                compressed.len(),
                stream.total_out()
            ))),
        }
    }
}

fn status_error(detail: String) -> CodecError {
    CodecError::Status {
        codec: "zlib",
        detail,
    }
}
