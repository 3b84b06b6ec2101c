use lz4_flex::block::{compress_into, decompress_into, get_maximum_output_size};
use pbc_core::{Codec, CodecError};

/// LZ4 block codec.
///
/// Writes the raw LZ4 block format with no size prefix; the pipeline already
/// carries each block's original length. Fastest of the bundled codecs,
/// with the weakest ratio.
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress_bound(&self, raw_len: usize) -> usize {
        get_maximum_output_size(raw_len)
    }

    fn compress_into(&self, raw: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        compress_into(raw, dst).map_err(|e| CodecError::Status {
            codec: "lz4",
            detail: e.to_string(),
        })
    }

    fn decompress_into(&self, compressed: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        decompress_into(compressed, dst).map_err(|e| CodecError::Status {
            codec: "lz4",
            detail: e.to_string(),
        })
    }
}
