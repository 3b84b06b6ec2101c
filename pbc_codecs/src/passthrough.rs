use pbc_core::{Codec, CodecError};

/// No-op codec: blocks are stored verbatim.
///
/// Useful for:
/// - Checking the pipeline's ordering and framing independently of any codec.
/// - Data that is already compressed, where a real codec would only expand it.
pub struct PassThroughCodec;

impl Codec for PassThroughCodec {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn compress_bound(&self, raw_len: usize) -> usize {
        raw_len
    }

    fn compress_into(&self, raw: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        copy(raw, dst)
    }

    fn decompress_into(&self, compressed: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        copy(compressed, dst)
    }
}

fn copy(src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
    let have = dst.len();
    let out = dst
        .get_mut(..src.len())
        .ok_or(CodecError::BufferTooSmall {
            needed: src.len(),
            have,
        })?;
    out.copy_from_slice(src);
    Ok(src.len())
}
