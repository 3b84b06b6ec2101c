use crate::error::CodecError;

/// Core compression primitive.
///
/// The pipeline treats every `Codec` as a black box with a buffer-sizing and
/// status contract:
/// - [`compress_bound`] gives the worst-case compressed size for a raw length.
///   Incompressible data can legitimately come out larger than it went in.
/// - [`compress_into`] writes into a destination of at least that bound and
///   returns the number of bytes actually written.
/// - [`decompress_into`] receives a destination of *exactly* the original
///   length. The compressed bytes carry no length field of their own, so the
///   caller must supply it out of band.
///
/// Blocks are compressed independently. A codec must not keep state between
/// calls, which is what lets one instance be shared by every worker.
///
/// [`compress_bound`]: Codec::compress_bound
/// [`compress_into`]: Codec::compress_into
/// [`decompress_into`]: Codec::decompress_into
pub trait Codec: Send + Sync {
    /// Human-readable codec name for logs and reports.
    fn name(&self) -> &'static str;

    /// Worst-case compressed size of `raw_len` input bytes.
    fn compress_bound(&self, raw_len: usize) -> usize;

    /// Compress `raw` into `dst`, returning the compressed length.
    fn compress_into(&self, raw: &[u8], dst: &mut [u8]) -> Result<usize, CodecError>;

    /// Decompress `compressed` into `dst`, returning the number of bytes written.
    fn decompress_into(&self, compressed: &[u8], dst: &mut [u8]) -> Result<usize, CodecError>;

    /// Compress a whole block into a freshly allocated, trimmed buffer.
    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut dst = vec![0u8; self.compress_bound(raw.len())];
        let written = self.compress_into(raw, &mut dst)?;
        if written > dst.len() {
            return Err(CodecError::BufferTooSmall {
                needed: written,
                have: dst.len(),
            });
        }
        dst.truncate(written);
        Ok(dst)
    }

    /// Decompress a block whose original length is known up front.
    ///
    /// Anything other than exactly `original_len` output bytes is a failure.
    fn decompress(&self, compressed: &[u8], original_len: usize) -> Result<Vec<u8>, CodecError> {
        let mut dst = vec![0u8; original_len];
        let written = self.decompress_into(compressed, &mut dst)?;
        if written != original_len {
            return Err(CodecError::LengthMismatch {
                expected: original_len,
                actual: written,
            });
        }
        Ok(dst)
    }
}
