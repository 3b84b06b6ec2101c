use serde::Serialize;
use xxhash_rust::xxh3::xxh3_64;

use crate::codec::Codec;
use crate::error::{CodecError, PipelineError};

/// A contiguous slice of the source stream, the unit of parallel work.
///
/// Created by [`BlockReader`](crate::BlockReader) on demand and consumed by
/// the worker that asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Zero-based position of this block in the source stream.
    pub index: u64,
    /// Raw bytes, never empty; only the final block may be shorter than the
    /// configured block size.
    pub payload: Vec<u8>,
}

impl Block {
    #[inline]
    pub fn original_len(&self) -> usize {
        self.payload.len()
    }

    /// Compress this block with `codec`, consuming it.
    pub fn compress(self, codec: &dyn Codec) -> Result<CompressedResult, PipelineError> {
        let payload = codec
            .compress(&self.payload)
            .map_err(|source| PipelineError::Compression {
                index: self.index,
                source,
            })?;
        Ok(CompressedResult {
            index: self.index,
            checksum: xxh3_64(&payload),
            original_len: self.payload.len(),
            payload,
        })
    }
}

/// The compressed form of one [`Block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedResult {
    /// Copied from the source block.
    pub index: u64,
    /// Compressed bytes. Carries no embedded length.
    pub payload: Vec<u8>,
    /// Raw length of the source block, required to size the decompression
    /// buffer.
    pub original_len: usize,
    /// xxhash3-64 of `payload`.
    pub checksum: u64,
}

impl CompressedResult {
    /// Verify the checksum and decompress back to the original bytes.
    pub fn decompress(&self, codec: &dyn Codec) -> Result<Vec<u8>, PipelineError> {
        self.verify()
            .and_then(|()| codec.decompress(&self.payload, self.original_len))
            .map_err(|source| PipelineError::Decompression {
                index: self.index,
                source,
            })
    }

    fn verify(&self) -> Result<(), CodecError> {
        let actual = xxh3_64(&self.payload);
        if actual != self.checksum {
            return Err(CodecError::ChecksumMismatch {
                expected: self.checksum,
                actual,
            });
        }
        Ok(())
    }
}

/// Which half of the pipeline rejected a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Compress,
    Decompress,
}

/// A block that was dropped under the skip policy.
#[derive(Debug, Clone, Serialize)]
pub struct BlockFailure {
    pub index: u64,
    pub stage: Stage,
    /// Bytes of original data lost with this block.
    pub original_len: usize,
    pub error: String,
}

impl BlockFailure {
    pub(crate) fn new(index: u64, stage: Stage, original_len: usize, error: &PipelineError) -> Self {
        Self {
            index,
            stage,
            original_len,
            error: error.to_string(),
        }
    }
}
