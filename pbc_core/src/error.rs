use std::io;

use thiserror::Error;

/// Failure reported by a [`Codec`](crate::Codec) primitive.
///
/// The primitive contract only needs success vs. failure; the variants exist
/// so logs and reports can say *why* a block was rejected.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{codec} I/O error: {source}")]
    Io {
        codec: &'static str,
        #[source]
        source: io::Error,
    },

    /// The underlying codec returned a non-success status.
    #[error("{codec} rejected the block: {detail}")]
    Status { codec: &'static str, detail: String },

    #[error("destination buffer too small: need at least {needed} bytes, have {have}")]
    BufferTooSmall { needed: usize, have: usize },

    #[error("decompressed {actual} bytes but the block's original length is {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("checksum mismatch: expected {expected:016x}, got {actual:016x}")]
    ChecksumMismatch { expected: u64, actual: u64 },
}

/// Every way a pipeline run can fail.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source stream failed while fetching a block. Never treated as
    /// end-of-stream.
    #[error("failed to read block {index} from the source: {source}")]
    Read {
        index: u64,
        #[source]
        source: io::Error,
    },

    #[error("block {index} failed to compress: {source}")]
    Compression {
        index: u64,
        #[source]
        source: CodecError,
    },

    #[error("block {index} failed to decompress: {source}")]
    Decompression {
        index: u64,
        #[source]
        source: CodecError,
    },

    #[error("failed to write reconstructed output: {0}")]
    Write(#[source] io::Error),

    #[error("block {0} was submitted more than once")]
    DuplicateIndex(u64),

    #[error("run was cancelled")]
    Cancelled,

    #[error("{0} lock poisoned by a panicking worker")]
    Poisoned(&'static str),

    #[error("a compression worker panicked")]
    WorkerPanicked,

    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
