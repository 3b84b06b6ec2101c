//! Parallel block compression pipeline.
//!
//! A source stream is cut into fixed-size blocks by a [`BlockReader`],
//! compressed concurrently by a [`WorkerPool`], collected by an
//! [`Aggregator`], and turned back into the original bytes by a
//! [`Reconstructor`]. [`Pipeline`] wires the pieces together.

pub mod aggregator;
pub mod block;
pub mod cancel;
pub mod codec;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod pool;
pub mod reader;
pub mod reconstruct;

pub use aggregator::Aggregator;
pub use block::{Block, BlockFailure, CompressedResult, Stage};
pub use cancel::CancellationToken;
pub use codec::Codec;
pub use config::{default_worker_count, FailurePolicy, PipelineConfig, DEFAULT_BLOCK_SIZE};
pub use error::{CodecError, PipelineError};
pub use pipeline::{CompressedRun, Pipeline, RunReport};
pub use pool::{PoolReport, WorkerPool};
pub use reader::BlockReader;
pub use reconstruct::{ReconstructReport, Reconstructor};
