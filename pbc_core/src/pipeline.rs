use std::io::{Read, Write};
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use crate::aggregator::Aggregator;
use crate::block::{BlockFailure, CompressedResult, Stage};
use crate::cancel::CancellationToken;
use crate::codec::Codec;
use crate::config::{FailurePolicy, PipelineConfig};
use crate::error::PipelineError;
use crate::pool::{PoolReport, WorkerPool};
use crate::reader::BlockReader;
use crate::reconstruct::{ReconstructReport, Reconstructor};

/// One configured compression pipeline.
///
/// # Run sequence
/// 1. [`compress`]: a [`BlockReader`] over the source feeds a [`WorkerPool`];
///    workers submit into an [`Aggregator`], which is drained in sequence
///    order once every worker has joined.
/// 2. [`reconstruct`]: a [`Reconstructor`] decompresses the ordered results
///    and writes the original bytes to the sink.
///
/// [`run`] chains both and returns a [`RunReport`].
///
/// [`compress`]: Pipeline::compress
/// [`reconstruct`]: Pipeline::reconstruct
/// [`run`]: Pipeline::run
pub struct Pipeline {
    config: PipelineConfig,
    codec: Arc<dyn Codec>,
}

/// Output of the compression half: the ordered aggregate plus what the pool
/// reported.
#[derive(Debug)]
pub struct CompressedRun {
    pub results: Vec<CompressedResult>,
    /// Blocks the reader issued, including any that failed to compress.
    pub blocks_read: u64,
    pub report: PoolReport,
}

impl CompressedRun {
    pub fn compressed_bytes(&self) -> u64 {
        self.results.iter().map(|r| r.payload.len() as u64).sum()
    }
}

/// Summary of a full compress + reconstruct run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub codec: &'static str,
    pub config: PipelineConfig,
    pub blocks_read: u64,
    pub blocks_compressed: u64,
    pub raw_bytes: u64,
    pub compressed_bytes: u64,
    pub bytes_written: u64,
    pub ratio: f64,
    pub compress_secs: f64,
    pub reconstruct_secs: f64,
    /// Every block that did not make it into the output, either stage.
    pub failures: Vec<BlockFailure>,
}

impl RunReport {
    pub fn is_lossless(&self) -> bool {
        self.failures.is_empty() && self.bytes_written == self.raw_bytes_read()
    }

    /// Raw bytes consumed from the source, counting dropped blocks.
    pub fn raw_bytes_read(&self) -> u64 {
        self.raw_bytes
            + self
                .failures
                .iter()
                .filter(|f| f.stage == Stage::Compress)
                .map(|f| f.original_len as u64)
                .sum::<u64>()
    }
}

impl Pipeline {
    pub fn new(config: PipelineConfig, codec: Arc<dyn Codec>) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config, codec })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    /// Compress every block of `source` across the worker pool.
    pub fn compress<R: Read + Send>(
        &self,
        source: R,
        cancel: &CancellationToken,
    ) -> Result<CompressedRun, PipelineError> {
        let reader = BlockReader::new(source, self.config.block_size);
        let aggregator = Aggregator::new();
        let pool = WorkerPool::new(self.config.workers);

        let report = pool.run(
            &reader,
            self.codec.as_ref(),
            &aggregator,
            self.config.policy,
            cancel,
        )?;
        let blocks_read = reader.blocks_issued()?;
        let results = aggregator.drain()?;

        info!(
            "compressed {} of {} blocks using {} workers in {:.3}s",
            results.len(),
            blocks_read,
            report.workers,
            report.elapsed_secs
        );
        Ok(CompressedRun {
            results,
            blocks_read,
            report,
        })
    }

    /// Write the original bytes of `run` to `sink`.
    pub fn reconstruct<W: Write>(
        &self,
        run: &CompressedRun,
        sink: &mut W,
    ) -> Result<ReconstructReport, PipelineError> {
        Reconstructor::new(self.codec.as_ref(), self.config.policy)
            .with_expected_blocks(run.blocks_read)
            .reconstruct(&run.results, sink)
    }

    /// Compress `source`, then reconstruct it into `sink`.
    pub fn run<R: Read + Send, W: Write>(
        &self,
        source: R,
        sink: &mut W,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let compressed = self.compress(source, cancel)?;
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let rebuilt = self.reconstruct(&compressed, sink)?;
        let report = self.report(&compressed, &rebuilt);
        if self.config.policy == FailurePolicy::Skip && !report.failures.is_empty() {
            warn!(
                "output is missing {} block(s); {} of {} bytes written",
                report.failures.len(),
                report.bytes_written,
                report.raw_bytes_read()
            );
        }
        Ok(report)
    }

    /// Combine the two phase reports of one run.
    pub fn report(&self, compressed: &CompressedRun, rebuilt: &ReconstructReport) -> RunReport {
        let pool = &compressed.report;
        let mut failures = pool.failures.clone();
        failures.extend(rebuilt.failures.iter().cloned());

        let ratio = if pool.compressed_bytes == 0 {
            1.0
        } else {
            pool.raw_bytes as f64 / pool.compressed_bytes as f64
        };
        RunReport {
            codec: self.codec.name(),
            config: self.config.clone(),
            blocks_read: compressed.blocks_read,
            blocks_compressed: pool.blocks_compressed,
            raw_bytes: pool.raw_bytes,
            compressed_bytes: pool.compressed_bytes,
            bytes_written: rebuilt.bytes_written,
            ratio,
            compress_secs: pool.elapsed_secs,
            reconstruct_secs: rebuilt.elapsed_secs,
            failures,
        }
    }
}
