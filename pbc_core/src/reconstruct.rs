use std::io::Write;
use std::time::Instant;

use log::{debug, warn};
use serde::Serialize;

use crate::block::{BlockFailure, CompressedResult, Stage};
use crate::codec::Codec;
use crate::config::FailurePolicy;
use crate::error::PipelineError;

/// Turns an ordered aggregate back into the original byte stream.
///
/// Results must arrive ascending by sequence index (as returned by
/// [`Aggregator::drain`](crate::Aggregator::drain)). Each one is checksummed,
/// decompressed with its recorded original length, and appended with no
/// separators. The output is staged in memory and written to the sink once,
/// at the end, so an aborted reconstruction writes nothing.
pub struct Reconstructor<'a> {
    codec: &'a dyn Codec,
    policy: FailurePolicy,
    expected_blocks: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconstructReport {
    pub blocks_written: u64,
    pub bytes_written: u64,
    /// Blocks dropped under [`FailurePolicy::Skip`] during decompression.
    pub failures: Vec<BlockFailure>,
    /// Sequence indices with no result at all, i.e. dropped at compression
    /// time.
    pub missing_indices: Vec<u64>,
    pub elapsed_secs: f64,
}

impl ReconstructReport {
    /// `true` when every block made it into the output.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.missing_indices.is_empty()
    }
}

impl<'a> Reconstructor<'a> {
    pub fn new(codec: &'a dyn Codec, policy: FailurePolicy) -> Self {
        Self {
            codec,
            policy,
            expected_blocks: None,
        }
    }

    /// Number of blocks the reader issued, so trailing gaps are reported too.
    pub fn with_expected_blocks(mut self, blocks: u64) -> Self {
        self.expected_blocks = Some(blocks);
        self
    }

    pub fn reconstruct<W: Write>(
        &self,
        results: &[CompressedResult],
        sink: &mut W,
    ) -> Result<ReconstructReport, PipelineError> {
        debug_assert!(results.windows(2).all(|w| w[0].index < w[1].index));
        let t0 = Instant::now();
        let mut report = ReconstructReport::default();

        let capacity = results.iter().map(|r| r.original_len).sum();
        let mut staged = Vec::with_capacity(capacity);
        let mut next_expected = 0u64;

        for result in results {
            report.missing_indices.extend(next_expected..result.index);
            next_expected = result.index + 1;

            match result.decompress(self.codec) {
                Ok(raw) => {
                    staged.extend_from_slice(&raw);
                    report.blocks_written += 1;
                }
                Err(e) => match self.policy {
                    FailurePolicy::Abort => return Err(e),
                    FailurePolicy::Skip => {
                        warn!("omitting block {} from output: {}", result.index, e);
                        report.failures.push(BlockFailure::new(
                            result.index,
                            Stage::Decompress,
                            result.original_len,
                            &e,
                        ));
                    }
                },
            }
        }
        if let Some(expected) = self.expected_blocks {
            report.missing_indices.extend(next_expected..expected);
        }
        if !report.missing_indices.is_empty() {
            warn!(
                "{} block(s) missing from the aggregate: {:?}",
                report.missing_indices.len(),
                report.missing_indices
            );
        }

        sink.write_all(&staged).map_err(PipelineError::Write)?;
        sink.flush().map_err(PipelineError::Write)?;
        report.bytes_written = staged.len() as u64;
        report.elapsed_secs = t0.elapsed().as_secs_f64();
        debug!(
            "reconstructed {} blocks, {} bytes",
            report.blocks_written, report.bytes_written
        );
        Ok(report)
    }
}
