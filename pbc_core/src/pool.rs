use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, error, warn};
use serde::Serialize;

use crate::aggregator::Aggregator;
use crate::block::{BlockFailure, Stage};
use crate::cancel::CancellationToken;
use crate::codec::Codec;
use crate::config::FailurePolicy;
use crate::error::PipelineError;
use crate::reader::BlockReader;

/// Fixed-size pool of compression workers.
///
/// # Run contract
/// [`run`] spawns `workers` scoped threads. Each one loops:
/// pull a block from the reader, compress it, submit the result to the
/// aggregator. A worker stops when the reader is exhausted, when the caller
/// cancels, or when a sibling has hit a fatal error. `run` returns only
/// after every worker has been joined.
///
/// Per-block compression failures follow the [`FailurePolicy`]: `Abort`
/// halts every worker and returns the error, `Skip` records the block in the
/// report and keeps going. Read errors always halt the run.
///
/// [`run`]: WorkerPool::run
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

/// What the pool did during one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolReport {
    pub workers: usize,
    pub blocks_compressed: u64,
    pub raw_bytes: u64,
    pub compressed_bytes: u64,
    /// Blocks dropped under [`FailurePolicy::Skip`], ascending by index.
    pub failures: Vec<BlockFailure>,
    pub elapsed_secs: f64,
}

#[derive(Default)]
struct WorkerOutcome {
    blocks: u64,
    raw_bytes: u64,
    compressed_bytes: u64,
    failures: Vec<BlockFailure>,
}

/// State every worker borrows for the duration of one run.
struct Shared<'a, R> {
    reader: &'a BlockReader<R>,
    codec: &'a dyn Codec,
    aggregator: &'a Aggregator,
    policy: FailurePolicy,
    cancel: &'a CancellationToken,
    halt: AtomicBool,
}

impl WorkerPool {
    /// A pool of `workers` threads (at least one).
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn run<R: Read + Send>(
        &self,
        reader: &BlockReader<R>,
        codec: &dyn Codec,
        aggregator: &Aggregator,
        policy: FailurePolicy,
        cancel: &CancellationToken,
    ) -> Result<PoolReport, PipelineError> {
        let shared = Shared {
            reader,
            codec,
            aggregator,
            policy,
            cancel,
            halt: AtomicBool::new(false),
        };
        let t0 = Instant::now();

        let joined: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.workers)
                .map(|id| {
                    let shared = &shared;
                    scope.spawn(move || run_worker(id, shared))
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });

        let mut report = PoolReport {
            workers: self.workers,
            ..PoolReport::default()
        };
        let mut first_error = None;
        for outcome in joined {
            match outcome {
                Ok(Ok(outcome)) => {
                    report.blocks_compressed += outcome.blocks;
                    report.raw_bytes += outcome.raw_bytes;
                    report.compressed_bytes += outcome.compressed_bytes;
                    report.failures.extend(outcome.failures);
                }
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    first_error.get_or_insert(PipelineError::WorkerPanicked);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        report.failures.sort_by_key(|f| f.index);
        report.elapsed_secs = t0.elapsed().as_secs_f64();
        Ok(report)
    }
}

fn run_worker<R: Read>(id: usize, shared: &Shared<'_, R>) -> Result<WorkerOutcome, PipelineError> {
    let mut outcome = WorkerOutcome::default();
    loop {
        if shared.cancel.is_cancelled() || shared.halt.load(Ordering::Acquire) {
            break;
        }
        let block = match shared.reader.next_block() {
            Ok(Some(block)) => block,
            Ok(None) => break,
            Err(e) => return Err(halt_all(shared, id, e)),
        };

        let index = block.index;
        let original_len = block.original_len();
        match block.compress(shared.codec) {
            Ok(result) => {
                outcome.blocks += 1;
                outcome.raw_bytes += original_len as u64;
                outcome.compressed_bytes += result.payload.len() as u64;
                if let Err(e) = shared.aggregator.submit(result) {
                    return Err(halt_all(shared, id, e));
                }
            }
            Err(e) => match shared.policy {
                FailurePolicy::Abort => return Err(halt_all(shared, id, e)),
                FailurePolicy::Skip => {
                    warn!("worker {}: dropping block {}: {}", id, index, e);
                    outcome
                        .failures
                        .push(BlockFailure::new(index, Stage::Compress, original_len, &e));
                }
            },
        }
    }
    debug!("worker {} done after {} blocks", id, outcome.blocks);
    Ok(outcome)
}

/// Stop every worker and hand the error back to the joiner.
fn halt_all<R>(shared: &Shared<'_, R>, id: usize, e: PipelineError) -> PipelineError {
    error!("worker {}: {}", id, e);
    shared.halt.store(true, Ordering::Release);
    e
}
