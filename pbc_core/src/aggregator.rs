use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::block::CompressedResult;
use crate::error::PipelineError;

/// Order-tolerant collection of per-block results for one run.
///
/// Workers only ever see [`submit`]; the map itself stays private. Results
/// are keyed by sequence index, so the order workers happen to finish in has
/// no effect on what [`drain`] returns.
///
/// `drain` takes `self` by value. The pool's scoped threads borrow the
/// aggregator, so it cannot be drained until every worker has been joined.
///
/// [`submit`]: Aggregator::submit
/// [`drain`]: Aggregator::drain
#[derive(Default)]
pub struct Aggregator {
    results: Mutex<BTreeMap<u64, CompressedResult>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one result. A second result for the same index is rejected and
    /// the first one is kept.
    pub fn submit(&self, result: CompressedResult) -> Result<(), PipelineError> {
        let mut results = self.lock()?;
        match results.entry(result.index) {
            Entry::Vacant(slot) => {
                slot.insert(result);
                Ok(())
            }
            Entry::Occupied(_) => Err(PipelineError::DuplicateIndex(result.index)),
        }
    }

    pub fn len(&self) -> Result<usize, PipelineError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, PipelineError> {
        Ok(self.lock()?.is_empty())
    }

    /// All submitted results, ascending by sequence index.
    pub fn drain(self) -> Result<Vec<CompressedResult>, PipelineError> {
        let results = self
            .results
            .into_inner()
            .map_err(|_| PipelineError::Poisoned("aggregator"))?;
        Ok(results.into_values().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<u64, CompressedResult>>, PipelineError> {
        self.results
            .lock()
            .map_err(|_| PipelineError::Poisoned("aggregator"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: u64) -> CompressedResult {
        CompressedResult {
            index,
            payload: vec![index as u8],
            original_len: 1,
            checksum: 0,
        }
    }

    #[test]
    fn drain_sorts_by_index() {
        let agg = Aggregator::new();
        for i in [3, 0, 4, 1, 2] {
            agg.submit(result(i)).unwrap();
        }
        assert_eq!(agg.len().unwrap(), 5);
        let order: Vec<u64> = agg.drain().unwrap().iter().map(|r| r.index).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn duplicate_index_is_rejected() {
        let agg = Aggregator::new();
        agg.submit(result(7)).unwrap();
        let err = agg.submit(result(7)).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateIndex(7)));
        assert_eq!(agg.drain().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_submissions_are_not_lost() {
        let agg = Aggregator::new();
        std::thread::scope(|scope| {
            for t in 0..8u64 {
                let agg = &agg;
                scope.spawn(move || {
                    for i in (t..400).step_by(8) {
                        agg.submit(result(i)).unwrap();
                    }
                });
            }
        });
        let drained = agg.drain().unwrap();
        assert_eq!(drained.len(), 400);
        assert!(drained.iter().enumerate().all(|(i, r)| r.index == i as u64));
    }

    #[test]
    fn poisoned_lock_is_reported() {
        let agg = Aggregator::new();
        agg.submit(result(0)).unwrap();
        let _ = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _guard = agg.results.lock().unwrap();
                    panic!("worker died holding the aggregator");
                })
                .join()
        });
        assert!(matches!(agg.len(), Err(PipelineError::Poisoned("aggregator"))));
        assert!(matches!(agg.is_empty(), Err(PipelineError::Poisoned(_))));
        assert!(matches!(agg.submit(result(1)), Err(PipelineError::Poisoned(_))));
        assert!(matches!(agg.drain(), Err(PipelineError::Poisoned(_))));
    }
}
