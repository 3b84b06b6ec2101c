use std::io::{ErrorKind, Read};
use std::sync::{Mutex, MutexGuard};

use log::debug;

use crate::block::Block;
use crate::error::PipelineError;

/// Sequenced block reader: the single owner of the source stream's cursor.
///
/// # Contract
/// [`next_block`] is the only way to touch the stream. Each call runs under
/// one exclusive critical section that
/// 1. returns `None` once the source is exhausted,
/// 2. otherwise fills up to `block_size` bytes (short reads are retried until
///    the block is full or the source hits EOF),
/// 3. stamps the block with the next sequence index.
///
/// Indices start at 0 and grow by exactly 1 per issued block, whichever
/// worker asked. A read that yields zero bytes counts as exhaustion, so an
/// empty block is never produced. I/O errors are returned as
/// [`PipelineError::Read`], never confused with end-of-stream.
///
/// [`next_block`]: BlockReader::next_block
pub struct BlockReader<R> {
    block_size: usize,
    cursor: Mutex<ReadCursor<R>>,
}

struct ReadCursor<R> {
    source: R,
    next_index: u64,
    bytes_read: u64,
    exhausted: bool,
}

impl<R: Read> BlockReader<R> {
    pub fn new(source: R, block_size: usize) -> Self {
        Self {
            block_size,
            cursor: Mutex::new(ReadCursor {
                source,
                next_index: 0,
                bytes_read: 0,
                exhausted: false,
            }),
        }
    }

    /// Fetch the next block and its sequence index.
    pub fn next_block(&self) -> Result<Option<Block>, PipelineError> {
        let mut payload = vec![0u8; self.block_size];
        let mut cursor = self.lock()?;
        if cursor.exhausted {
            return Ok(None);
        }

        let filled = match fill_block(&mut cursor.source, &mut payload) {
            Ok(n) => n,
            Err(source) => {
                cursor.exhausted = true;
                return Err(PipelineError::Read {
                    index: cursor.next_index,
                    source,
                });
            }
        };

        // A partial fill means the source hit EOF.
        if filled < self.block_size {
            cursor.exhausted = true;
        }
        if filled == 0 {
            return Ok(None);
        }
        payload.truncate(filled);

        let index = cursor.next_index;
        cursor.next_index += 1;
        cursor.bytes_read += filled as u64;
        debug!("issued block {} ({} bytes)", index, filled);

        Ok(Some(Block { index, payload }))
    }

    /// Number of blocks handed out so far.
    pub fn blocks_issued(&self) -> Result<u64, PipelineError> {
        Ok(self.lock()?.next_index)
    }

    /// Raw bytes consumed from the source so far.
    pub fn bytes_read(&self) -> Result<u64, PipelineError> {
        Ok(self.lock()?.bytes_read)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ReadCursor<R>>, PipelineError> {
        self.cursor
            .lock()
            .map_err(|_| PipelineError::Poisoned("block reader"))
    }
}

/// Read until `buf` is full or the source reports EOF.
fn fill_block<R: Read>(source: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
