/// Integration tests: drive the whole pipeline (reader → worker pool →
/// aggregator → reconstructor) with the bundled codecs.
///
/// The central claim is that parallel, unordered compression still yields a
/// byte-identical stream, and that a block the codec rejects is never lost
/// without the caller being told.
use std::io::{self, Cursor, Read};
use std::sync::Arc;

use pbc_codecs::{Lz4Codec, PassThroughCodec, ZlibCodec, ZstdCodec};
use pbc_core::{
    Aggregator, CancellationToken, Codec, CodecError, FailurePolicy, Pipeline, PipelineConfig,
    PipelineError, Reconstructor, Stage, DEFAULT_BLOCK_SIZE,
};

/// Generate `len` deterministic bytes using a simple LCG.
fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

/// Generate `len` highly compressible bytes (repeating pattern).
fn compressible_bytes(len: usize) -> Vec<u8> {
    let pattern = b"the quick brown fox jumps over the lazy dog. ";
    (0..len).map(|i| pattern[i % pattern.len()]).collect()
}

// ── helpers ───────────────────────────────────────────────────────────────

const POISON: u8 = 0xEE;

/// zlib, except any block whose first byte is [`POISON`] fails to compress.
struct PoisonedZlib(ZlibCodec);

impl Codec for PoisonedZlib {
    fn name(&self) -> &'static str {
        "poisoned-zlib"
    }

    fn compress_bound(&self, raw_len: usize) -> usize {
        self.0.compress_bound(raw_len)
    }

    fn compress_into(&self, raw: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        if raw.first() == Some(&POISON) {
            return Err(CodecError::Status {
                codec: "poisoned-zlib",
                detail: "forced failure".into(),
            });
        }
        self.0.compress_into(raw, dst)
    }

    fn decompress_into(&self, compressed: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        self.0.decompress_into(compressed, dst)
    }
}

/// Cancels `token` as soon as it is asked to compress block content starting
/// with [`POISON`], then behaves like passthrough.
struct CancelOnPoison(CancellationToken);

impl Codec for CancelOnPoison {
    fn name(&self) -> &'static str {
        "cancel-on-poison"
    }

    fn compress_bound(&self, raw_len: usize) -> usize {
        raw_len
    }

    fn compress_into(&self, raw: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        if raw.first() == Some(&POISON) {
            self.0.cancel();
        }
        PassThroughCodec.compress_into(raw, dst)
    }

    fn decompress_into(&self, compressed: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        PassThroughCodec.decompress_into(compressed, dst)
    }
}

/// Yields `good` bytes, then fails every read.
struct FailsAfter {
    inner: Cursor<Vec<u8>>,
    good: u64,
}

impl Read for FailsAfter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.inner.position() >= self.good {
            return Err(io::Error::new(io::ErrorKind::Other, "device unplugged"));
        }
        let room = (self.good - self.inner.position()) as usize;
        let n = buf.len().min(room);
        self.inner.read(&mut buf[..n])
    }
}

fn pipeline(codec: Arc<dyn Codec>, block_size: usize, workers: usize) -> Pipeline {
    let config = PipelineConfig::default()
        .with_block_size(block_size)
        .with_workers(workers);
    Pipeline::new(config, codec).unwrap()
}

fn roundtrip(p: &Pipeline, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let report = p
        .run(Cursor::new(data.to_vec()), &mut out, &CancellationToken::new())
        .unwrap();
    assert!(report.is_lossless());
    out
}

// ── tests ──────────────────────────────────────────────────────────────────

#[test]
fn test_roundtrip_any_worker_count() {
    let mut data = compressible_bytes(37 * 4096 + 123);
    data.extend(pseudo_random_bytes(5 * 4096 + 7, 0xDEAD_BEEF));
    for workers in [1, 4, 17] {
        let p = pipeline(Arc::new(ZlibCodec::default()), 4096, workers);
        assert_eq!(roundtrip(&p, &data), data, "workers={workers}");
    }
}

#[test]
fn test_roundtrip_every_codec() {
    let data = compressible_bytes(3 * DEFAULT_BLOCK_SIZE + 777);
    let codecs: Vec<Arc<dyn Codec>> = vec![
        Arc::new(ZlibCodec::default()),
        Arc::new(ZstdCodec::default()),
        Arc::new(Lz4Codec),
        Arc::new(PassThroughCodec),
    ];
    for codec in codecs {
        let name = codec.name();
        let p = pipeline(codec, DEFAULT_BLOCK_SIZE, 4);
        assert_eq!(roundtrip(&p, &data), data, "{name} round-trip should be byte-exact");
    }
}

#[test]
fn test_sequence_indices_cover_every_block_once() {
    let block_size = 1000;
    let len = 25_500;
    let p = pipeline(Arc::new(Lz4Codec), block_size, 8);
    let run = p
        .compress(Cursor::new(pseudo_random_bytes(len, 7)), &CancellationToken::new())
        .unwrap();
    let indices: Vec<u64> = run.results.iter().map(|r| r.index).collect();
    let expected = len.div_ceil(block_size) as u64;
    assert_eq!(run.blocks_read, expected);
    assert_eq!(indices, (0..expected).collect::<Vec<_>>());
}

#[test]
fn test_empty_input() {
    let p = pipeline(Arc::new(ZlibCodec::default()), 1024, 4);
    let run = p
        .compress(Cursor::new(Vec::<u8>::new()), &CancellationToken::new())
        .unwrap();
    assert_eq!(run.blocks_read, 0);
    assert!(run.results.is_empty());

    let mut out = Vec::new();
    let report = p.reconstruct(&run, &mut out).unwrap();
    assert!(out.is_empty());
    assert_eq!(report.blocks_written, 0);
}

#[test]
fn test_exact_and_one_past_block_size() {
    let b = 4096;
    let p = pipeline(Arc::new(ZlibCodec::default()), b, 4);

    let run = p
        .compress(Cursor::new(compressible_bytes(b)), &CancellationToken::new())
        .unwrap();
    assert_eq!(run.results.len(), 1);
    assert_eq!(run.results[0].original_len, b);

    let run = p
        .compress(Cursor::new(compressible_bytes(b + 1)), &CancellationToken::new())
        .unwrap();
    let lens: Vec<usize> = run.results.iter().map(|r| r.original_len).collect();
    assert_eq!(lens, vec![b, 1]);
}

/// Three blocks of [B, B, 500] bytes with two workers.
#[test]
fn test_two_full_blocks_and_a_tail() {
    let b = DEFAULT_BLOCK_SIZE;
    let data = pseudo_random_bytes(2 * b + 500, 0x1234_5678);
    let p = pipeline(Arc::new(ZlibCodec::default()), b, 2);

    let run = p
        .compress(Cursor::new(data.clone()), &CancellationToken::new())
        .unwrap();
    let indices: Vec<u64> = run.results.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(run.results[2].original_len, 500);

    let mut out = Vec::new();
    p.reconstruct(&run, &mut out).unwrap();
    assert_eq!(out.len(), 2 * b + 500);
    assert_eq!(out, data);
}

/// Submission order is worker scheduling, not stream order; the output must
/// not depend on it.
#[test]
fn test_shuffled_submission_gives_same_output() {
    let data = compressible_bytes(20 * 512 + 9);
    let p = pipeline(Arc::new(ZstdCodec::default()), 512, 3);
    let run = p
        .compress(Cursor::new(data.clone()), &CancellationToken::new())
        .unwrap();

    let mut shuffled = run.results.clone();
    let mut rng = 0x9E37_79B9_7F4A_7C15u64;
    for i in (1..shuffled.len()).rev() {
        rng = rng
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        shuffled.swap(i, (rng >> 33) as usize % (i + 1));
    }

    let agg = Aggregator::new();
    for result in shuffled {
        agg.submit(result).unwrap();
    }
    let drained = agg.drain().unwrap();
    assert_eq!(drained, run.results);

    let mut out = Vec::new();
    Reconstructor::new(p.codec(), FailurePolicy::Abort)
        .reconstruct(&drained, &mut out)
        .unwrap();
    assert_eq!(out, data);
}

/// Four 4 KB blocks; block 2 is rejected by the codec.
fn poisoned_input() -> (Vec<u8>, usize) {
    let b = 4096;
    let mut data = compressible_bytes(4 * b);
    data[2 * b] = POISON;
    (data, b)
}

#[test]
fn test_compression_failure_aborts_with_no_output() {
    let (data, b) = poisoned_input();
    let p = pipeline(Arc::new(PoisonedZlib(ZlibCodec::default())), b, 2);

    let mut out = Vec::new();
    let err = p
        .run(Cursor::new(data), &mut out, &CancellationToken::new())
        .unwrap_err();
    assert!(
        matches!(err, PipelineError::Compression { index: 2, .. }),
        "got: {err}"
    );
    assert!(out.is_empty(), "an aborted run must not write anything");
}

#[test]
fn test_compression_failure_skip_drops_exactly_one_block() {
    let (data, b) = poisoned_input();
    let config = PipelineConfig::default()
        .with_block_size(b)
        .with_workers(2)
        .with_policy(FailurePolicy::Skip);
    let p = Pipeline::new(config, Arc::new(PoisonedZlib(ZlibCodec::default()))).unwrap();

    let mut out = Vec::new();
    let report = p
        .run(Cursor::new(data.clone()), &mut out, &CancellationToken::new())
        .unwrap();

    // The loss is explicit: one block short, and the report says which.
    assert_eq!(out.len(), data.len() - b);
    let mut expected = data[..2 * b].to_vec();
    expected.extend_from_slice(&data[3 * b..]);
    assert_eq!(out, expected);

    assert!(!report.is_lossless());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 2);
    assert_eq!(report.failures[0].stage, Stage::Compress);
    assert_eq!(report.raw_bytes_read(), data.len() as u64);
}

#[test]
fn test_corrupted_result_fails_reconstruction() {
    let data = compressible_bytes(8 * 1024);
    let p = pipeline(Arc::new(ZlibCodec::default()), 1024, 4);
    let mut run = p
        .compress(Cursor::new(data), &CancellationToken::new())
        .unwrap();
    let last = run.results[5].payload.len() - 1;
    run.results[5].payload[last] ^= 0xFF;

    let mut out = Vec::new();
    let err = p.reconstruct(&run, &mut out).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Decompression {
            index: 5,
            source: CodecError::ChecksumMismatch { .. }
        }
    ));
    assert!(out.is_empty());
}

#[test]
fn test_read_error_aborts_the_run() {
    let source = FailsAfter {
        inner: Cursor::new(compressible_bytes(10_000)),
        good: 2500,
    };
    let config = PipelineConfig::default()
        .with_block_size(1000)
        .with_workers(3)
        .with_policy(FailurePolicy::Skip);
    let p = Pipeline::new(config, Arc::new(ZlibCodec::default())).unwrap();

    let mut out = Vec::new();
    let err = p
        .run(source, &mut out, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, PipelineError::Read { index: 2, .. }), "got: {err}");
    assert!(out.is_empty());
}

#[test]
fn test_cancellation_stops_the_run() {
    let b = 256;
    let mut data = compressible_bytes(64 * b);
    data[3 * b] = POISON;

    let token = CancellationToken::new();
    let p = pipeline(Arc::new(CancelOnPoison(token.clone())), b, 2);
    let mut out = Vec::new();
    let err = p.run(Cursor::new(data), &mut out, &token).unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
    assert!(out.is_empty());
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = PipelineConfig::default().with_block_size(0);
    let err = Pipeline::new(config, Arc::new(PassThroughCodec)).err().unwrap();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));
}

/// Random data should not shrink; the run report still has to add up.
#[test]
fn test_incompressible_data_report() {
    let data = pseudo_random_bytes(DEFAULT_BLOCK_SIZE * 2, 0xABCD);
    let p = pipeline(Arc::new(ZstdCodec::default()), DEFAULT_BLOCK_SIZE, 4);
    let mut out = Vec::new();
    let report = p
        .run(Cursor::new(data.clone()), &mut out, &CancellationToken::new())
        .unwrap();
    assert_eq!(out, data);
    assert_eq!(report.blocks_read, 2);
    assert_eq!(report.raw_bytes, data.len() as u64);
    assert_eq!(report.bytes_written, data.len() as u64);
    assert!(
        report.ratio < 1.10,
        "zstd on random data should not meaningfully compress: ratio={:.4}",
        report.ratio
    );
}
