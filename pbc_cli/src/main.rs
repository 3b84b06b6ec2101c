use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use pbc_codecs::codec_from_name;
use pbc_core::{
    default_worker_count, CancellationToken, FailurePolicy, Pipeline, PipelineConfig, RunReport,
    DEFAULT_BLOCK_SIZE,
};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "pbc",
    about = "Parallel block compression: split a stream into blocks, compress them across a worker pool, rebuild the stream",
    version
)]
struct Cli {
    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file in parallel, then reconstruct it into OUTPUT
    Roundtrip {
        /// Source file ("-" reads stdin)
        input: PathBuf,
        /// Destination for the reconstructed bytes ("-" writes to stdout)
        output: PathBuf,
        #[command(flatten)]
        opts: PipelineOpts,
    },
    /// Compress a file in parallel and report ratio and throughput
    Bench {
        /// Source file ("-" reads stdin)
        input: PathBuf,
        #[command(flatten)]
        opts: PipelineOpts,
    },
}

#[derive(Args)]
struct PipelineOpts {
    /// Codec to use: zlib | zstd | lz4 | passthrough
    #[arg(short, long, default_value = "zlib")]
    codec: String,
    /// Codec level (zlib 0–9, zstd 1–22); codec default when omitted
    #[arg(long)]
    level: Option<i32>,
    /// Raw bytes per block
    #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,
    /// Worker threads (default: hardware concurrency)
    #[arg(short, long)]
    workers: Option<usize>,
    /// What to do when a single block fails to compress or decompress
    #[arg(long, value_enum, default_value_t = PolicyArg::Abort)]
    policy: PolicyArg,
    /// Print the run report as JSON (stderr when OUTPUT is stdout)
    #[arg(long)]
    report_json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Abort,
    Skip,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Abort => FailurePolicy::Abort,
            PolicyArg::Skip => FailurePolicy::Skip,
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn throughput(bytes: u64, secs: f64) -> String {
    if secs <= 0.0 {
        return "n/a".into();
    }
    format!("{}/s", human_bytes((bytes as f64 / secs) as u64))
}

fn build_pipeline(opts: &PipelineOpts) -> anyhow::Result<Pipeline> {
    let codec = codec_from_name(&opts.codec, opts.level)?;
    let config = PipelineConfig::default()
        .with_block_size(opts.block_size)
        .with_workers(opts.workers.unwrap_or_else(default_worker_count))
        .with_policy(opts.policy.into());
    Ok(Pipeline::new(config, codec)?)
}

fn open_input(input: &Path) -> anyhow::Result<Box<dyn Read + Send>> {
    if is_stdio(input) {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(input).with_context(|| format!("opening input file {:?}", input))?;
    Ok(Box::new(BufReader::new(file)))
}

fn is_stdio(path: &Path) -> bool {
    path.to_str() == Some("-")
}

/// Write the reconstructed bytes in one go. The file is only created here,
/// so a failed run never truncates an existing OUTPUT.
fn write_output(output: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if is_stdio(output) {
        let mut out = io::stdout().lock();
        out.write_all(bytes)?;
        out.flush()?;
        return Ok(());
    }
    let file =
        File::create(output).with_context(|| format!("creating output file {:?}", output))?;
    let mut out = BufWriter::new(file);
    out.write_all(bytes)
        .and_then(|()| out.flush())
        .with_context(|| format!("writing output file {:?}", output))
}

/// Print the JSON report where it cannot mix with the reconstructed stream.
fn emit_report(output: &Path, report: &RunReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    if is_stdio(output) {
        eprintln!("{}", json);
    } else {
        println!("{}", json);
    }
    Ok(())
}

/// Compress `source`, reconstruct it in memory, and only then write OUTPUT.
fn roundtrip(
    pipeline: &Pipeline,
    source: Box<dyn Read + Send>,
    output: &Path,
    cancel: &CancellationToken,
) -> anyhow::Result<RunReport> {
    let compressed = pipeline.compress(source, cancel)?;
    eprintln!(
        "Compressed using {} threads in {:.3} seconds.",
        compressed.report.workers, compressed.report.elapsed_secs
    );

    eprintln!("Decompressing to {}...", output.display());
    let mut staged = Vec::new();
    let rebuilt = pipeline
        .reconstruct(&compressed, &mut staged)
        .with_context(|| format!("reconstructing into {:?}", output))?;
    write_output(output, &staged)?;
    Ok(pipeline.report(&compressed, &rebuilt))
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_roundtrip(input: PathBuf, output: PathBuf, opts: PipelineOpts) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&opts)?;
    let source = open_input(&input)?;
    let cancel = CancellationToken::new();

    let t0 = Instant::now();
    let report = roundtrip(&pipeline, source, &output, &cancel)
        .with_context(|| format!("round-tripping {:?}", input))?;
    let elapsed = t0.elapsed();

    eprintln!("  codec       : {}", report.codec);
    eprintln!("  block size  : {}", human_bytes(report.config.block_size as u64));
    eprintln!("  blocks      : {}", report.blocks_read);
    eprintln!("  raw size    : {}", human_bytes(report.raw_bytes));
    eprintln!("  compressed  : {}", human_bytes(report.compressed_bytes));
    eprintln!("  written     : {}", human_bytes(report.bytes_written));
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());

    for f in &report.failures {
        eprintln!(
            "  DROPPED     : block {} ({:?}, {}): {}",
            f.index,
            f.stage,
            human_bytes(f.original_len as u64),
            f.error
        );
    }

    if opts.report_json {
        emit_report(&output, &report)?;
    }

    if !report.failures.is_empty() {
        anyhow::bail!(
            "output is incomplete: {} block(s) dropped under the skip policy",
            report.failures.len()
        );
    }
    eprintln!("Done.");
    Ok(())
}

fn run_bench(input: PathBuf, opts: PipelineOpts) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&opts)?;
    let source = open_input(&input)?;

    info!(
        "benchmarking {} with {} workers, {} blocks",
        pipeline.codec().name(),
        pipeline.config().workers,
        human_bytes(pipeline.config().block_size as u64)
    );
    let run = pipeline
        .compress(source, &CancellationToken::new())
        .with_context(|| format!("compressing {:?}", input))?;
    let report = &run.report;
    let ratio = if report.compressed_bytes == 0 {
        1.0
    } else {
        report.raw_bytes as f64 / report.compressed_bytes as f64
    };

    println!();
    println!("=== Parallel Compression Benchmark ===");
    println!("  codec       : {}", pipeline.codec().name());
    println!("  workers     : {}", report.workers);
    println!("  blocks      : {}", run.blocks_read);
    println!("  raw size    : {}", human_bytes(report.raw_bytes));
    println!("  compressed  : {}", human_bytes(run.compressed_bytes()));
    println!("  ratio       : {:.2}x", ratio);
    println!("  throughput  : {}", throughput(report.raw_bytes, report.elapsed_secs));
    println!("  elapsed     : {:.3}s", report.elapsed_secs);
    if !report.failures.is_empty() {
        println!("  dropped     : {} block(s)", report.failures.len());
    }

    if opts.report_json {
        println!("{}", serde_json::to_string_pretty(report)?);
    }
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Warn,
        (false, 1) => LevelFilter::Info,
        (false, _) => LevelFilter::Debug,
    };
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    match cli.command {
        Commands::Roundtrip {
            input,
            output,
            opts,
        } => run_roundtrip(input, output, opts),
        Commands::Bench { input, opts } => run_bench(input, opts),
    }
}
