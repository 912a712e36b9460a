use std::path::PathBuf;
use std::process;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use refscan_rs::config::{PipelineConfig, ToolPaths, DEFAULT_KMER_LENGTH, DEFAULT_THREADS};
use refscan_rs::logging::init_logger;
use refscan_rs::types::ReadType;
use refscan_rs::{Pipeline, ProcessInvoker};

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Select the best reference template per sample and summarize the batch",
    arg_required_else_help = true
)]
struct Cli {
    /// FASTQ files; gzip optional. Illumina files are sorted and paired.
    #[arg(required = true, help_heading = "INPUT")]
    reads: Vec<PathBuf>,

    /// Aligner database prefix (as passed to `kma -t_db`).
    #[arg(short, long, help_heading = "INPUT")]
    database: PathBuf,

    /// Read technology: illumina or nanopore (case-insensitive).
    #[arg(short, long = "read-type", help_heading = "INPUT")]
    read_type: String,

    /// Reference-name catalog. Defaults to `<database>.name`.
    #[arg(long, help_heading = "INPUT")]
    catalog: Option<PathBuf>,

    /// Output directory, created if missing.
    #[arg(short, long, help_heading = "OUTPUT")]
    output: PathBuf,

    /// Scratch directory for decompressed reads. Defaults to `<output>/tmp`.
    #[arg(long, help_heading = "OUTPUT")]
    scratch: Option<PathBuf>,

    #[arg(short, long, default_value_t = DEFAULT_THREADS, help_heading = "ALGORITHM", help = "Threads handed to the external tools.")]
    threads: usize,

    #[arg(short, long = "kmer-length", default_value_t = DEFAULT_KMER_LENGTH, help_heading = "ALGORITHM", help = "K-mer length for the distinct k-mer count.")]
    kmer_length: u8,

    #[arg(long, env = "REFSCAN_KMA", default_value = "kma", help_heading = "TOOLS", help = "Aligner binary.")]
    aligner: PathBuf,

    #[arg(long = "kmer-counter", env = "REFSCAN_JELLYFISH", default_value = "jellyfish", help_heading = "TOOLS", help = "K-mer counter binary.")]
    kmer_counter: PathBuf,

    /// Log progress at info level.
    #[arg(short, long)]
    verbose: bool,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    process::exit(1);
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    // 1. Validate inputs before touching anything on disk
    let read_type: ReadType = cli.read_type.parse().unwrap_or_else(|e| fail(e));

    let mut config = PipelineConfig::new(&cli.database, &cli.output)
        .with_threads(cli.threads)
        .with_kmer_length(cli.kmer_length)
        .with_tools(ToolPaths {
            aligner: cli.aligner,
            kmer_counter: cli.kmer_counter,
        });
    if let Some(catalog) = cli.catalog {
        config = config.with_catalog(catalog);
    }
    if let Some(scratch) = cli.scratch {
        config = config.with_scratch_dir(scratch);
    }
    if let Err(e) = config.validate() {
        fail(e);
    }

    // 2. Per-sample progress bar
    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .tick_strings(TICKS)
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let pipeline = Pipeline::new(config, ProcessInvoker);
    let outcome = pipeline
        .run(&cli.reads, read_type, &progress)
        .unwrap_or_else(|e| fail(e));

    progress.finish_with_message(format!("Processed {} samples.", outcome.reports.len()));

    // 3. Summary
    println!("{}", outcome.summary);
}
