//src/config.rs

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// K-mer length handed to the k-mer counter.
pub const DEFAULT_KMER_LENGTH: u8 = 21;
/// Compute lanes the aligner and the k-mer counter are told to use.
pub const DEFAULT_THREADS: usize = 4;
/// Initial hash size for `jellyfish count -s`.
pub const DEFAULT_HASH_SIZE: &str = "100M";
/// Minimum fragment count handed to the sparse scan (`-mf`).
pub const SPARSE_MIN_FRAGMENTS: u32 = 50_000;

/// Index file every KMA database has; its absence means the prefix is wrong.
const DATABASE_INDEX_EXT: &str = ".comp.b";

/// Largest k the k-mer counter is run with; dump lines stay one k-mer each up to here.
const MAX_KMER_LENGTH: u8 = 31;

/// Locations of the external binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub aligner: PathBuf,
    pub kmer_counter: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            aligner: PathBuf::from("kma"),
            kmer_counter: PathBuf::from("jellyfish"),
        }
    }
}

/// Everything a batch run needs besides the read files themselves.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Aligner database prefix (the path passed to `-t_db`).
    pub database: PathBuf,
    pub output_dir: PathBuf,
    /// Reference-name catalog consulted by the species counter.
    pub catalog: PathBuf,
    /// Where decompressed reads and k-mer databases are staged.
    pub scratch_dir: PathBuf,
    pub tools: ToolPaths,
    pub threads: usize,
    pub kmer_length: u8,
    pub hash_size: String,
}

impl PipelineConfig {
    /// Config with defaults derived from the database and output locations:
    /// the catalog is `<database>.name` and scratch space is `<output_dir>/tmp`.
    pub fn new(database: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        let database = database.into();
        let output_dir = output_dir.into();
        Self {
            catalog: default_catalog(&database),
            scratch_dir: output_dir.join("tmp"),
            database,
            output_dir,
            tools: ToolPaths::default(),
            threads: DEFAULT_THREADS,
            kmer_length: DEFAULT_KMER_LENGTH,
            hash_size: DEFAULT_HASH_SIZE.to_string(),
        }
    }

    pub fn with_catalog(mut self, catalog: impl Into<PathBuf>) -> Self {
        self.catalog = catalog.into();
        self
    }

    pub fn with_scratch_dir(mut self, scratch_dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = scratch_dir.into();
        self
    }

    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_kmer_length(mut self, kmer_length: u8) -> Self {
        self.kmer_length = kmer_length;
        self
    }

    /// Rejects settings that would make every sample fail the same way.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(PipelineError::Config("threads must be at least 1".into()));
        }
        if self.kmer_length == 0 || self.kmer_length > MAX_KMER_LENGTH {
            return Err(PipelineError::Config(format!(
                "k-mer length must be between 1 and {MAX_KMER_LENGTH} (got {})",
                self.kmer_length
            )));
        }
        if self.hash_size.trim().is_empty() {
            return Err(PipelineError::Config("hash size must not be empty".into()));
        }
        let index = database_file(&self.database, DATABASE_INDEX_EXT);
        if !index.is_file() {
            return Err(PipelineError::Config(format!(
                "aligner database not found: {} (no {})",
                self.database.display(),
                index.display()
            )));
        }
        if !self.catalog.is_file() {
            return Err(PipelineError::Config(format!(
                "reference-name catalog not found: {}",
                self.catalog.display()
            )));
        }
        Ok(())
    }
}

/// KMA keeps template names next to the database as `<prefix>.name`.
fn default_catalog(database: &Path) -> PathBuf {
    database_file(database, ".name")
}

fn database_file(database: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(database.as_os_str());
    name.push(ext);
    PathBuf::from(name)
}
