//src/kmers.rs
//! Distinct k-mer count of a batch, delegated to Jellyfish.
//!
//! Reads are decompressed into one joint input inside a private scratch
//! directory, counted with `jellyfish count`, dumped with `jellyfish dump -c`,
//! and the dump's line count is the tally. [`ScratchSpace`] removes the private
//! directory and everything in it when it goes out of scope, whichever way the
//! run ends.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::fastq;
use crate::invoke::{log_outcome, Invocation, Tool, ToolInvoker};
use crate::types::{ReadType, Sample};

const SCRATCH_PREFIX: &str = "refscan-kmers-";
const JOINT_INPUT: &str = "reads.fastq";
const COUNT_DB: &str = "mer_counts.jf";
const DUMP: &str = "mer_counts.tsv";

/// A private, uniquely named directory under the configured scratch root.
///
/// Every staged file lives inside it, so nothing else in the root is ever
/// touched. Its path is absolute, so it stays valid for tools run with a
/// different working directory. On drop the private directory is deleted with
/// its contents; the root is removed only if this guard created it and it is
/// empty by then.
pub struct ScratchSpace {
    root: PathBuf,
    created_root: bool,
    dir: Option<TempDir>,
}

impl ScratchSpace {
    pub fn acquire(root: &Path) -> Result<Self> {
        let created_root = !root.is_dir();
        fs::create_dir_all(root).map_err(PipelineError::io(root, "create scratch directory"))?;

        // Held in `space` from here on so an early return still drops a root we created.
        let mut space = Self {
            root: root.to_path_buf(),
            created_root,
            dir: None,
        };
        space.root = fs::canonicalize(root).map_err(PipelineError::io(root, "resolve scratch directory"))?;
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&space.root)
            .map_err(PipelineError::io(&space.root, "create private scratch directory"))?;
        space.dir = Some(dir);
        Ok(space)
    }

    /// Absolute path of the private directory.
    pub fn dir(&self) -> &Path {
        self.dir.as_ref().map_or(self.root.as_path(), |d| d.path())
    }

    /// Absolute path for a staged file inside the private directory.
    pub fn stage(&self, name: &str) -> PathBuf {
        self.dir().join(name)
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                log::warn!("Could not remove scratch directory {}: {e}", path.display());
            }
        }
        if self.created_root {
            // remove_dir refuses non-empty directories, which is what we want here.
            if let Err(e) = fs::remove_dir(&self.root) {
                log::debug!("Leaving scratch directory {}: {e}", self.root.display());
            }
        }
    }
}

/// Number of distinct k-mers across every read file of the batch.
///
/// Paired illumina files are concatenated into the joint input; nanopore
/// files go in one after another. A failed count or dump is logged and
/// reported as 0, matching how missing aligner output is treated.
pub fn count_distinct_kmers(
    samples: &[Sample],
    read_type: ReadType,
    scratch_dir: &Path,
    config: &PipelineConfig,
    invoker: &dyn ToolInvoker,
) -> Result<u64> {
    let scratch = ScratchSpace::acquire(scratch_dir)?;

    let input = scratch.stage(JOINT_INPUT);
    let files = write_joint_input(samples, &input)?;
    log::info!(
        "Counting {}-mers over {files} {read_type} read files",
        config.kmer_length
    );

    let db = scratch.stage(COUNT_DB);
    let dump = scratch.stage(DUMP);

    let count = count_invocation(config, &input, &db).current_dir(scratch.dir());
    let outcome = invoker.invoke(&count)?;
    log_outcome(&count, &outcome);
    if !outcome.is_success() {
        return Ok(0);
    }

    let dump_cmd = dump_invocation(config, &db, &dump).current_dir(scratch.dir());
    let outcome = invoker.invoke(&dump_cmd)?;
    log_outcome(&dump_cmd, &outcome);
    if !outcome.is_success() {
        return Ok(0);
    }

    count_lines(&dump)
}

fn write_joint_input(samples: &[Sample], input: &Path) -> Result<usize> {
    let file = File::create(input).map_err(PipelineError::io(input, "create joint read input"))?;
    let mut out = BufWriter::new(file);
    let mut files = 0;

    for sample in samples {
        for read in &sample.reads {
            fastq::copy_uncompressed(read, &mut out)
                .map_err(PipelineError::io(read, "decompress reads"))?;
            files += 1;
        }
    }
    out.flush().map_err(PipelineError::io(input, "write joint read input"))?;
    Ok(files)
}

/// `jellyfish count -m <k> -s <hash> -t <n> -C -o <db> <input>`
pub fn count_invocation(config: &PipelineConfig, input: &Path, db: &Path) -> Invocation {
    Invocation::new(Tool::KmerCounter, &config.tools.kmer_counter)
        .arg("count")
        .arg("-m")
        .arg(config.kmer_length.to_string())
        .arg("-s")
        .arg(&config.hash_size)
        .arg("-t")
        .arg(config.threads.to_string())
        .arg("-C")
        .arg("-o")
        .arg(db)
        .arg(input)
}

/// `jellyfish dump -c -o <dump> <db>`
pub fn dump_invocation(config: &PipelineConfig, db: &Path, dump: &Path) -> Invocation {
    Invocation::new(Tool::KmerCounter, &config.tools.kmer_counter)
        .arg("dump")
        .arg("-c")
        .arg("-o")
        .arg(dump)
        .arg(db)
}

/// Line count of the dump; a missing dump counts 0.
fn count_lines(path: &Path) -> Result<u64> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::warn!("K-mer dump {} was not written", path.display());
            return Ok(0);
        }
        Err(e) => return Err(PipelineError::io(path, "open k-mer dump")(e)),
    };

    let mut reader = BufReader::new(file);
    let mut lines = 0u64;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(PipelineError::io(path, "read k-mer dump"))?;
        if n == 0 {
            break;
        }
        lines += 1;
    }
    Ok(lines)
}
