// src/lib.rs
pub mod aggregate;
pub mod align;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fastq;
pub mod invoke;
pub mod kmers;
pub mod logging;
pub mod samples;
pub mod spa;
pub mod types;

use std::path::PathBuf;

use indicatif::ProgressBar;

use crate::align::{run_sample, OutputPrefix};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::invoke::ToolInvoker;
use crate::types::{ReadType, RunSummary, SampleReport};

pub use crate::error::PipelineError;
pub use crate::invoke::ProcessInvoker;

/// Results of one batch: what each sample selected, and the batch summary.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub reports: Vec<SampleReport>,
    pub summary: RunSummary,
}

/// Drives a batch from read files to the printed summary.
pub struct Pipeline<I: ToolInvoker> {
    config: PipelineConfig,
    invoker: I,
}

impl<I: ToolInvoker> Pipeline<I> {
    pub fn new(config: PipelineConfig, invoker: I) -> Self {
        Self { config, invoker }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs every sample sequentially, then aggregates and counts k-mers.
    ///
    /// `progress` advances once per sample and is left for the caller to
    /// finish; pass `ProgressBar::hidden()` when nothing should be drawn.
    pub fn run(
        &self,
        reads: &[PathBuf],
        read_type: ReadType,
        progress: &ProgressBar,
    ) -> Result<BatchOutcome> {
        // 1. Output directory and samples
        samples::prepare_output_dir(&self.config.output_dir)?;
        let batch = samples::group_samples(reads, read_type);
        let sample_count = batch.len();
        log::info!(
            "Grouped {} {read_type} read files into {sample_count} samples",
            reads.len()
        );

        // 2. Both alignment phases and the species count, one sample at a time
        progress.set_length(sample_count as u64);
        let mut reports = Vec::with_capacity(sample_count);
        for sample in &batch {
            progress.set_message(sample.id.clone());
            let prefix = OutputPrefix::new(&self.config.output_dir, &sample.id);
            let report = run_sample(sample, &prefix, &self.config, &self.invoker)?;
            reports.push(report);
            progress.inc(1);
        }

        // 3. Aggregate over every result table in the output directory
        let counts: Vec<usize> = reports.iter().map(|r| r.species_count).collect();
        let mut summary = aggregate::summarize(&self.config.output_dir, &counts, sample_count)?;

        // 4. Distinct k-mers over the whole batch
        summary.distinct_kmers = kmers::count_distinct_kmers(
            &batch,
            read_type,
            &self.config.scratch_dir,
            &self.config,
            &self.invoker,
        )?;

        Ok(BatchOutcome { reports, summary })
    }
}
