//src/types.rs

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::PipelineError;

/// Sequencing technology of a batch. Decides how files are grouped into
/// samples and which aligner flag profile is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadType {
    /// Paired short reads: two files per sample.
    Illumina,
    /// Long reads: one file per sample.
    Nanopore,
}

impl ReadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadType::Illumina => "illumina",
            ReadType::Nanopore => "nanopore",
        }
    }
}

impl FromStr for ReadType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "illumina" => Ok(ReadType::Illumina),
            "nanopore" => Ok(ReadType::Nanopore),
            _ => Err(PipelineError::InvalidReadType(s.to_string())),
        }
    }
}

impl fmt::Display for ReadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical sample: a pair of read files (illumina) or a single file (nanopore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Base name used to build every output path for this sample. Unique within a batch.
    pub id: String,
    pub reads: Vec<PathBuf>,
    pub read_type: ReadType,
}

/// A structured representation of one row in a sparse-mapping (`.spa`) table.
/// For example:
///  #Template  Num  Score  Expected  Template_length  ...
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingRecord {
    /// Descriptive template name, e.g. `NC_000913.3 Escherichia coli strain K12`.
    pub template: String,
    /// Index of the template inside the aligner database; `None` when the column
    /// did not hold an integer.
    pub number: Option<u32>,
    pub score: i64,
}

/// The record that won template selection. The default (empty name, no number,
/// score 0) stands for "no valid row was found".
pub type SelectedTemplate = MappingRecord;

impl MappingRecord {
    /// Whether a real row was selected, as opposed to the empty default.
    pub fn is_selected(&self) -> bool {
        self.score > 0 && !self.template.is_empty()
    }

    /// Two-word species label derived from the template name.
    pub fn species_label(&self) -> String {
        crate::spa::species_label(&self.template)
    }
}

/// Per-file maxima of one alignment-result (`.res`) table.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BestHit {
    pub identity: f64,
    pub coverage: f64,
}

/// Outcome of running one sample through both alignment phases.
#[derive(Debug, Clone)]
pub struct SampleReport {
    pub sample_id: String,
    pub template: SelectedTemplate,
    pub species: String,
    /// Number of catalog entries containing `species`.
    pub species_count: usize,
    /// Where the refined alignment was written; `None` when no template was selected.
    pub result_table: Option<PathBuf>,
}

/// Batch-level numbers printed at the end of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub samples: usize,
    pub mean_species_count: f64,
    /// Number of result tables the identity/coverage means were taken over.
    pub result_tables: usize,
    pub mean_best_identity: f64,
    pub mean_best_coverage: f64,
    pub distinct_kmers: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Samples processed:\t{}", self.samples)?;
        writeln!(
            f,
            "Average species reference count:\t{:.2}",
            self.mean_species_count
        )?;
        writeln!(
            f,
            "Average highest identity:\t{:.2} ({} tables)",
            self.mean_best_identity, self.result_tables
        )?;
        writeln!(
            f,
            "Average highest coverage:\t{:.2} ({} tables)",
            self.mean_best_coverage, self.result_tables
        )?;
        write!(f, "Distinct k-mers:\t{}", self.distinct_kmers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_type_parses_case_insensitively() {
        assert_eq!("Illumina".parse::<ReadType>().unwrap(), ReadType::Illumina);
        assert_eq!("NANOPORE".parse::<ReadType>().unwrap(), ReadType::Nanopore);
        assert_eq!(" nanopore ".parse::<ReadType>().unwrap(), ReadType::Nanopore);
    }

    #[test]
    fn unknown_read_type_is_rejected() {
        match "pacbio".parse::<ReadType>() {
            Err(PipelineError::InvalidReadType(tag)) => assert_eq!(tag, "pacbio"),
            other => panic!("expected InvalidReadType, got {other:?}"),
        }
    }

    #[test]
    fn default_template_is_not_selected() {
        let empty = SelectedTemplate::default();
        assert!(!empty.is_selected());
        assert_eq!(empty.species_label(), "");
    }
}
