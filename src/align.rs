//src/align.rs
//! Two-phase alignment of one sample.
//!
//! Each phase is its own type and consumes the previous one, so a refined
//! alignment can only be issued with a template that came out of a scan:
//!
//! ```text
//! scan() -> Scanned -> TemplateChosen -> Aligned -> SampleReport
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::catalog;
use crate::config::{PipelineConfig, SPARSE_MIN_FRAGMENTS};
use crate::error::Result;
use crate::invoke::{log_outcome, Invocation, Tool, ToolInvoker, ToolOutcome};
use crate::spa;
use crate::types::{ReadType, Sample, SampleReport, SelectedTemplate};

/// Extension of the refined alignment tables the aggregator looks for.
pub const RESULT_TABLE_EXTENSION: &str = "res";
const MAPPING_SUFFIX: &str = "_mapping";
const MAPPING_TABLE_EXTENSION: &str = "spa";

/// `<output_dir>/<sample_id>`: the stem every output file of one sample hangs off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPrefix(PathBuf);

impl OutputPrefix {
    pub fn new(output_dir: &Path, sample_id: &str) -> Self {
        Self(output_dir.join(sample_id))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Prefix handed to the sparse scan (`-o`).
    pub fn mapping_prefix(&self) -> PathBuf {
        self.with_suffix(MAPPING_SUFFIX)
    }

    /// Table the sparse scan writes.
    pub fn mapping_table(&self) -> PathBuf {
        self.with_suffix(&format!("{MAPPING_SUFFIX}.{MAPPING_TABLE_EXTENSION}"))
    }

    /// Table the refined alignment writes.
    pub fn result_table(&self) -> PathBuf {
        self.with_suffix(&format!(".{RESULT_TABLE_EXTENSION}"))
    }

    // Appended to the raw name; ids may contain dots, so no set_extension here.
    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.0.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    }
}

/// Sparse scan done; the mapping table may or may not exist.
#[derive(Debug)]
pub struct Scanned<'a> {
    sample: &'a Sample,
    prefix: &'a OutputPrefix,
    pub mapping_table: PathBuf,
    pub outcome: ToolOutcome,
}

/// Best template picked from the scan.
#[derive(Debug)]
pub struct TemplateChosen<'a> {
    sample: &'a Sample,
    prefix: &'a OutputPrefix,
    pub template: SelectedTemplate,
}

/// Refined alignment done (or skipped when nothing was selected).
#[derive(Debug)]
pub struct Aligned<'a> {
    sample: &'a Sample,
    pub template: SelectedTemplate,
    pub result_table: Option<PathBuf>,
}

/// Phase 1: broad scan of the reads against the whole database.
pub fn scan<'a>(
    sample: &'a Sample,
    prefix: &'a OutputPrefix,
    config: &PipelineConfig,
    invoker: &dyn ToolInvoker,
) -> Result<Scanned<'a>> {
    let invocation = scan_invocation(sample, prefix, config);
    let outcome = invoker.invoke(&invocation)?;
    log_outcome(&invocation, &outcome);

    Ok(Scanned {
        sample,
        prefix,
        mapping_table: prefix.mapping_table(),
        outcome,
    })
}

impl<'a> Scanned<'a> {
    /// Phase 2: pick the highest-scoring template from the scan output.
    pub fn choose_template(self) -> TemplateChosen<'a> {
        let template = spa::select_template(&self.mapping_table);
        if template.is_selected() {
            log::info!(
                "{}: selected template #{} '{}' (score {})",
                self.sample.id,
                template.number.map_or_else(|| "?".to_string(), |n| n.to_string()),
                template.template,
                template.score
            );
        } else {
            log::warn!("{}: no template scored in {}", self.sample.id, self.mapping_table.display());
        }
        TemplateChosen {
            sample: self.sample,
            prefix: self.prefix,
            template,
        }
    }
}

impl<'a> TemplateChosen<'a> {
    /// Phase 3: realign against the chosen template only.
    ///
    /// Skipped when the scan produced no template, or the winning row had no usable
    /// template number; there is nothing to constrain the aligner to and the
    /// aggregator simply finds no table for this sample. The species count still
    /// uses the selected template name.
    pub fn align(self, config: &PipelineConfig, invoker: &dyn ToolInvoker) -> Result<Aligned<'a>> {
        let number = match self.template.number {
            Some(n) if self.template.is_selected() => n,
            _ => {
                if self.template.is_selected() {
                    log::warn!(
                        "{}: template '{}' has no template number, skipping refined alignment",
                        self.sample.id,
                        self.template.template
                    );
                }
                return Ok(Aligned {
                    sample: self.sample,
                    template: self.template,
                    result_table: None,
                });
            }
        };

        let invocation = align_invocation(self.sample, self.prefix, number, config);
        let outcome = invoker.invoke(&invocation)?;
        log_outcome(&invocation, &outcome);

        Ok(Aligned {
            sample: self.sample,
            template: self.template,
            result_table: Some(self.prefix.result_table()),
        })
    }
}

impl Aligned<'_> {
    /// Phase 4: count catalog entries sharing the template's species label.
    pub fn count_species(self, catalog_path: &Path) -> SampleReport {
        let species = self.template.species_label();
        let species_count = catalog::count_matches(catalog_path, &species);
        log::info!(
            "{}: {species_count} catalog references for '{species}'",
            self.sample.id
        );

        SampleReport {
            sample_id: self.sample.id.clone(),
            template: self.template,
            species,
            species_count,
            result_table: self.result_table,
        }
    }
}

/// Runs all phases for one sample and returns its report.
pub fn run_sample(
    sample: &Sample,
    prefix: &OutputPrefix,
    config: &PipelineConfig,
    invoker: &dyn ToolInvoker,
) -> Result<SampleReport> {
    let report = scan(sample, prefix, config, invoker)?
        .choose_template()
        .align(config, invoker)?
        .count_species(&config.catalog);
    Ok(report)
}

/// `kma -i <reads> -o <prefix>_mapping -t_db <db> -mem_mode -Sparse -mf 50000 -ss c -t <n>`
pub fn scan_invocation(sample: &Sample, prefix: &OutputPrefix, config: &PipelineConfig) -> Invocation {
    Invocation::new(Tool::Aligner, &config.tools.aligner)
        .arg("-i")
        .args(&sample.reads)
        .arg("-o")
        .arg(prefix.mapping_prefix())
        .arg("-t_db")
        .arg(&config.database)
        .args(["-mem_mode", "-Sparse"])
        .arg("-mf")
        .arg(SPARSE_MIN_FRAGMENTS.to_string())
        .args(["-ss", "c"])
        .arg("-t")
        .arg(config.threads.to_string())
}

/// Refined alignment restricted to template `number`, with the flag profile of the read type.
pub fn align_invocation(
    sample: &Sample,
    prefix: &OutputPrefix,
    number: u32,
    config: &PipelineConfig,
) -> Invocation {
    let input_flag = match sample.read_type {
        ReadType::Illumina if sample.reads.len() == 2 => "-ipe",
        _ => "-i",
    };

    let invocation = Invocation::new(Tool::Aligner, &config.tools.aligner)
        .arg(input_flag)
        .args(&sample.reads)
        .arg("-o")
        .arg(prefix.as_path())
        .arg("-t_db")
        .arg(&config.database)
        .arg("-Mt1")
        .arg(number.to_string())
        .args(["-1t1", "-ef", "-nf"]);

    let invocation = match sample.read_type {
        ReadType::Nanopore => invocation.args(["-ont", "-bcNano"]),
        ReadType::Illumina => invocation,
    };

    invocation.arg("-t").arg(config.threads.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::ffi::OsStr;
    use std::fs;

    /// Writes canned tables where the aligner would, recording every call.
    struct FakeAligner {
        spa: Option<&'static str>,
        res: &'static str,
        calls: RefCell<Vec<Invocation>>,
    }

    impl FakeAligner {
        fn new(spa: Option<&'static str>) -> Self {
            Self {
                spa,
                res: "#Template\tScore\tExpected\tTemplate_length\tTemplate_Identity\tTemplate_Coverage\n",
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ToolInvoker for FakeAligner {
        fn invoke(&self, invocation: &Invocation) -> Result<ToolOutcome> {
            self.calls.borrow_mut().push(invocation.clone());
            let out = PathBuf::from(invocation.value_after("-o").unwrap());
            if invocation.has_flag("-Sparse") {
                match self.spa {
                    Some(table) => {
                        let mut path = out.into_os_string();
                        path.push(".spa");
                        fs::write(path, table).unwrap();
                    }
                    None => {
                        return Ok(ToolOutcome::Failed {
                            code: Some(1),
                            stderr: "database not found".into(),
                        })
                    }
                }
            } else {
                let mut path = out.into_os_string();
                path.push(".res");
                fs::write(path, self.res).unwrap();
            }
            Ok(ToolOutcome::Completed)
        }
    }

    const SPA: &str = "#Template\tNum\tScore\n\
                       NC_002695.2 Escherichia coli O157:H7 str. Sakai\t12\t900\n\
                       NC_003197.2 Salmonella enterica serovar Typhimurium\t40\t300\n";

    fn setup(read_type: ReadType, reads: &[&str]) -> (tempfile::TempDir, PipelineConfig, Sample) {
        let dir = tempfile::tempdir().unwrap();
        let catalog = dir.path().join("db.name");
        fs::write(
            &catalog,
            "NC_000913.3 Escherichia coli K-12\nNC_002695.2 Escherichia coli O157:H7\nNC_003197.2 Salmonella enterica\n",
        )
        .unwrap();
        let config = PipelineConfig::new(dir.path().join("db"), dir.path().to_path_buf())
            .with_catalog(catalog)
            .with_threads(8);
        let sample = Sample {
            id: "s1".into(),
            reads: reads.iter().map(PathBuf::from).collect(),
            read_type,
        };
        (dir, config, sample)
    }

    #[test]
    fn prefix_builds_deterministic_names() {
        let prefix = OutputPrefix::new(Path::new("out"), "a.b");
        assert_eq!(prefix.mapping_table(), PathBuf::from("out/a.b_mapping.spa"));
        assert_eq!(prefix.mapping_prefix(), PathBuf::from("out/a.b_mapping"));
        assert_eq!(prefix.result_table(), PathBuf::from("out/a.b.res"));
    }

    #[test]
    fn chosen_template_is_threaded_into_refined_alignment() {
        let (_dir, config, sample) = setup(ReadType::Illumina, &["s1_R1.fq", "s1_R2.fq"]);
        let prefix = OutputPrefix::new(&config.output_dir, &sample.id);
        let aligner = FakeAligner::new(Some(SPA));

        let report = run_sample(&sample, &prefix, &config, &aligner).unwrap();

        assert_eq!(report.template.number, Some(12));
        assert_eq!(report.species, "Escherichia coli");
        assert_eq!(report.species_count, 2);
        assert_eq!(report.result_table, Some(prefix.result_table()));
        assert!(prefix.result_table().is_file());

        let calls = aligner.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].has_flag("-Sparse"));
        assert_eq!(calls[0].value_after("-t"), Some(OsStr::new("8")));
        assert_eq!(calls[1].value_after("-Mt1"), Some(OsStr::new("12")));
        assert_eq!(calls[1].value_after("-ipe"), Some(OsStr::new("s1_R1.fq")));
        assert!(!calls[1].has_flag("-ont"));
    }

    #[test]
    fn nanopore_uses_its_own_flag_profile() {
        let (_dir, config, sample) = setup(ReadType::Nanopore, &["s1.fastq"]);
        let prefix = OutputPrefix::new(&config.output_dir, &sample.id);
        let aligner = FakeAligner::new(Some(SPA));

        run_sample(&sample, &prefix, &config, &aligner).unwrap();

        let calls = aligner.calls.borrow();
        let refined = &calls[1];
        assert!(refined.has_flag("-ont"));
        assert!(refined.has_flag("-bcNano"));
        assert!(!refined.has_flag("-ipe"));
        assert_eq!(refined.value_after("-i"), Some(OsStr::new("s1.fastq")));
    }

    #[test]
    fn failed_scan_yields_empty_report() {
        let (_dir, config, sample) = setup(ReadType::Nanopore, &["s1.fastq"]);
        let prefix = OutputPrefix::new(&config.output_dir, &sample.id);
        let aligner = FakeAligner::new(None);

        let scanned = scan(&sample, &prefix, &config, &aligner).unwrap();
        assert!(!scanned.outcome.is_success());

        let report = scanned.choose_template().align(&config, &aligner).unwrap().count_species(&config.catalog);
        assert_eq!(report.species, "");
        assert_eq!(report.species_count, 0);
        assert_eq!(report.result_table, None);
        assert_eq!(aligner.calls.borrow().len(), 1);
    }

    #[test]
    fn template_without_number_is_still_counted() {
        let (_dir, config, sample) = setup(ReadType::Nanopore, &["s1.fastq"]);
        let prefix = OutputPrefix::new(&config.output_dir, &sample.id);
        let aligner = FakeAligner::new(Some(
            "#Template\tNum\tScore\nNC_1 Salmonella enterica LT2\t\t700\nNC_2 Escherichia coli K12\t3\t20\n",
        ));

        let report = run_sample(&sample, &prefix, &config, &aligner).unwrap();
        assert_eq!(report.template.number, None);
        assert_eq!(report.species, "Salmonella enterica");
        assert_eq!(report.species_count, 1);
        assert_eq!(report.result_table, None);
        assert_eq!(aligner.calls.borrow().len(), 1);
    }

    #[test]
    fn header_only_scan_skips_refinement() {
        let (_dir, config, sample) = setup(ReadType::Illumina, &["s1_R1.fq", "s1_R2.fq"]);
        let prefix = OutputPrefix::new(&config.output_dir, &sample.id);
        let aligner = FakeAligner::new(Some("#Template\tNum\tScore\n"));

        let report = run_sample(&sample, &prefix, &config, &aligner).unwrap();
        assert!(!report.template.is_selected());
        assert_eq!(report.species_count, 0);
        assert_eq!(aligner.calls.borrow().len(), 1);
    }
}
