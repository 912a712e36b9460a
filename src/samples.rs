//src/samples.rs

use std::fs;
use std::path::{Path, PathBuf};

use ahash::AHashSet;

use crate::error::{PipelineError, Result};
use crate::types::{ReadType, Sample};

/// Partitions read files into samples.
///
/// - `Illumina`: paths are sorted lexicographically and taken two at a time;
///   an odd trailing file is dropped.
/// - `Nanopore`: every path is its own sample, in input order.
///
/// Sample ids come from the first read's file name (up to the first `.`).
/// Repeated ids get `_2`, `_3`, ... appended so output files never collide.
pub fn group_samples(paths: &[PathBuf], read_type: ReadType) -> Vec<Sample> {
    let groups: Vec<Vec<PathBuf>> = match read_type {
        ReadType::Illumina => {
            let mut sorted = paths.to_vec();
            sorted.sort();
            if sorted.len() % 2 == 1 {
                if let Some(last) = sorted.last() {
                    log::warn!("Dropping unpaired read file {}", last.display());
                }
            }
            sorted.chunks_exact(2).map(|pair| pair.to_vec()).collect()
        }
        ReadType::Nanopore => paths.iter().map(|p| vec![p.clone()]).collect(),
    };

    let mut seen: AHashSet<String> = AHashSet::with_capacity(groups.len());
    groups
        .into_iter()
        .map(|reads| {
            let id = unique_id(base_name(&reads[0]), &mut seen);
            Sample {
                id,
                reads,
                read_type,
            }
        })
        .collect()
}

/// File name up to its first `.`; `reads/a_R1.fastq.gz` becomes `a_R1`.
pub fn base_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => "sample".to_string(),
    }
}

fn unique_id(base: String, seen: &mut AHashSet<String>) -> String {
    if seen.insert(base.clone()) {
        return base;
    }
    let mut n = 2usize;
    loop {
        let candidate = format!("{base}_{n}");
        if seen.insert(candidate.clone()) {
            log::warn!("Sample id '{base}' is already taken, using '{candidate}'");
            return candidate;
        }
        n += 1;
    }
}

/// Creates the output directory if needed. Safe to call repeatedly.
pub fn prepare_output_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        log::info!("Output directory {} already exists.", dir.display());
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(PipelineError::io(dir, "create output directory"))?;
    log::info!("Output directory {} created.", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn illumina_sorts_then_pairs() {
        let files = paths(&["b_R2.fq", "a_R1.fq", "a_R2.fq", "b_R1.fq"]);
        let samples = group_samples(&files, ReadType::Illumina);

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].reads, paths(&["a_R1.fq", "a_R2.fq"]));
        assert_eq!(samples[1].reads, paths(&["b_R1.fq", "b_R2.fq"]));
        assert_eq!(samples[0].id, "a_R1");
        assert!(samples.iter().all(|s| s.read_type == ReadType::Illumina));
    }

    #[test]
    fn illumina_drops_trailing_file() {
        let files = paths(&["c_R1.fq", "a_R1.fq", "a_R2.fq"]);
        let samples = group_samples(&files, ReadType::Illumina);

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].reads, paths(&["a_R1.fq", "a_R2.fq"]));
    }

    #[test]
    fn nanopore_keeps_input_order() {
        let files = paths(&["z.fastq", "a.fastq", "m.fastq.gz"]);
        let samples = group_samples(&files, ReadType::Nanopore);

        let ids: Vec<&str> = samples.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["z", "a", "m"]);
        assert!(samples.iter().all(|s| s.reads.len() == 1));
        assert_eq!(samples.len(), 3);
    }

    #[test]
    fn colliding_ids_are_disambiguated() {
        let files = paths(&["run1/x.fastq", "run2/x.fastq", "run3/x.fq.gz"]);
        let samples = group_samples(&files, ReadType::Nanopore);

        let ids: Vec<&str> = samples.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["x", "x_2", "x_3"]);
    }

    #[test]
    fn base_name_strips_directories_and_extensions() {
        assert_eq!(base_name(Path::new("reads/a_R1.fastq.gz")), "a_R1");
        assert_eq!(base_name(Path::new(".hidden")), "sample");
    }

    #[test]
    fn output_dir_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("out");
        prepare_output_dir(&out).unwrap();
        prepare_output_dir(&out).unwrap();
        assert!(out.is_dir());
    }
}
