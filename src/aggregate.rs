//src/aggregate.rs

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::align::RESULT_TABLE_EXTENSION;
use crate::error::{PipelineError, Result};
use crate::types::{BestHit, RunSummary};

const IDENTITY_COL: usize = 4;
const COVERAGE_COL: usize = 5;

/// Mean species-reference count per sample. Zero samples is an error rather than NaN.
pub fn mean_species_count(counts: &[usize], sample_count: usize) -> Result<f64> {
    if sample_count == 0 {
        return Err(PipelineError::EmptyBatch);
    }
    let total: usize = counts.iter().sum();
    Ok(total as f64 / sample_count as f64)
}

/// All `*.res` tables directly inside `dir`, sorted by path.
pub fn find_result_tables(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(PipelineError::io(dir, "list output directory"))?;

    let mut tables: Vec<PathBuf> = entries
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let is_table = path.is_file()
                && path
                    .extension()
                    .map(|ext| ext == RESULT_TABLE_EXTENSION)
                    .unwrap_or(false);
            is_table.then_some(path)
        })
        .collect();
    tables.sort();
    Ok(tables)
}

/// Highest identity and highest coverage in one result table, taken independently.
///
/// The header is skipped; lines too short to hold both columns, or holding
/// non-numeric values, are ignored. Both maxima start at 0.0.
pub fn best_hit_from_reader<R: BufRead>(reader: R) -> BestHit {
    let mut best = BestHit::default();

    for line in reader.lines().skip(1) {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::warn!("Stopped reading result table: {e}");
                break;
            }
        };
        let columns: Vec<&str> = line.split('\t').collect();
        let (Some(identity), Some(coverage)) = (
            columns.get(IDENTITY_COL).and_then(|c| c.trim().parse::<f64>().ok()),
            columns.get(COVERAGE_COL).and_then(|c| c.trim().parse::<f64>().ok()),
        ) else {
            log::debug!("Skipping malformed result row: {line:?}");
            continue;
        };

        if identity > best.identity {
            best.identity = identity;
        }
        if coverage > best.coverage {
            best.coverage = coverage;
        }
    }

    best
}

/// [`best_hit_from_reader`] over a file; `None` if it cannot be opened.
pub fn best_hit<P: AsRef<Path>>(path: P) -> Option<BestHit> {
    let path = path.as_ref();
    match File::open(path) {
        Ok(file) => Some(best_hit_from_reader(BufReader::new(file))),
        Err(e) => {
            log::warn!("Cannot open result table {}: {e}", path.display());
            None
        }
    }
}

/// Mean of per-table maxima as `(identity, coverage, tables averaged)`; zeros when none.
pub fn mean_best_hits(tables: &[PathBuf]) -> (f64, f64, usize) {
    let hits: Vec<BestHit> = tables.iter().filter_map(best_hit).collect();
    if hits.is_empty() {
        return (0.0, 0.0, 0);
    }
    let n = hits.len() as f64;
    let identity = hits.iter().map(|h| h.identity).sum::<f64>() / n;
    let coverage = hits.iter().map(|h| h.coverage).sum::<f64>() / n;
    (identity, coverage, hits.len())
}

/// Batch summary over the species counts of this run and every result table in
/// `output_dir`. `distinct_kmers` is left at 0 for the k-mer counter to fill in.
pub fn summarize(output_dir: &Path, species_counts: &[usize], sample_count: usize) -> Result<RunSummary> {
    let mean_species_count = mean_species_count(species_counts, sample_count)?;
    let tables = find_result_tables(output_dir)?;
    let (mean_best_identity, mean_best_coverage, result_tables) = mean_best_hits(&tables);

    log::info!(
        "Aggregated {result_tables} result tables over {sample_count} samples"
    );

    Ok(RunSummary {
        samples: sample_count,
        mean_species_count,
        result_tables,
        mean_best_identity,
        mean_best_coverage,
        distinct_kmers: 0,
    })
}
