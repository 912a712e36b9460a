//src/spa.rs
//! Template selection from sparse-mapping (`.spa`) tables.
//!
//! Layout (tab separated, one header line):
//! ```text
//! #Template  Num  Score  Expected  Template_length  query_coverage  ...
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::types::{MappingRecord, SelectedTemplate};

const TEMPLATE_COL: usize = 0;
const NUMBER_COL: usize = 1;
const SCORE_COL: usize = 2;

/// Picks the highest-scoring template in a sparse-mapping table.
///
/// A missing or unreadable table yields the empty default, the same as a
/// table with only a header.
pub fn select_template<P: AsRef<Path>>(path: P) -> SelectedTemplate {
    let path = path.as_ref();
    match File::open(path) {
        Ok(file) => select_from_reader(BufReader::new(file)),
        Err(e) => {
            log::warn!("Cannot open mapping table {}: {e}", path.display());
            SelectedTemplate::default()
        }
    }
}

/// Single pass over the rows after the header. Only a strictly higher score
/// replaces the current best, so the earliest row reaching the maximum wins.
pub fn select_from_reader<R: BufRead>(reader: R) -> SelectedTemplate {
    let mut best = SelectedTemplate::default();

    for line in reader.lines().skip(1) {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::warn!("Stopped reading mapping table: {e}");
                break;
            }
        };
        match parse_row(&line) {
            Some(record) if record.score > best.score => best = record,
            Some(_) => {}
            None => log::debug!("Skipping malformed mapping row: {line:?}"),
        }
    }

    best
}

/// Parses one data row; `None` only when the score is not an integer.
/// A template number that does not parse is kept as `None`.
pub fn parse_row(line: &str) -> Option<MappingRecord> {
    let columns: Vec<&str> = line.split('\t').collect();
    let score: i64 = columns.get(SCORE_COL)?.trim().parse().ok()?;
    let number = columns
        .get(NUMBER_COL)
        .and_then(|c| c.trim().parse::<u32>().ok());
    let template = columns.get(TEMPLATE_COL)?.trim().to_string();

    Some(MappingRecord {
        template,
        number,
        score,
    })
}

/// Species label from a template name: tokens 1 and 2 joined by one space,
/// skipping the leading accession. Shorter names give whatever tokens exist.
pub fn species_label(template: &str) -> String {
    template
        .split_whitespace()
        .skip(1)
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
}
