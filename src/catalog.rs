//src/catalog.rs

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Counts catalog lines containing `label` as a plain substring.
///
/// Case-sensitive and unanchored: `Escherichia coli` also matches a line for
/// `Escherichia coliformis`. An empty label or an unreadable catalog counts 0.
pub fn count_matches<P: AsRef<Path>>(catalog: P, label: &str) -> usize {
    if label.is_empty() {
        return 0;
    }
    let catalog = catalog.as_ref();
    match File::open(catalog) {
        Ok(file) => count_in_reader(BufReader::new(file), label),
        Err(e) => {
            log::warn!("Cannot open reference catalog {}: {e}", catalog.display());
            0
        }
    }
}

/// Same as [`count_matches`] over any reader. Non-UTF-8 bytes are replaced, not rejected.
pub fn count_in_reader<R: BufRead>(reader: R, label: &str) -> usize {
    if label.is_empty() {
        return 0;
    }
    let mut count = 0;
    for line in reader.split(b'\n') {
        match line {
            Ok(bytes) => {
                if String::from_utf8_lossy(&bytes).contains(label) {
                    count += 1;
                }
            }
            Err(e) => {
                log::warn!("Stopped reading reference catalog after {count} matches: {e}");
                break;
            }
        }
    }
    count
}
