use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;

/// True when the path ends in `.gz`.
pub fn is_gzipped(path: &Path) -> bool {
    path.extension().map(|ext| ext == "gz").unwrap_or(false)
}

/// Opens a read file, transparently decoding gzip (including multi-member files).
pub fn open_reads(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let f = File::open(path)?;

    let reader: Box<dyn BufRead> = if is_gzipped(path) {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

/// Streams the uncompressed content of `path` into `out`, returning the byte count.
///
/// A missing trailing newline is added so that files concatenated one after
/// another never merge their last and first records.
pub fn copy_uncompressed<W: Write>(path: &Path, out: &mut W) -> io::Result<u64> {
    let mut reader = open_reads(path)?;
    let mut written = 0u64;
    let mut last_byte = b'\n';

    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        out.write_all(buf)?;
        last_byte = buf[buf.len() - 1];
        let n = buf.len();
        written += n as u64;
        reader.consume(n);
    }

    if last_byte != b'\n' {
        out.write_all(b"\n")?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;

    const RECORD: &str = "@r1 extra\nACGTACGT\n+\nIIIIIIII\n";

    #[test]
    fn plain_file_is_copied_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.fastq");
        fs::write(&path, RECORD).unwrap();

        let mut out = Vec::new();
        let n = copy_uncompressed(&path, &mut out).unwrap();
        assert_eq!(n as usize, RECORD.len());
        assert_eq!(String::from_utf8(out).unwrap(), RECORD);
    }

    #[test]
    fn gzip_file_is_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.fastq.gz");
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(RECORD.as_bytes()).unwrap();
        fs::write(&path, enc.finish().unwrap()).unwrap();

        let mut out = Vec::new();
        copy_uncompressed(&path, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), RECORD);
    }

    #[test]
    fn missing_newline_is_terminated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.fq");
        fs::write(&path, RECORD.trim_end()).unwrap();

        let mut out = Vec::new();
        copy_uncompressed(&path, &mut out).unwrap();
        assert!(out.ends_with(b"IIIIIIII\n"));
    }
}
