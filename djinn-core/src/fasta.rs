// FASTA input
// Streams records as (header, sequence bytes): lines of a record are
// concatenated with whitespace dropped, every other byte surfaces verbatim
// (the distributor normalizes to the working alphabet). Gzipped files are
// decoded transparently.

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

pub struct FastaRecord {
    pub header: String,
    pub sequence: Vec<u8>,
}

pub struct FastaReader<R> {
    reader: BufReader<R>,
    line: Vec<u8>,
    next_header: Option<String>,
}

impl FastaReader<Box<dyn Read>> {
    /// Open a FASTA file, gunzipping by extension.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("can't open input file {}", path.display()))?;
        let reader: Box<dyn Read> = if path.extension().and_then(|s| s.to_str()) == Some("gz") {
            Box::new(MultiGzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(FastaReader::new(reader))
    }
}

impl<R: Read> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        FastaReader {
            reader: BufReader::with_capacity(1 << 20, reader),
            line: Vec::with_capacity(1 << 12),
            next_header: None,
        }
    }

    /// Next record, or `None` at end of input.
    pub fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        let header = match self.next_header.take() {
            Some(h) => h,
            None => loop {
                self.line.clear();
                let n = self
                    .reader
                    .read_until(b'\n', &mut self.line)
                    .context("FASTA read failed")?;
                if n == 0 {
                    return Ok(None);
                }
                if self.line.first() == Some(&b'>') {
                    break parse_header(&self.line);
                }
                // Leading junk before the first '>' is skipped.
            },
        };

        let mut sequence = Vec::new();
        loop {
            self.line.clear();
            let n = self
                .reader
                .read_until(b'\n', &mut self.line)
                .context("FASTA read failed")?;
            if n == 0 {
                break;
            }
            if self.line.first() == Some(&b'>') {
                self.next_header = Some(parse_header(&self.line));
                break;
            }
            sequence.extend(self.line.iter().copied().filter(|b| !b.is_ascii_whitespace()));
        }

        Ok(Some(FastaRecord { header, sequence }))
    }
}

fn parse_header(line: &[u8]) -> String {
    String::from_utf8_lossy(line)
        .trim_start_matches('>')
        .trim()
        .to_string()
}
