// Junction position file API
// Binary stream of little-endian (pos: u32, bifId: u64) records. An all-ones
// record is a chromosome separator: the reader infers the chromosome of each
// record from the number of separators seen before it.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

const SEPARATOR_POS: u32 = u32::MAX;
const SEPARATOR_BIF: u64 = u64::MAX;

/// One junction occurrence: chromosome (input record index), position within
/// the record, and the vertex id of the junction k-mer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JunctionPosition {
    pub chr: u32,
    pub pos: u32,
    pub id: u64,
}

impl JunctionPosition {
    pub fn new(chr: u32, pos: u32, id: u64) -> Self {
        JunctionPosition { chr, pos, id }
    }
}

/// Streaming writer. Positions must arrive in non-decreasing chromosome
/// order; separators are emitted to pad skipped chromosomes.
pub struct JunctionPositionWriter<W: Write> {
    out: W,
    now_chr: u32,
}

impl JunctionPositionWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(JunctionPositionWriter::new(BufWriter::new(file)))
    }
}

impl<W: Write> JunctionPositionWriter<W> {
    pub fn new(out: W) -> Self {
        JunctionPositionWriter { out, now_chr: 0 }
    }

    pub fn write(&mut self, pos: JunctionPosition) -> io::Result<()> {
        while pos.chr > self.now_chr {
            self.write_record(SEPARATOR_POS, SEPARATOR_BIF)?;
            self.now_chr += 1;
        }
        self.write_record(pos.pos, pos.id)
    }

    fn write_record(&mut self, pos: u32, id: u64) -> io::Result<()> {
        self.out.write_all(&pos.to_le_bytes())?;
        self.out.write_all(&id.to_le_bytes())
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Streaming reader; yields positions and skips separators.
pub struct JunctionPositionReader<R: Read> {
    input: R,
    now_chr: u32,
}

impl JunctionPositionReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(JunctionPositionReader::new(BufReader::new(file)))
    }
}

impl<R: Read> JunctionPositionReader<R> {
    pub fn new(input: R) -> Self {
        JunctionPositionReader { input, now_chr: 0 }
    }

    /// Next junction position, or `None` at end of stream.
    pub fn next_position(&mut self) -> io::Result<Option<JunctionPosition>> {
        loop {
            let mut pos_buf = [0u8; 4];
            match self.input.read_exact(&mut pos_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(e),
            }
            let mut id_buf = [0u8; 8];
            self.input.read_exact(&mut id_buf)?;

            let pos = u32::from_le_bytes(pos_buf);
            let id = u64::from_le_bytes(id_buf);
            if pos == SEPARATOR_POS && id == SEPARATOR_BIF {
                self.now_chr += 1;
                continue;
            }
            return Ok(Some(JunctionPosition::new(self.now_chr, pos, id)));
        }
    }

    /// Drain the remaining stream into a vector.
    pub fn read_all(&mut self) -> io::Result<Vec<JunctionPosition>> {
        let mut out = Vec::new();
        while let Some(pos) = self.next_position()? {
            out.push(pos);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_roundtrip_single_chromosome() {
        let mut writer = JunctionPositionWriter::new(Vec::new());
        writer.write(JunctionPosition::new(0, 0, 7)).unwrap();
        writer.write(JunctionPosition::new(0, 5, 2)).unwrap();
        let bytes = writer.finish().unwrap();

        // Two fixed 12-byte records, no separators.
        assert_eq!(bytes.len(), 24);

        let mut reader = JunctionPositionReader::new(Cursor::new(bytes));
        let all = reader.read_all().unwrap();
        assert_eq!(
            all,
            vec![
                JunctionPosition::new(0, 0, 7),
                JunctionPosition::new(0, 5, 2)
            ]
        );
    }

    #[test]
    fn test_separator_padding() {
        let mut writer = JunctionPositionWriter::new(Vec::new());
        writer.write(JunctionPosition::new(2, 4, 1)).unwrap();
        let bytes = writer.finish().unwrap();

        // Two separators precede the record.
        assert_eq!(bytes.len(), 36);
        assert_eq!(&bytes[0..4], &[0xFF; 4]);
        assert_eq!(&bytes[4..12], &[0xFF; 8]);

        let mut reader = JunctionPositionReader::new(Cursor::new(bytes));
        assert_eq!(
            reader.read_all().unwrap(),
            vec![JunctionPosition::new(2, 4, 1)]
        );
    }

    #[test]
    fn test_empty_stream() {
        let mut reader = JunctionPositionReader::new(Cursor::new(Vec::new()));
        assert!(reader.next_position().unwrap().is_none());
    }
}
