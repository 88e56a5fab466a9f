// Integration test for the junction position file format

use djinn_common::{JunctionPosition, JunctionPositionReader, JunctionPositionWriter};
use std::io::Cursor;

#[test]
fn test_multi_chromosome_roundtrip() {
    let positions = vec![
        JunctionPosition::new(0, 0, 42),
        JunctionPosition::new(0, 3, 42),
        JunctionPosition::new(1, 0, 7),
        JunctionPosition::new(3, 9, 0),
    ];

    let mut writer = JunctionPositionWriter::new(Vec::new());
    for &p in &positions {
        writer.write(p).unwrap();
    }
    let bytes = writer.finish().unwrap();

    let mut reader = JunctionPositionReader::new(Cursor::new(bytes));
    assert_eq!(reader.read_all().unwrap(), positions);
}

#[test]
fn test_positions_strictly_increasing_within_chromosome() {
    let mut writer = JunctionPositionWriter::new(Vec::new());
    for pos in [1u32, 4, 9, 100] {
        writer.write(JunctionPosition::new(0, pos, 1)).unwrap();
    }
    let bytes = writer.finish().unwrap();

    let mut reader = JunctionPositionReader::new(Cursor::new(bytes));
    let all = reader.read_all().unwrap();
    for pair in all.windows(2) {
        assert!(pair[0].pos < pair[1].pos);
    }
}

#[test]
fn test_record_layout_is_little_endian() {
    let mut writer = JunctionPositionWriter::new(Vec::new());
    writer
        .write(JunctionPosition::new(0, 0x0102_0304, 0x1122_3344_5566_7788))
        .unwrap();
    let bytes = writer.finish().unwrap();

    assert_eq!(&bytes[0..4], &[0x04, 0x03, 0x02, 0x01]);
    assert_eq!(
        &bytes[4..12],
        &[0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]
    );
}
