// End-to-end junction enumeration scenarios (k = 3 unless noted).
// Each test builds over real FASTA files in a scratch directory and checks
// the binary junction stream through the reader API.

use djinn_common::{JunctionPosition, JunctionPositionReader};
use djinn_core::{Config, JunctionEnumerator};
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_fasta(dir: &TempDir, name: &str, records: &[&str]) -> PathBuf {
    let path = dir.path().join(name);
    let mut content = String::new();
    for (i, seq) in records.iter().enumerate() {
        content.push_str(&format!(">record{i}\n{seq}\n"));
    }
    fs::write(&path, content).unwrap();
    path
}

fn config(dir: &TempDir, k: usize, threads: usize, rounds: usize) -> Config {
    Config {
        vertex_length: k,
        filter_size_bits: 16,
        hash_functions: 3,
        rounds,
        threads,
        tmp_dir: dir.path().to_path_buf(),
        out_file: dir.path().join("junctions.bin"),
    }
}

fn read_output(config: &Config) -> Vec<JunctionPosition> {
    let mut reader = JunctionPositionReader::open(&config.out_file).unwrap();
    reader.read_all().unwrap()
}

#[test]
fn test_single_linear_walk_yields_only_stubs() {
    let dir = TempDir::new().unwrap();
    let input = write_fasta(&dir, "in.fa", &["ACGT"]);
    let config = config(&dir, 3, 1, 1);

    let enumerator = JunctionEnumerator::build(&config, &[input]).unwrap();
    assert_eq!(enumerator.vertex_count(), 0);
    assert_eq!(enumerator.stub_count(), 2);

    // No junction vertices: the two sequence endpoints get fresh stub ids,
    // starting at verticesCount + 42.
    assert_eq!(
        read_output(&config),
        vec![
            JunctionPosition::new(0, 0, 42),
            JunctionPosition::new(0, 1, 43),
        ]
    );
}

#[test]
fn test_repeated_kmer_with_single_context_is_not_a_junction() {
    let dir = TempDir::new().unwrap();
    // ACG occurs twice but always enters from A and leaves to A (or a
    // record boundary), so its degree stays 1 on both sides.
    let input = write_fasta(&dir, "in.fa", &["ACGAACG"]);
    let config = config(&dir, 3, 1, 1);

    let enumerator = JunctionEnumerator::build(&config, &[input]).unwrap();
    assert_eq!(enumerator.vertex_count(), 0);
    assert_eq!(
        read_output(&config),
        vec![
            JunctionPosition::new(0, 0, 42),
            JunctionPosition::new(0, 4, 43),
        ]
    );
}

#[test]
fn test_branching_successor_makes_a_junction() {
    let dir = TempDir::new().unwrap();
    // ACG is followed by T in one record and by A in the other:
    // out-degree 2, one junction vertex.
    let input = write_fasta(&dir, "in.fa", &["ACGT", "ACGA"]);
    let config = config(&dir, 3, 1, 1);

    let enumerator = JunctionEnumerator::build(&config, &[input]).unwrap();
    assert_eq!(enumerator.vertex_count(), 1);

    // Every occurrence of ACG (including the CGT windows, which fold onto
    // it) reports the same vertex id; the unmatched tail of record 1 gets a
    // stub.
    assert_eq!(
        read_output(&config),
        vec![
            JunctionPosition::new(0, 0, 0),
            JunctionPosition::new(0, 1, 0),
            JunctionPosition::new(1, 0, 0),
            JunctionPosition::new(1, 1, 43),
        ]
    );

    // Canonical folding: a window and its reverse complement resolve alike.
    assert_eq!(enumerator.id_of(b"ACG"), Some(0));
    assert_eq!(enumerator.id_of(b"CGT"), Some(0));
    assert_eq!(enumerator.id_of(b"CGA"), None);
}

#[test]
fn test_palindromic_repeat_folds_onto_itself() {
    let dir = TempDir::new().unwrap();
    // ACGTACGT... equals its own reverse complement; strand folding must
    // not invent branches in a plain repeat walk.
    let input = write_fasta(&dir, "in.fa", &["ACGTACGTACGTACGT"]);
    let config = config(&dir, 3, 1, 1);

    let enumerator = JunctionEnumerator::build(&config, &[input]).unwrap();
    assert_eq!(enumerator.vertex_count(), 0);
    assert_eq!(
        read_output(&config),
        vec![
            JunctionPosition::new(0, 0, 42),
            JunctionPosition::new(0, 13, 43),
        ]
    );
    for window in [&b"ACG"[..], b"CGT", b"GTA", b"TAC"] {
        let rc: Vec<u8> = window
            .iter()
            .rev()
            .map(|&b| djinn_common::types::complement(b))
            .collect();
        assert_eq!(enumerator.id_of(window), enumerator.id_of(&rc));
    }
}

#[test]
fn test_n_runs_interrupt_windows() {
    let dir = TempDir::new().unwrap();
    let input = write_fasta(&dir, "in.fa", &["ANNNCGT"]);
    let config = config(&dir, 3, 1, 1);

    let enumerator = JunctionEnumerator::build(&config, &[input]).unwrap();
    assert_eq!(enumerator.vertex_count(), 0);
    // Windows spanning the N run are skipped; the record endpoints still
    // get their stubs (the tail stub sits on the CGT window).
    assert_eq!(
        read_output(&config),
        vec![
            JunctionPosition::new(0, 0, 42),
            JunctionPosition::new(0, 4, 43),
        ]
    );
}

#[test]
fn test_short_record_boundaries() {
    let dir = TempDir::new().unwrap();
    // A record shorter than k yields nothing at all, but still advances the
    // chromosome counter; a record of exactly k yields one stub.
    let input = write_fasta(&dir, "in.fa", &["AC", "ACG"]);
    let config = config(&dir, 3, 1, 1);

    let enumerator = JunctionEnumerator::build(&config, &[input]).unwrap();
    assert_eq!(enumerator.vertex_count(), 0);
    assert_eq!(enumerator.stub_count(), 1);
    assert_eq!(
        read_output(&config),
        vec![JunctionPosition::new(1, 0, 42)]
    );
}

#[test]
fn test_multiple_input_files() {
    let dir = TempDir::new().unwrap();
    let first = write_fasta(&dir, "a.fa", &["ACGT"]);
    let second = write_fasta(&dir, "b.fa", &["ACGA"]);
    let config = config(&dir, 3, 2, 1);

    let enumerator = JunctionEnumerator::build(&config, &[first, second]).unwrap();
    // Same branching as the two-record case; records number globally
    // across files.
    assert_eq!(enumerator.vertex_count(), 1);
    let output = read_output(&config);
    assert_eq!(output.len(), 4);
    assert!(output.iter().take(3).all(|p| p.id == 0));
    assert_eq!(output[3], JunctionPosition::new(1, 1, 43));
}

#[test]
fn test_filter_dump_reloads_and_is_removed_on_drop() {
    let dir = TempDir::new().unwrap();
    let input = write_fasta(&dir, "in.fa", &["ACGTACGTAA"]);
    let config = config(&dir, 3, 1, 1);

    let dump_path = dir.path().join("filter.bin");
    let enumerator = JunctionEnumerator::build(&config, &[input]).unwrap();
    assert!(dump_path.exists());
    let bits = enumerator.reload_filter().unwrap();
    assert_eq!(bits.len_bits(), 1 << 16);

    drop(enumerator);
    assert!(!dump_path.exists());
}

#[test]
fn test_threads_and_rounds_do_not_change_the_output() {
    let base_dir = TempDir::new().unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
    let sequence: String = (0..80_000)
        .map(|_| ['A', 'C', 'G', 'T'][rng.gen_range(0..4)])
        .collect();
    let input = write_fasta(&base_dir, "random.fa", &[&sequence]);

    let runs = [(1usize, 1usize), (4, 2)];
    let mut outputs = Vec::new();
    for (threads, rounds) in runs {
        let dir = TempDir::new().unwrap();
        let config = Config {
            vertex_length: 21,
            filter_size_bits: 20,
            hash_functions: 4,
            rounds,
            threads,
            tmp_dir: dir.path().to_path_buf(),
            out_file: dir.path().join("junctions.bin"),
        };
        let enumerator = JunctionEnumerator::build(&config, &[input.clone()]).unwrap();
        assert!(enumerator.stub_count() >= 1);
        outputs.push(fs::read(&config.out_file).unwrap());
    }

    // Piece-ordered emission and sorted id assignment make the stream
    // byte-identical for any worker count and round split.
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn test_invalid_configurations_fail_fast() {
    let dir = TempDir::new().unwrap();
    let input = write_fasta(&dir, "in.fa", &["ACGT"]);

    let mut bad_k = config(&dir, 3, 1, 1);
    bad_k.vertex_length = 63;
    assert!(JunctionEnumerator::build(&bad_k, &[input.clone()]).is_err());

    let mut bad_threads = config(&dir, 3, 1, 1);
    bad_threads.threads = 0;
    assert!(JunctionEnumerator::build(&bad_threads, &[input.clone()]).is_err());

    let good = config(&dir, 3, 1, 1);
    let missing = dir.path().join("missing.fa");
    assert!(JunctionEnumerator::build(&good, &[missing]).is_err());
    // The failed run must not leave an output file behind.
    assert!(!good.out_file.exists());
}
