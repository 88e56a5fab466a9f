// Bifurcation storage
// Immutable map from canonical junction k-mer to its dense vertex id. Built
// once from the packed scratch stream all rounds appended to; the set is
// sorted by canonical base order before ids are assigned, so ids depend only
// on the k-mer set, never on hash traversal or thread timing. Lookup goes
// through a fingerprint-keyed map with a full-key check.

use crate::kmer::{canonical_vertex, words_for, PackedKmer};
use ahash::AHashMap;
use anyhow::{Context, Result};
use std::io::{Read, Write};

/// Append one packed canonical k-mer to the scratch stream.
pub fn write_packed<W: Write>(out: &mut W, kmer: &PackedKmer, k: usize) -> std::io::Result<()> {
    let words = kmer.words();
    for word in words.iter().take(words_for(k)) {
        out.write_all(&word.to_le_bytes())?;
    }
    Ok(())
}

pub struct BifurcationStorage {
    k: usize,
    kmers: Vec<PackedKmer>,
    index: AHashMap<u64, Vec<u32>>,
}

impl BifurcationStorage {
    /// Read `count` packed k-mers from the scratch stream and build the map.
    pub fn build<R: Read>(mut input: R, count: u64, k: usize) -> Result<BifurcationStorage> {
        let width = words_for(k);
        let mut kmers = Vec::with_capacity(count as usize);
        let mut buf = [0u8; 8];
        for _ in 0..count {
            let mut words = [0u64; 2];
            for word in words.iter_mut().take(width) {
                input
                    .read_exact(&mut buf)
                    .context("truncated bifurcation scratch file")?;
                *word = u64::from_le_bytes(buf);
            }
            kmers.push(PackedKmer::from_words(words, k));
        }
        Ok(Self::from_kmers(kmers, k))
    }

    /// Sort, assign ids in order, index by fingerprint.
    pub fn from_kmers(mut kmers: Vec<PackedKmer>, k: usize) -> BifurcationStorage {
        kmers.sort_unstable_by(|a, b| a.base_cmp(b));
        kmers.dedup();
        let mut index: AHashMap<u64, Vec<u32>> = AHashMap::with_capacity(kmers.len());
        for (id, kmer) in kmers.iter().enumerate() {
            index.entry(kmer.key()).or_default().push(id as u32);
        }
        BifurcationStorage { k, kmers, index }
    }

    /// Number of distinct junction vertices.
    pub fn len(&self) -> u64 {
        self.kmers.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.kmers.is_empty()
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Id of an already canonical k-mer.
    pub fn id_of_canonical(&self, canonical: &PackedKmer) -> Option<u64> {
        let candidates = self.index.get(&canonical.key())?;
        candidates
            .iter()
            .copied()
            .find(|&id| self.kmers[id as usize] == *canonical)
            .map(u64::from)
    }

    /// Id of a raw window; `None` for indefinite windows and non-junctions.
    pub fn id_of_window(&self, window: &[u8]) -> Option<u64> {
        debug_assert_eq!(window.len(), self.k);
        let (canonical, _) = canonical_vertex(window)?;
        self.id_of_canonical(&canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn packed(seq: &[u8]) -> PackedKmer {
        PackedKmer::from_ascii(seq).unwrap()
    }

    #[test]
    fn test_ids_follow_sorted_order() {
        let storage = BifurcationStorage::from_kmers(
            vec![packed(b"TTT"), packed(b"ACG"), packed(b"CCA")],
            3,
        );
        assert_eq!(storage.len(), 3);
        assert_eq!(storage.id_of_window(b"ACG"), Some(0));
        assert_eq!(storage.id_of_window(b"CCA"), Some(1));
        assert_eq!(storage.id_of_window(b"TTT"), Some(2));
    }

    #[test]
    fn test_ids_independent_of_insertion_order() {
        let forward =
            BifurcationStorage::from_kmers(vec![packed(b"ACG"), packed(b"GGA")], 3);
        let reversed =
            BifurcationStorage::from_kmers(vec![packed(b"GGA"), packed(b"ACG")], 3);
        for window in [&b"ACG"[..], b"GGA"] {
            assert_eq!(
                forward.id_of_window(window),
                reversed.id_of_window(window)
            );
        }
    }

    #[test]
    fn test_reverse_complement_resolves_to_same_id() {
        let storage = BifurcationStorage::from_kmers(vec![packed(b"ACGA")], 4);
        let id = storage.id_of_window(b"ACGA");
        assert!(id.is_some());
        assert_eq!(storage.id_of_window(b"TCGT"), id);
    }

    #[test]
    fn test_unknown_and_indefinite_windows() {
        let storage = BifurcationStorage::from_kmers(vec![packed(b"ACG")], 3);
        assert_eq!(storage.id_of_window(b"TTT"), None);
        assert_eq!(storage.id_of_window(b"ANG"), None);
    }

    #[test]
    fn test_scratch_stream_roundtrip() {
        let kmers = vec![packed(b"GATTACA"), packed(b"ACGTACG"), packed(b"TTTTTTT")];
        let mut bytes = Vec::new();
        for kmer in &kmers {
            write_packed(&mut bytes, kmer, 7).unwrap();
        }
        let storage = BifurcationStorage::build(Cursor::new(bytes), 3, 7).unwrap();
        assert_eq!(storage.len(), 3);
        for kmer in &kmers {
            assert!(storage.id_of_canonical(kmer).is_some());
        }
    }

    #[test]
    fn test_long_kmers_span_two_words() {
        let seq: Vec<u8> = (0..40).map(|i| b"ACGT"[(i * 3) % 4]).collect();
        let kmer = packed(&seq);
        let mut bytes = Vec::new();
        write_packed(&mut bytes, &kmer, 40).unwrap();
        assert_eq!(bytes.len(), 16);
        let storage = BifurcationStorage::build(Cursor::new(bytes), 1, 40).unwrap();
        assert_eq!(storage.id_of_canonical(&kmer), Some(0));
    }
}
