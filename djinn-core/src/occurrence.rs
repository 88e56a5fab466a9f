// Occurrence set
// Exact confirmation structure for pass 2. Keyed by the canonical k-mer bits
// with the composite rolling hash precomputed (the map hasher passes it
// through). Each entry keeps one definite witness base per side, in
// canonical orientation; an occurrence contributing a second distinct
// definite base on either side promotes the entry to a bifurcation.
// Indefinite flanks carry no evidence (there is no edge into `N`), so record
// endpoints stay clean and fall through to stub handling. Promotion is
// sticky, so merging is idempotent and commutative under concurrent
// insertion.

use crate::kmer::PackedKmer;
use dashmap::DashMap;
use djinn_common::types::{complement, is_definite};
use std::hash::{BuildHasherDefault, Hasher};

#[derive(Debug, Clone, Copy)]
pub struct OccurrenceKey {
    words: [u64; 2],
    hash: u64,
}

impl PartialEq for OccurrenceKey {
    fn eq(&self, other: &Self) -> bool {
        self.words == other.words
    }
}

impl Eq for OccurrenceKey {}

impl std::hash::Hash for OccurrenceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// The key hash is already mixed; forward it unchanged.
#[derive(Default)]
pub struct PassThroughHasher(u64);

impl Hasher for PassThroughHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, _bytes: &[u8]) {
        unreachable!("keys hash through write_u64");
    }

    fn write_u64(&mut self, value: u64) {
        self.0 = value;
    }
}

#[derive(Debug, Clone, Copy)]
struct Occurrence {
    /// Definite witness bases, or `N` while unseen.
    in_flank: u8,
    out_flank: u8,
    bifurcation: bool,
}

pub struct OccurrenceSet {
    map: DashMap<OccurrenceKey, Occurrence, BuildHasherDefault<PassThroughHasher>>,
}

impl OccurrenceSet {
    pub fn new() -> OccurrenceSet {
        OccurrenceSet {
            map: DashMap::with_hasher(BuildHasherDefault::default()),
        }
    }

    /// Record one confirmed candidate window. `canonical`/`was_rc` come from
    /// canonical folding of the window; `prev`/`next` are the observed flank
    /// bytes on the forward strand; `hash` is the strand-symmetric composite.
    pub fn record_window(
        &self,
        canonical: &PackedKmer,
        was_rc: bool,
        prev: u8,
        next: u8,
        hash: u64,
    ) {
        let (in_flank, out_flank) = if was_rc {
            (complement(next), complement(prev))
        } else {
            (prev, next)
        };
        self.record(canonical, hash, in_flank, out_flank);
        // A palindromic vertex reads its own context from both strands, so a
        // single occurrence already contributes the mirrored flank pair.
        if canonical.is_palindrome() {
            self.record(canonical, hash, complement(out_flank), complement(in_flank));
        }
    }

    fn record(&self, canonical: &PackedKmer, hash: u64, in_flank: u8, out_flank: u8) {
        let key = OccurrenceKey {
            words: canonical.words(),
            hash,
        };
        let mut entry = self.map.entry(key).or_insert(Occurrence {
            in_flank: b'N',
            out_flank: b'N',
            bifurcation: false,
        });
        merge(entry.value_mut(), in_flank, out_flank);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// One scan after the stage join: bifurcating canonical k-mers plus the
    /// count of entries that turned out to be filter false positives.
    pub fn collect_bifurcations(&self, k: usize) -> (Vec<PackedKmer>, u64) {
        let mut bifurcations = Vec::new();
        let mut false_positives = 0u64;
        for entry in self.map.iter() {
            if entry.value().bifurcation {
                bifurcations.push(PackedKmer::from_words(entry.key().words, k));
            } else {
                false_positives += 1;
            }
        }
        (bifurcations, false_positives)
    }
}

impl Default for OccurrenceSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold one flank pair into the entry. A side with a stored definite
/// witness branches when a different definite base arrives; a stored `N`
/// is upgraded by the first definite base.
fn merge(occ: &mut Occurrence, in_flank: u8, out_flank: u8) {
    if occ.bifurcation {
        return;
    }
    for (stored, seen) in [
        (&mut occ.in_flank, in_flank),
        (&mut occ.out_flank, out_flank),
    ] {
        if !is_definite(seen) {
            continue;
        }
        if !is_definite(*stored) {
            *stored = seen;
        } else if *stored != seen {
            occ.bifurcation = true;
            return;
        }
    }
}
