// Bit-packed k-mers
// 2 bits per base, base i at bits 2i..2i+1 of the word stream, up to 64 bases
// in two words. The canonical form of a k-mer is the lexicographically smaller
// base string of itself and its reverse complement.

use djinn_common::hash::mix_pair;
use djinn_common::types::{base_of, code_of, complement_code, is_definite};
use std::cmp::Ordering;

/// Longest representable k-mer. Vertices are capped one lower so that the
/// (k+1)-mer edge still fits.
pub const MAX_BASES: usize = 64;

/// A DNA string of up to [`MAX_BASES`] bases packed at 2 bits per base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedKmer {
    words: [u64; 2],
    len: u16,
}

impl PackedKmer {
    /// Pack a fully definite window; `None` if any byte is not A/C/G/T.
    pub fn from_ascii(seq: &[u8]) -> Option<PackedKmer> {
        if seq.len() > MAX_BASES {
            return None;
        }
        let mut kmer = PackedKmer {
            words: [0; 2],
            len: seq.len() as u16,
        };
        for (i, &b) in seq.iter().enumerate() {
            if !is_definite(b) {
                return None;
            }
            kmer.set(i, code_of(b));
        }
        Some(kmer)
    }

    /// Rebuild from serialized words.
    pub fn from_words(words: [u64; 2], len: usize) -> PackedKmer {
        debug_assert!(len <= MAX_BASES);
        PackedKmer {
            words,
            len: len as u16,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn words(&self) -> [u64; 2] {
        self.words
    }

    #[inline]
    fn set(&mut self, i: usize, code: u64) {
        let shift = 2 * (i % 32);
        let w = i / 32;
        self.words[w] = (self.words[w] & !(3u64 << shift)) | (code << shift);
    }

    /// 2-bit code of base `i`.
    #[inline]
    pub fn get(&self, i: usize) -> u64 {
        (self.words[i / 32] >> (2 * (i % 32))) & 3
    }

    /// Reverse complement of the packed string.
    pub fn reverse_complement(&self) -> PackedKmer {
        let len = self.len();
        let mut out = PackedKmer {
            words: [0; 2],
            len: self.len,
        };
        for i in 0..len {
            out.set(len - 1 - i, complement_code(self.get(i)));
        }
        out
    }

    /// Lexicographic base-string order. The packing is little-endian per
    /// base, so word comparison would give the wrong answer.
    pub fn base_cmp(&self, other: &PackedKmer) -> Ordering {
        debug_assert_eq!(self.len, other.len);
        for i in 0..self.len() {
            match self.get(i).cmp(&other.get(i)) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }

    /// The canonical form and whether it is the reverse complement.
    pub fn canonicalize(self) -> (PackedKmer, bool) {
        let rc = self.reverse_complement();
        match rc.base_cmp(&self) {
            Ordering::Less => (rc, true),
            _ => (self, false),
        }
    }

    /// True when the string equals its own reverse complement.
    pub fn is_palindrome(&self) -> bool {
        *self == self.reverse_complement()
    }

    /// 64-bit filter key: the packed value itself while it fits one word,
    /// otherwise a fingerprint of both words. Injective up to 32 bases.
    #[inline]
    pub fn key(&self) -> u64 {
        if self.len <= 32 {
            self.words[0]
        } else {
            mix_pair(self.words[0], self.words[1])
        }
    }

    /// Unpack back to ASCII (tests and diagnostics).
    pub fn to_ascii(&self) -> Vec<u8> {
        (0..self.len()).map(|i| base_of(self.get(i))).collect()
    }
}

/// Number of serialized words for a k-mer of `len` bases.
#[inline]
pub fn words_for(len: usize) -> usize {
    (len + 31) / 32
}

/// Canonical packed form of a definite window, plus the strand flag
/// (true when the reverse complement was the smaller string).
#[inline]
pub fn canonical_vertex(window: &[u8]) -> Option<(PackedKmer, bool)> {
    PackedKmer::from_ascii(window).map(PackedKmer::canonicalize)
}

/// Filter key of the canonical form of a definite window.
#[inline]
pub fn canonical_key(window: &[u8]) -> Option<u64> {
    canonical_vertex(window).map(|(kmer, _)| kmer.key())
}
