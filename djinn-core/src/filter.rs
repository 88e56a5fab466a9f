// Membership filters
// The pipeline needs two approximate-set shapes: the shared canonical-edge
// filter and the small per-chunk candidate-position masks. Both sit behind
// the `SetFilter` capability set; the Cuckoo implementation is what the
// pipeline runs on, the exact sorted-set shim exists for tests that need a
// zero-false-positive oracle. A separate concurrent bit vector backs the
// reloadable filter dump.

use anyhow::{Context, Result};
use djinn_common::hash::mix64;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

const SLOTS_PER_BUCKET: usize = 4;
const MAX_KICKS: usize = 500;

/// Approximate membership set: no false negatives for successfully inserted
/// keys, bounded false-positive rate.
pub trait SetFilter: Send + Sync {
    /// Insert a key. Returns false when the structure is too full to keep
    /// it; an already-present key is a successful no-op.
    fn insert(&self, key: u64) -> bool;
    fn contains(&self, key: u64) -> bool;
    fn len(&self) -> u64;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn write_to_file(&self, path: &Path) -> Result<()>;
}

struct CuckooTable {
    fingerprints: Vec<u32>,
    bucket_mask: usize,
    victim: Option<(usize, u32)>,
    items: u64,
}

/// Cuckoo filter with 4-slot buckets and 32-bit fingerprints. A single
/// victim slot absorbs the one eviction chain that can fail near full load.
/// Interior RwLock: concurrent inserts while filling, concurrent reads while
/// probing.
pub struct CuckooFilter {
    table: RwLock<CuckooTable>,
}

impl CuckooFilter {
    /// Size for `capacity` keys; the table is the next power of two of
    /// capacity at ~94% target load, in slots.
    pub fn with_capacity(capacity: usize) -> CuckooFilter {
        let slots = ((capacity.max(SLOTS_PER_BUCKET) as f64 / 0.94).ceil() as usize)
            .next_power_of_two()
            .max(SLOTS_PER_BUCKET);
        let bucket_count = slots / SLOTS_PER_BUCKET;
        CuckooFilter {
            table: RwLock::new(CuckooTable {
                fingerprints: vec![0u32; bucket_count * SLOTS_PER_BUCKET],
                bucket_mask: bucket_count - 1,
                victim: None,
                items: 0,
            }),
        }
    }

    #[inline]
    fn fingerprint(key: u64) -> u32 {
        let fp = (mix64(key) >> 32) as u32;
        if fp == 0 {
            1
        } else {
            fp
        }
    }

    #[inline]
    fn bucket_of(key: u64, mask: usize) -> usize {
        mix64(key) as usize & mask
    }

    #[inline]
    fn alt_bucket(bucket: usize, fp: u32, mask: usize) -> usize {
        (bucket ^ mix64(fp as u64) as usize) & mask
    }

    fn bucket_has(table: &CuckooTable, bucket: usize, fp: u32) -> bool {
        let base = bucket * SLOTS_PER_BUCKET;
        table.fingerprints[base..base + SLOTS_PER_BUCKET].contains(&fp)
    }

    fn try_place(table: &mut CuckooTable, bucket: usize, fp: u32) -> bool {
        let base = bucket * SLOTS_PER_BUCKET;
        for slot in 0..SLOTS_PER_BUCKET {
            if table.fingerprints[base + slot] == 0 {
                table.fingerprints[base + slot] = fp;
                return true;
            }
        }
        false
    }

    fn contains_locked(table: &CuckooTable, key: u64) -> bool {
        let fp = Self::fingerprint(key);
        let b1 = Self::bucket_of(key, table.bucket_mask);
        let b2 = Self::alt_bucket(b1, fp, table.bucket_mask);
        if Self::bucket_has(table, b1, fp) || Self::bucket_has(table, b2, fp) {
            return true;
        }
        matches!(table.victim, Some((vb, vfp)) if vfp == fp && (vb == b1 || vb == b2))
    }

    /// Load the serialized table back from disk.
    pub fn read_from_file(path: &Path) -> Result<CuckooFilter> {
        let file = File::open(path)
            .with_context(|| format!("can't open filter file {}", path.display()))?;
        let mut input = BufReader::new(file);

        let bucket_count = read_u64(&mut input)? as usize;
        let items = read_u64(&mut input)?;
        let mut flag = [0u8; 1];
        input.read_exact(&mut flag)?;
        let victim = if flag[0] != 0 {
            let vb = read_u64(&mut input)? as usize;
            let vfp = read_u32(&mut input)?;
            Some((vb, vfp))
        } else {
            None
        };
        let mut fingerprints = vec![0u32; bucket_count * SLOTS_PER_BUCKET];
        let mut buf = [0u8; 4];
        for fp in fingerprints.iter_mut() {
            input.read_exact(&mut buf)?;
            *fp = u32::from_le_bytes(buf);
        }
        Ok(CuckooFilter {
            table: RwLock::new(CuckooTable {
                fingerprints,
                bucket_mask: bucket_count - 1,
                victim,
                items,
            }),
        })
    }
}

impl SetFilter for CuckooFilter {
    fn insert(&self, key: u64) -> bool {
        let mut table = self.table.write().unwrap();
        if Self::contains_locked(&table, key) {
            return true;
        }

        let mask = table.bucket_mask;
        let mut fp = Self::fingerprint(key);
        let b1 = Self::bucket_of(key, mask);
        let b2 = Self::alt_bucket(b1, fp, mask);
        if Self::try_place(&mut table, b1, fp) || Self::try_place(&mut table, b2, fp) {
            table.items += 1;
            return true;
        }

        // Both home buckets full: walk evictions. The walk is seeded from the
        // key so that runs are reproducible.
        let mut state = mix64(key ^ 0xc3a5c85c97cb3127);
        let mut bucket = if state & 1 == 0 { b1 } else { b2 };
        for _ in 0..MAX_KICKS {
            state = mix64(state);
            let slot = state as usize % SLOTS_PER_BUCKET;
            let base = bucket * SLOTS_PER_BUCKET;
            std::mem::swap(&mut fp, &mut table.fingerprints[base + slot]);
            bucket = Self::alt_bucket(bucket, fp, mask);
            if Self::try_place(&mut table, bucket, fp) {
                table.items += 1;
                return true;
            }
        }

        if table.victim.is_none() {
            table.victim = Some((bucket, fp));
            table.items += 1;
            return true;
        }
        false
    }

    fn contains(&self, key: u64) -> bool {
        let table = self.table.read().unwrap();
        Self::contains_locked(&table, key)
    }

    fn len(&self) -> u64 {
        self.table.read().unwrap().items
    }

    fn write_to_file(&self, path: &Path) -> Result<()> {
        let table = self.table.read().unwrap();
        let file = File::create(path)
            .with_context(|| format!("can't create filter file {}", path.display()))?;
        let mut out = BufWriter::new(file);

        out.write_all(&((table.bucket_mask + 1) as u64).to_le_bytes())?;
        out.write_all(&table.items.to_le_bytes())?;
        match table.victim {
            Some((vb, vfp)) => {
                out.write_all(&[1u8])?;
                out.write_all(&(vb as u64).to_le_bytes())?;
                out.write_all(&vfp.to_le_bytes())?;
            }
            None => out.write_all(&[0u8])?,
        }
        for &fp in &table.fingerprints {
            out.write_all(&fp.to_le_bytes())?;
        }
        out.flush()
            .with_context(|| format!("can't write filter file {}", path.display()))
    }
}

/// Exact membership set with the same capability surface; the deterministic
/// oracle for filter-sensitive tests.
pub struct ExactSetFilter {
    keys: RwLock<BTreeSet<u64>>,
}

impl ExactSetFilter {
    pub fn new() -> ExactSetFilter {
        ExactSetFilter {
            keys: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn read_from_file(path: &Path) -> Result<ExactSetFilter> {
        let file = File::open(path)
            .with_context(|| format!("can't open filter file {}", path.display()))?;
        let mut input = BufReader::new(file);
        let count = read_u64(&mut input)?;
        let mut keys = BTreeSet::new();
        for _ in 0..count {
            keys.insert(read_u64(&mut input)?);
        }
        Ok(ExactSetFilter {
            keys: RwLock::new(keys),
        })
    }
}

impl Default for ExactSetFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl SetFilter for ExactSetFilter {
    fn insert(&self, key: u64) -> bool {
        self.keys.write().unwrap().insert(key);
        true
    }

    fn contains(&self, key: u64) -> bool {
        self.keys.read().unwrap().contains(&key)
    }

    fn len(&self) -> u64 {
        self.keys.read().unwrap().len() as u64
    }

    fn write_to_file(&self, path: &Path) -> Result<()> {
        let keys = self.keys.read().unwrap();
        let file = File::create(path)
            .with_context(|| format!("can't create filter file {}", path.display()))?;
        let mut out = BufWriter::new(file);
        out.write_all(&(keys.len() as u64).to_le_bytes())?;
        for &key in keys.iter() {
            out.write_all(&key.to_le_bytes())?;
        }
        out.flush()
            .with_context(|| format!("can't write filter file {}", path.display()))
    }
}

/// Fixed-length bit vector with lock-free concurrent sets; the serialized
/// form is the reloadable filter dump consumed by downstream graph builders.
pub struct ConcurrentBitVector {
    words: Vec<AtomicU64>,
    len_bits: u64,
}

impl ConcurrentBitVector {
    pub fn new(len_bits: u64) -> ConcurrentBitVector {
        let word_count = (len_bits as usize + 63) / 64;
        let mut words = Vec::with_capacity(word_count);
        words.resize_with(word_count, || AtomicU64::new(0));
        ConcurrentBitVector { words, len_bits }
    }

    #[inline]
    pub fn len_bits(&self) -> u64 {
        self.len_bits
    }

    #[inline]
    pub fn set(&self, idx: u64) {
        debug_assert!(idx < self.len_bits);
        self.words[(idx / 64) as usize].fetch_or(1u64 << (idx % 64), Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self, idx: u64) -> bool {
        debug_assert!(idx < self.len_bits);
        self.words[(idx / 64) as usize].load(Ordering::Relaxed) & (1u64 << (idx % 64)) != 0
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("can't create filter dump {}", path.display()))?;
        let mut out = BufWriter::new(file);
        out.write_all(&self.len_bits.to_le_bytes())?;
        for word in &self.words {
            out.write_all(&word.load(Ordering::Relaxed).to_le_bytes())?;
        }
        out.flush()
            .with_context(|| format!("can't write filter dump {}", path.display()))
    }

    pub fn read_from_file(path: &Path) -> Result<ConcurrentBitVector> {
        let file = File::open(path)
            .with_context(|| format!("can't open filter dump {}", path.display()))?;
        let mut input = BufReader::new(file);
        let len_bits = read_u64(&mut input)?;
        let vec = ConcurrentBitVector::new(len_bits);
        let mut buf = [0u8; 8];
        for word in &vec.words {
            input.read_exact(&mut buf)?;
            word.store(u64::from_le_bytes(buf), Ordering::Relaxed);
        }
        Ok(vec)
    }
}

fn read_u64<R: Read>(input: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_u32<R: Read>(input: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}
