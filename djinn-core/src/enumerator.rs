// Junction enumeration pipeline
// Orchestrates the passes over the inputs: an optional histogram pre-pass
// fixing the per-round hash ranges, then per round the edge-filter fill,
// candidate marking, and exact confirmation; finally the bifurcation storage
// build and the ordered emission pass. Worker threads communicate through
// per-worker bounded queues and a first-error-wins slot; stages are
// separated by thread joins.

use crate::distributor::distribute_tasks;
use crate::error::ErrorSlot;
use crate::fasta::FastaReader;
use crate::filter::{ConcurrentBitVector, CuckooFilter, SetFilter};
use crate::kmer::{canonical_key, canonical_vertex};
use crate::occurrence::OccurrenceSet;
use crate::rolling::{RollingHash, RollingHashSeed};
use crate::storage::{write_packed, BifurcationStorage};
use crate::task::{TaskQueue, TASK_SIZE};
use anyhow::{anyhow, bail, Context, Result};
use djinn_common::hash::{mix64, mix_seeded};
use djinn_common::position::{JunctionPosition, JunctionPositionWriter};
use djinn_common::types::{is_definite, LITERAL};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::info;

const BINS_COUNT: usize = 1 << 24;

/// Unresolved stub marker inside buffered emission results; replaced under
/// the writer lock, so it never reaches the output file.
const STUB_PENDING: u64 = u64::MAX;

/// First stub id is the vertex count plus this gap (kept for file
/// compatibility with existing consumers).
const STUB_ID_GAP: u64 = 42;

/// Pipeline configuration. Validation failures are fatal before any worker
/// starts.
#[derive(Debug, Clone)]
pub struct Config {
    /// k, the vertex length. Edges are (k+1)-mers.
    pub vertex_length: usize,
    /// log2 of the filter hash domain; the edge filter holds this many slots.
    pub filter_size_bits: u32,
    /// Rolling hash seeds, and bits set per key in the filter dump.
    pub hash_functions: usize,
    /// Rounds partitioning the vertex hash domain to bound peak memory.
    pub rounds: usize,
    /// Worker threads per stage.
    pub threads: usize,
    /// Directory for candidate masks, the bifurcation scratch and filter.bin.
    pub tmp_dir: PathBuf,
    /// Junction position output file.
    pub out_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            vertex_length: 25,
            filter_size_bits: 28,
            hash_functions: 5,
            rounds: 1,
            threads: rayon::current_num_threads(),
            tmp_dir: PathBuf::from("."),
            out_file: PathBuf::from("junctions.bin"),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.vertex_length < 1 || self.vertex_length > 62 {
            bail!("vertex length must be in 1..=62, got {}", self.vertex_length);
        }
        if self.filter_size_bits < 1 || self.filter_size_bits > 40 {
            bail!(
                "filter size must be in 1..=40 bits, got {}",
                self.filter_size_bits
            );
        }
        if self.hash_functions < 1 || self.hash_functions > 32 {
            bail!("hash functions must be in 1..=32, got {}", self.hash_functions);
        }
        if self.rounds < 1 {
            bail!("rounds must be at least 1");
        }
        if self.threads < 1 {
            bail!("threads must be at least 1");
        }
        Ok(())
    }
}

/// The built enumerator: the id map plus the hash seed and the reloadable
/// filter dump. Dropping it removes the dump.
pub struct JunctionEnumerator {
    seed: RollingHashSeed,
    storage: Arc<BifurcationStorage>,
    filter_dump: PathBuf,
    stub_count: u64,
}

impl JunctionEnumerator {
    /// Run the whole pipeline over `files`, writing the junction stream to
    /// `config.out_file`.
    pub fn build(config: &Config, files: &[PathBuf]) -> Result<JunctionEnumerator> {
        config.validate()?;
        if files.is_empty() {
            bail!("no input files given");
        }
        // Input problems are fatal before any worker starts.
        for file in files {
            FastaReader::open(file)?;
        }

        let k = config.vertex_length;
        let overlap = k + 1;
        let real_size: u64 = 1u64 << config.filter_size_bits;
        let domain_mask = real_size - 1;
        let seed = RollingHashSeed::new(config.hash_functions, k);

        info!(
            threads = config.threads,
            vertex_length = k,
            hash_functions = config.hash_functions,
            filter_size = real_size,
            rounds = config.rounds,
            "enumerating junctions"
        );

        let errors = Arc::new(ErrorSlot::new());
        let dump_bits = Arc::new(ConcurrentBitVector::new(real_size));
        let filter_dump = config.tmp_dir.join("filter.bin");
        let scratch_path = config.tmp_dir.join("bifurcations.bin");

        // Histogram pre-pass: per-round ranges balancing distinct edges by
        // their endpoint vertex hashes.
        let bin_counter = if config.rounds > 1 {
            info!("splitting the input k-mer set");
            let mut bins = Vec::with_capacity(BINS_COUNT);
            bins.resize_with(BINS_COUNT, || AtomicU32::new(0));
            let bins = Arc::new(bins);
            let scratch = Arc::new(CuckooFilter::with_capacity(real_size as usize));
            let bin_size = (real_size / BINS_COUNT as u64).max(1);

            run_stage(config.threads, files, overlap, &errors, |queue| {
                let scratch = Arc::clone(&scratch);
                let bins = Arc::clone(&bins);
                let errors = Arc::clone(&errors);
                thread::spawn(move || {
                    histogram_worker(&queue, &scratch, &bins, &errors, k, bin_size, domain_mask);
                    Ok(())
                })
            })?;
            Some(bins)
        } else {
            None
        };

        let bin_size = (real_size / BINS_COUNT as u64).max(1);
        let round_share = bin_counter.as_ref().map(|bins| {
            let total: u64 = bins.iter().map(|b| b.load(Ordering::Relaxed) as u64).sum();
            (total / config.rounds as u64).max(1)
        });

        let scratch_file = File::create(&scratch_path)
            .with_context(|| format!("can't create temp file {}", scratch_path.display()))?;
        let mut scratch_out = BufWriter::new(scratch_file);

        let mut vertices_count: u64 = 0;
        let mut total_false: u64 = 0;
        let mut low: u64 = 0;
        let mut low_boundary: usize = 0;

        for round in 0..config.rounds {
            let high = match (&bin_counter, round_share) {
                // Earlier rounds can consume every bin on tiny inputs.
                (Some(_), _) if low_boundary >= BINS_COUNT => real_size,
                (Some(bins), Some(share)) => {
                    let mut accumulated = bins[low_boundary].load(Ordering::Relaxed) as u64;
                    low_boundary += 1;
                    while low_boundary < BINS_COUNT {
                        if accumulated <= share || round + 1 == config.rounds {
                            accumulated += bins[low_boundary].load(Ordering::Relaxed) as u64;
                            low_boundary += 1;
                        } else {
                            break;
                        }
                    }
                    low_boundary as u64 * bin_size
                }
                _ => real_size,
            };
            info!(round, low, high, "round range");

            let mark = Instant::now();
            let edge_filter = Arc::new(CuckooFilter::with_capacity(real_size as usize));

            // Pass 1a: fill the edge filter (and the dump bits).
            run_stage(config.threads, files, overlap, &errors, |queue| {
                let filter = Arc::clone(&edge_filter);
                let dump = Arc::clone(&dump_bits);
                let errors = Arc::clone(&errors);
                let functions = config.hash_functions;
                thread::spawn(move || {
                    fill_worker(
                        &queue,
                        filter.as_ref(),
                        &dump,
                        &errors,
                        k,
                        functions,
                        low,
                        high,
                        domain_mask,
                    );
                    Ok(())
                })
            })?;
            let filling = mark.elapsed();

            // Pass 1b: mark candidate positions, spill per-chunk masks.
            let mark = Instant::now();
            let marks_count = Arc::new(AtomicU64::new(0));
            run_stage(config.threads, files, overlap, &errors, |queue| {
                let filter = Arc::clone(&edge_filter);
                let errors = Arc::clone(&errors);
                let marks = Arc::clone(&marks_count);
                let tmp_dir = config.tmp_dir.clone();
                thread::spawn(move || {
                    candidate_worker(
                        &queue,
                        filter.as_ref(),
                        &errors,
                        &marks,
                        &tmp_dir,
                        round,
                        k,
                        low,
                        high,
                        domain_mask,
                    );
                    Ok(())
                })
            })?;
            let filtering = mark.elapsed();
            drop(edge_filter);

            // Pass 2: exact confirmation through the occurrence set.
            let mark = Instant::now();
            let occurrences = Arc::new(OccurrenceSet::new());
            let shared_seed = Arc::new(seed.clone());
            run_stage(config.threads, files, overlap, &errors, |queue| {
                let occurrences = Arc::clone(&occurrences);
                let seed = Arc::clone(&shared_seed);
                let errors = Arc::clone(&errors);
                let tmp_dir = config.tmp_dir.clone();
                thread::spawn(move || {
                    confirm_worker(&queue, &seed, &occurrences, &errors, &tmp_dir, round, k);
                    Ok(())
                })
            })?;

            let (bifurcations, false_positives) = occurrences.collect_bifurcations(k);
            for kmer in &bifurcations {
                write_packed(&mut scratch_out, kmer, k)
                    .with_context(|| format!("can't write to {}", scratch_path.display()))?;
            }
            info!(
                round,
                filling_secs = filling.as_secs_f64(),
                filtering_secs = filtering.as_secs_f64(),
                confirming_secs = mark.elapsed().as_secs_f64(),
                true_junctions = bifurcations.len(),
                false_junctions = false_positives,
                candidate_marks = marks_count.load(Ordering::Relaxed),
                table_size = occurrences.len(),
                "round finished"
            );
            vertices_count += bifurcations.len() as u64;
            total_false += false_positives;
            low = high + 1;
        }
        drop(bin_counter);

        scratch_out
            .flush()
            .with_context(|| format!("can't write to {}", scratch_path.display()))?;
        drop(scratch_out);

        let mark = Instant::now();
        let storage = {
            let scratch_file = File::open(&scratch_path)
                .with_context(|| format!("can't open temp file {}", scratch_path.display()))?;
            BifurcationStorage::build(BufReader::new(scratch_file), vertices_count, k)?
        };
        let _ = fs::remove_file(&scratch_path);
        let storage = Arc::new(storage);
        info!(
            vertices = storage.len(),
            false_positive_total = total_false,
            build_secs = mark.elapsed().as_secs_f64(),
            "bifurcation storage ready"
        );

        dump_bits
            .write_to_file(&filter_dump)
            .context("can't write the filter dump")?;

        // Emission: rescan, resolve ids, release results in piece order.
        let mark = Instant::now();
        let sink = Arc::new(Mutex::new(EmissionSink {
            writer: JunctionPositionWriter::create(&config.out_file).with_context(|| {
                format!("can't create the output file {}", config.out_file.display())
            })?,
            next_stub: storage.len() + STUB_ID_GAP,
        }));
        let current_piece = Arc::new(AtomicU64::new(0));
        let true_marks = Arc::new(AtomicU64::new(0));

        let emission = run_stage(config.threads, files, overlap, &errors, |queue| {
            let storage = Arc::clone(&storage);
            let sink = Arc::clone(&sink);
            let current_piece = Arc::clone(&current_piece);
            let true_marks = Arc::clone(&true_marks);
            let errors = Arc::clone(&errors);
            let tmp_dir = config.tmp_dir.clone();
            let rounds = config.rounds;
            thread::spawn(move || {
                emission_worker(
                    &queue,
                    &storage,
                    &sink,
                    &current_piece,
                    &true_marks,
                    &errors,
                    &tmp_dir,
                    rounds,
                    k,
                );
                Ok(())
            })
        });
        if let Err(err) = emission {
            let _ = fs::remove_file(&config.out_file);
            return Err(err);
        }

        let sink = Arc::try_unwrap(sink)
            .map_err(|_| anyhow!("emission sink still shared after join"))?
            .into_inner()
            .unwrap();
        let stub_count = sink.next_stub - storage.len() - STUB_ID_GAP;
        if let Err(err) = sink.writer.finish() {
            let _ = fs::remove_file(&config.out_file);
            return Err(err).context("can't write the output file");
        }
        info!(
            true_marks = true_marks.load(Ordering::Relaxed),
            stubs = stub_count,
            emission_secs = mark.elapsed().as_secs_f64(),
            "emission finished"
        );

        Ok(JunctionEnumerator {
            seed,
            storage,
            filter_dump,
            stub_count,
        })
    }

    /// Number of distinct junction vertices (stubs not included).
    pub fn vertex_count(&self) -> u64 {
        self.storage.len()
    }

    /// Stub ids minted for record endpoints.
    pub fn stub_count(&self) -> u64 {
        self.stub_count
    }

    /// Id of a vertex given as ASCII bases; `None` for non-junctions.
    pub fn id_of(&self, vertex: &[u8]) -> Option<u64> {
        self.storage.id_of_window(vertex)
    }

    pub fn hash_seed(&self) -> &RollingHashSeed {
        &self.seed
    }

    /// Reload the serialized filter bit vector for downstream construction.
    pub fn reload_filter(&self) -> Result<ConcurrentBitVector> {
        ConcurrentBitVector::read_from_file(&self.filter_dump)
    }
}

impl Drop for JunctionEnumerator {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.filter_dump);
    }
}

struct EmissionSink {
    writer: JunctionPositionWriter<BufWriter<File>>,
    next_stub: u64,
}

/// Candidate mask spill path for one chunk and round.
fn mask_file_name(tmp_dir: &Path, seq_id: u32, start: u64, round: usize) -> PathBuf {
    tmp_dir.join(format!("{seq_id}_{start}_{round}.tmp"))
}

#[inline]
fn domain_of(key: u64, mask: u64) -> u64 {
    mix64(key) & mask
}

#[inline]
fn in_range(value: u64, low: u64, high: u64) -> bool {
    value >= low && value <= high
}

/// Spawn one worker per queue, feed the inputs, join, surface the first
/// error.
fn run_stage<S>(
    threads: usize,
    files: &[PathBuf],
    overlap: usize,
    errors: &Arc<ErrorSlot>,
    spawn: S,
) -> Result<()>
where
    S: Fn(Arc<TaskQueue>) -> JoinHandle<Result<()>>,
{
    let queues: Vec<Arc<TaskQueue>> = (0..threads).map(|_| Arc::new(TaskQueue::new())).collect();
    let handles: Vec<JoinHandle<Result<()>>> =
        queues.iter().map(|q| spawn(Arc::clone(q))).collect();

    let distributed = distribute_tasks(files, overlap, &queues, errors);
    for handle in handles {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => errors.report(err),
            Err(_) => errors.report(anyhow!("worker thread panicked")),
        }
    }
    if let Some(err) = errors.take() {
        return Err(err);
    }
    distributed
}

/// Pre-pass: count distinct canonical edges into endpoint-hash bins.
fn histogram_worker(
    queue: &TaskQueue,
    scratch: &CuckooFilter,
    bins: &[AtomicU32],
    errors: &ErrorSlot,
    k: usize,
    bin_size: u64,
    domain_mask: u64,
) {
    let edge_len = k + 1;
    while let Some(task) = queue.pop() {
        if errors.is_set() || task.payload.len() < edge_len {
            continue;
        }
        let payload = &task.payload;
        let mut definite = payload[..edge_len]
            .iter()
            .filter(|&&b| is_definite(b))
            .count();
        let mut pos = 0usize;
        loop {
            if definite == edge_len {
                let edge = &payload[pos..pos + edge_len];
                let key = canonical_key(edge).unwrap();
                if !scratch.contains(key) && scratch.insert(key) {
                    let u = canonical_vertex(&edge[..k]).unwrap().0.key();
                    let w = canonical_vertex(&edge[1..]).unwrap().0.key();
                    for vertex_key in [u, w] {
                        let bin = (domain_of(vertex_key, domain_mask) / bin_size) as usize;
                        if bins[bin].load(Ordering::Relaxed) != u32::MAX {
                            bins[bin].fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }
            if pos + edge_len < payload.len() {
                definite += usize::from(is_definite(payload[pos + edge_len]));
                definite -= usize::from(is_definite(payload[pos]));
                pos += 1;
            } else {
                break;
            }
        }
    }
}

/// Pass 1a: insert canonical edges whose endpoint vertex falls in the round
/// range; dummy A/T edges stand in for `N` flanks so degree checks overcount
/// rather than undercount at boundaries.
#[allow(clippy::too_many_arguments)]
fn fill_worker(
    queue: &TaskQueue,
    filter: &CuckooFilter,
    dump: &ConcurrentBitVector,
    errors: &ErrorSlot,
    k: usize,
    hash_functions: usize,
    low: u64,
    high: u64,
    domain_mask: u64,
) {
    let edge_len = k + 1;
    let mut edge_buf = vec![0u8; edge_len];

    let add = |key: u64| {
        if !filter.contains(key) {
            filter.insert(key);
        }
        for j in 0..hash_functions {
            dump.set(mix_seeded(key, j as u64) & domain_mask);
        }
    };

    while let Some(task) = queue.pop() {
        if errors.is_set() || task.payload.len() < edge_len {
            continue;
        }
        let payload = &task.payload;
        let mut definite = payload[..k].iter().filter(|&&b| is_definite(b)).count();
        let mut pos = 0usize;
        loop {
            let next_ch = payload[pos + k];
            if definite == k {
                let vertex = &payload[pos..pos + k];
                let v_dom = domain_of(canonical_vertex(vertex).unwrap().0.key(), domain_mask);
                let v_in = in_range(v_dom, low, high);
                if is_definite(next_ch) {
                    let edge = &payload[pos..pos + edge_len];
                    let selected = v_in || {
                        let w_dom =
                            domain_of(canonical_vertex(&edge[1..]).unwrap().0.key(), domain_mask);
                        in_range(w_dom, low, high)
                    };
                    if selected {
                        add(canonical_key(edge).unwrap());
                    }
                } else if v_in {
                    edge_buf[..k].copy_from_slice(vertex);
                    for dummy in [b'A', b'T'] {
                        edge_buf[k] = dummy;
                        add(canonical_key(&edge_buf).unwrap());
                    }
                }
                if v_in && pos > 0 && !is_definite(payload[pos - 1]) {
                    edge_buf[1..].copy_from_slice(vertex);
                    for dummy in [b'A', b'T'] {
                        edge_buf[0] = dummy;
                        add(canonical_key(&edge_buf).unwrap());
                    }
                }
            }
            if pos + k < payload.len() - 1 {
                definite += usize::from(is_definite(payload[pos + k]));
                definite -= usize::from(is_definite(payload[pos]));
                pos += 1;
            } else {
                break;
            }
        }
    }
}

/// Pass 1b: probe the edge filter around every definite in-range window and
/// spill the positions that look like junctions.
#[allow(clippy::too_many_arguments)]
fn candidate_worker(
    queue: &TaskQueue,
    filter: &CuckooFilter,
    errors: &ErrorSlot,
    marks: &AtomicU64,
    tmp_dir: &Path,
    round: usize,
    k: usize,
    low: u64,
    high: u64,
    domain_mask: u64,
) {
    let edge_len = k + 1;
    let mut edge_buf = vec![0u8; edge_len];

    while let Some(task) = queue.pop() {
        if errors.is_set() || task.payload.len() < k + 2 {
            continue;
        }
        let payload = &task.payload;
        let candidates = CuckooFilter::with_capacity(TASK_SIZE);
        let mut definite = payload[1..1 + k].iter().filter(|&&b| is_definite(b)).count();
        let mut pos = 1usize;
        loop {
            let prev = payload[pos - 1];
            let next = payload[pos + k];
            if definite == k {
                let vertex = &payload[pos..pos + k];
                let v_dom = domain_of(canonical_vertex(vertex).unwrap().0.key(), domain_mask);
                if in_range(v_dom, low, high) {
                    let mut in_count = if is_definite(prev) { 0 } else { 2 };
                    let mut out_count = if is_definite(next) { 0 } else { 2 };
                    for &ch in LITERAL.iter() {
                        if in_count > 1 || out_count > 1 {
                            break;
                        }
                        edge_buf[0] = ch;
                        edge_buf[1..].copy_from_slice(vertex);
                        if ch == prev || filter.contains(canonical_key(&edge_buf).unwrap()) {
                            in_count += 1;
                        }
                        edge_buf[..k].copy_from_slice(vertex);
                        edge_buf[k] = ch;
                        if ch == next || filter.contains(canonical_key(&edge_buf).unwrap()) {
                            out_count += 1;
                        }
                    }
                    if in_count > 1 || out_count > 1 {
                        marks.fetch_add(1, Ordering::Relaxed);
                        candidates.insert(pos as u64);
                    }
                }
            }
            if pos + edge_len < payload.len() {
                definite += usize::from(is_definite(payload[pos + k]));
                definite -= usize::from(is_definite(payload[pos]));
                pos += 1;
            } else {
                break;
            }
        }

        if !candidates.is_empty() {
            let path = mask_file_name(tmp_dir, task.seq_id, task.start, round);
            if let Err(err) = candidates.write_to_file(&path) {
                errors.report(err.context("can't spill a candidate mask"));
            }
        }
    }
}

/// Pass 2: reload the chunk's candidate mask and push every candidate window
/// through the occurrence set.
fn confirm_worker(
    queue: &TaskQueue,
    seed: &RollingHashSeed,
    occurrences: &OccurrenceSet,
    errors: &ErrorSlot,
    tmp_dir: &Path,
    round: usize,
    k: usize,
) {
    while let Some(task) = queue.pop() {
        if errors.is_set() || task.payload.len() < k + 2 {
            continue;
        }
        let path = mask_file_name(tmp_dir, task.seq_id, task.start, round);
        if !path.exists() {
            // No candidates were spilled for this chunk.
            continue;
        }
        let mask = match CuckooFilter::read_from_file(&path) {
            Ok(mask) => mask,
            Err(err) => {
                errors.report(err.context("can't reload a candidate mask"));
                continue;
            }
        };

        let payload = &task.payload;
        let mut hash = RollingHash::new(seed, &payload[1..1 + k]);
        let mut pos = 1usize;
        loop {
            if mask.contains(pos as u64) {
                // Mask false positives can land on indefinite windows; those
                // fail to pack and are dropped here.
                if let Some((canonical, was_rc)) = canonical_vertex(&payload[pos..pos + k]) {
                    occurrences.record_window(
                        &canonical,
                        was_rc,
                        payload[pos - 1],
                        payload[pos + k],
                        hash.composite(),
                    );
                }
            }
            if pos + k + 1 < payload.len() {
                hash.update(payload[pos], payload[pos + k]);
                pos += 1;
            } else {
                break;
            }
        }
    }
}

struct EdgeResult {
    piece: u32,
    seq_id: u32,
    junctions: Vec<(u32, u64)>,
}

/// Release buffered results whose piece is next in the global order. Stub
/// placeholders get their final ids here, under the writer lock, so id
/// assignment follows piece order for any worker count.
fn flush_results(
    pending: &mut VecDeque<EdgeResult>,
    sink: &Mutex<EmissionSink>,
    current_piece: &AtomicU64,
    errors: &ErrorSlot,
) -> bool {
    let ready = match pending.front() {
        Some(front) => front.piece as u64 == current_piece.load(Ordering::Acquire),
        None => false,
    };
    if !ready {
        return false;
    }
    let result = pending.pop_front().unwrap();
    let mut sink = sink.lock().unwrap();
    for (pos, id) in result.junctions {
        let id = if id == STUB_PENDING {
            let stub = sink.next_stub;
            sink.next_stub += 1;
            stub
        } else {
            id
        };
        if let Err(err) = sink
            .writer
            .write(JunctionPosition::new(result.seq_id, pos, id))
        {
            errors.report(anyhow::Error::from(err).context("can't write the output file"));
            break;
        }
    }
    current_piece.fetch_add(1, Ordering::Release);
    true
}

/// Emission: union the round masks per chunk, resolve candidate windows
/// against the storage, mint stubs at record endpoints, and hand results to
/// the writer in piece order.
#[allow(clippy::too_many_arguments)]
fn emission_worker(
    queue: &TaskQueue,
    storage: &BifurcationStorage,
    sink: &Mutex<EmissionSink>,
    current_piece: &AtomicU64,
    true_marks: &AtomicU64,
    errors: &ErrorSlot,
    tmp_dir: &Path,
    rounds: usize,
    k: usize,
) {
    let mut pending: VecDeque<EdgeResult> = VecDeque::new();
    while let Some(task) = queue.pop() {
        if errors.is_set() {
            continue;
        }
        flush_results(&mut pending, sink, current_piece, errors);

        let mut masks = Vec::new();
        for round in 0..rounds {
            let path = mask_file_name(tmp_dir, task.seq_id, task.start, round);
            if !path.exists() {
                continue;
            }
            match CuckooFilter::read_from_file(&path) {
                Ok(mask) => {
                    masks.push(mask);
                    let _ = fs::remove_file(&path);
                }
                Err(err) => errors.report(err.context("can't reload a candidate mask")),
            }
        }

        let payload = &task.payload;
        let mut result = EdgeResult {
            piece: task.piece,
            seq_id: task.seq_id,
            junctions: Vec::new(),
        };
        if payload.len() >= k + 2 {
            let last_pos = payload.len() - k - 1;
            let mut definite = payload[1..1 + k].iter().filter(|&&b| is_definite(b)).count();
            let mut pos = 1usize;
            loop {
                let mut id = None;
                if definite == k && masks.iter().any(|m| m.contains(pos as u64)) {
                    id = storage.id_of_window(&payload[pos..pos + k]);
                    if let Some(found) = id {
                        true_marks.fetch_add(1, Ordering::Relaxed);
                        result
                            .junctions
                            .push(((task.start + pos as u64 - 1) as u32, found));
                    }
                }
                let endpoint = (task.start == 0 && pos == 1) || (task.is_final && pos == last_pos);
                if endpoint && id.is_none() {
                    result
                        .junctions
                        .push(((task.start + pos as u64 - 1) as u32, STUB_PENDING));
                }
                if pos + k + 1 < payload.len() {
                    definite += usize::from(is_definite(payload[pos + k]));
                    definite -= usize::from(is_definite(payload[pos]));
                    pos += 1;
                } else {
                    break;
                }
            }
        }
        pending.push_back(result);
        flush_results(&mut pending, sink, current_piece, errors);
    }

    // Remaining pieces wait on other workers; keep polling until drained.
    while !pending.is_empty() && !errors.is_set() {
        if !flush_results(&mut pending, sink, current_piece, errors) {
            thread::yield_now();
        }
    }
}
