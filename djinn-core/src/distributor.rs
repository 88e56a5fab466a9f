// Task distribution
// Chops every input record into TASK_SIZE chunks overlapping by k+1 bytes.
// Each chunk carries a leading sentinel `N`; the final chunk of a record also
// carries a trailing one, so flank scans never index past the payload. Chunks
// are handed round-robin to the per-worker queues, skipping full ones, and
// every queue is closed once the inputs are exhausted. The same routine runs
// before each pass, producing the identical chunk geometry every time.

use crate::error::ErrorSlot;
use crate::fasta::FastaReader;
use crate::task::{Task, TaskQueue, TASK_SIZE};
use anyhow::{Context, Result};
use djinn_common::types::normalize;
use std::path::PathBuf;
use std::sync::Arc;

/// Feed all records of `files` into `queues`. Returns after closing every
/// queue; a worker-reported error in `errors` aborts the scan early (the
/// stage driver surfaces it after the join).
pub fn distribute_tasks(
    files: &[PathBuf],
    overlap: usize,
    queues: &[Arc<TaskQueue>],
    errors: &ErrorSlot,
) -> Result<()> {
    let result = run(files, overlap, queues, errors);
    for queue in queues {
        queue.close();
    }
    result
}

fn run(
    files: &[PathBuf],
    overlap: usize,
    queues: &[Arc<TaskQueue>],
    errors: &ErrorSlot,
) -> Result<()> {
    let mut seq_id: u32 = 0;
    let mut piece: u32 = 0;
    let mut now_queue = 0usize;

    for file in files {
        let mut reader = FastaReader::open(file)?;
        while let Some(record) = reader
            .next_record()
            .with_context(|| format!("reading {}", file.display()))?
        {
            if errors.is_set() {
                return Ok(());
            }

            let mut buf = Vec::with_capacity(TASK_SIZE + 1);
            buf.push(b'N');
            let mut chunk_start: u64 = 0;
            let mut consumed: u64 = 0;
            let total = record.sequence.len();

            for (i, &raw) in record.sequence.iter().enumerate() {
                buf.push(normalize(raw));
                consumed += 1;
                let over = i + 1 == total;

                if buf.len() >= overlap && (buf.len() == TASK_SIZE || over) {
                    let next_buf = if over {
                        buf.push(b'N');
                        Vec::new()
                    } else {
                        buf[buf.len() - overlap..].to_vec()
                    };
                    let task = Task {
                        seq_id,
                        start: chunk_start,
                        piece,
                        is_final: over,
                        payload: std::mem::replace(&mut buf, next_buf),
                    };
                    piece += 1;
                    chunk_start = consumed - overlap as u64 + 1;
                    now_queue = dispatch(task, queues, now_queue);
                }
            }
            // Records shorter than overlap-1 bases produce no task at all.
            seq_id += 1;
        }
    }
    Ok(())
}

/// Round-robin with capacity-aware skipping: try each queue once starting at
/// the cursor, yield when all are full, repeat.
fn dispatch(task: Task, queues: &[Arc<TaskQueue>], cursor: usize) -> usize {
    let mut task = task;
    let mut q = cursor;
    loop {
        for _ in 0..queues.len() {
            match queues[q].try_push(task) {
                Ok(()) => return (q + 1) % queues.len(),
                Err(back) => {
                    task = back;
                    q = (q + 1) % queues.len();
                }
            }
        }
        std::thread::yield_now();
    }
}
