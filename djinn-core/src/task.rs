// Tasks and per-worker bounded queues
// A task is one overlapping chunk of one input record, with a sentinel `N`
// prepended (and appended on the final chunk). Each worker owns one bounded
// queue; the distributor round-robins over them and closes them when the
// inputs are exhausted. A closed, drained queue yields `None`, which is the
// shutdown signal.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Chunk payload size, including the leading sentinel.
pub const TASK_SIZE: usize = 1 << 16;

/// Per-worker queue depth, in tasks.
pub const QUEUE_CAPACITY: usize = 16;

/// One chunk of one record.
#[derive(Debug, Clone)]
pub struct Task {
    /// Input record index, global across all files.
    pub seq_id: u32,
    /// Absolute record offset of the chunk start (first base after the
    /// leading sentinel).
    pub start: u64,
    /// Globally monotone chunk counter; fixes the emission order.
    pub piece: u32,
    /// Last chunk of its record.
    pub is_final: bool,
    /// Normalized bases with sentinels.
    pub payload: Vec<u8>,
}

struct QueueInner {
    items: VecDeque<Task>,
    closed: bool,
}

/// Bounded MPMC task queue (Mutex + Condvar). `try_push` backs off instead
/// of blocking so the distributor can skip to the next worker.
pub struct TaskQueue {
    inner: Mutex<QueueInner>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl TaskQueue {
    pub fn new() -> TaskQueue {
        TaskQueue {
            inner: Mutex::new(QueueInner {
                items: VecDeque::with_capacity(QUEUE_CAPACITY),
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Non-blocking push; hands the task back when the queue is full.
    pub fn try_push(&self, task: Task) -> Result<(), Task> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed || inner.items.len() >= QUEUE_CAPACITY {
            return Err(task);
        }
        inner.items.push_back(task);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Blocking push; used by tests and single-queue callers.
    pub fn push(&self, task: Task) -> Result<(), Task> {
        let mut inner = self.inner.lock().unwrap();
        while inner.items.len() >= QUEUE_CAPACITY && !inner.closed {
            inner = self.not_full.wait(inner).unwrap();
        }
        if inner.closed {
            return Err(task);
        }
        inner.items.push_back(task);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Blocking pop. `None` once the queue is closed and drained.
    pub fn pop(&self) -> Option<Task> {
        let mut inner = self.inner.lock().unwrap();
        while inner.items.is_empty() && !inner.closed {
            inner = self.not_empty.wait(inner).unwrap();
        }
        let task = inner.items.pop_front();
        if task.is_some() {
            self.not_full.notify_one();
        }
        task
    }

    /// No more pushes; poppers drain the remainder, then see `None`.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().items.is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
