//! Sample buffer and flush hand-off.
//!
//! The buffer is the only state shared between the loop thread (appends)
//! and flush tasks (which may requeue a failed batch).  Every access goes
//! through one mutex, and a flush takes the whole contents in a single
//! swap, so a sample can never be read twice or fall between two flushes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use log::error;
use serde::{Deserialize, Serialize};

use crate::app::ports::{HostMetrics, PersistenceSink};
use crate::drivers::tasks::TaskSet;
use crate::error::PersistenceError;

/// One OD reading with the host utilisation at the time it was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Local>,
    pub od: f64,
    pub memory_percent: f32,
    /// Per-core CPU utilisation, in core order.
    pub cpu_percent: Vec<f32>,
}

impl Sample {
    pub fn new(timestamp: DateTime<Local>, od: f64, metrics: HostMetrics) -> Self {
        Self {
            timestamp,
            od,
            memory_percent: metrics.memory_percent,
            cpu_percent: metrics.cpu_percent,
        }
    }
}

/// Time-ordered samples awaiting persistence.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    samples: Mutex<Vec<Sample>>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Sample>> {
        // A panicking holder cannot leave the Vec half-updated.
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, sample: Sample) {
        self.lock().push(sample);
    }

    /// Take every buffered sample, leaving the buffer empty.
    pub fn take(&self) -> Vec<Sample> {
        std::mem::take(&mut *self.lock())
    }

    /// Put a batch back in front of the live contents.  The batch must be
    /// older than anything still buffered; [`Flusher`] guarantees this by
    /// never taking a new batch while one is in flight.
    pub fn requeue(&self, mut batch: Vec<Sample>) {
        let mut samples = self.lock();
        batch.append(&mut samples);
        *samples = batch;
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Moves buffered batches into a [`PersistenceSink`].
///
/// At most one background flush is in flight.  A window that comes due
/// while the previous batch is still being written is deferred: its
/// samples stay buffered and go out with the next window.  A failed batch
/// is therefore always requeued before any newer sample is taken, and the
/// persisted batches concatenate to the acquisition order.
pub struct Flusher {
    buffer: Arc<SampleBuffer>,
    sink: Arc<dyn PersistenceSink>,
    requeue_on_failure: bool,
    failures: Arc<AtomicU64>,
    in_flight: Arc<AtomicBool>,
}

/// Clears the in-flight flag when a flush task ends, even by panic.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Flusher {
    pub fn new(buffer: Arc<SampleBuffer>, sink: Arc<dyn PersistenceSink>, requeue_on_failure: bool) -> Self {
        Self {
            buffer,
            sink,
            requeue_on_failure,
            failures: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a background flush is still writing its batch.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Swap the buffer out and write it on a background task.  Returns
    /// the batch size; an empty buffer, or a flush still in flight,
    /// dispatches nothing.
    pub fn dispatch(&self, flush_time: DateTime<Local>, tasks: &mut TaskSet) -> usize {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let guard = InFlight(Arc::clone(&self.in_flight));

        let batch = self.buffer.take();
        let count = batch.len();
        if count == 0 {
            return 0;
        }

        // The batch stays reachable from the loop thread until the task
        // claims it, so a failed spawn can put it back.
        let slot = Arc::new(Mutex::new(Some(batch)));
        let task_slot = Arc::clone(&slot);
        let buffer = Arc::clone(&self.buffer);
        let sink = Arc::clone(&self.sink);
        let failures = Arc::clone(&self.failures);
        let requeue = self.requeue_on_failure;
        let task = move || {
            let _guard = guard;
            let claimed = task_slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            let Some(batch) = claimed else { return };
            if let Err(e) = sink.flush(&batch, flush_time) {
                failures.fetch_add(1, Ordering::Relaxed);
                handle_failure(&buffer, batch, &e, requeue);
            }
        };

        if let Err(e) = tasks.spawn("flush", task) {
            error!("Could not spawn flush task ({}); samples stay buffered", e);
            if let Some(batch) = slot.lock().unwrap_or_else(PoisonError::into_inner).take() {
                self.buffer.requeue(batch);
            }
            return 0;
        }
        count
    }

    /// Synchronous flush used at shutdown, after in-flight flush tasks are
    /// joined.  Returns the batch size.
    pub fn flush_now(&self, flush_time: DateTime<Local>) -> Result<usize, PersistenceError> {
        let batch = self.buffer.take();
        if batch.is_empty() {
            return Ok(0);
        }
        match self.sink.flush(&batch, flush_time) {
            Ok(()) => Ok(batch.len()),
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                handle_failure(&self.buffer, batch, &e, self.requeue_on_failure);
                Err(e)
            }
        }
    }

    /// Batches that failed to persist so far.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

fn handle_failure(buffer: &SampleBuffer, batch: Vec<Sample>, error: &PersistenceError, requeue: bool) {
    if requeue {
        error!("Flush of {} samples failed: {}; requeued", batch.len(), error);
        buffer.requeue(batch);
    } else {
        error!("Flush of {} samples failed: {}; batch dropped", batch.len(), error);
    }
}

impl std::fmt::Debug for Flusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flusher")
            .field("buffered", &self.buffer.len())
            .field("requeue_on_failure", &self.requeue_on_failure)
            .field("failures", &self.failures())
            .finish_non_exhaustive()
    }
}
