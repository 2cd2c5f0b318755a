//! Asynchronous batching stage in front of the real-time sender.
//!
//! The fast-lane consumer must never block on the network, so decoded
//! quote batches go into a bounded buffer and a dedicated thread does the
//! serialization and sending. Overflow drops the oldest batch.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, warn};

use mdbridge_codec::{json, QuoteRecord};

use crate::error::SendError;
use crate::sender::ChannelSender;
use crate::stats::{BridgeStats, Category};

/// Most batches held before the oldest is dropped.
pub const BATCH_QUEUE_CAP: usize = 100;
/// Most batches merged into a single broker frame.
pub const MAX_MERGE_BATCHES: usize = 10;
/// Bounded wait when the buffer is empty, same bound as the fast lane.
const IDLE_WAIT: Duration = Duration::from_millis(10);
const SPIN_ITERS: usize = 64;
/// A dropped-batch warning every this many drops.
const DROP_LOG_EVERY: u64 = 100;

/// Bounded batch buffer with drop-oldest overflow. Split out from the
/// thread so the policy is testable directly.
pub struct BatchBuffer {
    queue: VecDeque<Vec<QuoteRecord>>,
    capacity: usize,
    dropped: u64,
}

impl BatchBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Push a batch, dropping the oldest one first if the buffer is full.
    /// Returns true when something was dropped.
    pub fn push(&mut self, batch: Vec<QuoteRecord>) -> bool {
        let mut dropped = false;
        if self.queue.len() >= self.capacity {
            self.queue.pop_front();
            self.dropped += 1;
            dropped = true;
        }
        self.queue.push_back(batch);
        dropped
    }

    /// Drain up to `max_batches` batches, merged into one record list.
    pub fn drain_merged(&mut self, max_batches: usize) -> Vec<QuoteRecord> {
        let take = self.queue.len().min(max_batches);
        let mut merged = Vec::new();
        for batch in self.queue.drain(..take) {
            merged.extend(batch);
        }
        merged
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

struct Shared {
    buffer: Mutex<BatchBuffer>,
    available: Condvar,
    running: AtomicBool,
}

fn lock(m: &Mutex<BatchBuffer>) -> MutexGuard<'_, BatchBuffer> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct BatchingSender {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BatchingSender {
    /// Take ownership of the real-time sender and start the send thread.
    pub fn start(sender: ChannelSender, stats: Arc<BridgeStats>) -> Self {
        let shared = Arc::new(Shared {
            buffer: Mutex::new(BatchBuffer::new(BATCH_QUEUE_CAP)),
            available: Condvar::new(),
            running: AtomicBool::new(true),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("mdbridge-realtime-send".to_string())
            .spawn(move || run_loop(worker_shared, sender, stats))
            .ok();
        if worker.is_none() {
            warn!("failed to spawn real-time send thread");
        }
        Self {
            shared,
            worker: Mutex::new(worker),
        }
    }

    /// Queue a batch for sending. Never blocks on the network; a full
    /// buffer costs the oldest batch instead.
    pub fn submit(&self, records: Vec<QuoteRecord>) {
        if records.is_empty() {
            return;
        }
        let dropped_total = {
            let mut buffer = lock(&self.shared.buffer);
            let dropped = buffer.push(records);
            dropped.then(|| buffer.dropped())
        };
        if let Some(total) = dropped_total {
            if total % DROP_LOG_EVERY == 1 {
                warn!(total, "real-time buffer overflow, dropping oldest batches");
            }
        }
        self.shared.available.notify_one();
    }

    pub fn pending(&self) -> usize {
        lock(&self.shared.buffer).len()
    }

    /// Stop the send thread. The thread makes a final best-effort pass over
    /// whatever is still buffered before exiting.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.available.notify_all();
        let handle = {
            let mut worker = self
                .worker
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            worker.take()
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("real-time send thread panicked before shutdown");
            }
        }
        info!("real-time batching sender stopped");
    }
}

fn run_loop(shared: Arc<Shared>, mut sender: ChannelSender, stats: Arc<BridgeStats>) {
    debug!("real-time send thread running");
    while shared.running.load(Ordering::Acquire) {
        let merged = {
            let mut buffer = lock(&shared.buffer);
            buffer.drain_merged(MAX_MERGE_BATCHES)
        };
        if merged.is_empty() {
            wait_for_work(&shared);
            continue;
        }
        send_quotes(&mut sender, &stats, &merged);
    }

    // Final drain: best effort, one connection attempt at most thanks to
    // the sender's own throttle.
    loop {
        let merged = {
            let mut buffer = lock(&shared.buffer);
            buffer.drain_merged(MAX_MERGE_BATCHES)
        };
        if merged.is_empty() {
            break;
        }
        send_quotes(&mut sender, &stats, &merged);
    }
    sender.close();
    debug!("real-time send thread exiting");
}

fn wait_for_work(shared: &Shared) {
    for _ in 0..SPIN_ITERS {
        if !shared.running.load(Ordering::Acquire) {
            return;
        }
        if !lock(&shared.buffer).is_empty() {
            return;
        }
        std::hint::spin_loop();
    }
    let buffer = lock(&shared.buffer);
    if buffer.is_empty() && shared.running.load(Ordering::Acquire) {
        let _ = shared.available.wait_timeout(buffer, IDLE_WAIT);
    }
}

fn send_quotes(sender: &mut ChannelSender, stats: &BridgeStats, records: &[QuoteRecord]) {
    let payload = json::quotes_payload(records);
    match sender.send(payload.as_bytes()) {
        Ok(_) => stats.record_send(Category::RealTime, records.len(), payload.len()),
        Err(e) if e.is_throttled() => {
            stats.record_error(Category::RealTime);
            debug!(records = records.len(), "real-time send skipped: {e}");
        }
        Err(e) => {
            stats.record_error(Category::RealTime);
            warn!(records = records.len(), error = %e, "real-time send failed");
        }
    }
}
