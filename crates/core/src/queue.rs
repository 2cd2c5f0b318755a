//! Two-lane priority queue between the driver callback and the consumers.
//!
//! Real-time quotes ride the fast lane; everything else takes the slow
//! lane. Each lane is a briefly-locked deque with a condvar wake signal.
//! The fast consumer spins briefly and blocks at most 10 ms per wait with
//! an adaptive batch size; the slow consumer blocks up to 500 ms and
//! drains a fixed batch. Shutdown is cooperative: flag, wake, join, then
//! discard whatever is left.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::metrics;
use crate::packet::RawPacket;
use crate::stats::BridgeStats;

const FAST_WAIT: Duration = Duration::from_millis(10);
const SLOW_WAIT: Duration = Duration::from_millis(500);
const FAST_BATCH_MIN: usize = 100;
const FAST_BATCH_MAX: usize = 500;
const SLOW_BATCH: usize = 50;
const SPIN_ITERS: usize = 64;
const BACKLOG_WARN_INTERVAL: Duration = Duration::from_secs(5);

/// Depth limits. The defaults are the production values; tests shrink them.
#[derive(Debug, Clone, Copy)]
pub struct QueueLimits {
    /// Absolute cap; new packets are dropped beyond it.
    pub hard_cap: usize,
    /// Backlog size that triggers a rate-limited warning.
    pub warn_threshold: usize,
    /// Backlog size that triggers eviction of the oldest packets.
    pub pressure_threshold: usize,
    /// Most packets evicted per enqueue under pressure.
    pub max_evictions: usize,
    /// Fast-lane packets are only evicted while the lane holds more than this.
    pub fast_lane_floor: usize,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            hard_cap: 5000,
            warn_threshold: 1000,
            pressure_threshold: 3000,
            max_evictions: 500,
            fast_lane_floor: 100,
        }
    }
}

/// Result of an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// The queue has not been started or is shutting down.
    NotRunning,
    /// Hard cap reached; the packet was dropped.
    QueueFull,
    /// The packet failed header validation before it ever reached a lane.
    Rejected,
}

/// Consumers hand every drained packet to one of these.
pub trait PacketHandler: Send + Sync {
    fn handle(&self, packet: RawPacket);
}

struct Lane {
    name: &'static str,
    queue: Mutex<VecDeque<RawPacket>>,
    available: Condvar,
    depth: AtomicUsize,
}

impl Lane {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            depth: AtomicUsize::new(0),
        }
    }

    fn set_depth(&self, depth: usize) {
        self.depth.store(depth, Ordering::Release);
        metrics::set_queue_depth(self.name, depth);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Join handles for the two consumer threads.
#[derive(Default)]
pub struct ConsumerHandles {
    fast: Option<JoinHandle<()>>,
    slow: Option<JoinHandle<()>>,
}

pub struct IngestQueue {
    fast: Lane,
    slow: Lane,
    running: AtomicBool,
    limits: QueueLimits,
    stats: Arc<BridgeStats>,
    last_backlog_warn: Mutex<Option<Instant>>,
}

impl IngestQueue {
    pub fn new(stats: Arc<BridgeStats>) -> Arc<Self> {
        Self::with_limits(stats, QueueLimits::default())
    }

    pub fn with_limits(stats: Arc<BridgeStats>, limits: QueueLimits) -> Arc<Self> {
        Arc::new(Self {
            fast: Lane::new("fast"),
            slow: Lane::new("slow"),
            running: AtomicBool::new(false),
            limits,
            stats,
            last_backlog_warn: Mutex::new(None),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Current (fast, slow) depths.
    pub fn depths(&self) -> (usize, usize) {
        (
            self.fast.depth.load(Ordering::Acquire),
            self.slow.depth.load(Ordering::Acquire),
        )
    }

    fn total_depth(&self) -> usize {
        let (fast, slow) = self.depths();
        fast + slow
    }

    pub fn enqueue(&self, packet: RawPacket) -> EnqueueOutcome {
        if !self.is_running() {
            warn!(kind = packet.kind.name(), "enqueue while queue is not running");
            return EnqueueOutcome::NotRunning;
        }

        let depth = self.total_depth();
        if depth >= self.limits.hard_cap {
            self.stats.queue.dropped_full.fetch_add(1, Ordering::Relaxed);
            metrics::inc_packets_dropped("queue_full", 1);
            warn!(
                kind = packet.kind.name(),
                depth, "queue full, dropping packet"
            );
            return EnqueueOutcome::QueueFull;
        }
        if depth >= self.limits.warn_threshold {
            self.warn_backlog(depth);
        }
        if depth >= self.limits.pressure_threshold {
            self.evict_oldest();
        }

        let lane = if packet.kind.is_fast_lane() {
            &self.fast
        } else {
            &self.slow
        };
        {
            let mut queue = lock(&lane.queue);
            queue.push_back(packet);
            lane.set_depth(queue.len());
        }
        self.stats.queue.enqueued.fetch_add(1, Ordering::Relaxed);
        lane.available.notify_one();
        EnqueueOutcome::Queued
    }

    fn warn_backlog(&self, depth: usize) {
        let mut last = lock(&self.last_backlog_warn);
        let due = last
            .map(|t| t.elapsed() >= BACKLOG_WARN_INTERVAL)
            .unwrap_or(true);
        if due {
            *last = Some(Instant::now());
            let (fast, slow) = self.depths();
            warn!(depth, fast, slow, "ingestion queue backlog");
        }
    }

    /// Evict the oldest packets, slow lane first, fast lane only while it
    /// stays above its floor.
    fn evict_oldest(&self) {
        let mut evicted = 0usize;
        {
            let mut slow = lock(&self.slow.queue);
            while evicted < self.limits.max_evictions && slow.pop_front().is_some() {
                evicted += 1;
            }
            self.slow.set_depth(slow.len());
        }
        if evicted < self.limits.max_evictions {
            let mut fast = lock(&self.fast.queue);
            while evicted < self.limits.max_evictions && fast.len() > self.limits.fast_lane_floor
            {
                fast.pop_front();
                evicted += 1;
            }
            self.fast.set_depth(fast.len());
        }
        if evicted > 0 {
            self.stats
                .queue
                .evicted
                .fetch_add(evicted as u64, Ordering::Relaxed);
            metrics::inc_packets_dropped("evicted", evicted as u64);
            warn!(evicted, "queue under pressure, evicted oldest packets");
        }
    }

    /// Spawn the two consumer threads. Call once.
    pub fn start(self: &Arc<Self>, handler: Arc<dyn PacketHandler>) -> ConsumerHandles {
        self.running.store(true, Ordering::Release);

        let queue = Arc::clone(self);
        let h = Arc::clone(&handler);
        let fast = std::thread::Builder::new()
            .name("mdbridge-fast".to_string())
            .spawn(move || queue.run_fast(h))
            .ok();

        let queue = Arc::clone(self);
        let slow = std::thread::Builder::new()
            .name("mdbridge-slow".to_string())
            .spawn(move || queue.run_slow(handler))
            .ok();

        if fast.is_none() || slow.is_none() {
            warn!("failed to spawn a consumer thread");
        }
        info!("ingestion queue started");
        ConsumerHandles { fast, slow }
    }

    /// Flag, wake, join, then discard what is left. Never kills a thread.
    pub fn stop(&self, handles: ConsumerHandles) {
        self.running.store(false, Ordering::Release);
        self.fast.available.notify_all();
        self.slow.available.notify_all();

        for handle in [handles.fast, handles.slow].into_iter().flatten() {
            if handle.join().is_err() {
                warn!("consumer thread panicked before shutdown");
            }
        }

        let discarded = self.discard_all();
        if discarded > 0 {
            warn!(discarded, "discarded queued packets at shutdown");
        }
        info!("ingestion queue stopped");
    }

    fn discard_all(&self) -> usize {
        let mut discarded = 0usize;
        for lane in [&self.fast, &self.slow] {
            let mut queue = lock(&lane.queue);
            discarded += queue.len();
            queue.clear();
            lane.set_depth(0);
        }
        if discarded > 0 {
            self.stats
                .queue
                .discarded_at_shutdown
                .fetch_add(discarded as u64, Ordering::Relaxed);
        }
        discarded
    }

    fn run_fast(self: Arc<Self>, handler: Arc<dyn PacketHandler>) {
        debug!("fast consumer running");
        while self.is_running() {
            let batch = self.drain_fast();
            if batch.is_empty() {
                self.wait_for_work(&self.fast, FAST_WAIT, true);
                continue;
            }
            self.process(&handler, batch);
        }
        debug!("fast consumer exiting");
    }

    fn run_slow(self: Arc<Self>, handler: Arc<dyn PacketHandler>) {
        debug!("slow consumer running");
        while self.is_running() {
            let batch = self.drain_slow();
            if batch.is_empty() {
                self.wait_for_work(&self.slow, SLOW_WAIT, false);
                continue;
            }
            self.process(&handler, batch);
        }
        debug!("slow consumer exiting");
    }

    fn process(&self, handler: &Arc<dyn PacketHandler>, batch: Vec<RawPacket>) {
        let n = batch.len() as u64;
        for packet in batch {
            handler.handle(packet);
        }
        self.stats.queue.processed.fetch_add(n, Ordering::Relaxed);
    }

    /// Adaptive fast-lane batch: the deeper the backlog, the bigger the
    /// drain, clamped to [100, 500].
    fn drain_fast(&self) -> Vec<RawPacket> {
        let mut queue = lock(&self.fast.queue);
        let take = queue.len().clamp(FAST_BATCH_MIN, FAST_BATCH_MAX).min(queue.len());
        let batch: Vec<RawPacket> = queue.drain(..take).collect();
        self.fast.set_depth(queue.len());
        batch
    }

    fn drain_slow(&self) -> Vec<RawPacket> {
        let mut queue = lock(&self.slow.queue);
        let take = queue.len().min(SLOW_BATCH);
        let batch: Vec<RawPacket> = queue.drain(..take).collect();
        self.slow.set_depth(queue.len());
        batch
    }

    fn wait_for_work(&self, lane: &Lane, max_wait: Duration, spin_first: bool) {
        if spin_first {
            for _ in 0..SPIN_ITERS {
                if lane.depth.load(Ordering::Acquire) > 0 || !self.is_running() {
                    return;
                }
                std::hint::spin_loop();
            }
        }
        let queue = lock(&lane.queue);
        if queue.is_empty() && self.is_running() {
            let _ = lane.available.wait_timeout(queue, max_wait);
        }
    }
}
