//! Bridge statistics, injected as an `Arc` wherever counting happens.
//!
//! Category counters mirror into the prometheus metrics so the snapshot
//! API and the `/metrics` endpoint always agree.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::metrics;

/// Outbound data category, one broker queue each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    RealTime,
    Daily,
    ExRights,
    Symbols,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::RealTime,
        Category::Daily,
        Category::ExRights,
        Category::Symbols,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::RealTime => "realtime",
            Category::Daily => "daily",
            Category::ExRights => "ex_rights",
            Category::Symbols => "symbols",
        }
    }

    fn index(self) -> usize {
        match self {
            Category::RealTime => 0,
            Category::Daily => 1,
            Category::ExRights => 2,
            Category::Symbols => 3,
        }
    }
}

#[derive(Default)]
struct CategoryCounters {
    records: AtomicU64,
    bytes: AtomicU64,
    last_send_epoch: AtomicU64,
    errors: AtomicU64,
    skipped: AtomicU64,
}

/// Queue-side counters, bumped by the ingestion queue.
#[derive(Default)]
pub struct QueueCounters {
    pub enqueued: AtomicU64,
    pub processed: AtomicU64,
    pub dropped_full: AtomicU64,
    pub evicted: AtomicU64,
    pub discarded_at_shutdown: AtomicU64,
}

#[derive(Default)]
pub struct BridgeStats {
    categories: [CategoryCounters; 4],
    pub queue: QueueCounters,
}

/// Point-in-time view of one category.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CategorySnapshot {
    pub category: &'static str,
    pub records: u64,
    pub bytes: u64,
    pub last_send_epoch: u64,
    pub errors: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub enqueued: u64,
    pub processed: u64,
    pub dropped_full: u64,
    pub evicted: u64,
    pub discarded_at_shutdown: u64,
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl BridgeStats {
    /// Record a successful send of `records` records in `bytes` of payload.
    pub fn record_send(&self, category: Category, records: usize, bytes: usize) {
        let c = &self.categories[category.index()];
        c.records.fetch_add(records as u64, Ordering::Relaxed);
        c.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        c.last_send_epoch.store(epoch_secs(), Ordering::Relaxed);
        metrics::inc_records_sent(category.name(), records as u64);
        metrics::inc_bytes_sent(category.name(), bytes as u64);
    }

    pub fn record_error(&self, category: Category) {
        self.categories[category.index()]
            .errors
            .fetch_add(1, Ordering::Relaxed);
        metrics::inc_send_errors(category.name());
    }

    /// Count slots the decoder had to skip.
    pub fn record_skipped(&self, category: Category, skipped: usize) {
        self.categories[category.index()]
            .skipped
            .fetch_add(skipped as u64, Ordering::Relaxed);
        metrics::inc_records_skipped(category.name(), skipped as u64);
    }

    pub fn category(&self, category: Category) -> CategorySnapshot {
        let c = &self.categories[category.index()];
        CategorySnapshot {
            category: category.name(),
            records: c.records.load(Ordering::Relaxed),
            bytes: c.bytes.load(Ordering::Relaxed),
            last_send_epoch: c.last_send_epoch.load(Ordering::Relaxed),
            errors: c.errors.load(Ordering::Relaxed),
            skipped: c.skipped.load(Ordering::Relaxed),
        }
    }

    pub fn snapshot(&self) -> Vec<CategorySnapshot> {
        Category::ALL.iter().map(|&c| self.category(c)).collect()
    }

    pub fn queue_snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            enqueued: self.queue.enqueued.load(Ordering::Relaxed),
            processed: self.queue.processed.load(Ordering::Relaxed),
            dropped_full: self.queue.dropped_full.load(Ordering::Relaxed),
            evicted: self.queue.evicted.load(Ordering::Relaxed),
            discarded_at_shutdown: self.queue.discarded_at_shutdown.load(Ordering::Relaxed),
        }
    }

    /// Zero the per-category counters. Queue counters are left alone.
    pub fn reset(&self) {
        for c in &self.categories {
            c.records.store(0, Ordering::Relaxed);
            c.bytes.store(0, Ordering::Relaxed);
            c.last_send_epoch.store(0, Ordering::Relaxed);
            c.errors.store(0, Ordering::Relaxed);
            c.skipped.store(0, Ordering::Relaxed);
        }
    }
}
