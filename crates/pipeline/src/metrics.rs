use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters and timings for one ingestion run
pub struct RunMetrics {
    // Counters
    documents_total: AtomicUsize,
    documents_succeeded: AtomicUsize,
    documents_failed: AtomicUsize,

    // Timing (in microseconds) and how many documents each stage timed
    total_read_time_us: AtomicU64,
    total_extract_time_us: AtomicU64,
    total_write_time_us: AtomicU64,
    reads_timed: AtomicUsize,
    extracts_timed: AtomicUsize,
    writes_timed: AtomicUsize,

    // Counts
    total_entities_extracted: AtomicUsize,
    total_edges_extracted: AtomicUsize,
    total_writes_attempted: AtomicUsize,
    total_writes_failed: AtomicUsize,
}

impl RunMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            documents_total: AtomicUsize::new(0),
            documents_succeeded: AtomicUsize::new(0),
            documents_failed: AtomicUsize::new(0),
            total_read_time_us: AtomicU64::new(0),
            total_extract_time_us: AtomicU64::new(0),
            total_write_time_us: AtomicU64::new(0),
            reads_timed: AtomicUsize::new(0),
            extracts_timed: AtomicUsize::new(0),
            writes_timed: AtomicUsize::new(0),
            total_entities_extracted: AtomicUsize::new(0),
            total_edges_extracted: AtomicUsize::new(0),
            total_writes_attempted: AtomicUsize::new(0),
            total_writes_failed: AtomicUsize::new(0),
        })
    }

    pub fn record_document(&self, success: bool) {
        self.documents_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.documents_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.documents_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_read(&self, duration: Duration) {
        self.total_read_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.reads_timed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_extract(&self, duration: Duration, entities: usize, edges: usize) {
        self.total_extract_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.extracts_timed.fetch_add(1, Ordering::Relaxed);
        self.total_entities_extracted.fetch_add(entities, Ordering::Relaxed);
        self.total_edges_extracted.fetch_add(edges, Ordering::Relaxed);
    }

    pub fn record_write(&self, duration: Duration, attempted: usize, failed: usize) {
        self.total_write_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.writes_timed.fetch_add(1, Ordering::Relaxed);
        self.total_writes_attempted.fetch_add(attempted, Ordering::Relaxed);
        self.total_writes_failed.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_total: self.documents_total.load(Ordering::Relaxed),
            documents_succeeded: self.documents_succeeded.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            avg_read_time_ms: avg_time_ms(&self.total_read_time_us, &self.reads_timed),
            avg_extract_time_ms: avg_time_ms(&self.total_extract_time_us, &self.extracts_timed),
            avg_write_time_ms: avg_time_ms(&self.total_write_time_us, &self.writes_timed),
            total_entities_extracted: self.total_entities_extracted.load(Ordering::Relaxed),
            total_edges_extracted: self.total_edges_extracted.load(Ordering::Relaxed),
            total_writes_attempted: self.total_writes_attempted.load(Ordering::Relaxed),
            total_writes_failed: self.total_writes_failed.load(Ordering::Relaxed),
        }
    }
}

/// Average over the documents that reached the stage
fn avg_time_ms(total_us: &AtomicU64, timed: &AtomicUsize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    let cnt = timed.load(Ordering::Relaxed) as f64;
    if cnt > 0.0 {
        total / cnt / 1000.0 // Convert to ms
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub documents_total: usize,
    pub documents_succeeded: usize,
    pub documents_failed: usize,
    pub avg_read_time_ms: f64,
    pub avg_extract_time_ms: f64,
    pub avg_write_time_ms: f64,
    pub total_entities_extracted: usize,
    pub total_edges_extracted: usize,
    pub total_writes_attempted: usize,
    pub total_writes_failed: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
