//! In-process run metrics
//!
//! Counters, gauges and a latency histogram with Prometheus text export.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Counter metric (monotonically increasing)
pub struct Counter {
    value: AtomicU64,
    name: String,
    help: String,
}

impl Counter {
    /// Create a new counter
    pub fn new(name: &str, help: &str) -> Self {
        Self {
            value: AtomicU64::new(0),
            name: name.into(),
            help: help.into(),
        }
    }

    /// Increment by 1
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment by delta
    pub fn inc_by(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    /// Get current value
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Format as Prometheus metric
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP {} {}\n# TYPE {} counter\n{} {}\n",
            self.name, self.help, self.name, self.name, self.get()
        )
    }
}

/// Gauge metric (can go up or down)
pub struct Gauge {
    value: AtomicI64,
    name: String,
    help: String,
}

impl Gauge {
    /// Create a new gauge
    pub fn new(name: &str, help: &str) -> Self {
        Self {
            value: AtomicI64::new(0),
            name: name.into(),
            help: help.into(),
        }
    }

    /// Set value
    pub fn set(&self, val: i64) {
        self.value.store(val, Ordering::Relaxed);
    }

    /// Increment by 1
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement by 1
    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get current value
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Format as Prometheus metric
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP {} {}\n# TYPE {} gauge\n{} {}\n",
            self.name, self.help, self.name, self.name, self.get()
        )
    }
}

/// Histogram for latency measurements, in seconds
pub struct Histogram {
    buckets: Vec<(f64, AtomicU64)>,
    sum_micros: AtomicU64,
    count: AtomicU64,
    name: String,
    help: String,
}

impl Histogram {
    /// Create with buckets from 1ms to 10s
    pub fn new(name: &str, help: &str) -> Self {
        let bounds = [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0];
        Self {
            buckets: bounds.iter().map(|&b| (b, AtomicU64::new(0))).collect(),
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
            name: name.into(),
            help: help.into(),
        }
    }

    /// Observe a value
    pub fn observe(&self, seconds: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros
            .fetch_add((seconds * 1_000_000.0) as u64, Ordering::Relaxed);
        for (bound, count) in &self.buckets {
            if seconds <= *bound {
                count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of observations
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Format as Prometheus metric
    pub fn to_prometheus(&self) -> String {
        let mut output = format!(
            "# HELP {} {}\n# TYPE {} histogram\n",
            self.name, self.help, self.name
        );
        for (bound, count) in &self.buckets {
            output.push_str(&format!(
                "{}_bucket{{le=\"{}\"}} {}\n",
                self.name,
                bound,
                count.load(Ordering::Relaxed)
            ));
        }
        let sum = self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        output.push_str(&format!("{}_sum {}\n", self.name, sum));
        output.push_str(&format!("{}_count {}\n", self.name, self.count()));
        output
    }
}

/// Process-wide cluster metrics
pub mod standard {
    use super::*;
    use std::sync::LazyLock;

    pub static NODES_ELECTED: LazyLock<Gauge> = LazyLock::new(|| {
        Gauge::new("dsort_nodes_elected", "Nodes assigned a role in the last election")
    });

    pub static ACTIVE_CONNECTIONS: LazyLock<Gauge> = LazyLock::new(|| {
        Gauge::new("dsort_active_connections", "Worker connections open on the coordinator")
    });

    pub static CHUNKS_DISPATCHED: LazyLock<Counter> = LazyLock::new(|| {
        Counter::new("dsort_chunks_dispatched_total", "Chunks sent to workers")
    });

    pub static CHUNKS_RECEIVED: LazyLock<Counter> = LazyLock::new(|| {
        Counter::new("dsort_chunks_received_total", "Sorted chunks recorded by the coordinator")
    });

    pub static DIAL_RETRIES: LazyLock<Counter> = LazyLock::new(|| {
        Counter::new("dsort_dial_retries_total", "Failed worker dial attempts that were retried")
    });

    pub static PROTOCOL_ERRORS: LazyLock<Counter> = LazyLock::new(|| {
        Counter::new("dsort_protocol_errors_total", "Connections closed on a protocol error")
    });

    pub static CHUNK_SORT_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
        Histogram::new("dsort_chunk_sort_duration_seconds", "Worker-side chunk sort latency")
    });
}

/// Render every standard metric
pub fn gather_cluster_metrics() -> String {
    let mut output = String::new();
    output.push_str(&standard::NODES_ELECTED.to_prometheus());
    output.push_str(&standard::ACTIVE_CONNECTIONS.to_prometheus());
    output.push_str(&standard::CHUNKS_DISPATCHED.to_prometheus());
    output.push_str(&standard::CHUNKS_RECEIVED.to_prometheus());
    output.push_str(&standard::DIAL_RETRIES.to_prometheus());
    output.push_str(&standard::PROTOCOL_ERRORS.to_prometheus());
    output.push_str(&standard::CHUNK_SORT_DURATION.to_prometheus());
    output
}
