use hdrhistogram::Histogram;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// Delivery counters and post latency for one simulation run.
pub struct Stats {
    // Latency of successful posts, retries included (nanoseconds)
    latency_hist: RwLock<Histogram<u64>>,

    delivered_count: RwLock<u64>,
    failed_count: RwLock<u64>,

    start_time: Instant,
    last_snapshot: RwLock<Instant>,
    last_delivered: RwLock<u64>,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            // 1µs to 120s range, 3 significant digits
            latency_hist: RwLock::new(
                Histogram::new_with_bounds(1_000, 120_000_000_000, 3).expect("static bounds"),
            ),
            delivered_count: RwLock::new(0),
            failed_count: RwLock::new(0),
            start_time: now,
            last_snapshot: RwLock::new(now),
            last_delivered: RwLock::new(0),
        }
    }

    /// Record a delivered event and how long its post took
    pub async fn record_delivered(&self, latency_ns: u64) {
        *self.delivered_count.write().await += 1;
        // Clamped into the histogram's 1µs..120s range
        self.latency_hist.write().await.saturating_record(latency_ns.max(1_000));
    }

    /// Record an event dropped after all attempts failed
    pub async fn record_failed(&self) {
        *self.failed_count.write().await += 1;
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        let now = Instant::now();
        let delivered = *self.delivered_count.read().await;
        let failed = *self.failed_count.read().await;

        let hist = self.latency_hist.read().await;
        let (p50, p95, p99, min, max, mean) = if hist.is_empty() {
            (0, 0, 0, 0, 0, 0.0)
        } else {
            (
                hist.value_at_quantile(0.5),
                hist.value_at_quantile(0.95),
                hist.value_at_quantile(0.99),
                hist.min(),
                hist.max(),
                hist.mean(),
            )
        };

        let since_last = {
            let mut last = self.last_snapshot.write().await;
            let duration = now.duration_since(*last);
            *last = now;
            duration
        };
        let interval_delivered = {
            let mut last = self.last_delivered.write().await;
            let d = delivered - *last;
            *last = delivered;
            d
        };

        StatsSnapshot {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            attempted_count: delivered + failed,
            delivered_count: delivered,
            failed_count: failed,
            interval_delivered_count: interval_delivered,
            total_duration: now.duration_since(self.start_time),
            interval_duration: since_last,
            latency_ns_p50: p50,
            latency_ns_p95: p95,
            latency_ns_p99: p99,
            latency_ns_min: min,
            latency_ns_max: max,
            latency_ns_mean: mean,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub timestamp: u64,
    pub attempted_count: u64,
    pub delivered_count: u64,
    pub failed_count: u64,
    pub interval_delivered_count: u64,
    pub total_duration: Duration,
    pub interval_duration: Duration,
    pub latency_ns_p50: u64,
    pub latency_ns_p95: u64,
    pub latency_ns_p99: u64,
    pub latency_ns_min: u64,
    pub latency_ns_max: u64,
    pub latency_ns_mean: f64,
}

impl StatsSnapshot {
    /// Delivered events per second since the previous snapshot
    pub fn interval_throughput(&self) -> f64 {
        let interval_secs = self.interval_duration.as_secs_f64();
        if interval_secs > 0.0 {
            self.interval_delivered_count as f64 / interval_secs
        } else {
            0.0
        }
    }

    /// Delivered events per second over the whole run
    pub fn total_throughput(&self) -> f64 {
        let total_secs = self.total_duration.as_secs_f64();
        if total_secs > 0.0 {
            self.delivered_count as f64 / total_secs
        } else {
            0.0
        }
    }

    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{:.2},{:.2},{},{},{},{},{},{:.2}",
            self.timestamp,
            self.attempted_count,
            self.delivered_count,
            self.failed_count,
            self.total_throughput(),
            self.interval_throughput(),
            self.latency_ns_p50,
            self.latency_ns_p95,
            self.latency_ns_p99,
            self.latency_ns_min,
            self.latency_ns_max,
            self.latency_ns_mean
        )
    }

    pub fn csv_header() -> &'static str {
        "timestamp,attempted_count,delivered_count,failed_count,total_throughput,interval_throughput,latency_ns_p50,latency_ns_p95,latency_ns_p99,latency_ns_min,latency_ns_max,latency_ns_mean"
    }
}
