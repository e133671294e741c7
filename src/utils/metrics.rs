use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Latency samples kept per series; older samples are dropped first
const MAX_SAMPLES: usize = 1024;

/// Global metrics collector for the application.
///
/// Tracks cache outcomes, boundary calls and page loads.
/// Thread-safe and can be shared across the application.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Cache Metrics
    cache_hits: AtomicUsize,
    cache_cross_service_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    cache_size: AtomicUsize,

    // Boundary Metrics
    recognition_calls_success: AtomicUsize,
    recognition_calls_failed: AtomicUsize,
    recognition_latency_ms: RwLock<Vec<u64>>,
    translation_calls_success: AtomicUsize,
    translation_calls_failed: AtomicUsize,
    translation_latency_ms: RwLock<Vec<u64>>,

    // Page Metrics
    pages_ok: AtomicUsize,
    pages_failed: AtomicUsize,
    page_duration_ms: RwLock<Vec<u64>>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                cache_hits: AtomicUsize::new(0),
                cache_cross_service_hits: AtomicUsize::new(0),
                cache_misses: AtomicUsize::new(0),
                cache_size: AtomicUsize::new(0),
                recognition_calls_success: AtomicUsize::new(0),
                recognition_calls_failed: AtomicUsize::new(0),
                recognition_latency_ms: RwLock::new(Vec::new()),
                translation_calls_success: AtomicUsize::new(0),
                translation_calls_failed: AtomicUsize::new(0),
                translation_latency_ms: RwLock::new(Vec::new()),
                pages_ok: AtomicUsize::new(0),
                pages_failed: AtomicUsize::new(0),
                page_duration_ms: RwLock::new(Vec::new()),
                start_time: Instant::now(),
            }),
        }
    }

    // Cache Metrics
    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cross_service_hit(&self) {
        self.inner.cache_cross_service_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_cache_size(&self, size: usize) {
        self.inner.cache_size.store(size, Ordering::Relaxed);
    }

    // Boundary Metrics
    pub fn record_recognition_call(&self, success: bool, duration: Duration) {
        if success {
            self.inner.recognition_calls_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.recognition_calls_failed.fetch_add(1, Ordering::Relaxed);
        }
        push_sample(&self.inner.recognition_latency_ms, duration);
    }

    pub fn record_translation_call(&self, success: bool, duration: Duration) {
        if success {
            self.inner.translation_calls_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.translation_calls_failed.fetch_add(1, Ordering::Relaxed);
        }
        push_sample(&self.inner.translation_latency_ms, duration);
    }

    // Page Metrics
    pub fn record_page_load(&self, ok: bool, duration: Duration) {
        if ok {
            self.inner.pages_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.pages_failed.fetch_add(1, Ordering::Relaxed);
        }
        push_sample(&self.inner.page_duration_ms, duration);
    }

    // Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let recognition_latency = self.inner.recognition_latency_ms.read();
        let recognition_latency_avg = avg(&recognition_latency);
        let recognition_latency_p95 = percentile(&recognition_latency, 0.95);
        drop(recognition_latency);

        let translation_latency = self.inner.translation_latency_ms.read();
        let translation_latency_avg = avg(&translation_latency);
        let translation_latency_p95 = percentile(&translation_latency, 0.95);
        drop(translation_latency);

        let page_durations = self.inner.page_duration_ms.read();
        let page_avg = avg(&page_durations);
        drop(page_durations);

        let cache_hits = self.inner.cache_hits.load(Ordering::Relaxed);
        let cache_cross_service_hits = self.inner.cache_cross_service_hits.load(Ordering::Relaxed);
        let cache_misses = self.inner.cache_misses.load(Ordering::Relaxed);
        let cache_total = cache_hits + cache_cross_service_hits + cache_misses;
        let cache_hit_rate = if cache_total > 0 {
            cache_hits as f64 / cache_total as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            cache_hits,
            cache_cross_service_hits,
            cache_misses,
            cache_hit_rate,
            cache_size: self.inner.cache_size.load(Ordering::Relaxed),
            recognition_calls_success: self.inner.recognition_calls_success.load(Ordering::Relaxed),
            recognition_calls_failed: self.inner.recognition_calls_failed.load(Ordering::Relaxed),
            recognition_latency_avg_ms: recognition_latency_avg,
            recognition_latency_p95_ms: recognition_latency_p95,
            translation_calls_success: self.inner.translation_calls_success.load(Ordering::Relaxed),
            translation_calls_failed: self.inner.translation_calls_failed.load(Ordering::Relaxed),
            translation_latency_avg_ms: translation_latency_avg,
            translation_latency_p95_ms: translation_latency_p95,
            pages_ok: self.inner.pages_ok.load(Ordering::Relaxed),
            pages_failed: self.inner.pages_failed.load(Ordering::Relaxed),
            page_avg_ms: page_avg,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP cache_lookups_total Result store lookups by outcome
# TYPE cache_lookups_total counter
cache_lookups_total {{outcome="exact"}} {}
cache_lookups_total {{outcome="cross_service"}} {}
cache_lookups_total {{outcome="miss"}} {}

# HELP cache_hit_rate Exact cache hit rate (0.0 to 1.0)
# TYPE cache_hit_rate gauge
cache_hit_rate {{}} {}

# HELP cache_size Current number of cached entries
# TYPE cache_size gauge
cache_size {{}} {}

# HELP boundary_calls_total Recognition and translation calls by result
# TYPE boundary_calls_total counter
boundary_calls_total {{boundary="recognition",result="success"}} {}
boundary_calls_total {{boundary="recognition",result="failed"}} {}
boundary_calls_total {{boundary="translation",result="success"}} {}
boundary_calls_total {{boundary="translation",result="failed"}} {}

# HELP boundary_latency_avg_ms Average boundary call latency in milliseconds
# TYPE boundary_latency_avg_ms gauge
boundary_latency_avg_ms {{boundary="recognition"}} {}
boundary_latency_avg_ms {{boundary="translation"}} {}

# HELP pages_loaded_total Page loads by result
# TYPE pages_loaded_total counter
pages_loaded_total {{result="ok"}} {}
pages_loaded_total {{result="failed"}} {}

# HELP page_load_avg_ms Average page load duration in milliseconds
# TYPE page_load_avg_ms gauge
page_load_avg_ms {{}} {}

# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {{}} {}
"#,
            snapshot.cache_hits,
            snapshot.cache_cross_service_hits,
            snapshot.cache_misses,
            snapshot.cache_hit_rate,
            snapshot.cache_size,
            snapshot.recognition_calls_success,
            snapshot.recognition_calls_failed,
            snapshot.translation_calls_success,
            snapshot.translation_calls_failed,
            snapshot.recognition_latency_avg_ms,
            snapshot.translation_latency_avg_ms,
            snapshot.pages_ok,
            snapshot.pages_failed,
            snapshot.page_avg_ms,
            snapshot.uptime_seconds,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub cache_hits: usize,
    pub cache_cross_service_hits: usize,
    pub cache_misses: usize,
    pub cache_hit_rate: f64,
    pub cache_size: usize,
    pub recognition_calls_success: usize,
    pub recognition_calls_failed: usize,
    pub recognition_latency_avg_ms: u64,
    pub recognition_latency_p95_ms: u64,
    pub translation_calls_success: usize,
    pub translation_calls_failed: usize,
    pub translation_latency_avg_ms: u64,
    pub translation_latency_p95_ms: u64,
    pub pages_ok: usize,
    pub pages_failed: usize,
    pub page_avg_ms: u64,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn push_sample(samples: &RwLock<Vec<u64>>, duration: Duration) {
    let mut samples = samples.write();
    if samples.len() >= MAX_SAMPLES {
        let excess = samples.len() + 1 - MAX_SAMPLES;
        samples.drain(..excess);
    }
    samples.push(duration.as_millis() as u64);
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_cache_hit();
        metrics.record_cross_service_hit();
        metrics.record_cache_miss();
        metrics.record_cache_miss();
        metrics.record_recognition_call(true, Duration::from_millis(100));
        metrics.record_translation_call(false, Duration::from_millis(50));
        metrics.record_page_load(true, Duration::from_millis(300));
        metrics.record_page_load(false, Duration::from_millis(100));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_cross_service_hits, 1);
        assert_eq!(snapshot.cache_misses, 2);
        assert_eq!(snapshot.cache_hit_rate, 0.25);
        assert_eq!(snapshot.recognition_calls_success, 1);
        assert_eq!(snapshot.translation_calls_failed, 1);
        assert_eq!(snapshot.pages_ok, 1);
        assert_eq!(snapshot.pages_failed, 1);
        assert_eq!(snapshot.page_avg_ms, 200);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.record_cache_miss();
        metrics.record_recognition_call(true, Duration::from_millis(100));

        let prometheus = metrics.to_prometheus();
        assert!(prometheus.contains(r#"cache_lookups_total {outcome="miss"} 1"#));
        assert!(prometheus.contains(r#"boundary_calls_total {boundary="recognition",result="success"} 1"#));
    }

    #[test]
    fn test_latency_samples_are_capped() {
        let metrics = Metrics::new();
        for _ in 0..MAX_SAMPLES {
            metrics.record_page_load(true, Duration::from_millis(1));
        }
        for _ in 0..10 {
            metrics.record_page_load(true, Duration::from_millis(500));
        }

        let samples = metrics.inner.page_duration_ms.read();
        assert_eq!(samples.len(), MAX_SAMPLES);
        assert_eq!(samples.last(), Some(&500));
        assert_eq!(samples.iter().filter(|&&ms| ms == 500).count(), 10);
        drop(samples);

        assert_eq!(metrics.snapshot().pages_ok, MAX_SAMPLES + 10);
    }

    #[test]
    fn test_percentile() {
        assert_eq!(percentile(&[], 0.5), 0);
        assert_eq!(percentile(&[5, 1, 3], 0.5), 3);
        assert_eq!(percentile(&[5, 1, 3], 1.0), 5);
    }
}
