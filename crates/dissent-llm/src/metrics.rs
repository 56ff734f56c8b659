//! Process-wide debate and LLM counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global metrics collector
#[derive(Debug, Default)]
pub struct Metrics {
    /// Total LLM calls
    pub llm_calls: AtomicU64,
    /// Total LLM errors (including timeouts)
    pub llm_errors: AtomicU64,
    /// Total tokens used
    pub tokens_used: AtomicU64,
    /// Debates started
    pub debates: AtomicU64,
    /// Debates that ended in a terminal error
    pub debates_failed: AtomicU64,
    /// Debate rounds executed
    pub rounds: AtomicU64,
    /// Agent responses recorded as degraded
    pub degraded_responses: AtomicU64,
    /// Sessions cancelled by their consumer
    pub cancelled: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an LLM call
    pub fn record_llm_call(&self, tokens: u64, error: bool) {
        self.llm_calls.fetch_add(1, Ordering::Relaxed);
        self.tokens_used.fetch_add(tokens, Ordering::Relaxed);
        if error {
            self.llm_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_debate(&self) {
        self.debates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_debate_failed(&self) {
        self.debates_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_round(&self) {
        self.rounds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degraded(&self) {
        self.degraded_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            llm_calls: self.llm_calls.load(Ordering::Relaxed),
            llm_errors: self.llm_errors.load(Ordering::Relaxed),
            tokens_used: self.tokens_used.load(Ordering::Relaxed),
            debates: self.debates.load(Ordering::Relaxed),
            debates_failed: self.debates_failed.load(Ordering::Relaxed),
            rounds: self.rounds.load(Ordering::Relaxed),
            degraded_responses: self.degraded_responses.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }

    /// Get LLM error rate
    pub fn llm_error_rate(&self) -> f64 {
        let total = self.llm_calls.load(Ordering::Relaxed);
        let errors = self.llm_errors.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            errors as f64 / total as f64
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub llm_calls: u64,
    pub llm_errors: u64,
    pub tokens_used: u64,
    pub debates: u64,
    pub debates_failed: u64,
    pub rounds: u64,
    pub degraded_responses: u64,
    pub cancelled: u64,
}

impl MetricsSnapshot {
    /// Export metrics in Prometheus text format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();
        let counters = [
            ("dissent_llm_calls_total", "Total number of LLM API calls", self.llm_calls),
            ("dissent_llm_errors_total", "Total number of LLM API errors", self.llm_errors),
            ("dissent_tokens_used_total", "Total tokens consumed by LLM calls", self.tokens_used),
            ("dissent_debates_total", "Total number of debates started", self.debates),
            ("dissent_debates_failed_total", "Debates ending in an error", self.debates_failed),
            ("dissent_rounds_total", "Debate rounds executed", self.rounds),
            ("dissent_degraded_responses_total", "Agent responses degraded after retry", self.degraded_responses),
            ("dissent_cancelled_total", "Sessions cancelled by their consumer", self.cancelled),
        ];
        for (name, help, value) in counters {
            output.push_str(&format!("# HELP {} {}\n", name, help));
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, value));
        }

        let error_rate = if self.llm_calls > 0 {
            self.llm_errors as f64 / self.llm_calls as f64
        } else {
            0.0
        };
        output.push_str("# HELP dissent_llm_error_rate Current LLM error rate\n");
        output.push_str("# TYPE dissent_llm_error_rate gauge\n");
        output.push_str(&format!("dissent_llm_error_rate {:.4}\n", error_rate));

        output
    }
}

/// Timer for measuring stage durations
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    name: &'static str,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let elapsed = self.elapsed();
        if elapsed > Duration::from_secs(10) {
            tracing::debug!(stage = self.name, elapsed_ms = elapsed.as_millis() as u64, "slow stage");
        }
    }
}

/// Global metrics instance
static GLOBAL_METRICS: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

/// Get or initialize global metrics
pub fn global_metrics() -> Arc<Metrics> {
    GLOBAL_METRICS
        .get_or_init(|| Arc::new(Metrics::new()))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        metrics.record_llm_call(100, false);
        metrics.record_llm_call(50, true);
        metrics.record_debate();
        metrics.record_round();
        metrics.record_round();
        metrics.record_degraded();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.llm_calls, 2);
        assert_eq!(snapshot.llm_errors, 1);
        assert_eq!(snapshot.tokens_used, 150);
        assert_eq!(snapshot.debates, 1);
        assert_eq!(snapshot.rounds, 2);
        assert_eq!(snapshot.degraded_responses, 1);
        assert_eq!(metrics.llm_error_rate(), 0.5);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();
        metrics.record_debate();
        let text = metrics.snapshot().to_prometheus();
        assert!(text.contains("# TYPE dissent_debates_total counter"));
        assert!(text.contains("dissent_debates_total 1\n"));
        assert!(text.contains("dissent_llm_error_rate 0.0000"));
    }

    #[test]
    fn test_timer() {
        let timer = Timer::new("retrieval");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10);
        assert_eq!(timer.name(), "retrieval");
    }
}
