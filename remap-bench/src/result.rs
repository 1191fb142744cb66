//! Benchmark records and latency statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of a set of latency samples, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencyStats {
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Sample standard deviation; zero with fewer than two samples
    pub std_ms: f64,
}

impl LatencyStats {
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let n = samples.len() as f64;
        let avg = samples.iter().sum::<f64>() / n;
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let std = if samples.len() > 1 {
            let var = samples.iter().map(|s| (s - avg).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        } else {
            0.0
        };

        Self {
            avg_ms: avg,
            min_ms: min,
            max_ms: max,
            std_ms: std,
        }
    }
}

/// Mean of resource samples, zero when nothing was sampled
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        0.0
    } else {
        samples.iter().sum::<f64>() / samples.len() as f64
    }
}

/// One approach's measurements, as written to the JSON report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub approach: String,
    pub avg_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub std_latency_ms: f64,
    pub cpu_usage_percent: f64,
    pub memory_usage_mb: f64,
    pub missed_events: u64,
    pub total_events: u64,
    pub reliability_percent: f64,
    /// True when the numbers are generated rather than measured
    pub simulated: bool,
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkResult {
    pub fn new(approach: impl Into<String>, latency: LatencyStats, simulated: bool) -> Self {
        Self {
            approach: approach.into(),
            avg_latency_ms: latency.avg_ms,
            min_latency_ms: latency.min_ms,
            max_latency_ms: latency.max_ms,
            std_latency_ms: latency.std_ms,
            cpu_usage_percent: 0.0,
            memory_usage_mb: 0.0,
            missed_events: 0,
            total_events: 0,
            reliability_percent: 0.0,
            simulated,
            timestamp: Utc::now(),
        }
    }

    pub fn with_resources(mut self, cpu_percent: f64, memory_mb: f64) -> Self {
        self.cpu_usage_percent = cpu_percent;
        self.memory_usage_mb = memory_mb;
        self
    }

    /// Set event counts and derive reliability
    pub fn with_events(mut self, total: u64, missed: u64) -> Self {
        self.total_events = total;
        self.missed_events = missed.min(total);
        self.reliability_percent = reliability(total, self.missed_events);
        self
    }

    pub fn delivered_events(&self) -> u64 {
        self.total_events - self.missed_events
    }
}

/// Percentage of delivered events; zero when there were none
pub fn reliability(total: u64, missed: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (total.saturating_sub(missed)) as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_stats_empty_and_single() {
        assert_eq!(LatencyStats::from_samples(&[]), LatencyStats::default());

        let one = LatencyStats::from_samples(&[1.5]);
        assert!(close(one.avg_ms, 1.5));
        assert!(close(one.min_ms, 1.5));
        assert!(close(one.max_ms, 1.5));
        assert_eq!(one.std_ms, 0.0);
    }

    #[test]
    fn test_stats_sample_std_dev() {
        let stats = LatencyStats::from_samples(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!(close(stats.avg_ms, 5.0));
        assert!(close(stats.min_ms, 2.0));
        assert!(close(stats.max_ms, 9.0));
        // Sample (n-1) variance: 32 / 7
        assert!(close(stats.std_ms, (32.0f64 / 7.0).sqrt()));
    }

    #[test]
    fn test_reliability() {
        assert_eq!(reliability(0, 0), 0.0);
        assert!(close(reliability(300, 0), 100.0));
        assert!(close(reliability(200, 50), 75.0));
    }

    #[test]
    fn test_missed_clamped_to_total() {
        let result = BenchmarkResult::new("x", LatencyStats::default(), true).with_events(10, 20);
        assert_eq!(result.missed_events, 10);
        assert_eq!(result.delivered_events(), 0);
        assert_eq!(result.reliability_percent, 0.0);
    }

    #[test]
    fn test_json_fields() {
        let result = BenchmarkResult::new("Hybrid (Estimated)", LatencyStats::default(), true)
            .with_events(300, 0);
        let json = serde_json::to_value(&result).unwrap();
        for key in [
            "approach",
            "avg_latency_ms",
            "min_latency_ms",
            "max_latency_ms",
            "std_latency_ms",
            "cpu_usage_percent",
            "memory_usage_mb",
            "missed_events",
            "total_events",
            "reliability_percent",
            "simulated",
            "timestamp",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["total_events"], 300);
        assert_eq!(json["simulated"], true);
    }
}
