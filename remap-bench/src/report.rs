//! Console report and JSON output

use std::path::Path;

use anyhow::{Context, Result};

use crate::approach::{HYBRID, KERNEL_MODULE};
use crate::result::BenchmarkResult;

const WIDE: usize = 80;

/// Comparison table, one row per approach
pub fn table(results: &[BenchmarkResult]) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{:<26} {:<12} {:<10} {:<10} {:<12}",
            "Approach", "Avg Latency", "CPU Usage", "Memory", "Reliability"
        ),
        "-".repeat(WIDE),
    ];
    lines.extend(results.iter().map(|r| {
        format!(
            "{:<25}{} {:<10.2}ms {:<8.1}% {:<8.1}MB {:<10.1}%",
            r.approach,
            if r.simulated { "*" } else { " " },
            r.avg_latency_ms,
            r.cpu_usage_percent,
            r.memory_usage_mb,
            r.reliability_percent
        )
    }));
    if results.iter().any(|r| r.simulated) {
        lines.push("* simulated or estimated, not measured".to_string());
    }
    lines
}

/// Per-approach breakdown
pub fn details(results: &[BenchmarkResult]) -> Vec<String> {
    results
        .iter()
        .flat_map(|r| {
            [
                String::new(),
                format!("{}:", r.approach),
                format!(
                    "  Latency: {:.2}ms avg (min: {:.2}ms, max: {:.2}ms, std: {:.2}ms)",
                    r.avg_latency_ms, r.min_latency_ms, r.max_latency_ms, r.std_latency_ms
                ),
                format!(
                    "  Resource Usage: {:.1}% CPU, {:.1}MB RAM",
                    r.cpu_usage_percent, r.memory_usage_mb
                ),
                format!(
                    "  Reliability: {}/{} events ({:.1}%)",
                    r.delivered_events(),
                    r.total_events,
                    r.reliability_percent
                ),
            ]
        })
        .collect()
}

/// Best approach per metric
#[derive(Debug)]
pub struct Recommendations<'a> {
    pub latency: &'a BenchmarkResult,
    pub cpu: &'a BenchmarkResult,
    pub memory: &'a BenchmarkResult,
    pub reliability: &'a BenchmarkResult,
}

/// `None` unless there is more than one approach to compare
pub fn recommend(results: &[BenchmarkResult]) -> Option<Recommendations<'_>> {
    if results.len() < 2 {
        return None;
    }
    let min_by = |key: fn(&BenchmarkResult) -> f64| {
        results.iter().min_by(|a, b| key(*a).total_cmp(&key(*b)))
    };

    Some(Recommendations {
        latency: min_by(|r| r.avg_latency_ms)?,
        cpu: min_by(|r| r.cpu_usage_percent)?,
        memory: min_by(|r| r.memory_usage_mb)?,
        // Reversed so ties keep the first entry, like the other metrics
        reliability: results
            .iter()
            .min_by(|a, b| b.reliability_percent.total_cmp(&a.reliability_percent))?,
    })
}

fn overall(results: &[BenchmarkResult]) -> &'static [&'static str] {
    let has = |name: &str| results.iter().any(|r| r.approach == name);
    if has(KERNEL_MODULE) {
        &[
            "KERNEL MODULE - lowest latency and resource usage (simulated figures)",
            "   - Latency ~0.1-0.2ms",
            "   - No daemon or root needed once loaded",
        ]
    } else if has(HYBRID) {
        &[
            "HYBRID APPROACH - balance of performance and configurability (estimated figures)",
            "   - Latency ~0.15ms",
            "   - Bindings stay configurable in userspace",
        ]
    } else {
        &[
            "USERSPACE - fine for everyday use, higher overhead",
            "   - Latency in the 1-10ms range",
            "   - Requires root to read input devices",
        ]
    }
}

/// Recommendation section
pub fn recommendations(results: &[BenchmarkResult]) -> Vec<String> {
    let Some(best) = recommend(results) else {
        return vec!["Not enough approaches to compare".to_string()];
    };

    let mut lines = vec![
        format!(
            "Best Latency: {} ({:.2}ms)",
            best.latency.approach, best.latency.avg_latency_ms
        ),
        format!(
            "Best CPU Usage: {} ({:.1}%)",
            best.cpu.approach, best.cpu.cpu_usage_percent
        ),
        format!(
            "Best Memory Usage: {} ({:.1}MB)",
            best.memory.approach, best.memory.memory_usage_mb
        ),
        format!(
            "Best Reliability: {} ({:.1}%)",
            best.reliability.approach, best.reliability.reliability_percent
        ),
        String::new(),
        "Overall Recommendation:".to_string(),
    ];
    lines.extend(overall(results).iter().map(|l| l.to_string()));
    lines
}

/// Full console report, one entry per line
pub fn render(results: &[BenchmarkResult]) -> Vec<String> {
    let rule = "=".repeat(WIDE);
    let mut lines = vec![
        rule.clone(),
        "PERFORMANCE BENCHMARK RESULTS".to_string(),
        rule.clone(),
        String::new(),
    ];
    lines.extend(table(results));
    lines.push(String::new());
    lines.push("Detailed Results:".to_string());
    lines.push("-".repeat(40));
    lines.extend(details(results));
    lines.push(String::new());
    lines.push(rule.clone());
    lines.push("RECOMMENDATIONS".to_string());
    lines.push(rule);
    lines.extend(recommendations(results));
    lines
}

/// Write all results as a pretty JSON array
pub fn save_json(results: &[BenchmarkResult], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
