//! Benchmark result formatting and persistence
//!
//! Renders the console summary and comparison table, exports the JSON
//! report, and writes the optional answer file. Formatting returns strings
//! so the exact output can be asserted in tests.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::bench::{BenchmarkReport, ComparisonReport};
use crate::error::{MedirError, Result};

/// JSON report schema version
pub const REPORT_VERSION: &str = "1.0";

/// Render the single-backend benchmark summary
#[must_use]
pub fn format_summary(report: &BenchmarkReport, model: &str, device: &str) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "----------");
    let _ = writeln!(out, "Model: {model}");
    let _ = writeln!(out, "Device: {device}");
    let _ = writeln!(out, "Backend: {}", report.backend);
    let _ = writeln!(
        out,
        "Inferencing time: {:.4} seconds",
        report.inference_time_s
    );
    let _ = writeln!(out, "Tokens generated: {}", report.tokens_generated);
    let _ = writeln!(out, "Tokens per second: {:.2}", report.tokens_per_second);

    if let Some(backend_tps) = report.backend_tokens_per_second {
        let _ = writeln!(out, "Backend-reported tokens/sec: {backend_tps:.2}");
    }

    if report.iterations > 1 {
        let _ = writeln!(out);
        let _ = writeln!(out, "Latency over {} iterations (ms):", report.iterations);
        let _ = writeln!(out, "  Mean: {:.1}", report.latency.mean_ms);
        let _ = writeln!(out, "  p50:  {:.1}", report.latency.p50_ms);
        let _ = writeln!(out, "  p99:  {:.1}", report.latency.p99_ms);
    }

    out
}

/// Render the two-backend comparison table
#[must_use]
pub fn format_comparison(comparison: &ComparisonReport, model: &str, device: &str) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "----------");
    let _ = writeln!(out, "Model: {model}");
    let _ = writeln!(out, "Device: {device}");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<12} {:>10} {:>12} {:>12} {:>12}",
        "Backend", "Tokens", "Mean (ms)", "p50 (ms)", "tok/s"
    );
    let _ = writeln!(out, "{}", "-".repeat(62));

    for report in [&comparison.primary, &comparison.secondary] {
        let _ = writeln!(
            out,
            "{:<12} {:>10} {:>12.1} {:>12.1} {:>12.2}",
            report.backend,
            report.tokens_generated,
            report.latency.mean_ms,
            report.latency.p50_ms,
            report.tokens_per_second
        );
    }

    let _ = writeln!(out);
    match comparison.speedup() {
        Some(speedup) => {
            let _ = writeln!(
                out,
                "{} is {:.2}x the throughput of {}",
                comparison.primary.backend, speedup, comparison.secondary.backend
            );
        },
        None => {
            let _ = writeln!(out, "Comparison backend produced no throughput sample");
        },
    }

    out
}

fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Build the JSON document for a single-backend run
#[must_use]
pub fn to_json(report: &BenchmarkReport, model: &str, device: &str) -> serde_json::Value {
    serde_json::json!({
        "version": REPORT_VERSION,
        "timestamp": unix_timestamp(),
        "model": model,
        "device": device,
        "results": report,
    })
}

/// Build the JSON document for a comparison run
#[must_use]
pub fn comparison_to_json(
    comparison: &ComparisonReport,
    model: &str,
    device: &str,
) -> serde_json::Value {
    serde_json::json!({
        "version": REPORT_VERSION,
        "timestamp": unix_timestamp(),
        "model": model,
        "device": device,
        "results": comparison,
        "speedup": comparison.speedup(),
    })
}

/// Write a JSON document pretty-printed to `path`
///
/// # Errors
/// Returns an error if serialization or the write fails.
pub fn write_json(path: &Path, document: &serde_json::Value) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(document).map_err(|e| MedirError::FormatError {
            reason: format!("Failed to serialize report: {e}"),
        })?;

    fs::write(path, rendered).map_err(|e| MedirError::IoError {
        message: format!("Failed to write {}: {e}", path.display()),
    })
}

/// Write the generated answer text to `path`
///
/// # Errors
/// Returns an error if the write fails.
pub fn write_answer(path: &Path, answer: &str) -> Result<()> {
    fs::write(path, answer).map_err(|e| MedirError::IoError {
        message: format!("Failed to write {}: {e}", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::LatencySummary;

    fn sample_report(backend: &str, tps: f64) -> BenchmarkReport {
        BenchmarkReport {
            backend: backend.to_string(),
            iterations: 1,
            tokens_generated: 100,
            inference_time_s: 2.5,
            tokens_per_second: tps,
            backend_tokens_per_second: None,
            latency: LatencySummary::from_samples(&[2500.0]),
            latency_samples_ms: vec![2500.0],
            answer: "generated text".to_string(),
        }
    }

    #[test]
    fn test_summary_contains_expected_rows() {
        let report = sample_report("ollama", 40.0);
        let summary = format_summary(&report, "models/llama", "Intel CPU");

        assert!(summary.contains("----------"));
        assert!(summary.contains("Inferencing time: 2.5000 seconds"));
        assert!(summary.contains("Tokens generated: 100"));
        assert!(summary.contains("Tokens per second: 40.00"));
        assert!(summary.contains("Model: models/llama"));
        assert!(summary.contains("Device: Intel CPU"));
    }

    #[test]
    fn test_summary_skips_latency_block_for_single_iteration() {
        let report = sample_report("ollama", 40.0);
        let summary = format_summary(&report, "m", "d");
        assert!(!summary.contains("Latency over"));
    }

    #[test]
    fn test_summary_includes_latency_block_for_multiple_iterations() {
        let mut report = sample_report("ollama", 40.0);
        report.iterations = 5;
        let summary = format_summary(&report, "m", "d");
        assert!(summary.contains("Latency over 5 iterations"));
        assert!(summary.contains("p99:"));
    }

    #[test]
    fn test_summary_reports_backend_tps_when_present() {
        let mut report = sample_report("ollama", 40.0);
        report.backend_tokens_per_second = Some(42.5);
        let summary = format_summary(&report, "m", "d");
        assert!(summary.contains("Backend-reported tokens/sec: 42.50"));
    }

    #[test]
    fn test_comparison_table_lists_both_backends() {
        let comparison = ComparisonReport {
            primary: sample_report("ollama", 40.0),
            secondary: sample_report("llama-cpp", 20.0),
        };
        let table = format_comparison(&comparison, "m", "d");

        assert!(table.contains("ollama"));
        assert!(table.contains("llama-cpp"));
        assert!(table.contains("Backend"));
        assert!(table.contains("tok/s"));
        assert!(table.contains("2.00x"));
    }

    #[test]
    fn test_json_document_shape() {
        let report = sample_report("ollama", 40.0);
        let doc = to_json(&report, "models/llama", "CPU");

        assert_eq!(doc["version"], REPORT_VERSION);
        assert_eq!(doc["model"], "models/llama");
        assert_eq!(doc["results"]["backend"], "ollama");
        assert_eq!(doc["results"]["tokens_generated"], 100);
        // The raw answer stays out of the JSON report
        assert!(doc["results"].get("answer").is_none());
    }

    #[test]
    fn test_write_answer_and_json() {
        let dir = tempfile::tempdir().unwrap();

        let answer_path = dir.path().join("answer.txt");
        write_answer(&answer_path, "the answer").unwrap();
        assert_eq!(fs::read_to_string(&answer_path).unwrap(), "the answer");

        let json_path = dir.path().join("results.json");
        let report = sample_report("ollama", 40.0);
        write_json(&json_path, &to_json(&report, "m", "d")).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed["version"], REPORT_VERSION);
    }
}
