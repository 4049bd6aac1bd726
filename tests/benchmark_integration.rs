//! Integration tests for the benchmark flow
//!
//! Exercises the pieces the CLI wires together, using a temp model
//! directory and the mock pipeline. No network access.

use std::fs;
use std::path::Path;
use std::time::Duration;

use medir::bench::{BenchmarkConfig, BenchmarkRunner, ComparisonReport};
use medir::chat_template::build_prompt;
use medir::pipeline::{GenerationConfig, MockPipeline};
use medir::report;
use medir::tokenizer_config::{
    default_chat_template, ensure_chat_template, load_tokenizer_config, TemplateStatus,
    TOKENIZER_CONFIG_FILE,
};

fn write_model_dir(dir: &Path, config_body: &str) {
    fs::write(dir.join(TOKENIZER_CONFIG_FILE), config_body).unwrap();
}

#[test]
fn patched_model_dir_builds_raw_prompt() {
    let dir = tempfile::tempdir().unwrap();
    write_model_dir(dir.path(), r#"{"bos_token": "<s>"}"#);

    // First touch installs the default template
    assert_eq!(
        ensure_chat_template(dir.path()).unwrap(),
        TemplateStatus::Added
    );

    // The stringified default is not a Jinja template, so prompt
    // construction falls back to raw passthrough
    let prompt = build_prompt(dir.path(), "Why is the sky blue?", None).unwrap();
    assert_eq!(prompt, "Why is the sky blue?");

    let with_system = build_prompt(dir.path(), "Hi", Some("Be terse.")).unwrap();
    assert_eq!(with_system, "System: Be terse.\n\nHi");
}

#[test]
fn jinja_model_dir_renders_chat_template() {
    let dir = tempfile::tempdir().unwrap();
    let config = serde_json::json!({
        "chat_template": "{% for m in messages %}[{{ m.role }}]{{ m.content }}{% endfor %}",
        "eos_token": "</s>"
    });
    write_model_dir(dir.path(), &config.to_string());

    assert_eq!(
        ensure_chat_template(dir.path()).unwrap(),
        TemplateStatus::Present
    );

    let prompt = build_prompt(dir.path(), "Hello", Some("Be brief.")).unwrap();
    assert_eq!(prompt, "[system]Be brief.[user]Hello");
}

#[test]
fn patch_then_benchmark_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_model_dir(dir.path(), "{}");
    ensure_chat_template(dir.path()).unwrap();

    let config = load_tokenizer_config(dir.path()).unwrap();
    assert_eq!(
        config.chat_template.as_deref(),
        Some(default_chat_template().as_str())
    );

    let prompt = build_prompt(dir.path(), "Count to five", None).unwrap();

    let mut pipeline = MockPipeline::from_text("one two three four five");
    let runner = BenchmarkRunner::with_defaults();
    let bench_report = runner.run(&mut pipeline, &prompt).unwrap();

    assert_eq!(bench_report.tokens_generated, 5);
    assert_eq!(bench_report.answer, "one two three four five");
    assert_eq!(pipeline.sessions_finished, 1);

    // Summary carries the original console rows
    let summary = report::format_summary(&bench_report, "test-model", "CPU");
    assert!(summary.contains("Tokens generated: 5"));
    assert!(summary.contains("Tokens per second:"));
    assert!(summary.starts_with("----------"));
}

#[test]
fn multi_iteration_run_collects_latency_samples() {
    let runner = BenchmarkRunner::new(BenchmarkConfig {
        iterations: 4,
        warmup_iterations: 1,
        generation: GenerationConfig::default(),
        echo: false,
    });

    let mut pipeline = MockPipeline::from_text("alpha beta gamma")
        .with_fragment_delay(Duration::from_millis(1));
    let bench_report = runner.run(&mut pipeline, "prompt").unwrap();

    assert_eq!(bench_report.iterations, 4);
    assert_eq!(bench_report.latency_samples_ms.len(), 4);
    assert!(bench_report.latency.mean_ms > 0.0);
    assert!(bench_report.latency.p99_ms >= bench_report.latency.p50_ms);
    assert!(bench_report.tokens_per_second > 0.0);
}

#[test]
fn comparison_run_produces_table_and_json() {
    let runner = BenchmarkRunner::with_defaults();

    let mut fast = MockPipeline::from_text("a b c d e f");
    let mut slow =
        MockPipeline::from_text("a b c d e f").with_fragment_delay(Duration::from_millis(3));

    let comparison = ComparisonReport {
        primary: runner.run(&mut fast, "p").unwrap(),
        secondary: runner.run(&mut slow, "p").unwrap(),
    };

    let table = report::format_comparison(&comparison, "test-model", "CPU");
    assert!(table.contains("Backend"));
    assert!(table.contains("mock"));

    let doc = report::comparison_to_json(&comparison, "test-model", "CPU");
    assert_eq!(doc["model"], "test-model");
    assert!(doc["results"]["primary"]["tokens_per_second"].is_number());
    assert!(doc["speedup"].is_number());
}

#[test]
fn answer_and_json_files_are_written() {
    let dir = tempfile::tempdir().unwrap();

    let mut pipeline = MockPipeline::from_text("persisted answer text");
    let runner = BenchmarkRunner::with_defaults();
    let bench_report = runner.run(&mut pipeline, "p").unwrap();

    let answer_path = dir.path().join("answer.txt");
    report::write_answer(&answer_path, &bench_report.answer).unwrap();
    assert_eq!(
        fs::read_to_string(&answer_path).unwrap(),
        "persisted answer text"
    );

    let json_path = dir.path().join("results.json");
    report::write_json(&json_path, &report::to_json(&bench_report, "m", "d")).unwrap();
    let doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(doc["results"]["tokens_generated"], 3);
}

#[test]
fn missing_model_dir_fails_before_any_network_access() {
    let dir = tempfile::tempdir().unwrap();
    // No tokenizer_config.json written
    let err = ensure_chat_template(dir.path()).unwrap_err();
    assert!(err.to_string().contains("Tokenizer configuration file"));
}
