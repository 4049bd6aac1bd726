//! CLI argument parsing and command implementation
//!
//! The benchmark logic lives here, extracted from `main.rs` for
//! testability; `main.rs` only parses and reports errors.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;

use crate::bench::{BenchmarkConfig, BenchmarkRunner, ComparisonReport};
use crate::chat_template::build_prompt;
use crate::device;
use crate::error::{MedirError, Result};
use crate::http_client::{Backend, HttpPipeline};
use crate::pipeline::GenerationConfig;
use crate::report;
use crate::tokenizer_config::{ensure_chat_template, TemplateStatus};

/// Medir - throughput benchmarking for locally served LLMs
///
/// Patches the model's tokenizer configuration when needed, streams a
/// generation from a local inference backend, and reports tokens/sec.
#[derive(Debug, Parser)]
#[command(name = "medir")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the model directory (must contain tokenizer_config.json)
    #[arg(long, value_name = "DIR")]
    pub model_dir: PathBuf,

    /// Path to the file containing the test prompt
    #[arg(long, value_name = "FILE")]
    pub prompt: PathBuf,

    /// Device identifier for the report (CPU, GPU, or free-form)
    #[arg(long, default_value = "CPU")]
    pub device: String,

    /// Optional system prompt prepended to the conversation
    #[arg(long)]
    pub system: Option<String>,

    /// Inference backend: ollama, llama-cpp, or openai
    #[arg(long, default_value = "ollama")]
    pub backend: String,

    /// Base URL of the backend (defaults to the backend's local port)
    #[arg(long)]
    pub url: Option<String>,

    /// Model name sent to the backend (defaults to the model dir name)
    #[arg(long)]
    pub model_name: Option<String>,

    /// Second backend to benchmark against on the same prompt
    #[arg(long)]
    pub compare_backend: Option<String>,

    /// Base URL of the comparison backend
    #[arg(long)]
    pub compare_url: Option<String>,

    /// Maximum tokens to generate
    #[arg(short = 'n', long, default_value = "100")]
    pub max_tokens: usize,

    /// Sampling temperature (0.0 = deterministic)
    #[arg(long, default_value = "0.7")]
    pub temperature: f32,

    /// Measured benchmark iterations
    #[arg(long, default_value = "1")]
    pub iterations: usize,

    /// Unmeasured warmup iterations
    #[arg(long, default_value = "0")]
    pub warmup: usize,

    /// Write the generated answer to this file
    #[arg(long, value_name = "FILE")]
    pub answer_file: Option<PathBuf>,

    /// Write the JSON report to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Do not echo generated fragments while benchmarking
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Model name reported to the backend and in summaries
    #[must_use]
    pub fn model_label(&self) -> String {
        self.model_name.clone().unwrap_or_else(|| {
            self.model_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.model_dir.display().to_string())
        })
    }
}

fn read_prompt(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(MedirError::IoError {
            message: format!("Prompt file '{}' not found", path.display()),
        });
    }

    let raw = fs::read_to_string(path).map_err(|e| MedirError::IoError {
        message: format!("Failed to read prompt file '{}': {e}", path.display()),
    })?;

    Ok(raw.trim().to_string())
}

fn make_pipeline(backend_str: &str, url: Option<&str>, model: &str) -> Result<HttpPipeline> {
    let backend: Backend = backend_str.parse()?;
    let base_url = url
        .map(str::to_string)
        .unwrap_or_else(|| backend.default_base_url().to_string());
    Ok(HttpPipeline::new(backend, base_url, model))
}

/// Run the benchmark described by the parsed CLI arguments.
///
/// # Errors
/// Returns an error for missing input files, an unknown backend, an
/// unreachable server, or a failed generation.
pub fn entrypoint(cli: &Cli) -> Result<()> {
    if ensure_chat_template(&cli.model_dir)? == TemplateStatus::Added {
        println!("Adding default chat_template to tokenizer_config.json...");
    }

    let user_prompt = read_prompt(&cli.prompt)?;
    let prompt = build_prompt(&cli.model_dir, &user_prompt, cli.system.as_deref())?;

    let model = cli.model_label();
    let device_label = device::device_name(&cli.device);
    let comparing = cli.compare_backend.is_some();

    let mut pipeline = make_pipeline(&cli.backend, cli.url.as_deref(), &model)?;

    let config = BenchmarkConfig {
        iterations: cli.iterations,
        warmup_iterations: cli.warmup,
        generation: GenerationConfig {
            max_new_tokens: cli.max_tokens,
            temperature: cli.temperature,
        },
        // Fragment echo would interleave with the comparison table
        echo: !cli.quiet && !comparing,
    };
    let runner = BenchmarkRunner::new(config);

    println!(
        "Benchmarking the model {} with {}...",
        cli.model_dir.display(),
        cli.prompt.display()
    );

    let primary = runner.run(&mut pipeline, &prompt)?;
    if !cli.quiet && !comparing {
        println!();
    }

    let document = if let Some(ref compare_backend) = cli.compare_backend {
        let mut secondary_pipeline =
            make_pipeline(compare_backend, cli.compare_url.as_deref(), &model)?;
        let secondary = runner.run(&mut secondary_pipeline, &prompt)?;

        let comparison = ComparisonReport { primary, secondary };
        print!("{}", report::format_comparison(&comparison, &model, &device_label));

        if let Some(ref answer_path) = cli.answer_file {
            report::write_answer(answer_path, &comparison.primary.answer)?;
        }
        report::comparison_to_json(&comparison, &model, &device_label)
    } else {
        print!("{}", report::format_summary(&primary, &model, &device_label));

        if let Some(ref answer_path) = cli.answer_file {
            report::write_answer(answer_path, &primary.answer)?;
        }
        report::to_json(&primary, &model, &device_label)
    };

    if let Some(ref output_path) = cli.output {
        report::write_json(output_path, &document)?;
        println!("Results saved to: {}", output_path.display());
    }

    Ok(())
}
