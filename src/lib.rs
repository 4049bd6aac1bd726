//! # Medir
//!
//! Throughput benchmarking for locally served language models.
//!
//! Medir (Spanish: "to measure") drives a local inference backend with a
//! streaming callback and measures text-generation throughput: it patches
//! the model's `tokenizer_config.json` when the `chat_template` field is
//! missing, loads a prompt from a file, streams a generation, accumulates
//! token counts and wall-clock time, and prints or persists a benchmark
//! summary. A second backend can be benchmarked on the same prompt for
//! comparison.
//!
//! All model execution is delegated to external backends (Ollama,
//! llama.cpp, OpenAI-compatible servers) through the narrow
//! [`pipeline::LlmPipeline`] contract; no model loading, tokenization,
//! scheduling, or batching happens in this crate.
//!
//! ## Example
//!
//! ```rust
//! use medir::bench::BenchmarkRunner;
//! use medir::pipeline::MockPipeline;
//!
//! let mut pipeline = MockPipeline::from_text("streamed benchmark output");
//! let runner = BenchmarkRunner::with_defaults();
//! let report = runner.run(&mut pipeline, "prompt").unwrap();
//! assert_eq!(report.tokens_generated, 3);
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // usize -> f64 for throughput math
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

/// Benchmark harness: measurement loop, latency statistics, reports
pub mod bench;
/// Chat template detection and rendering for prompt construction
pub mod chat_template;
/// CLI argument parsing and command implementation
pub mod cli;
/// Device identity (CPU/GPU model names) for report headers
pub mod device;
pub mod error;
/// HTTP client and pipeline adapter for local model servers
pub mod http_client;
/// The session contract to an external inference backend
pub mod pipeline;
/// Result formatting, JSON export, and answer persistence
pub mod report;
/// `tokenizer_config.json` inspection and chat template patching
pub mod tokenizer_config;

// Re-exports for convenience
pub use error::{MedirError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
