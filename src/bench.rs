//! Benchmark harness for text-generation throughput
//!
//! Drives an [`LlmPipeline`] with a streaming callback, accumulating token
//! counts and wall-clock time per iteration. The session is always closed,
//! also when generation fails mid-run.

use std::io::Write;
use std::time::Instant;

use serde::Serialize;

use crate::error::{MedirError, Result};
use crate::pipeline::{GenerationConfig, LlmPipeline, StreamControl};

/// Configuration for a benchmark run
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Measured iterations
    pub iterations: usize,
    /// Unmeasured warmup iterations before the measurement loop
    pub warmup_iterations: usize,
    /// Generation parameters passed to the pipeline
    pub generation: GenerationConfig,
    /// Print fragments to stdout as they arrive
    pub echo: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            iterations: 1,
            warmup_iterations: 0,
            generation: GenerationConfig::default(),
            echo: false,
        }
    }
}

/// Tokens per second for a given count and elapsed time.
///
/// Guards against zero or negative elapsed time instead of dividing.
#[must_use]
pub fn tokens_per_second(tokens: usize, elapsed_s: f64) -> f64 {
    if elapsed_s > 0.0 {
        tokens as f64 / elapsed_s
    } else {
        0.0
    }
}

/// Latency percentile summary over the measured iterations
#[derive(Debug, Clone, Serialize)]
pub struct LatencySummary {
    /// Mean latency (ms)
    pub mean_ms: f64,
    /// P50 latency (ms)
    pub p50_ms: f64,
    /// P99 latency (ms)
    pub p99_ms: f64,
}

impl LatencySummary {
    /// Compute mean/p50/p99 from raw latency samples in milliseconds
    #[must_use]
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self {
                mean_ms: 0.0,
                p50_ms: 0.0,
                p99_ms: 0.0,
            };
        }

        let mean_ms = samples.iter().sum::<f64>() / samples.len() as f64;

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let p50_idx = sorted.len() / 2;
        let p99_idx = (sorted.len() * 99 / 100).min(sorted.len() - 1);

        Self {
            mean_ms,
            p50_ms: sorted[p50_idx],
            p99_ms: sorted[p99_idx],
        }
    }
}

/// Results of a benchmark run against one backend
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    /// Backend label
    pub backend: String,
    /// Measured iterations
    pub iterations: usize,
    /// Tokens generated in the last iteration
    pub tokens_generated: usize,
    /// Mean wall-clock generation time in seconds
    pub inference_time_s: f64,
    /// Mean client-side throughput (tokens/sec)
    pub tokens_per_second: f64,
    /// Backend-side throughput when the server reports one
    pub backend_tokens_per_second: Option<f64>,
    /// Latency percentiles over the iterations
    pub latency: LatencySummary,
    /// Raw per-iteration latencies (ms)
    pub latency_samples_ms: Vec<f64>,
    /// Generated text from the last iteration
    #[serde(skip)]
    pub answer: String,
}

/// Two benchmark reports over the same prompt, for backend comparison
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    /// Report for the primary backend
    pub primary: BenchmarkReport,
    /// Report for the comparison backend
    pub secondary: BenchmarkReport,
}

impl ComparisonReport {
    /// Primary throughput relative to secondary (1.0 = equal)
    #[must_use]
    pub fn speedup(&self) -> Option<f64> {
        if self.secondary.tokens_per_second > 0.0 {
            Some(self.primary.tokens_per_second / self.secondary.tokens_per_second)
        } else {
            None
        }
    }
}

/// Runs the generate-and-measure loop against a pipeline
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
}

impl BenchmarkRunner {
    /// Create a runner with the given configuration
    #[must_use]
    pub fn new(config: BenchmarkConfig) -> Self {
        Self { config }
    }

    /// Create a runner with default configuration (single iteration)
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(BenchmarkConfig::default())
    }

    /// The runner's configuration
    #[must_use]
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Run the benchmark: open a session, measure, close the session.
    ///
    /// The session is closed even when the measurement loop errors out.
    ///
    /// # Errors
    /// Returns an error for zero iterations, an unreachable backend, or a
    /// failed generation.
    pub fn run(&self, pipeline: &mut dyn LlmPipeline, prompt: &str) -> Result<BenchmarkReport> {
        if self.config.iterations == 0 {
            return Err(MedirError::InvalidConfiguration {
                reason: "iterations must be at least 1".to_string(),
            });
        }

        pipeline.start_chat()?;
        let outcome = self.run_iterations(pipeline, prompt);
        let teardown = pipeline.finish_chat();

        let report = outcome?;
        teardown?;
        Ok(report)
    }

    fn run_iterations(
        &self,
        pipeline: &mut dyn LlmPipeline,
        prompt: &str,
    ) -> Result<BenchmarkReport> {
        // Warmup errors are expected while the server spins up the model
        for _ in 0..self.config.warmup_iterations {
            drop(pipeline.generate(prompt, &self.config.generation, &mut |_fragment: &str| {
                StreamControl::Continue
            }));
        }

        let mut latencies_ms = Vec::with_capacity(self.config.iterations);
        let mut tps_samples = Vec::with_capacity(self.config.iterations);
        let mut answer = String::new();
        let mut tokens_generated = 0usize;
        let mut backend_tps = None;

        for _ in 0..self.config.iterations {
            let mut streamed_tokens = 0usize;
            let mut streamed_text = String::new();
            let echo = self.config.echo;

            let start = Instant::now();
            let output = {
                let mut streamer = |fragment: &str| {
                    streamed_tokens += fragment.split_whitespace().count();
                    streamed_text.push_str(fragment);
                    if echo {
                        print!("{fragment}");
                        let _ = std::io::stdout().flush();
                    }
                    StreamControl::Continue
                };
                pipeline.generate(prompt, &self.config.generation, &mut streamer)?
            };
            let elapsed_s = start.elapsed().as_secs_f64();

            // Prefer the backend's own token count over the whitespace estimate
            let tokens = if output.tokens_generated > 0 {
                output.tokens_generated
            } else {
                streamed_tokens
            };

            latencies_ms.push(elapsed_s * 1000.0);
            tps_samples.push(tokens_per_second(tokens, elapsed_s));
            tokens_generated = tokens;
            answer = if output.text.is_empty() {
                streamed_text
            } else {
                output.text
            };
            backend_tps = output.backend_tps.or(backend_tps);
        }

        let latency = LatencySummary::from_samples(&latencies_ms);
        let mean_tps = tps_samples.iter().sum::<f64>() / tps_samples.len() as f64;

        Ok(BenchmarkReport {
            backend: pipeline.name().to_string(),
            iterations: self.config.iterations,
            tokens_generated,
            inference_time_s: latency.mean_ms / 1000.0,
            tokens_per_second: mean_tps,
            backend_tokens_per_second: backend_tps,
            latency,
            latency_samples_ms: latencies_ms,
            answer,
        })
    }
}
