//! The narrow call contract to an inference backend
//!
//! All model execution is delegated to an external runtime; this module
//! defines the session shape the benchmark drives: start a chat session,
//! generate with a streaming callback, finish the session. The callback
//! runs inline on the calling thread, once per generated text fragment.

use std::time::Duration;

use crate::error::{MedirError, Result};

/// Generation parameters passed to a pipeline
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Maximum number of tokens to generate
    pub max_new_tokens: usize,
    /// Sampling temperature (0.0 = deterministic)
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: 100,
            temperature: 0.7,
        }
    }
}

/// Decision returned by the streaming callback after each fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamControl {
    /// Keep generating
    Continue,
    /// Abort generation
    Stop,
}

/// Streaming callback invoked once per generated text fragment
pub type Streamer<'a> = dyn FnMut(&str) -> StreamControl + 'a;

/// What a pipeline reports after a completed generation
#[derive(Debug, Clone, Default)]
pub struct GenerationOutput {
    /// Full generated text
    pub text: String,
    /// Token count as reported by the backend, 0 if unreported
    pub tokens_generated: usize,
    /// Backend-side tokens/sec measurement, when the backend reports one
    pub backend_tps: Option<f64>,
}

/// Session contract for an external inference backend
pub trait LlmPipeline {
    /// Short backend label used in reports
    fn name(&self) -> &str;

    /// Open a chat session. Default is a no-op for stateless backends.
    ///
    /// # Errors
    /// Returns an error if the backend is unreachable.
    fn start_chat(&mut self) -> Result<()> {
        Ok(())
    }

    /// Generate text for `prompt`, invoking `streamer` per fragment.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    fn generate(
        &mut self,
        prompt: &str,
        config: &GenerationConfig,
        streamer: &mut Streamer<'_>,
    ) -> Result<GenerationOutput>;

    /// Close the chat session. Default is a no-op.
    ///
    /// # Errors
    /// Returns an error if session teardown fails.
    fn finish_chat(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Deterministic in-process pipeline for tests and benches.
///
/// Emits a fixed fragment sequence through the streamer, optionally
/// sleeping between fragments to simulate generation latency.
#[derive(Debug, Clone)]
pub struct MockPipeline {
    fragments: Vec<String>,
    fragment_delay: Option<Duration>,
    reported_tokens: Option<usize>,
    fail_generation: bool,
    session_open: bool,
    /// Number of chat sessions that were finished
    pub sessions_finished: usize,
}

impl MockPipeline {
    /// Create a mock emitting the given fragments
    #[must_use]
    pub fn new(fragments: Vec<String>) -> Self {
        Self {
            fragments,
            fragment_delay: None,
            reported_tokens: None,
            fail_generation: false,
            session_open: false,
            sessions_finished: 0,
        }
    }

    /// Create a mock that streams `text` word by word
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut fragments = Vec::new();
        for (i, word) in text.split_whitespace().enumerate() {
            if i == 0 {
                fragments.push(word.to_string());
            } else {
                fragments.push(format!(" {word}"));
            }
        }
        Self::new(fragments)
    }

    /// Sleep for `delay` between fragments
    #[must_use]
    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = Some(delay);
        self
    }

    /// Report `tokens` in the generation output instead of the streamed
    /// word count. Real backends report their own tokenizer's count, which
    /// rarely matches a whitespace split; `0` models a backend that reports
    /// nothing.
    #[must_use]
    pub fn with_reported_tokens(mut self, tokens: usize) -> Self {
        self.reported_tokens = Some(tokens);
        self
    }

    /// Make `generate` fail, for error-path tests
    #[must_use]
    pub fn with_failing_generation(mut self) -> Self {
        self.fail_generation = true;
        self
    }
}

impl LlmPipeline for MockPipeline {
    fn name(&self) -> &str {
        "mock"
    }

    fn start_chat(&mut self) -> Result<()> {
        self.session_open = true;
        Ok(())
    }

    fn generate(
        &mut self,
        _prompt: &str,
        config: &GenerationConfig,
        streamer: &mut Streamer<'_>,
    ) -> Result<GenerationOutput> {
        if self.fail_generation {
            return Err(MedirError::InferenceError(
                "mock generation failure".to_string(),
            ));
        }

        let mut text = String::new();
        let mut tokens = 0usize;

        for fragment in &self.fragments {
            if tokens >= config.max_new_tokens {
                break;
            }
            if let Some(delay) = self.fragment_delay {
                std::thread::sleep(delay);
            }
            text.push_str(fragment);
            tokens += fragment.split_whitespace().count();
            if streamer(fragment) == StreamControl::Stop {
                break;
            }
        }

        Ok(GenerationOutput {
            text,
            tokens_generated: self.reported_tokens.unwrap_or(tokens),
            backend_tps: None,
        })
    }

    fn finish_chat(&mut self) -> Result<()> {
        self.session_open = false;
        self.sessions_finished += 1;
        Ok(())
    }
}
