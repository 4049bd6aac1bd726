//! HTTP client for locally served model backends
//!
//! Real HTTP calls to the inference runtimes the benchmark drives:
//!
//! - Ollama: `/api/generate`, NDJSON streaming
//! - llama.cpp: `/completion`, SSE streaming
//! - OpenAI-compatible servers (vLLM, llama.cpp): `/v1/completions`
//!
//! Streaming responses are consumed line by line on the calling thread, so
//! the benchmark's streaming callback fires once per generated fragment.

use std::io::{BufRead, BufReader};
use std::str::FromStr;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::{MedirError, Result};
use crate::pipeline::{GenerationConfig, GenerationOutput, LlmPipeline, StreamControl, Streamer};

/// Nanoseconds per second, for Ollama's duration fields
const NANOS_PER_SEC: f64 = 1_000_000_000.0;

// ============================================================================
// Backend selection
// ============================================================================

/// Inference backend reachable over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Ollama server (`/api/generate`)
    Ollama,
    /// llama.cpp server, native endpoint (`/completion`)
    LlamaCpp,
    /// OpenAI-compatible server such as vLLM (`/v1/completions`)
    OpenAi,
}

impl Backend {
    /// Canonical CLI name of the backend
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::LlamaCpp => "llama-cpp",
            Self::OpenAi => "openai",
        }
    }

    /// Default base URL for a locally running server
    #[must_use]
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::LlamaCpp => "http://localhost:8080",
            Self::OpenAi => "http://localhost:8000",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = MedirError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "llama-cpp" | "llamacpp" | "llama.cpp" => Ok(Self::LlamaCpp),
            "openai" | "vllm" => Ok(Self::OpenAi),
            other => Err(MedirError::UnsupportedOperation {
                operation: "backend selection".to_string(),
                reason: format!("Unknown backend: {other}. Supported: ollama, llama-cpp, openai"),
            }),
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// OpenAI-compatible completion request (vLLM, llama.cpp)
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Input prompt
    pub prompt: String,
    /// Maximum tokens to generate
    pub max_tokens: usize,
    /// Temperature for sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Whether to stream the response
    pub stream: bool,
}

/// OpenAI-compatible completion response
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    /// Completion choices
    pub choices: Vec<CompletionChoice>,
    /// Usage statistics
    pub usage: Option<UsageStats>,
}

/// A single completion choice
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChoice {
    /// Generated text
    pub text: String,
    /// Finish reason
    pub finish_reason: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Deserialize)]
pub struct UsageStats {
    /// Prompt tokens
    pub prompt_tokens: usize,
    /// Completion tokens
    pub completion_tokens: usize,
    /// Total tokens
    pub total_tokens: usize,
}

/// Ollama generate request
#[derive(Debug, Clone, Serialize)]
pub struct OllamaRequest {
    /// Model name
    pub model: String,
    /// Input prompt
    pub prompt: String,
    /// Whether to stream
    pub stream: bool,
    /// Generation options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
}

/// Ollama generation options
#[derive(Debug, Clone, Serialize)]
pub struct OllamaOptions {
    /// Maximum tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<usize>,
    /// Temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// One NDJSON line of a streaming Ollama response
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaStreamChunk {
    /// Generated fragment
    #[serde(default)]
    pub response: String,
    /// Whether generation is done
    #[serde(default)]
    pub done: bool,
    /// Tokens generated (final chunk only)
    #[serde(default)]
    pub eval_count: usize,
    /// Generation duration in nanoseconds (final chunk only)
    #[serde(default)]
    pub eval_duration: u64,
}

/// One SSE event of a streaming llama.cpp response
#[derive(Debug, Clone, Deserialize)]
pub struct LlamaCppStreamChunk {
    /// Generated fragment
    #[serde(default)]
    pub content: String,
    /// Whether generation stopped
    #[serde(default)]
    pub stop: bool,
    /// Tokens predicted so far (final chunk carries the total)
    #[serde(default)]
    pub tokens_predicted: usize,
    /// Timing information (final chunk only)
    #[serde(default)]
    pub timings: Option<LlamaCppTimings>,
}

/// llama.cpp timing information
#[derive(Debug, Clone, Deserialize)]
pub struct LlamaCppTimings {
    /// Predicted tokens
    #[serde(default)]
    pub predicted_n: usize,
    /// Tokens per second for generation
    #[serde(default)]
    pub predicted_per_second: f64,
}

/// Extract the JSON payload from an SSE line, if it carries one
#[must_use]
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let payload = line
        .strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))?;
    let payload = payload.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    Some(payload)
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for model server communication
pub struct ModelHttpClient {
    client: Client,
    timeout_secs: u64,
}

impl Default for ModelHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelHttpClient {
    /// Create a new HTTP client with a 60 second timeout
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(60)
    }

    /// Create a new HTTP client with a custom timeout
    #[must_use]
    pub fn with_timeout(timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_secs))
                .build()
                .expect("Failed to create HTTP client"),
            timeout_secs,
        }
    }

    /// Get the configured timeout
    #[must_use]
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    fn post_json(&self, url: &str, body: &impl Serialize) -> Result<reqwest::blocking::Response> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .map_err(|e| MedirError::ConnectionError(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(MedirError::ConnectionError(format!(
                "HTTP {status} from {url}: {body}"
            )));
        }

        Ok(response)
    }

    /// Call Ollama `/api/generate`, streaming fragments through `streamer`.
    ///
    /// The final NDJSON object carries `eval_count` and `eval_duration`,
    /// which populate the backend-reported token count and tokens/sec.
    ///
    /// # Errors
    /// Returns an error if the request fails or a chunk cannot be parsed.
    pub fn ollama_generate(
        &self,
        base_url: &str,
        request: &OllamaRequest,
        streamer: &mut Streamer<'_>,
    ) -> Result<GenerationOutput> {
        let url = format!("{}/api/generate", base_url.trim_end_matches('/'));
        let response = self.post_json(&url, request)?;

        let mut output = GenerationOutput::default();
        let reader = BufReader::new(response);

        for line in reader.lines() {
            let line = line.map_err(|e| {
                MedirError::ConnectionError(format!("Failed to read response stream: {e}"))
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let chunk: OllamaStreamChunk =
                serde_json::from_str(&line).map_err(|e| MedirError::FormatError {
                    reason: format!("Failed to parse Ollama chunk: {e}"),
                })?;

            if !chunk.response.is_empty() {
                output.text.push_str(&chunk.response);
                if streamer(&chunk.response) == StreamControl::Stop {
                    break;
                }
            }

            if chunk.done {
                output.tokens_generated = chunk.eval_count;
                if chunk.eval_count > 0 && chunk.eval_duration > 0 {
                    output.backend_tps = Some(
                        chunk.eval_count as f64 / (chunk.eval_duration as f64 / NANOS_PER_SEC),
                    );
                }
                break;
            }
        }

        Ok(output)
    }

    /// Call llama.cpp native `/completion`, streaming SSE fragments.
    ///
    /// Note: llama.cpp also has `/v1/completions`, but the native endpoint
    /// reports `tokens_predicted` and timing data directly.
    ///
    /// # Errors
    /// Returns an error if the request fails or a chunk cannot be parsed.
    pub fn llamacpp_completion(
        &self,
        base_url: &str,
        prompt: &str,
        config: &GenerationConfig,
        streamer: &mut Streamer<'_>,
    ) -> Result<GenerationOutput> {
        let url = format!("{}/completion", base_url.trim_end_matches('/'));

        // llama.cpp expects its own field names
        let body = serde_json::json!({
            "prompt": prompt,
            "n_predict": config.max_new_tokens,
            "temperature": config.temperature,
            "stream": true
        });

        let response = self.post_json(&url, &body)?;

        let mut output = GenerationOutput::default();
        let reader = BufReader::new(response);

        for line in reader.lines() {
            let line = line.map_err(|e| {
                MedirError::ConnectionError(format!("Failed to read response stream: {e}"))
            })?;
            let Some(payload) = parse_sse_data(&line) else {
                continue;
            };

            let chunk: LlamaCppStreamChunk =
                serde_json::from_str(payload).map_err(|e| MedirError::FormatError {
                    reason: format!("Failed to parse llama.cpp chunk: {e}"),
                })?;

            if !chunk.content.is_empty() {
                output.text.push_str(&chunk.content);
                if streamer(&chunk.content) == StreamControl::Stop {
                    break;
                }
            }

            if chunk.stop {
                output.tokens_generated = chunk.tokens_predicted;
                output.backend_tps = chunk
                    .timings
                    .map(|t| t.predicted_per_second)
                    .filter(|tps| *tps > 0.0);
                break;
            }
        }

        Ok(output)
    }

    /// Call an OpenAI-compatible `/v1/completions` endpoint (vLLM).
    ///
    /// The endpoint is consumed non-streaming; the callback fires once with
    /// the full completion text.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    pub fn openai_completion(
        &self,
        base_url: &str,
        request: &CompletionRequest,
        api_key: Option<&str>,
        streamer: &mut Streamer<'_>,
    ) -> Result<GenerationOutput> {
        let url = format!("{}/v1/completions", base_url.trim_end_matches('/'));

        let mut req_builder = self.client.post(&url).json(request);
        if let Some(key) = api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = req_builder
            .send()
            .map_err(|e| MedirError::ConnectionError(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(MedirError::ConnectionError(format!(
                "HTTP {status} from {url}: {body}"
            )));
        }

        let completion: CompletionResponse =
            response.json().map_err(|e| MedirError::FormatError {
                reason: format!("Failed to parse completion response: {e}"),
            })?;

        let text = completion
            .choices
            .first()
            .map(|c| c.text.clone())
            .unwrap_or_default();
        let tokens_generated = completion.usage.map_or(0, |u| u.completion_tokens);

        if !text.is_empty() {
            let _ = streamer(&text);
        }

        Ok(GenerationOutput {
            text,
            tokens_generated,
            backend_tps: None,
        })
    }

    /// Health check for an Ollama server
    ///
    /// # Errors
    /// Returns an error if the server is not reachable.
    pub fn health_check_ollama(&self, base_url: &str) -> Result<bool> {
        let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| MedirError::ConnectionError(format!("Health check failed: {e}")))?;
        Ok(response.status().is_success())
    }

    /// Health check for an OpenAI-compatible server (also llama.cpp)
    ///
    /// # Errors
    /// Returns an error if the server is not reachable.
    pub fn health_check_openai(&self, base_url: &str) -> Result<bool> {
        let url = format!("{}/v1/models", base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| MedirError::ConnectionError(format!("Health check failed: {e}")))?;
        Ok(response.status().is_success())
    }
}

// ============================================================================
// Pipeline adapter
// ============================================================================

/// [`LlmPipeline`] implementation over an HTTP backend
pub struct HttpPipeline {
    client: ModelHttpClient,
    backend: Backend,
    base_url: String,
    model: String,
}

impl HttpPipeline {
    /// Create a pipeline for `backend` at `base_url`, benchmarking `model`
    #[must_use]
    pub fn new(backend: Backend, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: ModelHttpClient::with_timeout(120),
            backend,
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    /// The backend this pipeline talks to
    #[must_use]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// The base URL this pipeline talks to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl LlmPipeline for HttpPipeline {
    fn name(&self) -> &str {
        self.backend.as_str()
    }

    fn start_chat(&mut self) -> Result<()> {
        let healthy = match self.backend {
            Backend::Ollama => self.client.health_check_ollama(&self.base_url)?,
            Backend::LlamaCpp | Backend::OpenAi => {
                self.client.health_check_openai(&self.base_url)?
            },
        };

        if healthy {
            Ok(())
        } else {
            Err(MedirError::ConnectionError(format!(
                "Server at {} failed health check",
                self.base_url
            )))
        }
    }

    fn generate(
        &mut self,
        prompt: &str,
        config: &GenerationConfig,
        streamer: &mut Streamer<'_>,
    ) -> Result<GenerationOutput> {
        match self.backend {
            Backend::Ollama => {
                let request = OllamaRequest {
                    model: self.model.clone(),
                    prompt: prompt.to_string(),
                    stream: true,
                    options: Some(OllamaOptions {
                        num_predict: Some(config.max_new_tokens),
                        temperature: Some(config.temperature),
                    }),
                };
                self.client
                    .ollama_generate(&self.base_url, &request, streamer)
            },
            Backend::LlamaCpp => {
                self.client
                    .llamacpp_completion(&self.base_url, prompt, config, streamer)
            },
            Backend::OpenAi => {
                let request = CompletionRequest {
                    model: self.model.clone(),
                    prompt: prompt.to_string(),
                    max_tokens: config.max_new_tokens,
                    temperature: Some(config.temperature),
                    stream: false,
                };
                self.client
                    .openai_completion(&self.base_url, &request, None, streamer)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("ollama".parse::<Backend>().unwrap(), Backend::Ollama);
        assert_eq!("llama-cpp".parse::<Backend>().unwrap(), Backend::LlamaCpp);
        assert_eq!("llamacpp".parse::<Backend>().unwrap(), Backend::LlamaCpp);
        assert_eq!("OpenAI".parse::<Backend>().unwrap(), Backend::OpenAi);
        assert_eq!("vllm".parse::<Backend>().unwrap(), Backend::OpenAi);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = "triton".parse::<Backend>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("triton"));
        assert!(msg.contains("ollama"));
    }

    #[test]
    fn test_default_base_urls() {
        assert_eq!(Backend::Ollama.default_base_url(), "http://localhost:11434");
        assert_eq!(
            Backend::LlamaCpp.default_base_url(),
            "http://localhost:8080"
        );
        assert_eq!(Backend::OpenAi.default_base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_parse_sse_data() {
        assert_eq!(
            parse_sse_data(r#"data: {"content": "hi"}"#),
            Some(r#"{"content": "hi"}"#)
        );
        assert_eq!(parse_sse_data("data: [DONE]"), None);
        assert_eq!(parse_sse_data(""), None);
        assert_eq!(parse_sse_data(": comment"), None);
    }

    #[test]
    fn test_ollama_chunk_parsing() {
        let mid: OllamaStreamChunk =
            serde_json::from_str(r#"{"model":"m","response":" the","done":false}"#).unwrap();
        assert_eq!(mid.response, " the");
        assert!(!mid.done);

        let last: OllamaStreamChunk = serde_json::from_str(
            r#"{"model":"m","response":"","done":true,"eval_count":42,"eval_duration":2000000000}"#,
        )
        .unwrap();
        assert!(last.done);
        assert_eq!(last.eval_count, 42);
        assert_eq!(last.eval_duration, 2_000_000_000);
    }

    #[test]
    fn test_llamacpp_chunk_parsing() {
        let last: LlamaCppStreamChunk = serde_json::from_str(
            r#"{"content":"","stop":true,"tokens_predicted":50,"timings":{"predicted_n":50,"predicted_per_second":31.5}}"#,
        )
        .unwrap();
        assert!(last.stop);
        assert_eq!(last.tokens_predicted, 50);
        let tps = last.timings.unwrap().predicted_per_second;
        assert!((tps - 31.5).abs() < 1e-9);
    }

    #[test]
    fn test_completion_request_omits_empty_temperature() {
        let request = CompletionRequest {
            model: "m".to_string(),
            prompt: "p".to_string(),
            max_tokens: 10,
            temperature: None,
            stream: false,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("temperature"));
    }

    #[test]
    fn test_client_timeout_configuration() {
        let client = ModelHttpClient::with_timeout(120);
        assert_eq!(client.timeout_secs(), 120);
        assert_eq!(ModelHttpClient::new().timeout_secs(), 60);
    }

    #[test]
    fn test_http_pipeline_name_matches_backend() {
        let pipeline = HttpPipeline::new(Backend::Ollama, "http://localhost:11434", "llama3.2");
        assert_eq!(pipeline.name(), "ollama");
        assert_eq!(pipeline.backend(), Backend::Ollama);
        assert_eq!(pipeline.base_url(), "http://localhost:11434");
    }
}
