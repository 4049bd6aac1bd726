//! Chat template rendering for prompt construction
//!
//! Wraps the user prompt (and optional system prompt) the way the target
//! model expects. Models shipping a Jinja2 `chat_template` in their
//! `tokenizer_config.json` get real template rendering via `minijinja`;
//! everything else falls back to a raw passthrough.
//!
//! # Supported detection
//!
//! - **ChatML**: `<|im_start|>role\ncontent<|im_end|>` (Qwen2, Yi)
//! - **LLaMA 2**: `<s>[INST] ... [/INST]`
//! - **Alpaca**: `### Instruction:\n...`
//! - **Custom**: any other Jinja2 template
//! - **Raw**: no renderable template

use std::path::Path;

use minijinja::{context, Environment};
use serde::{Deserialize, Serialize};

use crate::error::{MedirError, Result};
use crate::tokenizer_config::{load_tokenizer_config, TokenizerConfig};

/// Maximum recursion depth allowed in templates
pub const MAX_RECURSION_DEPTH: usize = 100;

/// A single message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,
    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Create a new chat message
    #[must_use]
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Template families recognized from the template string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateFormat {
    /// ChatML format (Qwen2, Yi)
    ChatML,
    /// LLaMA 2 format
    Llama2,
    /// Alpaca instruction format
    Alpaca,
    /// Some other Jinja2 template
    Custom,
    /// No renderable template
    #[default]
    Raw,
}

/// Detect the template family from a chat template string
#[must_use]
pub fn detect_format(template: &str) -> TemplateFormat {
    if template.contains("<|im_start|>") {
        return TemplateFormat::ChatML;
    }
    if template.contains("[INST]") {
        return TemplateFormat::Llama2;
    }
    if template.contains("### Instruction:") {
        return TemplateFormat::Alpaca;
    }
    TemplateFormat::Custom
}

/// Whether a chat template string is a Jinja2 template.
///
/// Some export pipelines store a stringified JSON object in the field
/// instead; those are not renderable and fall back to raw formatting.
#[must_use]
pub fn is_jinja_template(template: &str) -> bool {
    template.contains("{{") || template.contains("{%")
}

/// Jinja2-based chat template engine
pub struct HuggingFaceTemplate {
    env: Environment<'static>,
    template_str: String,
    bos_token: String,
    eos_token: String,
    format: TemplateFormat,
}

impl std::fmt::Debug for HuggingFaceTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceTemplate")
            .field("template_str", &self.template_str)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl HuggingFaceTemplate {
    /// Create a template engine from a Jinja2 string and special tokens
    ///
    /// # Errors
    /// Returns a format error if the template has invalid syntax.
    pub fn new(
        template_str: String,
        bos_token: Option<String>,
        eos_token: Option<String>,
    ) -> Result<Self> {
        let mut env = Environment::new();
        env.set_recursion_limit(MAX_RECURSION_DEPTH);

        let format = detect_format(&template_str);
        let mut engine = Self {
            env,
            template_str: template_str.clone(),
            bos_token: bos_token.unwrap_or_default(),
            eos_token: eos_token.unwrap_or_default(),
            format,
        };

        engine
            .env
            .add_template_owned("chat", template_str)
            .map_err(|e| MedirError::FormatError {
                reason: format!("Invalid template syntax: {e}"),
            })?;

        Ok(engine)
    }

    /// Create from a parsed tokenizer config
    ///
    /// # Errors
    /// Returns a format error if the config carries no Jinja2 template.
    pub fn from_config(config: &TokenizerConfig) -> Result<Self> {
        let template_str = config
            .chat_template
            .clone()
            .filter(|t| is_jinja_template(t))
            .ok_or_else(|| MedirError::FormatError {
                reason: "No renderable 'chat_template' in config".to_string(),
            })?;

        Self::new(
            template_str,
            config.bos_token.clone(),
            config.eos_token.clone(),
        )
    }

    /// The detected template family
    #[must_use]
    pub fn format(&self) -> TemplateFormat {
        self.format
    }

    /// Render a conversation through the template
    ///
    /// # Errors
    /// Returns a format error if rendering fails.
    pub fn format_conversation(&self, messages: &[ChatMessage]) -> Result<String> {
        let tmpl = self
            .env
            .get_template("chat")
            .map_err(|e| MedirError::FormatError {
                reason: format!("Template error: {e}"),
            })?;

        tmpl.render(context!(
            messages => messages,
            add_generation_prompt => true,
            bos_token => self.bos_token.as_str(),
            eos_token => self.eos_token.as_str()
        ))
        .map_err(|e| MedirError::FormatError {
            reason: format!("Render error: {e}"),
        })
    }
}

/// Raw passthrough formatting for models without a renderable template
#[must_use]
pub fn format_raw(messages: &[ChatMessage]) -> String {
    let mut out = String::new();
    for msg in messages {
        match msg.role.as_str() {
            "system" => {
                out.push_str("System: ");
                out.push_str(&msg.content);
                out.push_str("\n\n");
            },
            _ => out.push_str(&msg.content),
        }
    }
    out
}

/// Build the final prompt string for a model directory.
///
/// Renders through the model's Jinja2 chat template when one exists,
/// otherwise returns the raw prompt (with an optional system prefix).
///
/// # Errors
/// Returns an error if the tokenizer config is missing or the template
/// fails to render.
pub fn build_prompt(model_dir: &Path, prompt: &str, system: Option<&str>) -> Result<String> {
    let mut messages = Vec::new();
    if let Some(sys) = system {
        messages.push(ChatMessage::system(sys));
    }
    messages.push(ChatMessage::user(prompt));

    let config = load_tokenizer_config(model_dir)?;
    let renderable = config
        .chat_template
        .as_deref()
        .is_some_and(is_jinja_template);

    if renderable {
        let engine = HuggingFaceTemplate::from_config(&config)?;
        engine.format_conversation(&messages)
    } else {
        Ok(format_raw(&messages))
    }
}
