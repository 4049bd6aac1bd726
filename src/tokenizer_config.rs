//! Tokenizer configuration handling
//!
//! Models exported without a `chat_template` in `tokenizer_config.json`
//! cannot run chat-style generation, so the benchmark patches one in before
//! touching the backend. An existing template is never modified, and every
//! other field in the file round-trips untouched.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{MedirError, Result};

/// File name of the tokenizer configuration inside a model directory
pub const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";

/// Default chat template installed when the config has none.
///
/// Stored as a stringified JSON object describing the role formats, matching
/// what common export pipelines expect to find in the field.
#[must_use]
pub fn default_chat_template() -> String {
    serde_json::json!({
        "system": "You are a helpful assistant.",
        "user": "User: {input}",
        "assistant": "Assistant: {response}"
    })
    .to_string()
}

/// Outcome of [`ensure_chat_template`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateStatus {
    /// The config already carried a `chat_template`; file left untouched
    Present,
    /// A default `chat_template` was added and the file rewritten
    Added,
}

/// Parsed view of `tokenizer_config.json`
///
/// Only the fields the benchmark cares about are typed; everything else is
/// kept in `extra` so nothing is lost on inspection.
#[derive(Debug, Deserialize)]
pub struct TokenizerConfig {
    /// Jinja2 (or stringified) chat template, if any
    pub chat_template: Option<String>,
    /// Beginning-of-sequence token
    pub bos_token: Option<String>,
    /// End-of-sequence token
    pub eos_token: Option<String>,
    /// Remaining fields, preserved verbatim
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn config_path(model_dir: &Path) -> PathBuf {
    model_dir.join(TOKENIZER_CONFIG_FILE)
}

fn read_config_object(path: &Path) -> Result<serde_json::Map<String, Value>> {
    if !path.exists() {
        return Err(MedirError::IoError {
            message: format!(
                "Tokenizer configuration file not found at {}",
                path.display()
            ),
        });
    }

    let raw = fs::read_to_string(path).map_err(|e| MedirError::IoError {
        message: format!("Failed to read {}: {e}", path.display()),
    })?;

    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(MedirError::FormatError {
            reason: format!("{} is not a JSON object", path.display()),
        }),
        Err(e) => Err(MedirError::FormatError {
            reason: format!("Invalid tokenizer config: {e}"),
        }),
    }
}

/// Ensure `tokenizer_config.json` in `model_dir` carries a `chat_template`.
///
/// If the field is missing, the default template is inserted and the file is
/// rewritten pretty-printed. If the field is present with any value, the file
/// is left byte-wise untouched.
///
/// # Errors
/// Returns an error if the config file is missing, unreadable, not valid
/// JSON, or cannot be written back.
pub fn ensure_chat_template(model_dir: &Path) -> Result<TemplateStatus> {
    let path = config_path(model_dir);
    let mut config = read_config_object(&path)?;

    if config.contains_key("chat_template") {
        return Ok(TemplateStatus::Present);
    }

    config.insert(
        "chat_template".to_string(),
        Value::String(default_chat_template()),
    );

    let rendered = serde_json::to_string_pretty(&Value::Object(config)).map_err(|e| {
        MedirError::FormatError {
            reason: format!("Failed to serialize tokenizer config: {e}"),
        }
    })?;

    fs::write(&path, rendered).map_err(|e| MedirError::IoError {
        message: format!("Failed to write {}: {e}", path.display()),
    })?;

    Ok(TemplateStatus::Added)
}

/// Load and parse `tokenizer_config.json` from a model directory.
///
/// # Errors
/// Returns an error if the file is missing or is not a valid config object.
pub fn load_tokenizer_config(model_dir: &Path) -> Result<TokenizerConfig> {
    let path = config_path(model_dir);
    let object = read_config_object(&path)?;

    serde_json::from_value(Value::Object(object)).map_err(|e| MedirError::FormatError {
        reason: format!("Invalid tokenizer config: {e}"),
    })
}
