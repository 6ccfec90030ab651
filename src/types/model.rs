//! Model parameters and prompt pairs sent to the backend.

use serde::{Deserialize, Serialize};

/// Per-call generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-latest".to_string(),
            temperature: 0.0,
            max_tokens: 4096,
        }
    }
}

/// A system/user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}
