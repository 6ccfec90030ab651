//! # Backend Module
//!
//! The remote analysis service, abstracted behind [`AnalysisBackend`] so the
//! orchestrator can be driven by the HTTP client in production and by stubs
//! in tests.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`AnalysisBackend`] | Async trait: prompts in, raw model text out |
//! | [`HttpBackend`] | Messages API client over `reqwest` |

mod http;

pub use http::{stored_api_key, HttpBackend, ANTHROPIC_VERSION};

use crate::types::ModelParams;
use crate::Result;
use async_trait::async_trait;

/// A remote model that turns a system/user prompt pair into text.
///
/// Implementations report transport faults as [`crate::Error::Network`] and
/// non-success answers as [`crate::Error::Remote`]; the retry policy relies
/// on that split.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn call(&self, system_prompt: &str, user_prompt: &str, params: &ModelParams)
        -> Result<String>;

    fn name(&self) -> &str {
        "custom"
    }
}
