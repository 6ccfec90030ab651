//! # Types Module
//!
//! Core data types exchanged between callers, the orchestrator and the backend.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`AnalysisRequest`] | Source content plus its analysis options |
//! | [`AnalysisOptions`] | Language and rule set; part of the cache fingerprint |
//! | [`AnalysisResult`] | Issues, suggestions and metrics returned by the backend |
//! | [`ModelParams`] | Model identifier, temperature and token limit |
//! | [`Prompt`] | System and user prompt pair |

pub mod analysis;
pub mod model;

pub use analysis::{AnalysisOptions, AnalysisRequest, AnalysisResult};
pub use model::{ModelParams, Prompt};
