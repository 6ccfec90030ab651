//! # analysis-orchestrator
//!
//! Request orchestration between a code-analysis pipeline and a remote
//! language-model backend.
//!
//! ## Overview
//!
//! Every analysis goes through one entry point, [`AnalysisOrchestrator::analyze`],
//! which layers four independent controls over the backend call:
//!
//! - **Deduplication**: a content-addressed TTL cache answers repeated requests
//!   without queueing, throttling or calling the backend
//! - **Concurrency**: a FIFO queue caps the number of in-flight requests
//! - **Throughput**: a token bucket throttles how fast requests are issued
//! - **Recovery**: exponential backoff with jitter retries transient failures
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use analysis_orchestrator::{AnalysisOptions, OrchestratorBuilder, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> analysis_orchestrator::Result<()> {
//!     let config = OrchestratorConfig::new()
//!         .with_api_key("sk-...")
//!         .with_max_concurrency(3);
//!     let orchestrator = OrchestratorBuilder::new(config).build().await?;
//!
//!     let result = orchestrator
//!         .analyze("const x = 1;", AnalysisOptions::new("javascript").with_rule("security"))
//!         .await?;
//!     println!("{} issues, metrics: {:?}", result.issues.len(), result.metrics);
//!
//!     orchestrator.destroy();
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`orchestrator`] | The composed entry point, its builder and statistics |
//! | [`cache`] | Content-addressed response cache with pluggable backends |
//! | [`queue`] | Bounded-concurrency FIFO request queue |
//! | [`resilience`] | Token-bucket rate limiter and retry policy |
//! | [`backend`] | Remote backend trait and HTTP implementation |
//! | [`prompt`] | Prompt construction |
//! | [`response`] | Parsing backend text into structured results |
//! | [`config`] | Configuration, environment and YAML loading |
//! | [`types`] | Requests, options, results and model parameters |
//! | [`error_code`] | Standard error code table |

pub mod backend;
pub mod cache;
pub mod config;
pub mod error_code;
pub mod orchestrator;
pub mod prompt;
pub mod queue;
pub mod resilience;
pub mod response;
pub mod types;

pub use backend::{AnalysisBackend, HttpBackend};
pub use config::OrchestratorConfig;
pub use error_code::StandardErrorCode;
pub use orchestrator::{AnalysisOrchestrator, OrchestratorBuilder, OrchestratorStats};
pub use types::{AnalysisOptions, AnalysisRequest, AnalysisResult, ModelParams, Prompt};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
