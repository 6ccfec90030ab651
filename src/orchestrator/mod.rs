//! # Orchestrator
//!
//! Composes the cache, request queue, rate limiter and retry policy behind
//! [`AnalysisOrchestrator::analyze`]:
//!
//! ```text
//! analyze ─► cache hit? ──yes──► return
//!               │ no
//!               ▼
//!         queue slot ─► rate-limit token ─► retry(backend call + parse) ─► cache write ─► return
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use analysis_orchestrator::{AnalysisOptions, OrchestratorBuilder, OrchestratorConfig};
//!
//! # async fn demo() -> analysis_orchestrator::Result<()> {
//! let orchestrator = OrchestratorBuilder::new(OrchestratorConfig::from_env())
//!     .build()
//!     .await?;
//! let result = orchestrator
//!     .analyze("const x = 1;", AnalysisOptions::new("javascript").with_rule("security"))
//!     .await?;
//! println!("{} issues", result.issues.len());
//! orchestrator.destroy();
//! # Ok(())
//! # }
//! ```

mod builder;
mod core;
mod stats;

pub use self::builder::{KeyLookup, OrchestratorBuilder};
pub use self::core::AnalysisOrchestrator;
pub use self::stats::{OrchestratorStats, RequestCounts};
