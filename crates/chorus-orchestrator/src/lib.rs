//! Multi-model response orchestration.
//! See ARCHITECTURE.md §2
//!
//! One prompt fans out to several backends in parallel; a judge model
//! ranks the candidates; weak winners are merged by a synthesis pass.
//! Every stage degrades independently, ending at a single-model
//! fallback, so a usable answer survives most partial failures.

pub mod config;
pub mod error;
pub mod orchestrator;

mod call;
mod evaluator;
mod fallback;
mod fanout;
mod router;
mod streaming;
mod synthesizer;

pub use config::Config;
pub use error::OrchestrationError;
pub use orchestrator::{ModelOrchestrator, OrchestrationProgress, Stage};
