//! chorus-common — Shared types and parsing helpers used across all Chorus crates.

pub mod json;
pub mod types;

// Re-export commonly used types
pub use types::{
    ModelResponse, OrchestratedResponse, RoutingDecision, TaskContext, TaskType,
};
