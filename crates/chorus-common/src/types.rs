//! Core data model for response orchestration.
//! See ARCHITECTURE.md §2.1

use serde::{Deserialize, Serialize};

/// Category of work a request represents. Shapes prompt construction
/// and backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    /// Improving/expanding existing content.
    #[default]
    Enhance,
    /// Condensing information.
    Summarize,
    /// Creating actionable steps for a goal.
    GenerateSteps,
    /// Adding details to a goal.
    Elaborate,
    /// Conversational refinement (the streaming path).
    Refine,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Enhance       => "enhance",
            TaskType::Summarize     => "summarize",
            TaskType::GenerateSteps => "generate-steps",
            TaskType::Elaborate     => "elaborate",
            TaskType::Refine        => "refine",
        }
    }

    /// Task types that warrant an extra structured-reasoning call
    /// during fan-out.
    pub fn needs_deep_reasoning(&self) -> bool {
        matches!(self, TaskType::Elaborate | TaskType::GenerateSteps)
    }
}

/// Caller-supplied context, passed by reference through the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskContext {
    pub goal: Option<String>,
    #[serde(default)]
    pub history: Vec<String>,
    pub task_type: Option<TaskType>,
}

/// One completed backend call. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub content: String,
    pub model: String,
    /// Judge-assigned score in [0, 100]. None until evaluated.
    pub confidence: Option<u8>,
    pub latency_ms: Option<u64>,
}

impl ModelResponse {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            confidence: None,
            latency_ms: None,
        }
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// Final answer returned to the caller. Never persisted by this
/// subsystem.
///
/// Invariants: `used_models.len() == alternatives.len()`;
/// `final_content` is non-empty; `confidence` is in [0, 100] by type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratedResponse {
    pub final_content: String,
    pub used_models: Vec<String>,
    pub reasoning: String,
    pub confidence: u8,
    pub alternatives: Vec<ModelResponse>,
}

/// Transient per-request routing state produced by the router stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub task_type: TaskType,
    pub requirements: Vec<String>,
    pub suggested_primary: String,
    pub suggested_secondary: String,
}

/// Clamp a raw judge score into the valid [0, 100] range.
pub fn clamp_confidence(raw: i64) -> u8 {
    raw.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_serde_names() {
        let t: TaskType = serde_json::from_str("\"generate-steps\"").unwrap();
        assert_eq!(t, TaskType::GenerateSteps);
        assert_eq!(serde_json::to_string(&TaskType::Refine).unwrap(), "\"refine\"");
    }

    #[test]
    fn test_deep_reasoning_task_types() {
        assert!(TaskType::Elaborate.needs_deep_reasoning());
        assert!(TaskType::GenerateSteps.needs_deep_reasoning());
        assert!(!TaskType::Summarize.needs_deep_reasoning());
        assert!(!TaskType::Enhance.needs_deep_reasoning());
    }

    #[test]
    fn test_clamp_confidence_bounds() {
        assert_eq!(clamp_confidence(-5), 0);
        assert_eq!(clamp_confidence(42), 42);
        assert_eq!(clamp_confidence(250), 100);
    }

    #[test]
    fn test_default_task_type_is_enhance() {
        assert_eq!(TaskType::default(), TaskType::Enhance);
    }
}
