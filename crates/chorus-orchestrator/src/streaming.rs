//! Streaming adapter for the conversational/refinement path.
//! See ARCHITECTURE.md §6
//!
//! Relays one backend's token stream to the caller's callback,
//! per-chunk and in strict arrival order. The timeout covers the whole
//! relay; hitting it (or any error) drops the stream, which releases
//! the underlying connection and guarantees the callback never fires
//! again.

use std::sync::Arc;
use std::time::Duration;

use chorus_common::types::{TaskContext, TaskType};
use chorus_llm::backend::{ChatRequest, LlmBackend, LlmError};

use crate::error::OrchestrationError;

pub(crate) fn build_stream_prompt(prompt: &str, context: Option<&TaskContext>) -> String {
    let task = context
        .and_then(|c| c.task_type)
        .unwrap_or(TaskType::Refine);
    let goal_line = context
        .and_then(|c| c.goal.as_deref())
        .map(|g| format!("Goal: {g}\n"))
        .unwrap_or_default();

    format!(
        "You are an AI assistant helping with {task}.\n\
         {goal_line}User request: {prompt}\n\n\
         Provide a thoughtful, helpful response.",
        task = task.as_str(),
    )
}

/// Open the stream and drive every delta into `on_chunk`.
pub(crate) async fn relay(
    backend: Arc<dyn LlmBackend>,
    req: ChatRequest,
    timeout_secs: u64,
    on_chunk: &mut dyn FnMut(&str),
) -> Result<(), OrchestrationError> {
    let drive = async {
        let mut stream = backend.complete_stream(req).await?;
        let mut delivered = 0usize;
        while let Some(delta) = stream.next_delta().await {
            match delta {
                Ok(text) => {
                    delivered += 1;
                    on_chunk(&text);
                }
                Err(e) => {
                    // Partial delivery already happened; no retry
                    tracing::warn!(delivered, error = %e, "Stream failed mid-flight");
                    return Err(e);
                }
            }
        }
        tracing::debug!(delivered, "Stream completed");
        Ok(())
    };

    match tokio::time::timeout(Duration::from_secs(timeout_secs), drive).await {
        Ok(result) => result.map_err(OrchestrationError::from),
        Err(_) => Err(OrchestrationError::Llm(LlmError::Timeout(timeout_secs))),
    }
}
