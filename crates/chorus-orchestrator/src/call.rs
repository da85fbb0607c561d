//! One timed, audited backend call. Shared by every pipeline stage.
//! See ARCHITECTURE.md §7.2

use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use chorus_llm::audit::CallRecord;
use chorus_llm::backend::{ChatRequest, ChatResponse, LlmBackend, LlmError};

/// Run `complete` under its own timeout and emit a `CallRecord` on
/// success. Timing out or failing here affects only this call.
pub(crate) async fn timed_call(
    backend: Arc<dyn LlmBackend>,
    backend_name: &str,
    role: &str,
    run_id: Uuid,
    timeout_secs: u64,
    req: ChatRequest,
) -> Result<(ChatResponse, u64), LlmError> {
    let t0 = Instant::now();
    let outcome = tokio::time::timeout(Duration::from_secs(timeout_secs), backend.complete(req)).await;
    let latency_ms = t0.elapsed().as_millis() as u64;

    let resp = match outcome {
        Ok(Ok(resp)) => resp,
        Ok(Err(e))   => return Err(e),
        Err(_)       => return Err(LlmError::Timeout(timeout_secs)),
    };

    let record = CallRecord::new(
        Some(run_id),
        resp.model.clone(),
        backend_name.to_string(),
        role,
        resp.prompt_tokens,
        resp.completion_tokens,
        &resp.content,
        latency_ms,
    );
    tracing::debug!(
        backend = backend_name,
        model = %record.model,
        role,
        latency_ms,
        output_hash = %record.output_hash,
        "LLM call completed"
    );

    Ok((resp, latency_ms))
}
