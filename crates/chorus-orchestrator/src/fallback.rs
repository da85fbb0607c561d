//! Single-shot fallback to the baseline backend.
//! See ARCHITECTURE.md §4
//!
//! The raw, unshaped prompt goes to one designated backend exactly
//! once. If that also fails, the request terminates — there is no
//! further degradation path and no retry.

use uuid::Uuid;

use chorus_common::types::{ModelResponse, OrchestratedResponse};
use chorus_llm::backend::ChatRequest;
use chorus_llm::registry::BackendRegistry;

use crate::call::timed_call;
use crate::config::Config;
use crate::error::OrchestrationError;

pub(crate) async fn run(
    registry: &BackendRegistry,
    config: &Config,
    run_id: Uuid,
    prompt: &str,
) -> Result<OrchestratedResponse, OrchestrationError> {
    let Some(backend) = registry.get(&config.roles.fallback) else {
        return Err(OrchestrationError::AllBackendsFailed(format!(
            "fallback backend not configured: {}",
            config.roles.fallback
        )));
    };

    let req = ChatRequest::from_prompt(prompt)
        .with_temperature(config.orchestrator.temperature)
        .with_max_tokens(config.orchestrator.max_tokens);

    let (resp, latency_ms) = match timed_call(
        backend,
        &config.roles.fallback,
        "fallback",
        run_id,
        config.orchestrator.direct_timeout_secs,
        req,
    )
    .await
    {
        Ok(ok) => ok,
        Err(e) => return Err(OrchestrationError::AllBackendsFailed(e.to_string())),
    };

    if resp.content.trim().is_empty() {
        return Err(OrchestrationError::AllBackendsFailed(
            "fallback backend returned empty content".to_string(),
        ));
    }

    tracing::info!(model = %resp.model, "Fallback answered");

    let answer = ModelResponse::new(resp.content.clone(), resp.model.clone())
        .with_latency_ms(latency_ms);
    Ok(OrchestratedResponse {
        final_content: resp.content,
        used_models: vec![resp.model],
        reasoning: "Fallback to single model".to_string(),
        confidence: config.orchestrator.fallback_confidence,
        alternatives: vec![answer],
    })
}
