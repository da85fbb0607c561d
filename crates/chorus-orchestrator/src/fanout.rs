//! Concurrent fan-out to the selected candidate backends.
//! See ARCHITECTURE.md §3 (stage 2)
//!
//! Fire all, await all, filter survivors: every call runs in its own
//! JoinSet task under its own timeout, so one slow or failing backend
//! never affects its siblings. Survivors are returned in submission
//! order — the first submitted candidate is the default best when the
//! judge cannot rank them.

use std::sync::Arc;

use tokio::task::JoinSet;
use uuid::Uuid;

use chorus_common::types::{ModelResponse, RoutingDecision, TaskContext};
use chorus_llm::backend::{ChatRequest, LlmBackend};
use chorus_llm::registry::BackendRegistry;

use crate::call::timed_call;
use crate::config::Config;
use crate::error::OrchestrationError;

/// Which prompt variant a fan-out slot carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotRole {
    /// Detailed, practical answer from the suggested primary.
    Primary,
    /// Concise alternative perspective from the secondary.
    Quick,
    /// Structured outline, added for deep-reasoning task types.
    Reasoning,
}

pub(crate) fn prompt_for_slot(
    role: SlotRole,
    prompt: &str,
    decision: &RoutingDecision,
    context: Option<&TaskContext>,
) -> String {
    match role {
        SlotRole::Primary => {
            let goal_line = context
                .and_then(|c| c.goal.as_deref())
                .map(|g| format!("Goal: {g}\n"))
                .unwrap_or_default();
            format!(
                "You are a careful assistant helping with {task}.\n\
                 {goal_line}Request: {prompt}\n\n\
                 Provide a detailed, helpful response that is practical and actionable.",
                task = decision.task_type.as_str(),
            )
        }
        SlotRole::Quick => {
            format!("Quick response to: {prompt}\n\nBe concise and direct.")
        }
        SlotRole::Reasoning => {
            format!(
                "Given this request: \"{prompt}\", provide a structured outline \
                 of how to approach it. Focus on logic and organization."
            )
        }
    }
}

fn temperature_for_slot(role: SlotRole, config: &Config) -> f32 {
    match role {
        SlotRole::Primary   => config.orchestrator.temperature,
        SlotRole::Quick     => config.orchestrator.quick_temperature,
        SlotRole::Reasoning => config.orchestrator.reasoning_temperature,
    }
}

/// Run the fan-out batch and return the non-empty successes in
/// submission order. `NoValidResponses` if nothing survives.
pub(crate) async fn fan_out(
    registry: &BackendRegistry,
    config: &Config,
    run_id: Uuid,
    decision: &RoutingDecision,
    prompt: &str,
    context: Option<&TaskContext>,
) -> Result<Vec<ModelResponse>, OrchestrationError> {
    let mut slots: Vec<(SlotRole, String)> = vec![
        (SlotRole::Primary, decision.suggested_primary.clone()),
        (SlotRole::Quick, decision.suggested_secondary.clone()),
    ];
    if decision.task_type.needs_deep_reasoning() {
        slots.push((SlotRole::Reasoning, config.roles.router.clone()));
    }

    // Resolve backends up front; unknown names are dropped with a warning
    let calls: Vec<(SlotRole, String, Arc<dyn LlmBackend>)> = slots
        .into_iter()
        .filter_map(|(role, name)| match registry.get(&name) {
            Some(backend) => Some((role, name, backend)),
            None => {
                tracing::warn!(backend = %name, "Fan-out slot skipped: backend not configured");
                None
            }
        })
        .collect();

    if calls.is_empty() {
        return Err(OrchestrationError::NoValidResponses);
    }

    let timeout_secs = config.orchestrator.direct_timeout_secs;
    let mut set = JoinSet::new();

    for (idx, (role, name, backend)) in calls.into_iter().enumerate() {
        let req = ChatRequest::from_prompt(prompt_for_slot(role, prompt, decision, context))
            .with_temperature(temperature_for_slot(role, config))
            .with_max_tokens(config.orchestrator.max_tokens);

        set.spawn(async move {
            let result = timed_call(backend, &name, "candidate", run_id, timeout_secs, req).await;
            (idx, name, result)
        });
    }

    // Wait for every call to settle, tolerating any subset failing
    let mut settled: Vec<Option<ModelResponse>> = Vec::new();
    settled.resize_with(set.len(), || None);

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, _, Ok((resp, latency_ms)))) if !resp.content.trim().is_empty() => {
                settled[idx] =
                    Some(ModelResponse::new(resp.content, resp.model).with_latency_ms(latency_ms));
            }
            Ok((_, name, Ok(_))) => {
                tracing::warn!(backend = %name, "Candidate dropped: empty content");
            }
            Ok((_, name, Err(e))) => {
                tracing::warn!(backend = %name, error = %e, "Candidate dropped: call failed");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Candidate dropped: task panicked");
            }
        }
    }

    let responses: Vec<ModelResponse> = settled.into_iter().flatten().collect();
    if responses.is_empty() {
        return Err(OrchestrationError::NoValidResponses);
    }

    tracing::info!(
        candidates = responses.len(),
        task_type = decision.task_type.as_str(),
        "Fan-out settled"
    );
    Ok(responses)
}
