//! Candidate merging when the judged best is low-confidence.
//! See ARCHITECTURE.md §3 (stage 4)
//!
//! Synthesis never degrades an already-acceptable answer: any failure
//! or suspiciously short result is a silent no-op and the previously
//! selected best candidate stands.

use uuid::Uuid;

use chorus_common::types::ModelResponse;
use chorus_llm::backend::ChatRequest;
use chorus_llm::registry::BackendRegistry;

use crate::call::timed_call;
use crate::config::Config;

pub(crate) fn build_synthesis_prompt(prompt: &str, responses: &[ModelResponse]) -> String {
    let listing = responses
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let label = (b'A' + (i as u8 % 26)) as char;
            format!("Response {} ({}):\n{}", label, r.model, r.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "I have multiple responses to the request: \"{prompt}\"\n\n\
         {listing}\n\n\
         Create a final response that combines the best elements from each, \
         maintaining coherence and addressing the original request."
    )
}

/// Merge the candidates into one answer. `None` means keep the best
/// candidate unchanged.
pub(crate) async fn synthesize(
    registry: &BackendRegistry,
    config: &Config,
    run_id: Uuid,
    responses: &[ModelResponse],
    prompt: &str,
) -> Option<String> {
    let backend = registry.get(&config.roles.synthesis)?;

    let req = ChatRequest::from_prompt(build_synthesis_prompt(prompt, responses))
        .with_temperature(config.orchestrator.synthesis_temperature)
        .with_max_tokens(config.orchestrator.max_tokens);

    let merged = match timed_call(
        backend,
        &config.roles.synthesis,
        "synthesis",
        run_id,
        config.orchestrator.direct_timeout_secs,
        req,
    )
    .await
    {
        Ok((resp, _)) => resp.content,
        Err(e) => {
            tracing::debug!(error = %e, "Synthesis call failed, keeping best candidate");
            return None;
        }
    };

    if merged.trim().len() < config.orchestrator.min_synthesis_chars {
        tracing::debug!(
            length = merged.trim().len(),
            minimum = config.orchestrator.min_synthesis_chars,
            "Synthesized text too short, keeping best candidate"
        );
        return None;
    }

    tracing::info!(length = merged.len(), "Candidates synthesized");
    Some(merged)
}
