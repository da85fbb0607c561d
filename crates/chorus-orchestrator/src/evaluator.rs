//! Candidate ranking via a judge backend.
//! See ARCHITECTURE.md §3 (stage 3)
//!
//! The judge can never abort the pipeline: any call or parse failure
//! leaves the candidates unscored and the first submitted candidate
//! becomes the default best.

use serde::Deserialize;
use uuid::Uuid;

use chorus_common::json::first_object;
use chorus_common::types::{clamp_confidence, ModelResponse};
use chorus_llm::backend::ChatRequest;
use chorus_llm::registry::BackendRegistry;

use crate::call::timed_call;
use crate::config::Config;

#[derive(Debug, Deserialize)]
struct JudgeVerdict {
    best_response_index: usize,
    #[serde(default)]
    reasoning: Option<String>,
    // f64 so a fractional score like 87.5 is still a valid verdict
    confidence_score: f64,
}

pub(crate) fn build_judge_prompt(prompt: &str, responses: &[ModelResponse]) -> String {
    let listing = responses
        .iter()
        .enumerate()
        .map(|(i, r)| format!("RESPONSE {} (from {}):\n{}\n---", i, r.model, r.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Original request: \"{prompt}\"\n\n\
         I have received multiple responses from different AI models. \
         Analyze them and decide which one is best:\n\n\
         {listing}\n\n\
         Consider:\n\
         1. Relevance to the original request\n\
         2. Clarity and coherence\n\
         3. Actionability/practicality\n\
         4. Completeness\n\n\
         Return a JSON object: {{\"best_response_index\": number (0-based), \
         \"reasoning\": string, \"confidence_score\": number (0-100)}}"
    )
}

/// Rank the candidates, attaching the judge's score to the winner
/// only. Returns the best index (0 on any failure).
pub(crate) async fn evaluate(
    registry: &BackendRegistry,
    config: &Config,
    run_id: Uuid,
    responses: &mut [ModelResponse],
    prompt: &str,
) -> usize {
    debug_assert!(!responses.is_empty());

    let Some(backend) = registry.get(&config.roles.judge) else {
        tracing::debug!(backend = %config.roles.judge, "Judge backend not configured, keeping submission order");
        return 0;
    };

    let req = ChatRequest::from_prompt(build_judge_prompt(prompt, responses))
        .with_temperature(config.orchestrator.judge_temperature)
        .with_max_tokens(config.orchestrator.max_tokens);

    let reply = match timed_call(
        backend,
        &config.roles.judge,
        "judge",
        run_id,
        config.orchestrator.direct_timeout_secs,
        req,
    )
    .await
    {
        Ok((resp, _)) => resp.content,
        Err(e) => {
            tracing::debug!(error = %e, "Judge call failed, keeping submission order");
            return 0;
        }
    };

    let Some(verdict) = first_object::<JudgeVerdict>(&reply) else {
        tracing::debug!("Judge reply had no parseable verdict, keeping submission order");
        return 0;
    };

    // An out-of-range index is a bad verdict, same as a parse failure
    if verdict.best_response_index >= responses.len() {
        tracing::debug!(
            index = verdict.best_response_index,
            candidates = responses.len(),
            "Judge picked an out-of-range candidate, keeping submission order"
        );
        return 0;
    }

    let best = verdict.best_response_index;
    responses[best].confidence = Some(clamp_confidence(verdict.confidence_score.round() as i64));
    tracing::info!(
        best_index = best,
        model = %responses[best].model,
        confidence = responses[best].confidence,
        rationale = verdict.reasoning.as_deref().unwrap_or(""),
        "Judge ranked candidates"
    );
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<ModelResponse> {
        vec![
            ModelResponse::new("Answer one", "model-a"),
            ModelResponse::new("Answer two", "model-b"),
        ]
    }

    #[test]
    fn test_judge_prompt_enumerates_candidates() {
        let p = build_judge_prompt("Summarize this", &candidates());
        assert!(p.contains("RESPONSE 0 (from model-a):"));
        assert!(p.contains("RESPONSE 1 (from model-b):"));
        assert!(p.contains("best_response_index"));
    }

    #[test]
    fn test_verdict_parses_from_prose() {
        let reply = "After review: {\"best_response_index\": 1, \
                     \"reasoning\": \"more complete\", \"confidence_score\": 88}";
        let v: JudgeVerdict = first_object(reply).unwrap();
        assert_eq!(v.best_response_index, 1);
        assert_eq!(v.confidence_score, 88.0);
    }

    #[test]
    fn test_fractional_score_rounds_to_nearest() {
        let reply = "{\"best_response_index\": 0, \"reasoning\": \"close call\", \
                     \"confidence_score\": 87.5}";
        let v: JudgeVerdict = first_object(reply).unwrap();
        assert_eq!(clamp_confidence(v.confidence_score.round() as i64), 88);
    }

    #[test]
    fn test_verdict_without_score_is_rejected() {
        let reply = "{\"best_response_index\": 0, \"reasoning\": \"ok\"}";
        assert!(first_object::<JudgeVerdict>(reply).is_none());
    }
}
