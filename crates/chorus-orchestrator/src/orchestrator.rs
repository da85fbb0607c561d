//! Full pipeline: route, fan out, judge, optionally synthesize.
//! See ARCHITECTURE.md §1
//!
//! `ModelOrchestrator` owns the registry and config and exposes the two
//! entry points callers use: `best_response` for the full multi-model
//! pipeline and `stream_response` for the low-latency incremental path.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::instrument;
use uuid::Uuid;

use chorus_common::types::{OrchestratedResponse, TaskContext};
use chorus_llm::backend::ChatRequest;
use chorus_llm::registry::BackendRegistry;

use crate::config::Config;
use crate::error::OrchestrationError;
use crate::{evaluator, fallback, fanout, router, streaming, synthesizer};

// ── Progress events ──────────────────────────────────────────────────

/// Pipeline stage, broadcast as each one begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Routing,
    FanOut,
    Evaluating,
    Synthesizing,
    Fallback,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct OrchestrationProgress {
    pub run_id:     Uuid,
    pub stage:      Stage,
    pub message:    String,
    pub candidates: usize,
}

// ── Orchestrator ─────────────────────────────────────────────────────

pub struct ModelOrchestrator {
    registry:    Arc<BackendRegistry>,
    config:      Config,
    progress_tx: Option<broadcast::Sender<OrchestrationProgress>>,
}

impl ModelOrchestrator {
    pub fn new(registry: Arc<BackendRegistry>, config: Config) -> Self {
        Self { registry, config, progress_tx: None }
    }

    /// Attach a progress channel. Events are fire-and-forget; a lagging
    /// or absent receiver never stalls the pipeline.
    pub fn with_progress(mut self, tx: broadcast::Sender<OrchestrationProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn emit(&self, run_id: Uuid, stage: Stage, message: impl Into<String>, candidates: usize) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(OrchestrationProgress {
                run_id,
                stage,
                message: message.into(),
                candidates,
            });
        }
    }

    /// Run the whole pipeline for one prompt and return the assembled
    /// answer. Candidate failures degrade to the fallback backend; only
    /// when that also fails does this return an error.
    #[instrument(skip(self, prompt, context), fields(run_id))]
    pub async fn best_response(
        &self,
        prompt: &str,
        context: Option<&TaskContext>,
    ) -> Result<OrchestratedResponse, OrchestrationError> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let orch = &self.config.orchestrator;

        self.emit(run_id, Stage::Routing, "Classifying prompt", 0);
        let decision = router::route(&self.registry, &self.config, run_id, prompt, context).await;
        tracing::info!(
            task_type = decision.task_type.as_str(),
            primary = %decision.suggested_primary,
            secondary = %decision.suggested_secondary,
            "Routing decided"
        );

        self.emit(run_id, Stage::FanOut, "Querying candidate models", 0);
        let mut responses =
            match fanout::fan_out(&self.registry, &self.config, run_id, &decision, prompt, context)
                .await
            {
                Ok(responses) => responses,
                Err(e) => {
                    tracing::warn!(error = %e, "Fan-out produced no candidates, falling back");
                    self.emit(run_id, Stage::Fallback, "All candidates failed", 0);
                    return match fallback::run(&self.registry, &self.config, run_id, prompt).await {
                        Ok(answer) => {
                            self.emit(run_id, Stage::Done, "Fallback answered", 1);
                            Ok(answer)
                        }
                        Err(e) => {
                            self.emit(run_id, Stage::Failed, e.to_string(), 0);
                            Err(e)
                        }
                    };
                }
            };

        self.emit(run_id, Stage::Evaluating, "Ranking candidates", responses.len());
        let best_idx =
            evaluator::evaluate(&self.registry, &self.config, run_id, &mut responses, prompt).await;
        let best = responses[best_idx].clone();

        // Synthesis only when the judge actually scored the winner and
        // scored it below the threshold. An unscored winner keeps its
        // own content and gets the default confidence.
        let mut final_content = best.content.clone();
        let mut synthesized = false;
        if responses.len() >= 2 {
            if let Some(score) = best.confidence {
                if score < orch.synthesis_threshold {
                    self.emit(run_id, Stage::Synthesizing, "Merging candidates", responses.len());
                    if let Some(merged) =
                        synthesizer::synthesize(&self.registry, &self.config, run_id, &responses, prompt)
                            .await
                    {
                        final_content = merged;
                        synthesized = true;
                    }
                }
            }
        }

        let mut reasoning = format!("Primary: {}", best.model);
        if synthesized {
            reasoning.push_str(" (synthesized from multiple models)");
        }
        let confidence = best.confidence.unwrap_or(orch.default_confidence);
        let used_models = responses.iter().map(|r| r.model.clone()).collect();

        self.emit(run_id, Stage::Done, "Response assembled", responses.len());
        tracing::info!(best = %best.model, confidence, synthesized, "Orchestration complete");

        Ok(OrchestratedResponse {
            final_content,
            used_models,
            reasoning,
            confidence,
            alternatives: responses,
        })
    }

    /// Stream one model's answer, delivering each delta to `on_chunk`
    /// as it arrives. Uses the default primary backend only; there is
    /// no multi-model stage on this path.
    #[instrument(skip(self, prompt, context, on_chunk))]
    pub async fn stream_response(
        &self,
        prompt: &str,
        context: Option<&TaskContext>,
        on_chunk: &mut dyn FnMut(&str),
    ) -> Result<(), OrchestrationError> {
        let name = &self.config.roles.default_primary;
        let Some(backend) = self.registry.get(name) else {
            return Err(OrchestrationError::UnknownBackend(name.clone()));
        };

        let req = ChatRequest::from_prompt(streaming::build_stream_prompt(prompt, context))
            .with_temperature(self.config.orchestrator.temperature)
            .with_max_tokens(self.config.orchestrator.max_tokens);

        streaming::relay(backend, req, self.config.orchestrator.stream_timeout_secs, on_chunk).await
    }
}
