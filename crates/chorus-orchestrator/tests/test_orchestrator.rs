//! End-to-end pipeline tests against scripted mock backends.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use chorus_common::types::{TaskContext, TaskType};
use chorus_llm::backend::LlmError;
use chorus_llm::mock::MockBackend;
use chorus_llm::registry::BackendRegistry;
use chorus_llm::stream::sse_document;
use chorus_orchestrator::orchestrator::Stage;
use chorus_orchestrator::{Config, ModelOrchestrator, OrchestrationError};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("chorus=debug").try_init();
}

fn verdict(index: usize, confidence: i64) -> String {
    format!(
        "{{\"best_response_index\": {index}, \"reasoning\": \"clearer\", \
         \"confidence_score\": {confidence}}}"
    )
}

struct Harness {
    primary: Arc<MockBackend>,
    quick:   Arc<MockBackend>,
    judge:   Arc<MockBackend>,
    synth:   Arc<MockBackend>,
    config:  Config,
}

impl Harness {
    fn new() -> Self {
        init_tracing();
        Self {
            primary: Arc::new(MockBackend::new("model-primary")),
            quick:   Arc::new(MockBackend::new("model-quick")),
            judge:   Arc::new(MockBackend::new("model-judge")),
            synth:   Arc::new(MockBackend::new("model-synth")),
            config:  {
                let mut config = Config::default();
                // Keep synthesis and fallback observable separately
                // from the primary candidate slot.
                config.roles.synthesis = "synth".to_string();
                config
            },
        }
    }

    fn orchestrator(&self) -> ModelOrchestrator {
        let mut registry = BackendRegistry::new();
        registry.register("primary", self.primary.clone());
        registry.register("quick", self.quick.clone());
        registry.register("judge", self.judge.clone());
        registry.register("synth", self.synth.clone());
        ModelOrchestrator::new(Arc::new(registry), self.config.clone())
    }
}

#[tokio::test]
async fn test_confident_winner_skips_synthesis() {
    let mut h = Harness::new();
    h.primary = Arc::new(MockBackend::new("model-primary").with_reply("The thorough answer."));
    h.quick = Arc::new(MockBackend::new("model-quick").with_reply("Short answer."));
    h.judge = Arc::new(MockBackend::new("model-judge").with_reply(verdict(0, 90)));

    let answer = h.orchestrator().best_response("Improve my plan", None).await.unwrap();

    assert_eq!(answer.final_content, "The thorough answer.");
    assert_eq!(answer.confidence, 90);
    assert_eq!(answer.used_models, vec!["model-primary", "model-quick"]);
    assert_eq!(answer.alternatives.len(), 2);
    assert_eq!(answer.reasoning, "Primary: model-primary");
    assert_eq!(h.synth.calls(), 0);
}

#[tokio::test]
async fn test_low_confidence_triggers_synthesis() {
    let mut h = Harness::new();
    h.primary = Arc::new(MockBackend::new("model-primary").with_reply("Candidate one."));
    h.quick = Arc::new(MockBackend::new("model-quick").with_reply("Candidate two."));
    h.judge = Arc::new(MockBackend::new("model-judge").with_reply(verdict(1, 60)));
    let merged = "A merged answer combining the strengths of both candidates into one.";
    h.synth = Arc::new(MockBackend::new("model-synth").with_reply(merged));

    let answer = h.orchestrator().best_response("Improve my plan", None).await.unwrap();

    assert_eq!(answer.final_content, merged);
    assert_eq!(answer.confidence, 60);
    assert_eq!(answer.reasoning, "Primary: model-quick (synthesized from multiple models)");
    assert_eq!(h.synth.calls(), 1);
}

#[tokio::test]
async fn test_short_synthesis_keeps_best_candidate() {
    let mut h = Harness::new();
    h.primary = Arc::new(MockBackend::new("model-primary").with_reply("Candidate one."));
    h.quick = Arc::new(MockBackend::new("model-quick").with_reply("Candidate two."));
    h.judge = Arc::new(MockBackend::new("model-judge").with_reply(verdict(0, 60)));
    h.synth = Arc::new(MockBackend::new("model-synth").with_reply("Too short."));

    let answer = h.orchestrator().best_response("Improve my plan", None).await.unwrap();

    // The merge was attempted but its result fell under the length
    // floor, so the judged winner stands.
    assert_eq!(h.synth.calls(), 1);
    assert_eq!(answer.final_content, "Candidate one.");
    assert_eq!(answer.reasoning, "Primary: model-primary");
}

#[tokio::test]
async fn test_unparseable_verdict_defaults_to_first_candidate() {
    let mut h = Harness::new();
    h.primary = Arc::new(MockBackend::new("model-primary").with_reply("First submitted."));
    h.quick = Arc::new(MockBackend::new("model-quick").with_reply("Second submitted."));
    h.judge = Arc::new(MockBackend::new("model-judge").with_reply("I cannot decide, sorry."));

    let answer = h.orchestrator().best_response("Improve my plan", None).await.unwrap();

    assert_eq!(answer.final_content, "First submitted.");
    // No judge score means the configured default confidence applies.
    assert_eq!(answer.confidence, 75);
    assert_eq!(h.synth.calls(), 0);
}

#[tokio::test]
async fn test_out_of_range_verdict_defaults_to_first_candidate() {
    let mut h = Harness::new();
    h.primary = Arc::new(MockBackend::new("model-primary").with_reply("First submitted."));
    h.quick = Arc::new(MockBackend::new("model-quick").with_reply("Second submitted."));
    h.judge = Arc::new(MockBackend::new("model-judge").with_reply(verdict(7, 95)));

    let answer = h.orchestrator().best_response("Improve my plan", None).await.unwrap();

    assert_eq!(answer.final_content, "First submitted.");
    assert_eq!(answer.confidence, 75);
}

#[tokio::test]
async fn test_fractional_judge_score_is_accepted() {
    let mut h = Harness::new();
    h.primary = Arc::new(MockBackend::new("model-primary").with_reply("The answer."));
    h.quick = Arc::new(MockBackend::new("model-quick").with_reply("Other answer."));
    h.judge = Arc::new(MockBackend::new("model-judge").with_reply(
        "{\"best_response_index\": 0, \"reasoning\": \"close call\", \
         \"confidence_score\": 87.5}",
    ));

    let answer = h.orchestrator().best_response("Improve my plan", None).await.unwrap();

    assert_eq!(answer.confidence, 88);
    assert_eq!(answer.final_content, "The answer.");
}

#[tokio::test]
async fn test_judge_score_is_clamped() {
    let mut h = Harness::new();
    h.primary = Arc::new(MockBackend::new("model-primary").with_reply("The answer."));
    h.quick = Arc::new(MockBackend::new("model-quick").with_reply("Other answer."));
    h.judge = Arc::new(MockBackend::new("model-judge").with_reply(verdict(0, 150)));

    let answer = h.orchestrator().best_response("Improve my plan", None).await.unwrap();

    assert_eq!(answer.confidence, 100);
}

#[tokio::test]
async fn test_deep_reasoning_task_adds_third_slot() {
    let mut h = Harness::new();
    h.primary = Arc::new(MockBackend::new("model-primary").with_failure("down"));
    h.quick = Arc::new(MockBackend::new("model-quick").with_failure("down"));
    h.config.roles.router = "router".to_string();
    let router = Arc::new(
        MockBackend::new("model-router").with_reply("Step 1: Research. Step 2: Plan."),
    );

    let mut registry = BackendRegistry::new();
    registry.register("primary", h.primary.clone());
    registry.register("quick", h.quick.clone());
    registry.register("judge", h.judge.clone());
    registry.register("synth", h.synth.clone());
    registry.register("router", router.clone());
    let orch = ModelOrchestrator::new(Arc::new(registry), h.config.clone());

    let ctx = TaskContext { task_type: Some(TaskType::GenerateSteps), ..Default::default() };
    let answer = orch.best_response("Plan my week", Some(&ctx)).await.unwrap();

    // The reasoning slot's survivor is the only candidate; unscored, it
    // carries the default confidence.
    assert_eq!(answer.final_content, "Step 1: Research. Step 2: Plan.");
    assert_eq!(answer.used_models, vec!["model-router"]);
    assert_eq!(answer.confidence, 75);
    // Routing meta-call plus the reasoning slot itself.
    assert_eq!(router.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_candidate_times_out_without_affecting_sibling() {
    let mut h = Harness::new();
    // Well past the 10s direct timeout
    h.primary = Arc::new(
        MockBackend::new("model-primary")
            .with_reply("Too late.")
            .with_delay(Duration::from_secs(30)),
    );
    h.quick = Arc::new(MockBackend::new("model-quick").with_reply("On time."));

    let answer = h.orchestrator().best_response("Improve my plan", None).await.unwrap();

    // The timed-out slot is dropped; its sibling's answer survives
    // unscored and carries the default confidence.
    assert_eq!(answer.final_content, "On time.");
    assert_eq!(answer.used_models, vec!["model-quick"]);
    assert_eq!(answer.confidence, 75);
}

#[tokio::test(start_paused = true)]
async fn test_stream_timeout_delivers_nothing_after_expiry() {
    let h = Harness::new();
    // Delay exceeds the 15s streaming timeout
    let slow = Arc::new(
        MockBackend::new("model-primary")
            .with_sse_document(sse_document(&["never delivered"]))
            .with_delay(Duration::from_secs(30)),
    );
    let mut registry = BackendRegistry::new();
    registry.register("primary", slow);
    let orch = ModelOrchestrator::new(Arc::new(registry), h.config.clone());

    let mut chunks: Vec<String> = Vec::new();
    let err = orch
        .stream_response("Say hello", None, &mut |c| chunks.push(c.to_string()))
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestrationError::Llm(LlmError::Timeout(15))));
    assert!(chunks.is_empty());
}

#[tokio::test]
async fn test_all_candidates_failing_uses_fallback_once() {
    let mut h = Harness::new();
    h.primary = Arc::new(MockBackend::new("model-primary").with_failure("down"));
    h.quick = Arc::new(MockBackend::new("model-quick").with_failure("down"));
    h.config.roles.fallback = "rescue".to_string();
    let rescue = Arc::new(MockBackend::new("model-rescue").with_reply("Rescued answer."));

    let mut registry = BackendRegistry::new();
    registry.register("primary", h.primary.clone());
    registry.register("quick", h.quick.clone());
    registry.register("judge", h.judge.clone());
    registry.register("rescue", rescue.clone());
    let orch = ModelOrchestrator::new(Arc::new(registry), h.config.clone());

    let answer = orch.best_response("Improve my plan", None).await.unwrap();

    assert_eq!(answer.final_content, "Rescued answer.");
    assert_eq!(answer.confidence, 50);
    assert_eq!(answer.reasoning, "Fallback to single model");
    assert_eq!(answer.used_models, vec!["model-rescue"]);
    assert_eq!(rescue.calls(), 1);
    // Nothing survived fan-out, so the judge is never consulted.
    assert_eq!(h.judge.calls(), 0);
}

#[tokio::test]
async fn test_fallback_failure_surfaces_error() {
    let mut h = Harness::new();
    h.primary = Arc::new(MockBackend::new("model-primary").with_failure("down"));
    h.quick = Arc::new(MockBackend::new("model-quick").with_failure("down"));
    // Default fallback role is "primary", which is also down.

    let err = h.orchestrator().best_response("Improve my plan", None).await.unwrap_err();

    assert!(matches!(err, OrchestrationError::AllBackendsFailed(_)));
}

#[tokio::test]
async fn test_router_reply_steers_backend_choice() {
    let mut h = Harness::new();
    h.primary = Arc::new(MockBackend::new("model-primary").with_reply("Primary answer."));
    h.quick = Arc::new(MockBackend::new("model-quick").with_reply("Quick answer."));
    h.config.roles.router = "router".to_string();
    let router = Arc::new(MockBackend::new("model-router").with_reply(
        "{\"task_type\": \"summarize\", \"requirements\": [\"brevity\"], \
         \"suggested_primary\": \"quick\", \"suggested_secondary\": \"primary\"}",
    ));

    let mut registry = BackendRegistry::new();
    registry.register("primary", h.primary.clone());
    registry.register("quick", h.quick.clone());
    registry.register("judge", h.judge.clone());
    registry.register("router", router.clone());
    let orch = ModelOrchestrator::new(Arc::new(registry), h.config.clone());

    let answer = orch.best_response("Condense these notes", None).await.unwrap();

    // The router swapped the slot assignment, so the quick backend
    // leads the candidate list and wins by default.
    assert_eq!(answer.used_models, vec!["model-quick", "model-primary"]);
    assert_eq!(answer.final_content, "Quick answer.");
}

#[tokio::test]
async fn test_router_garbage_falls_back_to_default_pair() {
    let mut h = Harness::new();
    h.primary = Arc::new(MockBackend::new("model-primary").with_reply("Primary answer."));
    h.quick = Arc::new(MockBackend::new("model-quick").with_reply("Quick answer."));
    h.config.roles.router = "router".to_string();
    let router = Arc::new(MockBackend::new("model-router").with_reply("no json here"));

    let mut registry = BackendRegistry::new();
    registry.register("primary", h.primary.clone());
    registry.register("quick", h.quick.clone());
    registry.register("judge", h.judge.clone());
    registry.register("router", router.clone());
    let orch = ModelOrchestrator::new(Arc::new(registry), h.config.clone());

    let answer = orch.best_response("Improve my plan", None).await.unwrap();

    assert_eq!(answer.used_models, vec!["model-primary", "model-quick"]);
    assert_eq!(h.primary.calls(), 1);
    assert_eq!(h.quick.calls(), 1);
}

#[tokio::test]
async fn test_stream_response_delivers_chunks_in_order() {
    let h = Harness::new();
    let streaming = Arc::new(
        MockBackend::new("model-primary")
            .with_sse_document(sse_document(&["Hello", " streaming", " world"])),
    );

    let mut registry = BackendRegistry::new();
    registry.register("primary", streaming.clone());
    let orch = ModelOrchestrator::new(Arc::new(registry), h.config.clone());

    let mut collected = String::new();
    orch.stream_response("Say hello", None, &mut |chunk| collected.push_str(chunk))
        .await
        .unwrap();

    assert_eq!(collected, "Hello streaming world");
}

#[tokio::test]
async fn test_stream_response_unknown_backend() {
    let h = Harness::new();
    let registry = BackendRegistry::new();
    let orch = ModelOrchestrator::new(Arc::new(registry), h.config.clone());

    let err = orch
        .stream_response("Say hello", None, &mut |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestrationError::UnknownBackend(name) if name == "primary"));
}

#[tokio::test]
async fn test_progress_events_arrive_in_stage_order() {
    let mut h = Harness::new();
    h.primary = Arc::new(MockBackend::new("model-primary").with_reply("The answer."));
    h.quick = Arc::new(MockBackend::new("model-quick").with_reply("Other answer."));
    h.judge = Arc::new(MockBackend::new("model-judge").with_reply(verdict(0, 90)));

    let (tx, mut rx) = broadcast::channel(16);
    let orch = h.orchestrator().with_progress(tx);
    orch.best_response("Improve my plan", None).await.unwrap();

    let mut stages = Vec::new();
    while let Ok(event) = rx.try_recv() {
        stages.push(event.stage);
    }
    assert_eq!(stages, vec![Stage::Routing, Stage::FanOut, Stage::Evaluating, Stage::Done]);
}
