//! Task-type routing via a meta-prompt to the routing backend.
//! See ARCHITECTURE.md §3 (stage 1)
//!
//! The router is infallible: any call or parse failure falls back to a
//! default decision built from the caller-supplied task type and the
//! configured default backend pair.

use serde::Deserialize;
use uuid::Uuid;

use chorus_common::json::first_object;
use chorus_common::types::{RoutingDecision, TaskContext, TaskType};
use chorus_llm::backend::ChatRequest;
use chorus_llm::registry::BackendRegistry;

use crate::call::timed_call;
use crate::config::Config;

/// Shape the routing backend is asked to produce.
#[derive(Debug, Deserialize)]
struct RouterReply {
    task_type: Option<TaskType>,
    requirements: Option<Vec<String>>,
    suggested_primary: Option<String>,
    suggested_secondary: Option<String>,
}

pub(crate) fn build_router_prompt(
    prompt: &str,
    context: Option<&TaskContext>,
    backend_names: &[String],
) -> String {
    let goal_line = context
        .and_then(|c| c.goal.as_deref())
        .map(|g| format!("Goal context: {g}\n"))
        .unwrap_or_default();

    format!(
        "Analyze this request and determine what type of task it is:\n\
         - enhance: improving/expanding existing content\n\
         - summarize: condensing information\n\
         - generate-steps: creating actionable steps for a goal\n\
         - elaborate: adding details to a goal\n\
         - refine: conversational refinement\n\n\
         Also identify key requirements (conciseness, creativity, structure, etc.).\n\
         Available backends: {backends}\n\n\
         Request: \"{prompt}\"\n\
         {goal_line}\n\
         Return a JSON object: {{\"task_type\": string, \"requirements\": [string], \
         \"suggested_primary\": string, \"suggested_secondary\": string}}",
        backends = backend_names.join(", "),
    )
}

/// The decision used whenever the routing backend cannot help.
pub(crate) fn default_decision(config: &Config, context: Option<&TaskContext>) -> RoutingDecision {
    RoutingDecision {
        task_type: context.and_then(|c| c.task_type).unwrap_or_default(),
        requirements: vec!["clarity".to_string()],
        suggested_primary: config.roles.default_primary.clone(),
        suggested_secondary: config.roles.default_secondary.clone(),
    }
}

pub(crate) async fn route(
    registry: &BackendRegistry,
    config: &Config,
    run_id: Uuid,
    prompt: &str,
    context: Option<&TaskContext>,
) -> RoutingDecision {
    let fallback = default_decision(config, context);

    let Some(backend) = registry.get(&config.roles.router) else {
        tracing::debug!(backend = %config.roles.router, "Routing backend not configured, using default decision");
        return fallback;
    };

    let req = ChatRequest::from_prompt(build_router_prompt(prompt, context, &registry.names()))
        .with_temperature(config.orchestrator.router_temperature)
        .with_max_tokens(config.orchestrator.max_tokens);

    let reply = match timed_call(
        backend,
        &config.roles.router,
        "router",
        run_id,
        config.orchestrator.direct_timeout_secs,
        req,
    )
    .await
    {
        Ok((resp, _)) => resp.content,
        Err(e) => {
            tracing::debug!(error = %e, "Routing call failed, using default decision");
            return fallback;
        }
    };

    let Some(parsed) = first_object::<RouterReply>(&reply) else {
        tracing::debug!("Routing reply had no parseable JSON, using default decision");
        return fallback;
    };

    // Suggested backends are only honored when they exist in the roster
    let pick = |suggestion: Option<String>, default: &str| -> String {
        suggestion
            .filter(|name| registry.contains(name))
            .unwrap_or_else(|| default.to_string())
    };

    let decision = RoutingDecision {
        task_type: parsed
            .task_type
            .or_else(|| context.and_then(|c| c.task_type))
            .unwrap_or_default(),
        requirements: parsed.requirements.unwrap_or_else(|| fallback.requirements.clone()),
        suggested_primary: pick(parsed.suggested_primary, &fallback.suggested_primary),
        suggested_secondary: pick(parsed.suggested_secondary, &fallback.suggested_secondary),
    };

    tracing::info!(
        task_type = decision.task_type.as_str(),
        primary = %decision.suggested_primary,
        secondary = %decision.suggested_secondary,
        "Request routed"
    );
    decision
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_decision_uses_caller_task_type() {
        let config = Config::default();
        let ctx = TaskContext {
            task_type: Some(TaskType::Summarize),
            ..Default::default()
        };
        let d = default_decision(&config, Some(&ctx));
        assert_eq!(d.task_type, TaskType::Summarize);
        assert_eq!(d.suggested_primary, "primary");
        assert_eq!(d.suggested_secondary, "quick");
    }

    #[test]
    fn test_default_decision_without_context_is_enhance() {
        let d = default_decision(&Config::default(), None);
        assert_eq!(d.task_type, TaskType::Enhance);
        assert_eq!(d.requirements, vec!["clarity"]);
    }

    #[test]
    fn test_router_prompt_mentions_request_and_backends() {
        let names = vec!["primary".to_string(), "quick".to_string()];
        let p = build_router_prompt("Plan a trip", None, &names);
        assert!(p.contains("\"Plan a trip\""));
        assert!(p.contains("primary, quick"));
        assert!(p.contains("generate-steps"));
    }

    #[test]
    fn test_router_reply_parses_from_prose() {
        let reply = "Here you go: {\"task_type\": \"elaborate\", \"requirements\": [\"depth\"], \
                     \"suggested_primary\": \"primary\", \"suggested_secondary\": \"quick\"}";
        let parsed: RouterReply = first_object(reply).unwrap();
        assert_eq!(parsed.task_type, Some(TaskType::Elaborate));
        assert_eq!(parsed.suggested_primary.as_deref(), Some("primary"));
    }
}
