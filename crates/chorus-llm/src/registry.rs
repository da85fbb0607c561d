//! Backend registry built from configuration.
//! See ARCHITECTURE.md §5.3
//!
//! Credentials are never embedded: each spec names the environment
//! variable holding its bearer key, resolved once at build time.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::{LlmBackend, OllamaBackend, OpenAiCompatibleBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Ollama,
    // snake_case would give "open_ai_compatible"; the config format
    // uses the provider-style spelling
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
}

/// One entry of the configured backend roster (`[[backend]]` in
/// chorus.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSpec {
    pub name: String,
    pub kind: BackendKind,
    pub model: String,
    /// Required for openai_compatible; defaults to local Ollama otherwise.
    pub base_url: Option<String>,
    /// Name of the environment variable holding the bearer key.
    pub api_key_env: Option<String>,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

/// Maps configured backend names to live transports.
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn LlmBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every backend in the roster. A spec whose key variable is
    /// named but unset is registered without a key (valid for local
    /// OpenAI-compatible servers) with a warning.
    pub fn from_specs(specs: &[BackendSpec]) -> Self {
        let mut registry = Self::new();
        for spec in specs {
            let backend: Arc<dyn LlmBackend> = match spec.kind {
                BackendKind::Ollama => Arc::new(OllamaBackend::new(
                    spec.base_url.clone().unwrap_or_else(default_ollama_url),
                    spec.model.clone(),
                )),
                BackendKind::OpenAiCompatible => {
                    let api_key = spec.api_key_env.as_deref().and_then(|var| {
                        let key = std::env::var(var).ok().filter(|k| !k.is_empty());
                        if key.is_none() {
                            tracing::warn!(
                                backend = %spec.name,
                                var = %var,
                                "API key variable not set; registering backend without credentials"
                            );
                        }
                        key
                    });
                    Arc::new(OpenAiCompatibleBackend::new(
                        spec.base_url.clone().unwrap_or_else(default_ollama_url),
                        spec.model.clone(),
                        api_key,
                    ))
                }
            };
            registry.register(spec.name.clone(), backend);
        }
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn LlmBackend>) {
        self.backends.insert(name.into(), backend);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LlmBackend>> {
        self.backends.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Registered backend names, sorted for stable prompt rendering.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_from_specs() {
        let specs = vec![
            BackendSpec {
                name: "local".to_string(),
                kind: BackendKind::Ollama,
                model: "llama3:8b".to_string(),
                base_url: None,
                api_key_env: None,
            },
            BackendSpec {
                name: "remote".to_string(),
                kind: BackendKind::OpenAiCompatible,
                model: "quick-7b".to_string(),
                base_url: Some("https://example.invalid/api".to_string()),
                api_key_env: Some("CHORUS_TEST_KEY_THAT_IS_NOT_SET".to_string()),
            },
        ];
        let registry = BackendRegistry::from_specs(&specs);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("local"));
        assert!(registry.get("remote").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["local", "remote"]);
    }

    #[test]
    fn test_backend_kind_serde_names() {
        let k: BackendKind = serde_json::from_str("\"openai_compatible\"").unwrap();
        assert_eq!(k, BackendKind::OpenAiCompatible);
        assert_eq!(
            serde_json::to_string(&BackendKind::OpenAiCompatible).unwrap(),
            "\"openai_compatible\""
        );
        assert_eq!(serde_json::to_string(&BackendKind::Ollama).unwrap(), "\"ollama\"");
    }
}
