//! Configuration loading for Chorus.
//! Reads chorus.toml from the current directory or the path in the
//! CHORUS_CONFIG env var. See ARCHITECTURE.md §7.1

use serde::{Deserialize, Serialize};
use std::path::Path;

use chorus_llm::registry::BackendSpec;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend roster (`[[backend]]` tables).
    #[serde(default, rename = "backend")]
    pub backends: Vec<BackendSpec>,
    #[serde(default)]
    pub roles: RolesConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Which roster entry fills each pipeline role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolesConfig {
    /// Routing-capable backend answering the task-classification meta-prompt.
    #[serde(default = "default_role_router")]
    pub router: String,
    /// Judge backend ranking candidate answers.
    #[serde(default = "default_role_judge")]
    pub judge: String,
    /// Backend merging candidates when confidence is low.
    #[serde(default = "default_role_primary")]
    pub synthesis: String,
    /// Baseline backend for the single-shot fallback.
    #[serde(default = "default_role_primary")]
    pub fallback: String,
    /// Default candidate pair when routing cannot suggest one.
    #[serde(default = "default_role_primary")]
    pub default_primary: String,
    #[serde(default = "default_role_quick")]
    pub default_secondary: String,
}

fn default_role_router()  -> String { "router".to_string() }
fn default_role_judge()   -> String { "judge".to_string() }
fn default_role_primary() -> String { "primary".to_string() }
fn default_role_quick()   -> String { "quick".to_string() }

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            router:            default_role_router(),
            judge:             default_role_judge(),
            synthesis:         default_role_primary(),
            fallback:          default_role_primary(),
            default_primary:   default_role_primary(),
            default_secondary: default_role_quick(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Per-call timeout for direct (non-streaming) backend calls.
    #[serde(default = "default_direct_timeout")]
    pub direct_timeout_secs: u64,
    /// Timeout covering an entire streaming relay.
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout_secs: u64,
    /// Judge confidence below which synthesis is attempted.
    #[serde(default = "default_synthesis_threshold")]
    pub synthesis_threshold: u8,
    /// Synthesized text shorter than this is discarded.
    #[serde(default = "default_min_synthesis_chars")]
    pub min_synthesis_chars: usize,
    /// Confidence assigned to an unscored best candidate.
    #[serde(default = "default_confidence")]
    pub default_confidence: u8,
    /// Confidence assigned to a fallback answer.
    #[serde(default = "default_fallback_confidence")]
    pub fallback_confidence: u8,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_router_temperature")]
    pub router_temperature: f32,
    #[serde(default = "default_judge_temperature")]
    pub judge_temperature: f32,
    #[serde(default = "default_synthesis_temperature")]
    pub synthesis_temperature: f32,
    #[serde(default = "default_quick_temperature")]
    pub quick_temperature: f32,
    #[serde(default = "default_reasoning_temperature")]
    pub reasoning_temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_direct_timeout()        -> u64   { 10 }
fn default_stream_timeout()        -> u64   { 15 }
fn default_synthesis_threshold()   -> u8    { 80 }
fn default_min_synthesis_chars()   -> usize { 50 }
fn default_confidence()            -> u8    { 75 }
fn default_fallback_confidence()   -> u8    { 50 }
fn default_temperature()           -> f32   { 0.7 }
fn default_router_temperature()    -> f32   { 0.3 }
fn default_judge_temperature()     -> f32   { 0.3 }
fn default_synthesis_temperature() -> f32   { 0.5 }
fn default_quick_temperature()     -> f32   { 0.5 }
fn default_reasoning_temperature() -> f32   { 0.4 }
fn default_max_tokens()            -> u32   { 500 }

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            direct_timeout_secs:   default_direct_timeout(),
            stream_timeout_secs:   default_stream_timeout(),
            synthesis_threshold:   default_synthesis_threshold(),
            min_synthesis_chars:   default_min_synthesis_chars(),
            default_confidence:    default_confidence(),
            fallback_confidence:   default_fallback_confidence(),
            temperature:           default_temperature(),
            router_temperature:    default_router_temperature(),
            judge_temperature:     default_judge_temperature(),
            synthesis_temperature: default_synthesis_temperature(),
            quick_temperature:     default_quick_temperature(),
            reasoning_temperature: default_reasoning_temperature(),
            max_tokens:            default_max_tokens(),
        }
    }
}

impl Config {
    /// Load configuration from chorus.toml.
    /// Checks CHORUS_CONFIG env var first, then current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CHORUS_CONFIG")
            .unwrap_or_else(|_| "chorus.toml".to_string());

        if !Path::new(&path).exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy chorus.example.toml to chorus.toml and edit it.",
                path
            );
        }

        Self::load_from(&path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
