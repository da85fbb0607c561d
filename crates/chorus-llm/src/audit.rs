//! Audit records for LLM calls.
//! See ARCHITECTURE.md §7.2

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: Uuid,
    pub run_id: Option<Uuid>,
    pub model: String,
    pub backend: String,
    /// Pipeline role of this call: candidate, router, judge,
    /// synthesis, fallback, or stream.
    pub role: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub output_hash: String,
    pub latency_ms: u64,
    pub called_at: chrono::DateTime<Utc>,
}

impl CallRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: Option<Uuid>,
        model: String,
        backend: String,
        role: &str,
        prompt_tokens: u32,
        completion_tokens: u32,
        output: &str,
        latency_ms: u64,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(output.as_bytes());
        let output_hash = format!("{:x}", hasher.finalize());

        Self {
            id: Uuid::new_v4(),
            run_id,
            model,
            backend,
            role: role.to_string(),
            prompt_tokens,
            completion_tokens,
            output_hash,
            latency_ms,
            called_at: Utc::now(),
        }
    }
}
