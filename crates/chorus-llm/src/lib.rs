//! chorus-llm — Chat-completion backend abstraction layer.
//! Implements the LlmBackend trait, SSE delta decoding, and the
//! registry defined in ARCHITECTURE.md §5 and §6.

pub mod audit;
pub mod backend;
pub mod mock;
pub mod registry;
pub mod stream;

pub use backend::{ChatMessage, ChatRequest, ChatResponse, LlmBackend, LlmError};
pub use registry::{BackendKind, BackendRegistry, BackendSpec};
pub use stream::DeltaStream;
