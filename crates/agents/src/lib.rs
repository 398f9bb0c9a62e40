//! Agent variants, the execution engine seam, retry/backoff and guardrails.

pub mod error;
pub mod guardrail;
pub mod model;
pub mod prompt;
pub mod providers;
pub mod retry;
pub mod variant;

pub use {
    error::{Error, ExecutionError, Result},
    guardrail::{Guardrail, GuardrailKind, GuardrailVerdict, ModelGuardrail, NoopGuardrail},
    model::{AgentExecutor, ChatMessage, build_model_input},
    retry::{BackoffCaller, Invocation, Outcome, RetryPolicy},
    variant::{AgentVariant, Slot, VariantRegistry},
};
