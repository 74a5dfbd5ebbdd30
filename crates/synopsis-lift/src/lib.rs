//! Generation clients and the quality-gated regeneration controller.
//!
//! # Architecture
//!
//! - **provider**: `GenerationClient` trait with Gemini and OpenAI-compatible clients
//! - **pipeline**: `Summarizer`, which runs attempt → evaluate → accept/retry/exhaust
//! - **usage**: token usage accumulated across attempts

pub mod pipeline;
pub mod provider;
pub mod usage;

pub use pipeline::{
    Acceptance, AttemptRecord, AttemptStatus, GenerateError, GenerateOptions, GenerationOutcome,
    Summarizer, generate,
};
pub use provider::{
    AnyClient, GeminiClient, GenerationClient, GenerationParams, OpenAiClient, ProviderError,
    client_from_env,
};
pub use usage::{UsageTotals, UsageTracker};
