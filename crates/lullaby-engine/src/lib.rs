//! Lullaby story engine
//!
//! Generates bedtime stories for children aged 5 to 10 behind a
//! generate-judge-validate loop:
//!
//! 1. **Validate** the request (empty check, banned terms) before any
//!    model call.
//! 2. **Classify** the request into theme, tone, and genre.
//! 3. **Generate** a candidate story with prompt-level guardrails.
//! 4. **Judge** it across four dimensions with a second model call.
//! 5. **Validate** the judged story deterministically (length, quality,
//!    positive ending) and accept, or retry with the judge's feedback.
//!
//! The whole run is driven through an explicit [`pipeline::PipelineState`]
//! machine and always ends in a typed [`pipeline::PipelineOutcome`]. The
//! [`api`] module wraps the pipeline in an axum gateway with per-request
//! ids, rate limiting, and CORS.

pub mod api;
pub mod config;
pub mod error;
pub mod judgment;
pub mod pipeline;
pub mod prompts;
pub mod rate_limit;
pub mod validators;


pub use api::{create_router, AppState};
pub use config::{Config, ModelConfig};
pub use error::{EngineError, Result};
pub use judgment::{Classification, Judgment, Verdict};
pub use pipeline::{
    AcceptedStory, DeclineKind, PipelineOutcome, PipelineState, StoryPipeline, StoryRequest,
};
pub use rate_limit::{RateDecision, RateLimiter};
