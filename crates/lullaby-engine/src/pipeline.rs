//! The story pipeline: generate, judge, validate, retry.
//!
//! A request flows through an explicit state machine. Input validation
//! happens before any model call; then up to `max_retries + 1` attempts
//! each generate a story, judge it, and validate the result. A failed
//! attempt carries the judge's improvement feedback into the next
//! generation prompt. The pipeline never returns an error to the caller:
//! every run ends in an accepted story or a typed decline.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lullaby_llm::{InvokeRequest, ModelInvoker};
use tracing::{debug, error, info, warn};

use crate::config::ModelConfig;
use crate::error::{EngineError, Result};
use crate::judgment::{parse_classification, parse_judgment, Classification, Judgment};
use crate::prompts;
use crate::validators::{self, RejectionReason};

/// Decline shown when every attempt was spent without an accepted story.
pub const DECLINE_EXHAUSTED: &str = "Sorry, I couldn't create a suitable bedtime story this time. \
                                     Please try rephrasing your request.";

// ============================================================================
// Request and Outcome Types
// ============================================================================

/// An incoming story request.
#[derive(Debug, Clone)]
pub struct StoryRequest {
    /// The user's story request text.
    pub user_input: String,
    /// Optional caller-provided feedback applied to the first attempt.
    pub feedback: Option<String>,
}

impl StoryRequest {
    /// Creates a request with no initial feedback.
    #[must_use]
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            feedback: None,
        }
    }

    /// Sets the initial feedback.
    #[must_use]
    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }
}

/// A story that passed every check.
#[derive(Debug, Clone)]
pub struct AcceptedStory {
    /// The story text.
    pub text: String,
    /// Whitespace-separated word count.
    pub word_count: usize,
    /// The 1-based attempt that produced it.
    pub attempt: u32,
    /// When the story was accepted.
    pub accepted_at: DateTime<Utc>,
}

/// Why a request was declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineKind {
    /// The request failed input validation; no model call was made.
    InputRejected,
    /// Every attempt was spent without an accepted story.
    Exhausted,
}

/// The final result of one pipeline run.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// A story was generated and passed every check.
    Accepted(AcceptedStory),
    /// No story; `message` is safe to show to the user.
    Declined {
        /// Whether the input was rejected or the attempt budget spent.
        kind: DeclineKind,
        /// User-facing decline message.
        message: String,
    },
}

impl PipelineOutcome {
    fn input_rejected(reason: RejectionReason) -> Self {
        Self::Declined {
            kind: DeclineKind::InputRejected,
            message: reason.message().to_string(),
        }
    }

    fn exhausted() -> Self {
        Self::Declined {
            kind: DeclineKind::Exhausted,
            message: DECLINE_EXHAUSTED.to_string(),
        }
    }
}

// ============================================================================
// State Machine
// ============================================================================

/// Where a pipeline run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Checking the request before any model call.
    ValidatingInput,
    /// Extracting theme, tone, and genre from the request.
    Classifying,
    /// Generating a candidate story.
    Generating,
    /// Waiting on the judge's evaluation.
    Judging,
    /// Running deterministic checks on a judged story.
    ValidatingOutput,
    /// An attempt failed; another attempt remains.
    Retrying,
    /// Terminal: a story was accepted.
    Accepted,
    /// Terminal: the attempt budget was spent.
    Exhausted,
    /// Terminal: the input was rejected before generation.
    Rejected,
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ValidatingInput => "validating_input",
            Self::Classifying => "classifying",
            Self::Generating => "generating",
            Self::Judging => "judging",
            Self::ValidatingOutput => "validating_output",
            Self::Retrying => "retrying",
            Self::Accepted => "accepted",
            Self::Exhausted => "exhausted",
            Self::Rejected => "rejected",
        };
        write!(f, "{name}")
    }
}

/// How one attempt ended short of acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The generation call failed or produced empty text.
    GenerationFailed,
    /// The judge call failed or its response did not parse.
    JudgmentFailed,
    /// The judged story failed a deterministic check.
    Rejected(RejectionReason),
}

/// Record of one spent attempt.
#[derive(Debug, Clone, Copy)]
pub struct AttemptRecord {
    /// The 1-based attempt number.
    pub attempt: u32,
    /// How the attempt ended.
    pub outcome: AttemptOutcome,
}

/// The pipeline's explicit state.
///
/// Every transition is a method that checks the current phase, so an
/// out-of-order call is an [`EngineError::InvalidStateTransition`]
/// instead of silent corruption.
#[derive(Debug)]
pub struct PipelineState {
    phase: PipelinePhase,
    attempt: u32,
    max_attempts: u32,
    history: Vec<AttemptRecord>,
    started_at: DateTime<Utc>,
}

impl PipelineState {
    /// Creates a fresh state with the given total attempt budget.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            phase: PipelinePhase::ValidatingInput,
            attempt: 0,
            max_attempts,
            history: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Returns when this run started.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn phase(&self) -> PipelinePhase {
        self.phase
    }

    /// Returns the current 1-based attempt number (0 before the first).
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the records of spent attempts.
    #[must_use]
    pub fn history(&self) -> &[AttemptRecord] {
        &self.history
    }

    /// Returns `true` if another attempt may be started.
    #[must_use]
    pub const fn attempts_remaining(&self) -> bool {
        self.attempt < self.max_attempts
    }

    fn transition(&mut self, allowed: &[PipelinePhase], to: PipelinePhase) -> Result<()> {
        if allowed.contains(&self.phase) {
            self.phase = to;
            Ok(())
        } else {
            Err(EngineError::invalid_transition(self.phase, to))
        }
    }

    /// Rejects the input before any model call.
    ///
    /// # Errors
    ///
    /// Returns an error unless the pipeline is validating input.
    pub fn reject(&mut self) -> Result<()> {
        self.transition(&[PipelinePhase::ValidatingInput], PipelinePhase::Rejected)
    }

    /// Moves from input validation to classification.
    ///
    /// # Errors
    ///
    /// Returns an error unless the pipeline is validating input.
    pub fn begin_classifying(&mut self) -> Result<()> {
        self.transition(&[PipelinePhase::ValidatingInput], PipelinePhase::Classifying)
    }

    /// Starts a generation attempt, consuming one unit of the budget.
    ///
    /// # Errors
    ///
    /// Returns an error unless the pipeline just classified or is
    /// retrying.
    pub fn begin_attempt(&mut self) -> Result<()> {
        self.transition(
            &[PipelinePhase::Classifying, PipelinePhase::Retrying],
            PipelinePhase::Generating,
        )?;
        self.attempt += 1;
        Ok(())
    }

    /// Moves a generated story to judgment.
    ///
    /// # Errors
    ///
    /// Returns an error unless the pipeline is generating.
    pub fn begin_judging(&mut self) -> Result<()> {
        self.transition(&[PipelinePhase::Generating], PipelinePhase::Judging)
    }

    /// Moves a judged story to output validation.
    ///
    /// # Errors
    ///
    /// Returns an error unless the pipeline is judging.
    pub fn begin_output_validation(&mut self) -> Result<()> {
        self.transition(&[PipelinePhase::Judging], PipelinePhase::ValidatingOutput)
    }

    /// Records a failed attempt and moves to retrying.
    ///
    /// # Errors
    ///
    /// Returns an error unless an attempt is in flight.
    pub fn retry(&mut self, outcome: AttemptOutcome) -> Result<()> {
        self.transition(
            &[
                PipelinePhase::Generating,
                PipelinePhase::Judging,
                PipelinePhase::ValidatingOutput,
            ],
            PipelinePhase::Retrying,
        )?;
        self.history.push(AttemptRecord {
            attempt: self.attempt,
            outcome,
        });
        Ok(())
    }

    /// Accepts the current story; terminal.
    ///
    /// # Errors
    ///
    /// Returns an error unless the pipeline is validating output.
    pub fn accept(&mut self) -> Result<()> {
        self.transition(&[PipelinePhase::ValidatingOutput], PipelinePhase::Accepted)
    }

    /// Marks the attempt budget as spent; terminal.
    ///
    /// # Errors
    ///
    /// Returns an error unless the pipeline is retrying.
    pub fn exhaust(&mut self) -> Result<()> {
        self.transition(&[PipelinePhase::Retrying], PipelinePhase::Exhausted)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Drives story requests through the generate-judge-validate loop.
pub struct StoryPipeline {
    invoker: Arc<dyn ModelInvoker>,
    max_retries: u32,
    model: ModelConfig,
}

impl StoryPipeline {
    /// Creates a pipeline over the given invoker.
    ///
    /// `max_retries` is the number of retries after the first attempt,
    /// so the total attempt budget is `max_retries + 1`.
    #[must_use]
    pub fn new(invoker: Arc<dyn ModelInvoker>, max_retries: u32, model: ModelConfig) -> Self {
        Self {
            invoker,
            max_retries,
            model,
        }
    }

    /// Runs one request to completion.
    ///
    /// This never fails: internal errors are logged and surface as an
    /// exhausted decline.
    pub async fn run(&self, request: &StoryRequest, request_id: &str) -> PipelineOutcome {
        match self.run_inner(request, request_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(request_id, error = %e, "pipeline_error");
                PipelineOutcome::exhausted()
            }
        }
    }

    async fn run_inner(&self, request: &StoryRequest, request_id: &str) -> Result<PipelineOutcome> {
        let mut state = PipelineState::new(self.max_retries + 1);

        if let Err(reason) = validators::validate_input(&request.user_input) {
            state.reject()?;
            info!(request_id, reason = ?reason, "input_rejected");
            return Ok(PipelineOutcome::input_rejected(reason));
        }

        state.begin_classifying()?;
        let classification = self.classify(&request.user_input, request_id).await;

        let mut feedback = request
            .feedback
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(String::from);

        while state.attempts_remaining() {
            state.begin_attempt()?;
            info!(
                request_id,
                attempt = state.attempt(),
                max_attempts = self.max_retries + 1,
                "attempt_start"
            );

            let Some(story) = self
                .generate(
                    &request.user_input,
                    classification.as_ref(),
                    feedback.as_deref(),
                    request_id,
                )
                .await
            else {
                state.retry(AttemptOutcome::GenerationFailed)?;
                continue;
            };

            state.begin_judging()?;
            let Some(judgment) = self.judge(&story, &request.user_input, request_id).await else {
                state.retry(AttemptOutcome::JudgmentFailed)?;
                continue;
            };

            state.begin_output_validation()?;
            match validators::validate_final_story(&story, &judgment) {
                Ok(()) => {
                    state.accept()?;
                    let word_count = validators::word_count(&story);
                    info!(
                        request_id,
                        attempt = state.attempt(),
                        word_count,
                        "story_accepted"
                    );
                    return Ok(PipelineOutcome::Accepted(AcceptedStory {
                        text: story,
                        word_count,
                        attempt: state.attempt(),
                        accepted_at: Utc::now(),
                    }));
                }
                Err(reason) => {
                    // The judge's feedback replaces earlier feedback
                    // rather than accumulating.
                    feedback = judgment.feedback().map(String::from);
                    info!(
                        request_id,
                        attempt = state.attempt(),
                        reason = ?reason,
                        has_feedback = feedback.is_some(),
                        "attempt_rejected"
                    );
                    state.retry(AttemptOutcome::Rejected(reason))?;
                }
            }
        }

        state.exhaust()?;
        info!(
            request_id,
            attempts = state.attempt(),
            "attempts_exhausted"
        );
        Ok(PipelineOutcome::exhausted())
    }

    fn base_request(&self, user_prompt: String) -> InvokeRequest {
        InvokeRequest::new(user_prompt)
            .with_max_tokens(self.model.max_tokens)
            .with_temperature(self.model.temperature)
            .with_timeout(self.model.timeout())
    }

    async fn classify(&self, user_input: &str, request_id: &str) -> Option<Classification> {
        let request = self.base_request(prompts::build_classification_prompt(user_input));

        let raw = match self.invoker.invoke(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(request_id, error = %e, "classification_call_failed");
                return None;
            }
        };

        match parse_classification(&raw) {
            Ok(classification) => {
                debug!(request_id, ?classification, "request_classified");
                Some(classification)
            }
            Err(e) => {
                warn!(request_id, error = %e, "classification_unparseable");
                None
            }
        }
    }

    async fn generate(
        &self,
        user_input: &str,
        classification: Option<&Classification>,
        feedback: Option<&str>,
        request_id: &str,
    ) -> Option<String> {
        let prompt = prompts::build_storyteller_prompt(user_input, classification, feedback);
        let request = self
            .base_request(prompt)
            .with_system_prompt(prompts::STORYTELLER_SYSTEM_PROMPT);

        match self.invoker.invoke(&request).await {
            Ok(raw) => {
                let story = raw.trim();
                if story.is_empty() {
                    warn!(request_id, "generation_returned_empty_story");
                    None
                } else {
                    Some(story.to_string())
                }
            }
            Err(e) => {
                warn!(request_id, error = %e, "generation_call_failed");
                None
            }
        }
    }

    async fn judge(&self, story: &str, user_input: &str, request_id: &str) -> Option<Judgment> {
        let prompt = prompts::build_judge_prompt(story, user_input);
        let request = self
            .base_request(prompt)
            .with_system_prompt(prompts::JUDGE_SYSTEM_PROMPT);

        let raw = match self.invoker.invoke(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(request_id, error = %e, "judge_call_failed");
                return None;
            }
        };

        match parse_judgment(&raw) {
            Ok(judgment) => {
                debug!(
                    request_id,
                    min_score = judgment.scores.min_score(),
                    "story_judged"
                );
                Some(judgment)
            }
            Err(e) => {
                warn!(request_id, error = %e, "judgment_unparseable");
                None
            }
        }
    }
}
