//! Deterministic content checks around the model calls.
//!
//! Input validation runs before any model call is made; output
//! validation runs after the judge. Both are pure functions so they can
//! be tested without a pipeline. Rejection messages are user-facing and
//! never echo the offending content back.

use crate::judgment::Judgment;

/// Terms that disqualify a request before any model call.
///
/// Matching is plain lowercase substring matching, so a banned term
/// inside a longer word also rejects (e.g. "gunwale"). That is accepted
/// over-blocking for a children's service.
const BANNED_TERMS: [&str; 8] = [
    "kill", "murder", "blood", "gun", "weapon", "sex", "drugs", "suicide",
];

/// Minimum accepted story length in words.
pub const MIN_WORDS: usize = 400;

/// Maximum accepted story length in words.
pub const MAX_WORDS: usize = 600;

/// Keywords that mark a story's final line as a positive ending.
const POSITIVE_ENDING_KEYWORDS: [&str; 7] = [
    "happy", "smiled", "together", "learned", "kind", "safe", "peaceful",
];

/// Why a request or a candidate story was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// The request was empty or whitespace-only.
    EmptyRequest,
    /// The request contained a banned term.
    UnsafeContent,
    /// The story's word count fell outside the accepted range.
    LengthOutOfRange,
    /// The judge's effective verdict was a failure.
    QualityBelowThreshold,
    /// The story's last line contained no positive-ending keyword.
    MissingPositiveEnding,
}

impl RejectionReason {
    /// Returns the user-facing message for this rejection.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::EmptyRequest => "Story request cannot be empty.",
            Self::UnsafeContent => {
                "This story request includes themes that are not appropriate \
                 for a children's bedtime story. Please rephrase."
            }
            Self::LengthOutOfRange => "Story length is outside the acceptable range.",
            Self::QualityBelowThreshold => "Story did not meet quality requirements.",
            Self::MissingPositiveEnding => {
                "Story does not appear to have a clear, positive ending."
            }
        }
    }
}

/// Validates a story request before generation.
///
/// # Errors
///
/// Returns `EmptyRequest` for blank input and `UnsafeContent` when the
/// lowercased request contains a banned term.
pub fn validate_input(user_input: &str) -> Result<(), RejectionReason> {
    if user_input.trim().is_empty() {
        return Err(RejectionReason::EmptyRequest);
    }

    let lowered = user_input.trim().to_lowercase();
    if BANNED_TERMS.iter().any(|term| lowered.contains(term)) {
        return Err(RejectionReason::UnsafeContent);
    }

    Ok(())
}

/// Counts whitespace-separated words in a story.
#[must_use]
pub fn word_count(story: &str) -> usize {
    story.split_whitespace().count()
}

/// Returns `true` if the story's word count is within the accepted range.
#[must_use]
pub fn validate_story_length(story: &str) -> bool {
    (MIN_WORDS..=MAX_WORDS).contains(&word_count(story))
}

/// Returns `true` if the story's last line contains a positive-ending
/// keyword.
///
/// The last line is the final `'\n'`-separated segment of the trimmed
/// story, compared in lowercase.
#[must_use]
pub fn has_positive_ending(story: &str) -> bool {
    let last_line = story.trim().split('\n').next_back().unwrap_or_default();
    let lowered = last_line.to_lowercase();
    POSITIVE_ENDING_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Final validation of a judged story before it is returned.
///
/// Checks run in a fixed order (length, quality, ending) and the first
/// failure wins.
///
/// # Errors
///
/// Returns the first failing check's `RejectionReason`.
pub fn validate_final_story(story: &str, judgment: &Judgment) -> Result<(), RejectionReason> {
    if !validate_story_length(story) {
        return Err(RejectionReason::LengthOutOfRange);
    }

    if !judgment.passes() {
        return Err(RejectionReason::QualityBelowThreshold);
    }

    if !has_positive_ending(story) {
        return Err(RejectionReason::MissingPositiveEnding);
    }

    Ok(())
}
