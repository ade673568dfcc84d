//! Typed model outputs: request classification and story judgment.
//!
//! Both the classifier and the judge are instructed to answer with bare
//! JSON. Parsing is strict: anything that is not valid JSON of the
//! expected shape (markdown fences included) is a parse error, and the
//! pipeline treats it as a failed attempt.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// High-level attributes extracted from a story request.
///
/// All fields are optional; the storyteller prompt substitutes
/// `"not specified"` for anything the classifier left out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Classification {
    /// Story theme, e.g. friendship or courage.
    #[serde(default)]
    pub theme: Option<String>,
    /// Story tone, e.g. calm or playful.
    #[serde(default)]
    pub tone: Option<String>,
    /// Story genre, e.g. animals or fantasy.
    #[serde(default)]
    pub genre: Option<String>,
}

/// One scored evaluation dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionScore {
    /// Score from 1 to 5.
    #[serde(deserialize_with = "deserialize_score")]
    pub score: u8,
    /// The judge's short explanation.
    pub reason: String,
}

fn deserialize_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = u8::deserialize(deserializer)?;
    if (1..=5).contains(&value) {
        Ok(value)
    } else {
        Err(serde::de::Error::custom(format!(
            "score must be between 1 and 5, got {value}"
        )))
    }
}

/// Scores across the four evaluation dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeScores {
    /// No scary or disturbing content, age-appropriate vocabulary.
    pub age_appropriateness: DimensionScore,
    /// Clear beginning, middle, end, and resolution.
    pub story_structure: DimensionScore,
    /// Likable characters, holds a child's attention.
    pub engagement: DimensionScore,
    /// Matches what the user actually asked for.
    pub request_alignment: DimensionScore,
}

impl JudgeScores {
    /// Returns the lowest of the four dimension scores.
    #[must_use]
    pub fn min_score(&self) -> u8 {
        self.age_appropriateness
            .score
            .min(self.story_structure.score)
            .min(self.engagement.score)
            .min(self.request_alignment.score)
    }
}

/// The judge's overall verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// All dimension scores are 3 or higher.
    #[serde(rename = "PASS")]
    Pass,
    /// At least one dimension score is below 3.
    #[serde(rename = "FAIL")]
    Fail,
}

/// A complete judgment of one candidate story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judgment {
    /// Per-dimension scores.
    pub scores: JudgeScores,
    /// The verdict the judge stated.
    pub verdict: Verdict,
    /// Suggestions for the next attempt; empty when the story passed.
    #[serde(default)]
    pub improvement_feedback: String,
}

impl Judgment {
    /// Returns the verdict recomputed from the scores.
    ///
    /// The stated verdict is advisory only: the verdict that counts is
    /// derived from the scores (`Fail` if any dimension scored below 3).
    /// A mismatch with the stated verdict is logged.
    #[must_use]
    pub fn effective_verdict(&self) -> Verdict {
        let computed = if self.scores.min_score() >= 3 {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
        if computed != self.verdict {
            warn!(
                stated = ?self.verdict,
                computed = ?computed,
                min_score = self.scores.min_score(),
                "judge_verdict_mismatch"
            );
        }
        computed
    }

    /// Returns `true` if the effective verdict is `Pass`.
    #[must_use]
    pub fn passes(&self) -> bool {
        self.effective_verdict() == Verdict::Pass
    }

    /// Returns the improvement feedback, or `None` when it is empty.
    #[must_use]
    pub fn feedback(&self) -> Option<&str> {
        let feedback = self.improvement_feedback.trim();
        if feedback.is_empty() {
            None
        } else {
            Some(feedback)
        }
    }
}

/// Parses a raw classifier response.
///
/// # Errors
///
/// Returns the underlying `serde_json::Error` if the response is not
/// valid JSON of the expected shape.
pub fn parse_classification(raw: &str) -> Result<Classification, serde_json::Error> {
    serde_json::from_str(raw.trim())
}

/// Parses a raw judge response.
///
/// # Errors
///
/// Returns the underlying `serde_json::Error` if the response is not
/// valid JSON of the expected shape.
pub fn parse_judgment(raw: &str) -> Result<Judgment, serde_json::Error> {
    serde_json::from_str(raw.trim())
}
