//! Shared helpers for the integration tests.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lullaby_llm::{InvokeError, InvokeRequest, ModelInvoker};

/// A model invoker that replays a fixed script of responses and records
/// every request it receives.
pub struct ScriptedInvoker {
    responses: Mutex<VecDeque<Result<String, InvokeError>>>,
    calls: Arc<Mutex<Vec<InvokeRequest>>>,
}

impl ScriptedInvoker {
    pub fn new(responses: Vec<Result<String, InvokeError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<InvokeRequest>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ModelInvoker for ScriptedInvoker {
    async fn invoke(&self, request: &InvokeRequest) -> Result<String, InvokeError> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(request.clone());
        self.responses
            .lock()
            .expect("responses lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(InvokeError::unavailable("script exhausted")))
    }
}

/// Builds a story with exactly `words` words and a positive final line.
pub fn valid_story(words: usize) -> String {
    let ending = "Everyone was happy and safe together.";
    let ending_words = ending.split_whitespace().count();
    let filler = vec!["word"; words.saturating_sub(ending_words)];
    format!("{}\n{ending}", filler.join(" "))
}

/// A judgment response with the given scores, verdict, and feedback.
pub fn judgment_json(scores: [u8; 4], verdict: &str, feedback: &str) -> String {
    serde_json::json!({
        "scores": {
            "age_appropriateness": {"score": scores[0], "reason": "r"},
            "story_structure": {"score": scores[1], "reason": "r"},
            "engagement": {"score": scores[2], "reason": "r"},
            "request_alignment": {"score": scores[3], "reason": "r"},
        },
        "verdict": verdict,
        "improvement_feedback": feedback,
    })
    .to_string()
}

/// A judgment that passes every dimension.
pub fn passing_judgment_json() -> String {
    judgment_json([4, 4, 4, 4], "PASS", "")
}

/// A judgment that fails one dimension with the given feedback.
pub fn failing_judgment_json(feedback: &str) -> String {
    judgment_json([2, 4, 4, 4], "FAIL", feedback)
}
