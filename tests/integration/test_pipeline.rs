//! End-to-end pipeline tests over a scripted model invoker.
//!
//! These exercise the full generate-judge-validate loop without any
//! network: the invoker replays a fixed script and the tests assert on
//! outcomes, call counts, and prompt contents.

mod common;

use std::sync::Arc;

use common::{failing_judgment_json, passing_judgment_json, valid_story, ScriptedInvoker};
use lullaby_engine::{DeclineKind, ModelConfig, PipelineOutcome, StoryPipeline, StoryRequest};
use lullaby_llm::InvokeError;

fn pipeline(invoker: ScriptedInvoker, max_retries: u32) -> StoryPipeline {
    StoryPipeline::new(Arc::new(invoker), max_retries, ModelConfig::default())
}

#[tokio::test]
async fn happy_path_accepts_on_first_attempt() {
    let invoker = ScriptedInvoker::new(vec![
        Ok(r#"{"theme": "friendship", "tone": "calm", "genre": "animals"}"#.to_string()),
        Ok(valid_story(480)),
        Ok(passing_judgment_json()),
    ]);
    let calls = invoker.calls();
    let pipeline = pipeline(invoker, 2);

    let outcome = pipeline
        .run(&StoryRequest::new("a story about a brave little turtle"), "it-1")
        .await;

    let PipelineOutcome::Accepted(story) = outcome else {
        panic!("expected an accepted story");
    };
    assert_eq!(story.attempt, 1);
    assert_eq!(story.word_count, 480);

    let calls = calls.lock().expect("lock");
    assert_eq!(calls.len(), 3, "classify, generate, judge");
    // Classification output feeds the generation prompt.
    assert!(calls[1].user_prompt.contains("Theme: friendship"));
    assert!(calls[1].user_prompt.contains("brave little turtle"));
    // The generation call carries the storyteller system prompt.
    assert!(calls[1]
        .system_prompt
        .as_deref()
        .is_some_and(|s| s.contains("bedtime storyteller")));
    // The judge sees the generated story.
    assert!(calls[2].user_prompt.contains("happy and safe together"));
}

#[tokio::test]
async fn unsafe_request_is_declined_without_model_calls() {
    let invoker = ScriptedInvoker::new(vec![]);
    let calls = invoker.calls();
    let pipeline = pipeline(invoker, 2);

    let outcome = pipeline
        .run(&StoryRequest::new("a story about a weapon"), "it-2")
        .await;

    let PipelineOutcome::Declined { kind, message } = outcome else {
        panic!("expected a decline");
    };
    assert_eq!(kind, DeclineKind::InputRejected);
    assert!(message.contains("not appropriate"));
    assert!(calls.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn judge_feedback_reaches_the_next_generation_prompt() {
    let invoker = ScriptedInvoker::new(vec![
        Ok("{}".to_string()),
        Ok(valid_story(500)),
        Ok(failing_judgment_json("give the fox a friend")),
        Ok(valid_story(520)),
        Ok(passing_judgment_json()),
    ]);
    let calls = invoker.calls();
    let pipeline = pipeline(invoker, 2);

    let outcome = pipeline
        .run(&StoryRequest::new("a story about a lonely fox"), "it-3")
        .await;

    assert!(matches!(outcome, PipelineOutcome::Accepted(s) if s.attempt == 2));

    let calls = calls.lock().expect("lock");
    assert_eq!(calls.len(), 5);
    assert!(!calls[1].user_prompt.contains("give the fox a friend"));
    assert!(calls[3].user_prompt.contains("give the fox a friend"));
}

#[tokio::test]
async fn exhausted_budget_returns_the_fixed_decline() {
    let invoker = ScriptedInvoker::new(vec![
        Ok("{}".to_string()),
        Ok(valid_story(500)),
        Ok(failing_judgment_json("try again")),
        Ok(valid_story(500)),
        Ok(failing_judgment_json("still not right")),
        Ok(valid_story(500)),
        Ok(failing_judgment_json("no")),
    ]);
    let calls = invoker.calls();
    let pipeline = pipeline(invoker, 2);

    let outcome = pipeline
        .run(&StoryRequest::new("a story about rain"), "it-4")
        .await;

    let PipelineOutcome::Declined { kind, message } = outcome else {
        panic!("expected a decline");
    };
    assert_eq!(kind, DeclineKind::Exhausted);
    assert!(message.starts_with("Sorry,"));
    assert!(message.contains("rephrasing"));
    // Three attempts: classify once, then (generate + judge) * 3.
    assert_eq!(calls.lock().expect("lock").len(), 7);
}

#[tokio::test]
async fn transient_failures_consume_attempts_until_success() {
    let invoker = ScriptedInvoker::new(vec![
        Ok("{}".to_string()),
        // Attempt 1: generation call fails outright.
        Err(InvokeError::Timeout { timeout_secs: 30.0 }),
        // Attempt 2: judge returns markdown-fenced garbage.
        Ok(valid_story(500)),
        Ok("```json\n{\"verdict\": \"PASS\"}\n```".to_string()),
        // Attempt 3: clean run.
        Ok(valid_story(500)),
        Ok(passing_judgment_json()),
    ]);
    let pipeline = pipeline(invoker, 2);

    let outcome = pipeline
        .run(&StoryRequest::new("a story about the moon"), "it-5")
        .await;

    assert!(matches!(outcome, PipelineOutcome::Accepted(s) if s.attempt == 3));
}

#[tokio::test]
async fn length_violations_retry_even_when_the_judge_passes() {
    let invoker = ScriptedInvoker::new(vec![
        Ok("{}".to_string()),
        Ok(valid_story(200)),
        Ok(passing_judgment_json()),
        Ok(valid_story(700)),
        Ok(passing_judgment_json()),
        Ok(valid_story(600)),
        Ok(passing_judgment_json()),
    ]);
    let pipeline = pipeline(invoker, 2);

    let outcome = pipeline
        .run(&StoryRequest::new("a story about clouds"), "it-6")
        .await;

    let PipelineOutcome::Accepted(story) = outcome else {
        panic!("expected acceptance on the boundary-length story");
    };
    assert_eq!(story.attempt, 3);
    assert_eq!(story.word_count, 600);
}

#[tokio::test]
async fn missing_positive_ending_declines_after_budget() {
    let no_ending = format!("{}\nAnd then it simply stopped.", vec!["word"; 495].join(" "));
    let invoker = ScriptedInvoker::new(vec![
        Ok("{}".to_string()),
        Ok(no_ending.clone()),
        Ok(passing_judgment_json()),
        Ok(no_ending),
        Ok(passing_judgment_json()),
    ]);
    let pipeline = pipeline(invoker, 1);

    let outcome = pipeline
        .run(&StoryRequest::new("a story about a clock"), "it-7")
        .await;

    assert!(matches!(
        outcome,
        PipelineOutcome::Declined {
            kind: DeclineKind::Exhausted,
            ..
        }
    ));
}

#[tokio::test]
async fn zero_retries_means_exactly_one_attempt() {
    let invoker = ScriptedInvoker::new(vec![
        Ok("{}".to_string()),
        Ok(valid_story(500)),
        Ok(failing_judgment_json("feedback that will never be used")),
    ]);
    let calls = invoker.calls();
    let pipeline = pipeline(invoker, 0);

    let outcome = pipeline
        .run(&StoryRequest::new("a story about a kite"), "it-8")
        .await;

    assert!(matches!(
        outcome,
        PipelineOutcome::Declined {
            kind: DeclineKind::Exhausted,
            ..
        }
    ));
    assert_eq!(calls.lock().expect("lock").len(), 3);
}
