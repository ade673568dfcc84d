//! End-to-end gateway tests over a real TCP server.
//!
//! Each test binds an ephemeral port, serves the router, and drives it
//! with reqwest. One test goes all the way down: gateway, pipeline, and
//! the real OpenAI invoker against a wiremock chat-completions endpoint.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use common::{failing_judgment_json, passing_judgment_json, valid_story, ScriptedInvoker};
use lullaby_engine::{AppState, Config, ModelConfig, StoryPipeline};
use lullaby_llm::{InvokeError, ModelInvoker, OpenAiInvoker};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves the router on an ephemeral port and returns its base URL.
async fn spawn_gateway(config: Config, invoker: Arc<dyn ModelInvoker>) -> String {
    let max_retries = config.max_retries;
    let model = config.model.clone();
    let pipeline = StoryPipeline::new(invoker, max_retries, model);
    let router = lullaby_engine::create_router(AppState::new(config, pipeline));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("server");
    });

    format!("http://{addr}")
}

fn scripted(responses: Vec<Result<String, InvokeError>>) -> Arc<dyn ModelInvoker> {
    Arc::new(ScriptedInvoker::new(responses))
}

/// Wraps completion text in the chat-completions response shape.
fn completion(text: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": text}}]
    })
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let base = spawn_gateway(Config::default(), scripted(vec![])).await;

    let response = reqwest::get(format!("{base}/api/health"))
        .await
        .expect("request");

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("json");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn story_request_round_trips_with_request_id() {
    let base = spawn_gateway(
        Config::default(),
        scripted(vec![
            Ok("{}".to_string()),
            Ok(valid_story(500)),
            Ok(passing_judgment_json()),
        ]),
    )
    .await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/api/story"))
        .json(&serde_json::json!({"userInput": "a story about a turtle"}))
        .send()
        .await
        .expect("request");

    assert_eq!(response.status(), 200);
    let header_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .expect("x-request-id header");

    let body: serde_json::Value = response.json().await.expect("json");
    assert!(body["story"].as_str().expect("story").contains("happy"));
    assert_eq!(body["requestId"].as_str().expect("requestId"), header_id);
}

#[tokio::test]
async fn declined_request_returns_400_with_message() {
    let base = spawn_gateway(Config::default(), scripted(vec![])).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/api/story"))
        .json(&serde_json::json!({"userInput": "a story about drugs"}))
        .send()
        .await
        .expect("request");

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.expect("json");
    assert!(body["error"]
        .as_str()
        .expect("error")
        .contains("not appropriate"));
    assert!(!body["requestId"].as_str().expect("requestId").is_empty());
}

#[tokio::test]
async fn rate_limit_kicks_in_per_client() {
    let config = Config {
        rate_limit_max_requests: 2,
        ..Default::default()
    };
    let base = spawn_gateway(
        config,
        scripted(vec![
            Ok("{}".to_string()),
            Ok(valid_story(500)),
            Ok(passing_judgment_json()),
            Ok("{}".to_string()),
            Ok(valid_story(500)),
            Ok(passing_judgment_json()),
        ]),
    )
    .await;

    let client = reqwest::Client::new();
    let body = serde_json::json!({"userInput": "a story about a turtle"});

    for _ in 0..2 {
        let response = client
            .post(format!("{base}/api/story"))
            .json(&body)
            .send()
            .await
            .expect("request");
        assert_eq!(response.status(), 200);
    }

    let limited = client
        .post(format!("{base}/api/story"))
        .json(&body)
        .send()
        .await
        .expect("request");
    assert_eq!(limited.status(), 429);
    let json: serde_json::Value = limited.json().await.expect("json");
    assert_eq!(json["error"], "Rate limit exceeded.");
}

#[tokio::test]
async fn full_stack_run_against_mock_completions_api() {
    // Three chat-completions calls in order: classify, generate, judge.
    let model_server = MockServer::start().await;
    for text in [
        r#"{"theme": "kindness", "tone": "calm", "genre": "animals"}"#.to_string(),
        valid_story(450),
        passing_judgment_json(),
    ] {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(&text)))
            .up_to_n_times(1)
            .mount(&model_server)
            .await;
    }

    let config = Config {
        model: ModelConfig {
            base_url: model_server.uri(),
            ..Default::default()
        },
        ..Default::default()
    };
    let invoker = OpenAiInvoker::with_base_url(
        Some("sk-test"),
        config.model.name.clone(),
        config.model.base_url.clone(),
    );
    let base = spawn_gateway(config, Arc::new(invoker)).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/api/story"))
        .json(&serde_json::json!({"userInput": "a kind story about a hedgehog"}))
        .send()
        .await
        .expect("request");

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("json");
    assert!(body["story"]
        .as_str()
        .expect("story")
        .contains("happy and safe together"));
}

#[tokio::test]
async fn model_outage_surfaces_as_decline_not_error() {
    let model_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&model_server)
        .await;

    let config = Config {
        max_retries: 0,
        model: ModelConfig {
            base_url: model_server.uri(),
            ..Default::default()
        },
        ..Default::default()
    };
    let invoker = OpenAiInvoker::with_base_url(
        Some("sk-test"),
        config.model.name.clone(),
        config.model.base_url.clone(),
    );
    let base = spawn_gateway(config, Arc::new(invoker)).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/api/story"))
        .json(&serde_json::json!({"userInput": "a story about a turtle"}))
        .send()
        .await
        .expect("request");

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.expect("json");
    assert!(body["error"].as_str().expect("error").starts_with("Sorry,"));
}

#[tokio::test]
async fn exhausted_pipeline_maps_to_400() {
    let config = Config {
        max_retries: 0,
        ..Default::default()
    };
    let base = spawn_gateway(
        config,
        scripted(vec![
            Ok("{}".to_string()),
            Ok(valid_story(500)),
            Ok(failing_judgment_json("not good enough")),
        ]),
    )
    .await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/api/story"))
        .json(&serde_json::json!({"userInput": "a story about a boat"}))
        .send()
        .await
        .expect("request");

    assert_eq!(response.status(), 400);
}
