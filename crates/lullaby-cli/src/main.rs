//! Lullaby CLI
//!
//! Runs the bedtime story pipeline once from the command line, or serves
//! the HTTP gateway with `--serve`.

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use lullaby_engine::{
    create_router, AppState, Config, DeclineKind, PipelineOutcome, StoryPipeline, StoryRequest,
};
use lullaby_llm::OpenAiInvoker;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Default port for the HTTP gateway.
const DEFAULT_PORT: u16 = 3000;

/// Environment variable holding the OpenAI API key.
const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Lullaby - Bedtime Story Generator
///
/// Generates gentle bedtime stories for children aged 5 to 10. Every
/// story is judged and validated before it is returned; requests that
/// cannot produce a suitable story are declined with a safe message.
#[derive(Parser, Debug)]
#[command(name = "lullaby")]
#[command(version, about, long_about = None)]
struct Args {
    /// The story request, e.g. "a story about a brave little turtle"
    #[arg(value_name = "REQUEST")]
    request: Option<String>,

    /// Run the HTTP gateway instead of a one-off request
    #[arg(long)]
    serve: bool,

    /// Port for the HTTP gateway
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Path to configuration file (default: lullaby.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Override the retry budget from the config file
    #[arg(long, value_name = "N")]
    max_retries: Option<u32>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    // Apply CLI argument overrides, then re-validate.
    if let Some(max_retries) = args.max_retries {
        config.max_retries = max_retries;
    }
    config.validate()?;

    let pipeline = build_pipeline(&config);

    if args.serve {
        serve(config, pipeline, args.port).await
    } else {
        let request = args.request.ok_or_else(|| {
            anyhow::anyhow!(
                "No story request given\n\nSuggestion: Pass a request like `lullaby \"a story about a brave little turtle\"` or use --serve"
            )
        })?;
        run_once(&pipeline, &request).await
    }
}

/// Runs one request through the pipeline and prints the result.
async fn run_once(pipeline: &StoryPipeline, request: &str) -> anyhow::Result<()> {
    let request_id = Uuid::new_v4().simple().to_string();
    tracing::info!(request_id = %request_id, "Running story pipeline");

    let outcome = pipeline
        .run(&StoryRequest::new(request), &request_id)
        .await;

    match outcome {
        PipelineOutcome::Accepted(story) => {
            println!("{}", story.text);
            tracing::info!(
                request_id = %request_id,
                attempt = story.attempt,
                word_count = story.word_count,
                "Story accepted"
            );
            Ok(())
        }
        PipelineOutcome::Declined { kind, message } => {
            println!("{message}");
            match kind {
                DeclineKind::InputRejected => {
                    tracing::info!(request_id = %request_id, "Request rejected");
                }
                DeclineKind::Exhausted => {
                    tracing::info!(request_id = %request_id, "Attempts exhausted");
                }
            }
            Err(anyhow::anyhow!("no story was produced"))
        }
    }
}

/// Serves the HTTP gateway until interrupted.
async fn serve(config: Config, pipeline: StoryPipeline, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let state = AppState::new(config, pipeline);
    let router = create_router(state);

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port")
    })?;

    println!("Lullaby gateway running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Builds the pipeline over the OpenAI invoker.
///
/// A missing API key is not fatal here: requests will be declined after
/// their attempts fail, and the gateway stays serviceable for health
/// checks. A warning is logged so the operator knows why.
fn build_pipeline(config: &Config) -> StoryPipeline {
    let api_key = std::env::var(API_KEY_ENV).ok();
    if api_key.is_none() {
        tracing::warn!("{API_KEY_ENV} is not set; model calls will fail");
    }

    let invoker = OpenAiInvoker::with_base_url(
        api_key.as_deref(),
        config.model.name.clone(),
        config.model.base_url.clone(),
    );

    StoryPipeline::new(Arc::new(invoker), config.max_retries, config.model.clone())
}
