use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Timelike};
use clap::Parser;
use log::{error, info};
use workout_motivation::app::QuoteService;
use workout_motivation::domain::{DEFAULT_MOTIVATION_PROMPT, FetchError, Greeting, QuoteRequest};
use workout_motivation::infra::llm::{GeminiConfig, GeminiProvider};

/// Prints a greeting and a freshly generated motivational quote for today's workout.
#[derive(Debug, Parser)]
#[command(name = "workout-motivation", version, about)]
struct Args {
    /// Prompt sent to the text-generation API.
    #[arg(long, default_value = DEFAULT_MOTIVATION_PROMPT, hide_default_value = true)]
    prompt: String,

    /// Gemini API key. Falls back to WORKOUT_MOTIVATION_GEMINI_API_KEY or GEMINI_API_KEY.
    #[arg(long)]
    api_key: Option<String>,

    /// Override the API base URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Override the model name.
    #[arg(long)]
    model: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn main() -> ExitCode {
    init_logger();
    let args = Args::parse();

    println!(
        "{}! Your workout awaits.",
        Greeting::for_hour(Local::now().hour())
    );

    match run(args) {
        Ok(text) => {
            println!("\"{}\"", text.trim());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("Error fetching motivational message: {err}");
            eprintln!("{}", err.user_message());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<String, FetchError> {
    let provider = build_provider(&args)?;
    info!("Requesting a motivational message from model {}", provider.model());

    let quote = QuoteService::new(Arc::new(provider)).fetch(QuoteRequest::new(args.prompt))?;
    info!(
        "Quote received after {} attempt(s){}",
        quote.metadata.attempts,
        quote
            .metadata
            .latency_ms
            .map(|ms| format!(" in {ms} ms"))
            .unwrap_or_default()
    );
    Ok(quote.text)
}

fn build_provider(args: &Args) -> Result<GeminiProvider, FetchError> {
    let config = apply_overrides(GeminiConfig::from_env()?, args)?;
    GeminiProvider::from_config(config)
}

/// Command-line values win over whatever the environment supplied.
fn apply_overrides(mut config: GeminiConfig, args: &Args) -> Result<GeminiConfig, FetchError> {
    if let Some(api_key) = &args.api_key {
        config.api_key = Some(api_key.clone());
    }
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(timeout_secs) = args.timeout_secs {
        if timeout_secs == 0 {
            return Err(FetchError::config(
                "--timeout-secs must be greater than 0 seconds",
            ));
        }
        config.timeout = Duration::from_secs(timeout_secs);
    }
    Ok(config)
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
