use anyhow::{Context, Result};
use clap::Parser;
use interview_core::runtime::{RuntimeSettings, drive_speech, spawn_session};
use interview_service::config::Config;
use interview_service::console::run_console;
use interview_service::console_speech::ConsoleSpeech;
use interview_service::prompt_loader::load_prompt_set;
use interview_service::providers::build_interviewer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Practice a technical interview out loud")]
struct Cli {
    /// The interview topic; asked for interactively when omitted
    topic: Option<String>,
    /// Number of questions to generate (overrides QUESTION_COUNT)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    questions: Option<u32>,
    /// Directory of prompt overrides (overrides PROMPTS_DIR)
    #[arg(long)]
    prompts: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    // Logs go to stderr; stdout carries the conversation.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully. Starting interview service...");

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();

    // --- 4. Load Prompts ---
    let prompts_dir = args.prompts.or_else(|| config.prompts_dir.clone());
    let prompts =
        load_prompt_set(prompts_dir.as_deref()).context("Failed to load LLM prompts")?;

    // --- 5. Start the Session ---
    let question_count = args
        .questions
        .map(|n| n as usize)
        .unwrap_or(config.question_count);
    let interviewer = build_interviewer(&config, prompts, question_count);
    let (handle, commands) = spawn_session(
        interviewer,
        RuntimeSettings {
            provider_timeout: config.provider_timeout,
            speech_available: true,
        },
    );
    let console = Arc::new(ConsoleSpeech::stdio());
    let driver = tokio::spawn(drive_speech(
        commands,
        console.clone(),
        handle.clone(),
        config.speech_timeout,
    ));

    // --- 6. Run Until Done or Interrupted ---
    tokio::select! {
        result = run_console(handle.clone(), console, args.topic) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl-C received, shutting down.");
        }
    }

    if let Err(e) = handle.shutdown().await {
        tracing::debug!("Session already stopped: {}", e);
    }
    // The driver may be parked on a stdin read.
    driver.abort();
    Ok(())
}
