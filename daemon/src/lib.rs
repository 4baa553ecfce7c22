pub mod args;
pub mod config;
pub mod daemon;
pub mod handler;
pub mod logging;
pub mod server;
pub mod transcribe;

/// Entry point for the server process: configures logging, loads the model
/// and serves until a shutdown signal arrives.
#[cfg(feature = "whisper")]
pub async fn run(args: args::Args) -> anyhow::Result<()> {
    let config = config::Config::from_args(&args)?;
    let _guard = logging::init(&config.logging)?;

    // Route whisper.cpp and GGML logs through tracing
    whisper_rs::install_logging_hooks();

    let engine = daemon::load_model(|| transcribe::WhisperTranscriber::load(&config.model))?;
    daemon::run(&config, engine).await?;
    Ok(())
}
