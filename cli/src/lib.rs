//! `pwctl`: command-line client for a pink-whisper server.

pub mod audio;
pub mod client;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(name = "pwctl")]
#[command(about = "Send audio to a pink-whisper server and print the transcription")]
#[command(version)]
pub struct Cli {
    /// Server host name or address
    #[arg(long, default_value = "127.0.0.1", global = true)]
    pub host: String,

    /// Server port
    #[arg(short, long, default_value_t = 7465, global = true)]
    pub port: u16,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Transcribe a 16kHz mono 16-bit PCM WAV file
    Wav { path: PathBuf },
    /// Transcribe a headerless 16kHz mono 16-bit little-endian PCM file
    Raw { path: PathBuf },
}

impl Cli {
    /// `host:port` of the server.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Entry point for the client process.
pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let pcm = match &cli.command {
        Commands::Wav { path } => audio::load_wav(path)?,
        Commands::Raw { path } => audio::load_raw(path)?,
    };

    let text = client::transcribe(&cli.server_addr(), &pcm).await?;
    println!("{text}");

    Ok(())
}
