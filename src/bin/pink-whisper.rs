use pink_whisper_daemon::args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pink_whisper_daemon::run(Args::parse_lenient(std::env::args_os())).await
}
