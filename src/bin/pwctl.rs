#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pwctl::run().await
}
