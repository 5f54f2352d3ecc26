//! Network Linked Data Index service entrypoint.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (before anything else)
    let _ = dotenvy::dotenv();

    nldi::cli::run().await
}
