use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    mongotls::cli::start().await
}
