use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    pulsebot_server::run().await
}
