use anyhow::Result;

#[tokio::main]
pub async fn main() -> Result<()> {
    address_monitor::start_webhook_server().await
}
