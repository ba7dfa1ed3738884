use anyhow::Result;

#[tokio::main]
pub async fn main() -> Result<()> {
    address_monitor::run_balance_check().await
}
