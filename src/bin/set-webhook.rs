use anyhow::{Context, Result};

#[tokio::main]
pub async fn main() -> Result<()> {
    let url = std::env::args()
        .nth(1)
        .context("usage: set-webhook <url>")?;

    address_monitor::set_webhook(&url).await?;
    println!("webhook set to {}", url);

    Ok(())
}
