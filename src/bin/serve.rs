#[tokio::main]
pub async fn main() -> Result<(), anyhow::Error> {
    eth_validator_api::start_server().await?;
    Ok(())
}
