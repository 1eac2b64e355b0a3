//! Basic usage example for the KV cloud client
//!
//! Run with: KV_APP_ID=... KV_APP_KEY=... KV_USER=... cargo run --example basic_usage

use std::time::Duration;

use kv_cloud_client::ClientConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = ClientConfig::from_env()
        .map_err(|e| format!("Configuration error: {}", e))?;

    info!("Endpoint: {}", config.endpoint);
    info!("User: {}", config.user_name);

    let client = kv_cloud_client::init_with_config(config)?;

    info!("Storing key 'happy_test'...");
    client.set_int("happy_test", 114514).await?;
    tokio::time::sleep(Duration::from_secs(1)).await;
    info!("saved int is: {:?}", client.get_int("happy_test").await?);
    client.delete_key("happy_test").await?;

    info!("Storing key 'int_arr'...");
    client.set_int_array("int_arr", &[1, 2, 3, 4, 5]).await?;
    tokio::time::sleep(Duration::from_secs(1)).await;
    let arr = client.get_int_array("int_arr").await?.unwrap_or_default();
    let joined: Vec<String> = arr.iter().map(|v| v.to_string()).collect();
    info!("saved int_arr is: {}", joined.join(", "));

    // Distinguish an absent key from an unreachable server
    match client.fetch("never_written").await {
        Ok(envelope) => info!("Found value of type {:?}", envelope.value_type()),
        Err(e) => info!("Fetch failed: {}", e),
    }

    info!("Example completed successfully!");
    Ok(())
}
