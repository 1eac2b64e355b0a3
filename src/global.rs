//! Process-wide client for applications that configure the store once at startup
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), kv_cloud_client::Error> {
//! kv_cloud_client::init_client("app-id", "app-key", "alice")?;
//!
//! let client = kv_cloud_client::client()?;
//! client.set_string("greeting", "hello").await?;
//! # Ok(())
//! # }
//! ```

use std::sync::OnceLock;

use crate::client::Client;
use crate::config::ClientConfig;
use crate::error::{Error, Result};

static CLIENT: OnceLock<Client> = OnceLock::new();

/// Install the process-wide client for the default endpoint
///
/// # Errors
/// Returns `Error::AlreadyInitialized` if a client was already installed, or a
/// configuration error if the arguments are unusable.
pub fn init_client(app_id: &str, app_key: &str, user_name: &str) -> Result<&'static Client> {
    init_with_config(ClientConfig::new(app_id, app_key, user_name))
}

/// Install the process-wide client with custom configuration
pub fn init_with_config(config: ClientConfig) -> Result<&'static Client> {
    let client = Client::with_config(config)?;
    CLIENT.set(client).map_err(|_| Error::AlreadyInitialized)?;
    self::client()
}

/// The process-wide client
///
/// # Errors
/// Returns `Error::NotInitialized` before [`init_client`] has succeeded.
pub fn client() -> Result<&'static Client> {
    CLIENT.get().ok_or(Error::NotInitialized)
}
