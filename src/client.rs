//! Typed client for the per-user key-value store

use std::sync::Arc;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Request, StatusCode, Uri};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::envelope::{Envelope, StoredValue};
use crate::error::{Error, FetchError, Result};
use crate::transport::{HttpResponse, HttpSender, HyperSender};

const MANAGE_DATA_PATH: &str = "/data/manageData";

const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// Characters left unencoded in query values (RFC 3986 unreserved).
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn encode_query_value(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

/// Client for the store's `manageData` endpoint
///
/// Failures are split in two groups:
/// - corrupt or impossible data (unknown type code, bytes stored as an array,
///   empty key) is returned as an `Err`;
/// - transport problems (connection errors, timeouts, error statuses, bodies that
///   are not an envelope) are logged and swallowed. Getters return `Ok(None)`,
///   setters and [`Client::delete_key`] return `Ok(())`.
///
/// Use [`Client::fetch`] when an outage has to be told apart from a missing key.
///
/// # Example
/// ```rust,no_run
/// use kv_cloud_client::Client;
///
/// #[tokio::main]
/// async fn main() -> Result<(), kv_cloud_client::Error> {
///     let client = Client::new("app-id", "app-key", "alice")?;
///
///     client.set_int_array("int_arr", &[1, 2, 3, 4, 5]).await?;
///     let arr = client.get_int_array("int_arr").await?.unwrap_or_default();
///     println!("saved int_arr is: {:?}", arr);
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    sender: Arc<dyn HttpSender>,
}

impl Client {
    /// Create a client for the default endpoint
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if any of the arguments is empty.
    pub fn new(app_id: &str, app_key: &str, user_name: &str) -> Result<Self> {
        Self::with_config(ClientConfig::new(app_id, app_key, user_name))
    }

    /// Create a client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let sender = HyperSender::new()?;
        Self::with_sender(config, Arc::new(sender))
    }

    /// Create a client that sends requests through `sender`
    pub fn with_sender(config: ClientConfig, sender: Arc<dyn HttpSender>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            sender,
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Get the user the stored values belong to
    pub fn user_name(&self) -> &str {
        &self.config.user_name
    }

    fn url(&self, key: Option<&str>) -> String {
        let base = self.config.endpoint.trim_end_matches('/');
        match key {
            Some(key) => format!(
                "{}{}?key={}&user={}",
                base,
                MANAGE_DATA_PATH,
                encode_query_value(key),
                encode_query_value(&self.config.user_name)
            ),
            None => format!("{}{}", base, MANAGE_DATA_PATH),
        }
    }

    /// Internal request method
    async fn request(&self, method: Method, url: String, body: Option<Bytes>) -> Result<HttpResponse> {
        let uri: Uri = url.parse()
            .map_err(|e| Error::InvalidUrl(format!("Invalid request URL: {}", e)))?;

        let mut builder = Request::builder()
            .method(method.clone())
            .uri(uri)
            .header("X-AppId", self.config.app_id.as_str())
            .header("X-AppKey", self.config.app_key.as_str());

        if body.is_some() {
            builder = builder.header("content-type", JSON_CONTENT_TYPE);
        }

        let req = builder
            .body(Full::new(body.unwrap_or_default()))
            .map_err(|e| Error::InvalidRequest(format!("Failed to build request: {}", e)))?;

        debug!("Sending request: {} {}", method, url);

        let timeout = Duration::from_millis(self.config.timeout_ms);
        tokio::time::timeout(timeout, self.sender.send(req))
            .await
            .map_err(|_| Error::Timeout(self.config.timeout_ms))?
    }

    fn ensure_success(response: &HttpResponse) -> Result<()> {
        if response.status.is_success() {
            Ok(())
        } else {
            Err(Error::Status {
                status: response.status.as_u16(),
                message: String::from_utf8_lossy(&response.body).to_string(),
            })
        }
    }

    /// Fetch the raw envelope stored under `key`
    ///
    /// Unlike the typed getters this keeps failures apart: a 404 is
    /// `FetchError::NotFound`, any other failed round trip is `FetchError::Transport`
    /// and an envelope with an invalid discriminator or shape is `FetchError::Invalid`.
    pub async fn fetch(&self, key: &str) -> std::result::Result<Envelope, FetchError> {
        if key.is_empty() {
            return Err(FetchError::Invalid(Error::InvalidKey("Key cannot be empty".to_string())));
        }

        let response = self.request(Method::GET, self.url(Some(key)), None).await?;

        if response.status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(key.to_string()));
        }
        Self::ensure_success(&response)?;

        Ok(Envelope::from_json(&response.body)?)
    }

    /// Read the value stored under `key` as a `T`
    ///
    /// # Returns
    /// `None` if the key is absent, holds a different type or shape, or could not be
    /// fetched.
    ///
    /// # Errors
    /// Returns an error for an empty key or when the stored envelope is invalid
    /// (unknown type code, bytes array, malformed base64).
    pub async fn get<T: StoredValue>(&self, key: &str) -> Result<Option<T>> {
        match self.fetch(key).await {
            Ok(envelope) => envelope.extract(),
            Err(FetchError::NotFound(_)) => {
                debug!("Key does not exist: {}", key);
                Ok(None)
            }
            Err(FetchError::Transport(e)) => {
                warn!("Key fetch failed for '{}': {}", key, e);
                Ok(None)
            }
            Err(FetchError::Invalid(e)) => Err(e),
        }
    }

    /// Store `value` under `key`
    ///
    /// Transport failures are logged and not reported.
    ///
    /// # Errors
    /// Returns `Error::InvalidKey` for an empty key and `Error::NonFiniteFloat` for
    /// NaN or infinite floats. Nothing is sent in either case.
    pub async fn set<T: StoredValue>(&self, key: &str, value: T) -> Result<()> {
        let envelope = Envelope::from_value(key, &self.config.user_name, value.into_value())?;
        let body = Bytes::from(envelope.to_json()?);

        let outcome = self
            .request(Method::PUT, self.url(None), Some(body))
            .await
            .and_then(|response| Self::ensure_success(&response));
        match outcome {
            Err(e) if e.is_transport() => warn!("Key update failed for '{}': {}", key, e),
            Err(e) => return Err(e),
            Ok(()) => {}
        }
        Ok(())
    }

    /// Delete `key`
    ///
    /// Transport failures, including a missing key, are logged and not reported.
    pub async fn delete_key(&self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidKey("Key cannot be empty".to_string()));
        }

        let outcome = self
            .request(Method::DELETE, self.url(Some(key)), None)
            .await
            .and_then(|response| Self::ensure_success(&response));
        match outcome {
            Err(e) if e.is_transport() => warn!("Key delete failed for '{}': {}", key, e),
            Err(e) => return Err(e),
            Ok(()) => {}
        }
        Ok(())
    }

    /// Read a 32-bit integer
    pub async fn get_int(&self, key: &str) -> Result<Option<i32>> {
        self.get(key).await
    }

    /// Store a 32-bit integer
    pub async fn set_int(&self, key: &str, value: i32) -> Result<()> {
        self.set(key, value).await
    }

    /// Read a 64-bit integer
    pub async fn get_long(&self, key: &str) -> Result<Option<i64>> {
        self.get(key).await
    }

    /// Store a 64-bit integer
    pub async fn set_long(&self, key: &str, value: i64) -> Result<()> {
        self.set(key, value).await
    }

    /// Read a boolean
    pub async fn get_boolean(&self, key: &str) -> Result<Option<bool>> {
        self.get(key).await
    }

    /// Store a boolean
    pub async fn set_boolean(&self, key: &str, value: bool) -> Result<()> {
        self.set(key, value).await
    }

    /// Read a 32-bit float
    pub async fn get_float(&self, key: &str) -> Result<Option<f32>> {
        self.get(key).await
    }

    /// Store a 32-bit float
    pub async fn set_float(&self, key: &str, value: f32) -> Result<()> {
        self.set(key, value).await
    }

    /// Read a 64-bit float
    pub async fn get_double(&self, key: &str) -> Result<Option<f64>> {
        self.get(key).await
    }

    /// Store a 64-bit float
    pub async fn set_double(&self, key: &str, value: f64) -> Result<()> {
        self.set(key, value).await
    }

    /// Read a string
    pub async fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.get(key).await
    }

    /// Store a string
    pub async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.set(key, value.to_string()).await
    }

    /// Read a byte sequence
    pub async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get(key).await
    }

    /// Store a byte sequence
    pub async fn set_bytes(&self, key: &str, value: &[u8]) -> Result<()> {
        self.set(key, value.to_vec()).await
    }

    /// Read an array of 32-bit integers
    pub async fn get_int_array(&self, key: &str) -> Result<Option<Vec<i32>>> {
        self.get(key).await
    }

    /// Store an array of 32-bit integers
    pub async fn set_int_array(&self, key: &str, value: &[i32]) -> Result<()> {
        self.set(key, value.to_vec()).await
    }

    /// Read an array of 64-bit integers
    pub async fn get_long_array(&self, key: &str) -> Result<Option<Vec<i64>>> {
        self.get(key).await
    }

    /// Store an array of 64-bit integers
    pub async fn set_long_array(&self, key: &str, value: &[i64]) -> Result<()> {
        self.set(key, value.to_vec()).await
    }

    /// Read an array of booleans
    pub async fn get_boolean_array(&self, key: &str) -> Result<Option<Vec<bool>>> {
        self.get(key).await
    }

    /// Store an array of booleans
    pub async fn set_boolean_array(&self, key: &str, value: &[bool]) -> Result<()> {
        self.set(key, value.to_vec()).await
    }

    /// Read an array of 32-bit floats
    pub async fn get_float_array(&self, key: &str) -> Result<Option<Vec<f32>>> {
        self.get(key).await
    }

    /// Store an array of 32-bit floats
    pub async fn set_float_array(&self, key: &str, value: &[f32]) -> Result<()> {
        self.set(key, value.to_vec()).await
    }

    /// Read an array of 64-bit floats
    pub async fn get_double_array(&self, key: &str) -> Result<Option<Vec<f64>>> {
        self.get(key).await
    }

    /// Store an array of 64-bit floats
    pub async fn set_double_array(&self, key: &str, value: &[f64]) -> Result<()> {
        self.set(key, value.to_vec()).await
    }

    /// Read an array of strings
    pub async fn get_string_array(&self, key: &str) -> Result<Option<Vec<String>>> {
        self.get(key).await
    }

    /// Store an array of strings
    pub async fn set_string_array(&self, key: &str, value: &[String]) -> Result<()> {
        self.set(key, value.to_vec()).await
    }
}
