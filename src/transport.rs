//! HTTP transport used by the store client
//!
//! The client only needs "send a request, get status and body back". That
//! capability is the [`HttpSender`] trait; [`HyperSender`] is the pooled
//! hyper/rustls implementation used by default.

use std::sync::Arc;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HttpClient;
use hyper_util::rt::TokioExecutor;

use crate::error::{Error, Result};

/// Status and fully-read body of a response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response body
    pub body: Bytes,
}

/// Sends one HTTP request and returns the buffered response
///
/// Implementations must be safe to share between concurrent calls. Timeouts are
/// applied by the caller.
#[async_trait]
pub trait HttpSender: Send + Sync {
    /// Send `request` and read the whole response body
    async fn send(&self, request: Request<Full<Bytes>>) -> Result<HttpResponse>;
}

/// Build a rustls ClientConfig that verifies servers against the webpki roots.
fn build_tls_config() -> Result<rustls::ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    Ok(rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth())
}

type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;

/// Pooled HTTP client over hyper and rustls
///
/// `https://` endpoints negotiate HTTP/2 or HTTP/1.1 through ALPN; plain `http://`
/// is accepted for local servers and speaks HTTP/1.1.
#[derive(Clone)]
pub struct HyperSender {
    http_client: HttpClient<HttpsConnector, Full<Bytes>>,
}

impl HyperSender {
    /// Create a sender with its own connection pool
    pub fn new() -> Result<Self> {
        let tls_config = build_tls_config()?;

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();

        let http_client = HttpClient::builder(TokioExecutor::new()).build(https_connector);

        Ok(Self { http_client })
    }
}

#[async_trait]
impl HttpSender for HyperSender {
    async fn send(&self, request: Request<Full<Bytes>>) -> Result<HttpResponse> {
        let response = self
            .http_client
            .request(request)
            .await
            .map_err(|e| Error::Connection(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::Connection(format!("Failed to read body: {}", e)))?
            .to_bytes();

        Ok(HttpResponse { status, body })
    }
}
