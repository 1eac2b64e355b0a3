//! Integration tests for kv-cloud-client
//!
//! Each test starts an in-process `manageData` server on an ephemeral port, so no
//! external service is needed.
//!
//! Run with: cargo test --tests

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use kv_cloud_client::{Client, ClientConfig, Error, FetchError, ValueType};
use percent_encoding::percent_decode_str;
use serde_json::json;
use tokio::net::TcpListener;

const APP_ID: &str = "456e2d0e3ab14e9c";
const APP_KEY: &str = "29bfece091f94356";
const USER: &str = "13336472640";

/// Envelopes keyed by (user, key), stored as the JSON the client sent.
#[derive(Default)]
struct MockStore {
    items: Mutex<HashMap<(String, String), serde_json::Value>>,
}

impl MockStore {
    fn get(&self, user: &str, key: &str) -> Option<serde_json::Value> {
        self.items
            .lock()
            .unwrap()
            .get(&(user.to_string(), key.to_string()))
            .cloned()
    }

    fn put(&self, user: &str, key: &str, envelope: serde_json::Value) {
        self.items
            .lock()
            .unwrap()
            .insert((user.to_string(), key.to_string()), envelope);
    }

    fn remove(&self, user: &str, key: &str) -> bool {
        self.items
            .lock()
            .unwrap()
            .remove(&(user.to_string(), key.to_string()))
            .is_some()
    }
}

fn query_params(query: Option<&str>) -> HashMap<String, String> {
    query
        .unwrap_or("")
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), percent_decode_str(v).decode_utf8_lossy().to_string()))
        .collect()
}

fn respond(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

fn authorized<B>(req: &Request<B>) -> bool {
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());
    header("X-AppId") == Some(APP_ID) && header("X-AppKey") == Some(APP_KEY)
}

async fn handle(
    store: Arc<MockStore>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if !authorized(&req) {
        return Ok(respond(StatusCode::UNAUTHORIZED, "{\"error\":\"bad credentials\"}".to_string()));
    }
    if req.uri().path() != "/data/manageData" {
        return Ok(respond(StatusCode::NOT_FOUND, String::new()));
    }

    let params = query_params(req.uri().query());
    let user = params.get("user").cloned().unwrap_or_default();
    let key = params.get("key").cloned().unwrap_or_default();

    let response = match req.method().clone() {
        Method::GET => match store.get(&user, &key) {
            Some(mut envelope) => {
                // Fields the client does not know about must be ignored
                envelope["storedAt"] = json!("2024-01-01T00:00:00Z");
                respond(StatusCode::OK, envelope.to_string())
            }
            None => respond(StatusCode::NOT_FOUND, String::new()),
        },
        Method::PUT => {
            let body = req.into_body().collect().await.unwrap().to_bytes();
            match serde_json::from_slice::<serde_json::Value>(&body) {
                Ok(envelope) => {
                    let user = envelope["userIdentifier"].as_str().unwrap_or_default().to_string();
                    let key = envelope["keyIdentifier"].as_str().unwrap_or_default().to_string();
                    store.put(&user, &key, envelope);
                    respond(StatusCode::OK, String::new())
                }
                Err(e) => respond(StatusCode::BAD_REQUEST, e.to_string()),
            }
        }
        Method::DELETE => {
            if store.remove(&user, &key) {
                respond(StatusCode::OK, String::new())
            } else {
                respond(StatusCode::NOT_FOUND, String::new())
            }
        }
        _ => respond(StatusCode::METHOD_NOT_ALLOWED, String::new()),
    };

    Ok(response)
}

async fn spawn_server(store: Arc<MockStore>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let store = store.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| handle(store.clone(), req));
                let _ = auto::Builder::new(TokioExecutor::new())
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    addr
}

fn config_for(addr: SocketAddr, user: &str) -> ClientConfig {
    ClientConfig {
        endpoint: format!("http://{}", addr),
        timeout_ms: 5_000,
        ..ClientConfig::new(APP_ID, APP_KEY, user)
    }
}

async fn setup() -> (Client, Arc<MockStore>, SocketAddr) {
    let store = Arc::new(MockStore::default());
    let addr = spawn_server(store.clone()).await;
    let client = Client::with_config(config_for(addr, USER)).expect("Failed to create client");
    (client, store, addr)
}

/// Address with nothing listening on it
fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

// ========== Scenarios ==========

#[tokio::test]
async fn test_int_array_roundtrip() {
    let (client, _store, _) = setup().await;

    client.set_int_array("int_arr", &[1, 2, 3, 4, 5]).await.unwrap();
    assert_eq!(
        client.get_int_array("int_arr").await.unwrap(),
        Some(vec![1, 2, 3, 4, 5])
    );

    assert_eq!(client.get_int_array("absent_key").await.unwrap(), None);
}

#[tokio::test]
async fn test_string_roundtrip() {
    let (client, store, _) = setup().await;

    client.set_string("s", "hello").await.unwrap();
    assert_eq!(client.get_string("s").await.unwrap(), Some("hello".to_string()));
    assert_eq!(client.get_double("s").await.unwrap(), None);

    let stored = store.get(USER, "s").unwrap();
    assert_eq!(stored["valueTypeIndicator"], ValueType::String.code());
}

#[tokio::test]
async fn test_scalar_types_roundtrip() {
    let (client, _store, _) = setup().await;

    client.set_int("int", i32::MIN).await.unwrap();
    client.set_long("long", i64::MAX).await.unwrap();
    client.set_boolean("bool", true).await.unwrap();
    client.set_float("float", 1.5).await.unwrap();
    client.set_double("double", -0.125).await.unwrap();
    client.set_string("empty", "").await.unwrap();
    client.set_bytes("bytes", &[0, 1, 255]).await.unwrap();
    client.set_bytes("no_bytes", &[]).await.unwrap();

    assert_eq!(client.get_int("int").await.unwrap(), Some(i32::MIN));
    assert_eq!(client.get_long("long").await.unwrap(), Some(i64::MAX));
    assert_eq!(client.get_boolean("bool").await.unwrap(), Some(true));
    assert_eq!(client.get_float("float").await.unwrap(), Some(1.5));
    assert_eq!(client.get_double("double").await.unwrap(), Some(-0.125));
    assert_eq!(client.get_string("empty").await.unwrap(), Some(String::new()));
    assert_eq!(client.get_bytes("bytes").await.unwrap(), Some(vec![0, 1, 255]));
    assert_eq!(client.get_bytes("no_bytes").await.unwrap(), Some(Vec::new()));
}

#[tokio::test]
async fn test_array_types_roundtrip() {
    let (client, _store, _) = setup().await;

    client.set_long_array("longs", &[i64::MIN, 0, i64::MAX]).await.unwrap();
    client.set_boolean_array("bools", &[true, false]).await.unwrap();
    client.set_float_array("floats", &[0.5, -2.0]).await.unwrap();
    client.set_double_array("doubles", &[]).await.unwrap();
    client.set_string_array("strings", &[]).await.unwrap();
    client
        .set_string_array("words", &["a".to_string(), "b c".to_string()])
        .await
        .unwrap();

    assert_eq!(
        client.get_long_array("longs").await.unwrap(),
        Some(vec![i64::MIN, 0, i64::MAX])
    );
    assert_eq!(client.get_boolean_array("bools").await.unwrap(), Some(vec![true, false]));
    assert_eq!(client.get_float_array("floats").await.unwrap(), Some(vec![0.5, -2.0]));
    assert_eq!(client.get_double_array("doubles").await.unwrap(), Some(Vec::new()));
    assert_eq!(client.get_string_array("strings").await.unwrap(), Some(Vec::new()));
    assert_eq!(
        client.get_string_array("words").await.unwrap(),
        Some(vec!["a".to_string(), "b c".to_string()])
    );
}

#[tokio::test]
async fn test_type_and_shape_mismatch_is_absent() {
    let (client, _store, _) = setup().await;

    client.set_long("n", 42).await.unwrap();
    assert_eq!(client.get_int("n").await.unwrap(), None);
    assert_eq!(client.get_double("n").await.unwrap(), None);
    assert_eq!(client.get_long_array("n").await.unwrap(), None);
    assert_eq!(client.get_long("n").await.unwrap(), Some(42));

    client.set_int_array("arr", &[0]).await.unwrap();
    assert_eq!(client.get_int("arr").await.unwrap(), None);
}

#[tokio::test]
async fn test_overwrite_with_other_type() {
    let (client, _store, _) = setup().await;

    client.set_int("k", 1).await.unwrap();
    client.set_string("k", "now a string").await.unwrap();

    assert_eq!(client.get_int("k").await.unwrap(), None);
    assert_eq!(client.get_string("k").await.unwrap(), Some("now a string".to_string()));
}

#[tokio::test]
async fn test_delete_key() {
    let (client, _store, _) = setup().await;

    client.set_int("happy_test", 114514).await.unwrap();
    assert_eq!(client.get_int("happy_test").await.unwrap(), Some(114514));

    client.delete_key("happy_test").await.unwrap();
    assert_eq!(client.get_int("happy_test").await.unwrap(), None);
    assert!(matches!(client.fetch("happy_test").await, Err(FetchError::NotFound(_))));

    // Deleting again is swallowed
    client.delete_key("happy_test").await.unwrap();
}

#[tokio::test]
async fn test_keys_are_scoped_per_user() {
    let (alice, _store, addr) = setup().await;
    let bob = Client::with_config(config_for(addr, "bob")).unwrap();

    alice.set_string("theme", "dark").await.unwrap();
    bob.set_string("theme", "light").await.unwrap();

    assert_eq!(alice.get_string("theme").await.unwrap(), Some("dark".to_string()));
    assert_eq!(bob.get_string("theme").await.unwrap(), Some("light".to_string()));
}

#[tokio::test]
async fn test_special_characters_in_key() {
    let (client, store, _) = setup().await;
    let key = "a b&c=d/ключ?";

    client.set_boolean(key, true).await.unwrap();
    assert!(store.get(USER, key).is_some());
    assert_eq!(client.get_boolean(key).await.unwrap(), Some(true));

    client.delete_key(key).await.unwrap();
    assert!(store.get(USER, key).is_none());
}

// ========== Failure policy ==========

#[tokio::test]
async fn test_server_down_reads_absent_and_writes_return() {
    let client = Client::with_config(config_for(closed_addr(), USER)).unwrap();

    assert_eq!(client.get_int("k").await.unwrap(), None);
    assert_eq!(client.get_string_array("k").await.unwrap(), None);
    client.set_int("k", 5).await.unwrap();
    client.delete_key("k").await.unwrap();

    assert!(matches!(
        client.fetch("k").await,
        Err(FetchError::Transport(Error::Connection(_)))
    ));
}

#[tokio::test]
async fn test_wrong_credentials_are_swallowed() {
    let (_client, store, addr) = setup().await;
    let config = ClientConfig {
        app_key: "wrong".to_string(),
        ..config_for(addr, USER)
    };
    let client = Client::with_config(config).unwrap();

    client.set_int("k", 1).await.unwrap();
    assert!(store.get(USER, "k").is_none());
    assert_eq!(client.get_int("k").await.unwrap(), None);

    match client.fetch("k").await {
        Err(FetchError::Transport(Error::Status { status, .. })) => assert_eq!(status, 401),
        other => panic!("Expected 401 transport error, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_reserved_type_code_from_server_is_loud() {
    let (client, store, _) = setup().await;
    store.put(
        USER,
        "unsigned",
        json!({
            "isArray": false,
            "keyIdentifier": "unsigned",
            "userIdentifier": USER,
            "valueTypeIndicator": 2
        }),
    );

    match client.get_int("unsigned").await {
        Err(Error::UnknownValueType(2)) => {}
        other => panic!("Expected UnknownValueType, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_bytes_array_from_server_is_rejected() {
    let (client, store, _) = setup().await;
    store.put(
        USER,
        "blobs",
        json!({
            "isArray": true,
            "keyIdentifier": "blobs",
            "userIdentifier": USER,
            "byteStringValue": "aGk=",
            "valueTypeIndicator": 8
        }),
    );

    assert!(matches!(
        client.get_bytes("blobs").await,
        Err(Error::InvalidValueShape(ValueType::Bytes))
    ));
    assert!(matches!(
        client.get_string_array("blobs").await,
        Err(Error::InvalidValueShape(ValueType::Bytes))
    ));
    assert!(matches!(
        client.fetch("blobs").await,
        Err(FetchError::Invalid(Error::InvalidValueShape(ValueType::Bytes)))
    ));
}

#[tokio::test]
async fn test_non_finite_floats_are_not_stored() {
    let (client, store, _) = setup().await;

    assert!(matches!(
        client.set_double("ratio", f64::NAN).await,
        Err(Error::NonFiniteFloat(ValueType::Double))
    ));
    assert!(matches!(
        client.set_float_array("ratios", &[1.0, f32::INFINITY]).await,
        Err(Error::NonFiniteFloat(ValueType::Float))
    ));
    assert!(store.get(USER, "ratio").is_none());
    assert!(store.get(USER, "ratios").is_none());
}

#[tokio::test]
async fn test_unknown_fields_are_ignored() {
    let (client, store, _) = setup().await;
    store.put(
        USER,
        "future",
        json!({
            "isArray": false,
            "keyIdentifier": "future",
            "userIdentifier": USER,
            "doubleValue": 2.5,
            "valueTypeIndicator": 6,
            "schemaVersion": 3,
            "tags": ["a", "b"]
        }),
    );

    assert_eq!(client.get_double("future").await.unwrap(), Some(2.5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_share_client() {
    let (client, _store, _) = setup().await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("counter_{}", i);
            client.set_int(&key, i).await.unwrap();
            client.get_int(&key).await.unwrap()
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), Some(i as i32));
    }
}
