//! Typed client for a remote per-user key-value store
//!
//! Every value is carried over HTTP in one JSON envelope that has a slot for each
//! supported type plus a type discriminator, so a single endpoint
//! (`/data/manageData`) serves integers, floats, booleans, strings, byte strings
//! and arrays of all of these except byte strings.
//!
//! # Features
//! - Typed get/set pairs for seven scalar and six array types
//! - Strict envelope decoding: unknown type codes and byte-string arrays are errors
//! - Reads that never fail on transport problems (`Ok(None)` instead)
//! - Fire-and-forget writes and deletes
//! - One shared connection pool with a per-call timeout
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kv_cloud_client::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), kv_cloud_client::Error> {
//!     let client = Client::new("app-id", "app-key", "alice")?;
//!
//!     // Store a value
//!     client.set_string("greeting", "hello").await?;
//!
//!     // Retrieve it; None if absent, of another type, or unreachable
//!     let value = client.get_string("greeting").await?;
//!     println!("Retrieved: {:?}", value);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs, rust_2018_idioms)]

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod global;
pub mod transport;

pub use client::Client;
pub use config::ClientConfig;
pub use envelope::{Envelope, StoredValue, Value, ValueType};
pub use error::{Error, FetchError, Result};
pub use global::{client, init_client, init_with_config};
pub use transport::{HttpResponse, HttpSender, HyperSender};
