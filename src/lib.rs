//! `reqsafe` is a resilient blocking HTTP client for JSON APIs: automatic
//! retries with exponential backoff and jitter, rate-limit (429)
//! cooperation, outbound-address guarding against internal-network targets,
//! per-request correlation ids, and normalized error extraction from the
//! common API error-body shapes.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use reqsafe::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct CreateItemResponse {
//!     id: String,
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::builder()
//!         .base_url("https://api.example.com")
//!         .timeout(Duration::from_secs(10))
//!         .max_retries(3)
//!         .backoff_factor(0.5)
//!         .try_build()?;
//!
//!     let created: CreateItemResponse = client
//!         .post("/v1/items")
//!         .json(&serde_json::json!({ "name": "demo" }))?
//!         .send()?
//!         .json()?;
//!
//!     println!("created id={}", created.id);
//!     Ok(())
//! }
//! ```
//!
//! # Behavior Notes
//!
//! - A request makes up to `max_retries + 1` attempts. Transport failures,
//!   5xx statuses, and 429 are retried; any other 4xx is terminal on the
//!   first pass.
//! - A 429 with a `Retry-After` header sleeps the server-supplied value
//!   verbatim instead of the computed backoff.
//! - Targets resolving to loopback, private, link-local, unique-local, or
//!   reserved addresses are rejected before any socket is opened.
//! - Every logical request carries one correlation id under `x-request-id`,
//!   stable across its retries and attached to every error.

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

mod backoff;
mod client;
mod config;
mod error;
mod extract;
mod guard;
mod request;
mod response;
mod session;
mod util;

pub use crate::client::{ApiClient, ClientScope};
pub use crate::config::{ClientBuilder, ClientConfig};
pub use crate::error::{ApiClientError, TransportFailureKind};
pub use crate::request::{ApiRequest, RequestBuilder};
pub use crate::response::ApiResponse;
pub use crate::session::{
    HttpTransport, RawResponse, TransportCall, TransportError, TransportFactory,
};

pub type Result<T> = std::result::Result<T, ApiClientError>;

pub mod prelude {
    pub use crate::{
        ApiClient, ApiClientError, ApiRequest, ApiResponse, REQUEST_ID_HEADER, Result,
        TransportFailureKind,
    };
}
