//! Transport seam and shared-session management.
//!
//! The client performs every attempt through the [`HttpTransport`] trait so
//! tests can substitute a scripted transport; production traffic goes through
//! [`UreqTransport`], a pooled blocking agent. [`SessionManager`] owns the
//! one transport shared by all calls on a client instance, constructing it
//! lazily and tearing it down on `close()`.

use std::io::Read;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method};

use crate::config::ClientConfig;
use crate::error::{ApiClientError, TransportFailureKind};
use crate::util::{read_unpoisoned, write_unpoisoned};

pub(crate) const MAX_RESPONSE_BODY_BYTES: usize = 8 * 1024 * 1024;

const USER_AGENT: &str = concat!("reqsafe/", env!("CARGO_PKG_VERSION"));
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const POOL_MAX_IDLE_PER_HOST: usize = 8;
const POOL_MAX_IDLE_CONNECTIONS: usize = 16;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One attempt's worth of input for a transport.
pub struct TransportCall<'a> {
    pub method: Method,
    pub url: &'a str,
    pub headers: &'a HeaderMap,
    pub body: Option<&'a [u8]>,
    pub timeout: Duration,
}

/// What a transport hands back: the raw exchange, untouched by retry or
/// error classification logic.
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Failure below the HTTP layer.
#[derive(Debug)]
pub enum TransportError {
    /// No usable response; retryable subject to the engine's budget.
    Failure {
        kind: TransportFailureKind,
        source: BoxError,
    },
    /// The response body exceeded the read cap. Terminal.
    BodyTooLarge {
        limit_bytes: usize,
        actual_bytes: usize,
    },
}

impl TransportError {
    pub fn failure(kind: TransportFailureKind, source: impl Into<BoxError>) -> Self {
        Self::Failure {
            kind,
            source: source.into(),
        }
    }
}

/// A blocking HTTP transport able to perform a single exchange.
pub trait HttpTransport: Send + Sync {
    fn perform(&self, call: TransportCall<'_>) -> Result<RawResponse, TransportError>;
}

/// Builds the shared transport on first use. TLS verification and pool
/// settings come from the client configuration at build time.
pub trait TransportFactory: Send + Sync {
    fn build(&self, config: &ClientConfig) -> Result<Arc<dyn HttpTransport>, ApiClientError>;
}

/// Default production transport: a pooled `ureq` agent. Connection
/// keep-alive is amortized across calls through the agent's idle pool.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut tls_config_builder = ureq::tls::TlsConfig::builder();
        if !config.verify_tls {
            tls_config_builder = tls_config_builder.disable_verification(true);
        }
        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .user_agent(USER_AGENT)
            .max_idle_age(POOL_IDLE_TIMEOUT)
            .max_idle_connections_per_host(POOL_MAX_IDLE_PER_HOST)
            .max_idle_connections(POOL_MAX_IDLE_CONNECTIONS)
            .tls_config(tls_config_builder.build())
            .build();
        Self {
            agent: agent_config.new_agent(),
        }
    }
}

impl HttpTransport for UreqTransport {
    fn perform(&self, call: TransportCall<'_>) -> Result<RawResponse, TransportError> {
        let mut builder = ureq::http::Request::builder()
            .method(call.method.clone())
            .uri(call.url);
        for (name, value) in call.headers {
            builder = builder.header(name, value);
        }
        let request = builder
            .body(call.body.map(<[u8]>::to_vec).unwrap_or_default())
            .map_err(|source| {
                TransportError::failure(TransportFailureKind::Connection, source)
            })?;

        let configured_request = self
            .agent
            .configure_request(request)
            .timeout_global(Some(call.timeout))
            .timeout_per_call(Some(call.timeout))
            .build();

        let mut response = self.agent.run(configured_request).map_err(|source| {
            let kind = classify_ureq_error(&source);
            TransportError::failure(kind, source)
        })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = read_all_body_limited(&mut response, MAX_RESPONSE_BODY_BYTES)?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

pub(crate) struct UreqTransportFactory;

impl TransportFactory for UreqTransportFactory {
    fn build(&self, config: &ClientConfig) -> Result<Arc<dyn HttpTransport>, ApiClientError> {
        Ok(Arc::new(UreqTransport::from_config(config)))
    }
}

fn classify_ureq_error(error: &ureq::Error) -> TransportFailureKind {
    match error {
        ureq::Error::Timeout(_) => TransportFailureKind::Timeout,
        ureq::Error::Io(source)
            if matches!(
                source.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ) =>
        {
            TransportFailureKind::Timeout
        }
        _ => TransportFailureKind::Connection,
    }
}

fn wrapped_ureq_error(io_error: &std::io::Error) -> Option<&ureq::Error> {
    io_error
        .get_ref()
        .and_then(|source| source.downcast_ref::<ureq::Error>())
}

fn read_all_body_limited(
    response: &mut ureq::http::Response<ureq::Body>,
    max_bytes: usize,
) -> Result<Bytes, TransportError> {
    let mut reader = response.body_mut().as_reader();
    let mut collected = Vec::new();
    let mut chunk = [0_u8; 8192];
    let mut total_len = 0_usize;

    loop {
        let read = reader.read(&mut chunk).map_err(|source| {
            let kind = match wrapped_ureq_error(&source) {
                Some(wrapped) => classify_ureq_error(wrapped),
                None => classify_io_error(&source),
            };
            TransportError::failure(kind, source)
        })?;
        if read == 0 {
            break;
        }
        total_len = total_len.saturating_add(read);
        if total_len > max_bytes {
            return Err(TransportError::BodyTooLarge {
                limit_bytes: max_bytes,
                actual_bytes: total_len,
            });
        }
        collected.extend_from_slice(&chunk[..read]);
    }

    Ok(Bytes::from(collected))
}

fn classify_io_error(error: &std::io::Error) -> TransportFailureKind {
    match error.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
            TransportFailureKind::Timeout
        }
        _ => TransportFailureKind::Connection,
    }
}

/// Owns the one transport shared by every call on a client instance.
///
/// The read path takes a shared lock and clones the `Arc`; construction
/// re-checks under the write lock so concurrent first calls build exactly
/// one transport. `close()` drops the cached transport; the next call
/// transparently rebuilds it.
pub(crate) struct SessionManager {
    transport: RwLock<Option<Arc<dyn HttpTransport>>>,
    factory: Arc<dyn TransportFactory>,
}

impl SessionManager {
    pub(crate) fn new(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            transport: RwLock::new(None),
            factory,
        }
    }

    pub(crate) fn acquire(
        &self,
        config: &ClientConfig,
    ) -> Result<Arc<dyn HttpTransport>, ApiClientError> {
        if let Some(existing) = read_unpoisoned(&self.transport).as_ref() {
            return Ok(Arc::clone(existing));
        }

        let mut slot = write_unpoisoned(&self.transport);
        if let Some(existing) = slot.as_ref() {
            return Ok(Arc::clone(existing));
        }
        let built = self.factory.build(config)?;
        *slot = Some(Arc::clone(&built));
        Ok(built)
    }

    /// Idempotent; safe before any transport was ever created.
    pub(crate) fn close(&self) {
        write_unpoisoned(&self.transport).take();
    }
}
