use std::sync::Arc;
use std::time::Duration;

use crate::client::ApiClient;
use crate::error::ApiClientError;
use crate::session::{SessionManager, TransportFactory, UreqTransportFactory};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_FACTOR: f64 = 1.0;

/// Validated client configuration. Built through [`ApiClient::builder`];
/// every field is checked in `try_build`, so a constructed client can never
/// carry an unusable configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub(crate) base_url: String,
    pub(crate) timeout: Duration,
    pub(crate) max_retries: u32,
    pub(crate) backoff_factor: f64,
    pub(crate) verify_tls: bool,
}

impl ClientConfig {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    fn validate(&self) -> Result<(), ApiClientError> {
        if self.timeout.is_zero() {
            return Err(ApiClientError::validation("Timeout must be positive"));
        }
        if !(self.backoff_factor.is_finite() && self.backoff_factor > 0.0) {
            return Err(ApiClientError::validation(
                "Backoff factor must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            verify_tls: true,
        }
    }
}

pub struct ClientBuilder {
    config: ClientConfig,
    transport_factory: Option<Arc<dyn TransportFactory>>,
}

impl ClientBuilder {
    pub(crate) fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            transport_factory: None,
        }
    }

    /// Base URL that relative endpoints are resolved against. Empty by
    /// default, in which case every endpoint must be an absolute URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Per-attempt network timeout. Must be positive.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Retries after the first attempt; `max_retries = 3` means up to four
    /// attempts total.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Base factor for exponential backoff. Must be positive.
    pub fn backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.config.backoff_factor = backoff_factor;
        self
    }

    /// Disables TLS certificate verification when set to `false`.
    pub fn verify_tls(mut self, verify_tls: bool) -> Self {
        self.config.verify_tls = verify_tls;
        self
    }

    /// Replaces the transport the session manager builds on first use. Meant
    /// for tests and embedding; production clients use the default
    /// ureq-backed transport.
    pub fn transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.transport_factory = Some(factory);
        self
    }

    pub fn try_build(self) -> Result<ApiClient, ApiClientError> {
        self.config.validate()?;
        let factory = self
            .transport_factory
            .unwrap_or_else(|| Arc::new(UreqTransportFactory));
        Ok(ApiClient::from_parts(
            self.config,
            SessionManager::new(factory),
        ))
    }
}
