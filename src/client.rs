use std::ops::Deref;
use std::thread::sleep;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method, Uri};
use serde_json::Value;
use tracing::{debug, info_span, warn};
use uuid::Uuid;

use crate::REQUEST_ID_HEADER;
use crate::backoff::{backoff_delay, sample_jitter_unit};
use crate::config::{ClientBuilder, ClientConfig};
use crate::error::{ApiClientError, TransportFailureKind};
use crate::request::{ApiRequest, RequestBuilder};
use crate::response::ApiResponse;
use crate::session::{HttpTransport, RawResponse, SessionManager, TransportCall, TransportError};
use crate::util::{mask_sensitive_headers, parse_retry_after, resolve_target_url, truncate_body};
use crate::{extract, guard};

/// Blocking REST client with retries, exponential backoff with jitter,
/// rate-limit cooperation, and outbound-address guarding.
///
/// One transport is shared across all calls on an instance, constructed
/// lazily on the first request and reused until [`ApiClient::close`]. The
/// client is safe to use from multiple threads; each `execute` call keeps
/// its own state on the stack, so concurrent calls only share the transport.
///
/// Closing concurrently with in-flight requests is not part of the
/// correctness guarantees: in-flight attempts finish on the transport they
/// already hold, and the next call transparently builds a fresh one.
pub struct ApiClient {
    config: ClientConfig,
    session: SessionManager,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Per-attempt classification. The outer retry loop interprets this instead
/// of dispatching on error types.
enum AttemptOutcome {
    Success(ApiResponse),
    Retry(RetryReason),
    Terminal(ApiClientError),
}

enum RetryReason {
    Transport {
        kind: TransportFailureKind,
    },
    Status {
        status: u16,
        /// Verbatim server `Retry-After` hint; only ever set for 429.
        server_wait: Option<Duration>,
        body: Bytes,
        correlation_id: String,
    },
}

impl RetryReason {
    fn server_wait(&self) -> Option<Duration> {
        match self {
            Self::Status { server_wait, .. } => *server_wait,
            Self::Transport { .. } => None,
        }
    }
}

impl ApiClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn from_parts(config: ClientConfig, session: SessionManager) -> Self {
        Self { config, session }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn get(&self, endpoint: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::GET, endpoint.into())
    }

    pub fn post(&self, endpoint: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::POST, endpoint.into())
    }

    pub fn put(&self, endpoint: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::PUT, endpoint.into())
    }

    pub fn delete(&self, endpoint: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::DELETE, endpoint.into())
    }

    pub fn patch(&self, endpoint: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::PATCH, endpoint.into())
    }

    /// Releases the shared transport. Idempotent; the next request builds a
    /// fresh transport.
    pub fn close(&self) {
        self.session.close();
    }

    /// Scoped acquisition: the returned guard derefs to the client and calls
    /// [`ApiClient::close`] when dropped, including during unwinding.
    pub fn scope(&self) -> ClientScope<'_> {
        ClientScope { client: self }
    }

    /// Executes a request, retrying transient failures.
    ///
    /// Up to `max_retries + 1` attempts are made. Transport failures and
    /// retryable statuses (429 and 5xx) sleep per the backoff schedule —
    /// or per the server's `Retry-After` hint on 429 — between attempts;
    /// everything else resolves on the first pass. The outcome is either a
    /// terminal [`ApiResponse`] or one typed [`ApiClientError`].
    pub fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiClientError> {
        let target_url = resolve_target_url(&self.config.base_url, request.endpoint());
        guard::validate_outbound_url(&target_url)?;
        let parsed_target: Uri = target_url.parse().map_err(|_| {
            ApiClientError::validation(format!("Invalid request URL: {target_url}"))
        })?;
        if parsed_target.scheme().is_none() {
            return Err(ApiClientError::validation(format!(
                "Invalid request URL: {target_url}"
            )));
        }

        let transport = self.session.acquire(&self.config)?;

        let mut headers = request.headers().clone();
        let correlation_id = match headers.get(REQUEST_ID_HEADER) {
            Some(value) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
            None => {
                let generated = Uuid::new_v4().to_string();
                if let Ok(value) = HeaderValue::from_str(&generated) {
                    headers.insert(REQUEST_ID_HEADER, value);
                }
                generated
            }
        };

        let body_bytes = match request.body() {
            Some(value) => Some(serde_json::to_vec(value).map_err(|source| {
                ApiClientError::validation(format!("Failed to serialize request json: {source}"))
            })?),
            None => None,
        };
        if body_bytes.is_some() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        debug!(
            correlation_id = %correlation_id,
            method = %request.method(),
            url = %target_url,
            headers = ?mask_sensitive_headers(&headers),
            "sending request"
        );

        let max_retries = self.config.max_retries;
        for attempt in 0..=max_retries {
            let span = info_span!(
                "reqsafe.request",
                correlation_id = %correlation_id,
                method = %request.method(),
                url = %target_url,
                attempt,
                max_retries
            );
            let _enter = span.enter();

            let outcome = self.run_attempt(
                transport.as_ref(),
                request,
                &target_url,
                &headers,
                body_bytes.as_deref(),
                &correlation_id,
            );

            match outcome {
                AttemptOutcome::Success(response) => return Ok(response),
                AttemptOutcome::Terminal(error) => return Err(error),
                AttemptOutcome::Retry(reason) => {
                    if attempt == max_retries {
                        return Err(retries_exhausted_error(reason, &correlation_id));
                    }
                    let wait = match reason.server_wait() {
                        Some(wait) => wait,
                        None => backoff_delay(
                            attempt,
                            self.config.backoff_factor,
                            sample_jitter_unit(),
                        ),
                    };
                    log_retry(&reason, attempt, max_retries, wait);
                    sleep(wait);
                }
            }
        }

        // The loop always returns out of its final iteration.
        Err(ApiClientError::Api {
            message: "Unexpected error in retry loop".to_owned(),
            transport_kind: None,
            status_code: None,
            response_body: None,
            correlation_id: Some(correlation_id),
        })
    }

    fn run_attempt(
        &self,
        transport: &dyn HttpTransport,
        request: &ApiRequest,
        target_url: &str,
        headers: &HeaderMap,
        body: Option<&[u8]>,
        sent_correlation_id: &str,
    ) -> AttemptOutcome {
        let call = TransportCall {
            method: request.method().clone(),
            url: target_url,
            headers,
            body,
            timeout: self.config.timeout,
        };

        let raw = match transport.perform(call) {
            Ok(raw) => raw,
            Err(TransportError::Failure { kind, source }) => {
                warn!(kind = %kind, error = %source, "transport attempt failed");
                return AttemptOutcome::Retry(RetryReason::Transport { kind });
            }
            Err(TransportError::BodyTooLarge {
                limit_bytes,
                actual_bytes,
            }) => {
                return AttemptOutcome::Terminal(ApiClientError::Api {
                    message: format!(
                        "Response body too large ({actual_bytes} bytes > {limit_bytes} bytes)"
                    ),
                    transport_kind: None,
                    status_code: None,
                    response_body: None,
                    correlation_id: Some(sent_correlation_id.to_owned()),
                });
            }
        };

        // The server may assign its own request id; when echoed back it wins
        // over the one sent.
        let correlation_id = raw
            .headers
            .get(REQUEST_ID_HEADER)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .unwrap_or_else(|| sent_correlation_id.to_owned());
        let status = raw.status;
        debug!(correlation_id = %correlation_id, status, "response received");

        // Retry eligibility comes first: 429 is retry-classified even though
        // it is a 4xx code.
        if status >= 500 || status == 429 {
            let server_wait = if status == 429 {
                parse_retry_after(&raw.headers, SystemTime::now())
            } else {
                None
            };
            return AttemptOutcome::Retry(RetryReason::Status {
                status,
                server_wait,
                body: raw.body,
                correlation_id,
            });
        }

        if (400..500).contains(&status) {
            let message = extract::error_message(status, &raw.body);
            debug!(
                correlation_id = %correlation_id,
                status,
                body = %truncate_body(&raw.body),
                "client error response"
            );
            return AttemptOutcome::Terminal(ApiClientError::Api {
                message,
                transport_kind: None,
                status_code: Some(status),
                response_body: Some(String::from_utf8_lossy(&raw.body).into_owned()),
                correlation_id: Some(correlation_id),
            });
        }

        AttemptOutcome::Success(build_response(raw, &correlation_id))
    }
}

fn retries_exhausted_error(reason: RetryReason, sent_correlation_id: &str) -> ApiClientError {
    match reason {
        RetryReason::Transport { kind } => ApiClientError::Api {
            message: format!("Request failed: {kind} error"),
            transport_kind: Some(kind),
            status_code: None,
            response_body: None,
            correlation_id: Some(sent_correlation_id.to_owned()),
        },
        RetryReason::Status {
            status,
            server_wait,
            body,
            correlation_id,
        } if status == 429 => ApiClientError::RateLimit {
            message: "Rate limit exceeded".to_owned(),
            retry_after_seconds: server_wait.map(|wait| wait.as_secs()),
            status_code: Some(status),
            response_body: Some(String::from_utf8_lossy(&body).into_owned()),
            correlation_id: Some(correlation_id),
        },
        RetryReason::Status {
            status,
            body,
            correlation_id,
            ..
        } => ApiClientError::Api {
            message: "Max retries exceeded".to_owned(),
            transport_kind: None,
            status_code: Some(status),
            response_body: Some(String::from_utf8_lossy(&body).into_owned()),
            correlation_id: Some(correlation_id),
        },
    }
}

fn log_retry(reason: &RetryReason, attempt: u32, max_retries: u32, wait: Duration) {
    let delay_ms = wait.as_millis() as u64;
    match reason {
        RetryReason::Transport { kind } => {
            warn!(delay_ms, kind = %kind, attempt, max_retries, "retrying request after transport error");
        }
        RetryReason::Status {
            status, server_wait, ..
        } if *status == 429 => {
            if server_wait.is_some() {
                warn!(delay_ms, attempt, max_retries, "rate limited, waiting per server retry-after");
            } else {
                warn!(delay_ms, attempt, max_retries, "rate limited, waiting per backoff");
            }
        }
        RetryReason::Status { status, .. } => {
            warn!(delay_ms, status = *status, attempt, max_retries, "server error, retrying");
        }
    }
}

fn build_response(raw: RawResponse, correlation_id: &str) -> ApiResponse {
    let mut data = None;
    let mut raw_text = None;
    if !raw.body.is_empty() {
        match serde_json::from_slice::<Value>(&raw.body) {
            Ok(value) => data = Some(value),
            Err(_) => {
                debug!(correlation_id = %correlation_id, "response body is not JSON");
                raw_text = Some(String::from_utf8_lossy(&raw.body).into_owned());
            }
        }
    }

    let mut headers = raw.headers;
    if let Ok(value) = HeaderValue::from_str(correlation_id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    ApiResponse::new(raw.status, data, raw_text, headers)
}

/// RAII guard returned by [`ApiClient::scope`]; closes the client's shared
/// transport when dropped.
pub struct ClientScope<'a> {
    client: &'a ApiClient,
}

impl Deref for ClientScope<'_> {
    type Target = ApiClient;

    fn deref(&self) -> &Self::Target {
        self.client
    }
}

impl Drop for ClientScope<'_> {
    fn drop(&mut self) {
        self.client.close();
    }
}
