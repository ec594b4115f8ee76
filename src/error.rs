use thiserror::Error;

/// Classification of a transport-level failure that never produced an HTTP
/// status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransportFailureKind {
    Connection,
    Timeout,
}

impl std::fmt::Display for TransportFailureKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Connection => "connection",
            Self::Timeout => "timeout",
        };
        formatter.write_str(text)
    }
}

/// Error type for every failure the client surfaces.
///
/// Retryable failures (transient transport errors, 429, 5xx while the retry
/// budget lasts) are handled inside `execute` and never reach the caller;
/// what does reach the caller is one of these three terminal shapes. Every
/// variant carries the correlation id of the logical request when one was
/// assigned, so client-side failures can be matched against server logs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiClientError {
    /// Malformed request, configuration, or target URL. Raised before any
    /// network activity and never retried.
    #[error("{message}")]
    Validation {
        message: String,
        status_code: Option<u16>,
        response_body: Option<String>,
        correlation_id: Option<String>,
    },
    /// The server kept answering 429 until the retry budget ran out.
    #[error("{message}")]
    RateLimit {
        message: String,
        retry_after_seconds: Option<u64>,
        status_code: Option<u16>,
        response_body: Option<String>,
        correlation_id: Option<String>,
    },
    /// Any other non-recoverable failure: a terminal 4xx, a 5xx that
    /// survived all retries, or a transport error that survived all retries
    /// (tagged with its [`TransportFailureKind`]).
    #[error("{message}")]
    Api {
        message: String,
        transport_kind: Option<TransportFailureKind>,
        status_code: Option<u16>,
        response_body: Option<String>,
        correlation_id: Option<String>,
    },
}

impl ApiClientError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            status_code: None,
            response_body: None,
            correlation_id: None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message, .. }
            | Self::RateLimit { message, .. }
            | Self::Api { message, .. } => message,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Validation { status_code, .. }
            | Self::RateLimit { status_code, .. }
            | Self::Api { status_code, .. } => *status_code,
        }
    }

    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::Validation { response_body, .. }
            | Self::RateLimit { response_body, .. }
            | Self::Api { response_body, .. } => response_body.as_deref(),
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::Validation { correlation_id, .. }
            | Self::RateLimit { correlation_id, .. }
            | Self::Api { correlation_id, .. } => correlation_id.as_deref(),
        }
    }

    /// Server-supplied retry hint, present only on [`ApiClientError::RateLimit`].
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::RateLimit {
                retry_after_seconds,
                ..
            } => *retry_after_seconds,
            _ => None,
        }
    }

    /// Transport failure classification, present only on retry-exhausted
    /// transport errors.
    pub fn transport_kind(&self) -> Option<TransportFailureKind> {
        match self {
            Self::Api { transport_kind, .. } => *transport_kind,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiClientError, TransportFailureKind};

    #[test]
    fn validation_constructor_leaves_context_empty() {
        let error = ApiClientError::validation("Endpoint cannot be empty");
        assert_eq!(error.message(), "Endpoint cannot be empty");
        assert_eq!(error.status_code(), None);
        assert_eq!(error.response_body(), None);
        assert_eq!(error.correlation_id(), None);
        assert_eq!(error.retry_after_seconds(), None);
    }

    #[test]
    fn rate_limit_exposes_retry_hint() {
        let error = ApiClientError::RateLimit {
            message: "Rate limit exceeded".to_owned(),
            retry_after_seconds: Some(30),
            status_code: Some(429),
            response_body: None,
            correlation_id: Some("abc".to_owned()),
        };
        assert_eq!(error.retry_after_seconds(), Some(30));
        assert_eq!(error.status_code(), Some(429));
        assert_eq!(error.correlation_id(), Some("abc"));
    }

    #[test]
    fn transport_kind_only_set_on_api_errors() {
        let error = ApiClientError::Api {
            message: "request failed: timeout error".to_owned(),
            transport_kind: Some(TransportFailureKind::Timeout),
            status_code: None,
            response_body: None,
            correlation_id: None,
        };
        assert_eq!(error.transport_kind(), Some(TransportFailureKind::Timeout));
        assert_eq!(
            ApiClientError::validation("nope").transport_kind(),
            None
        );
    }
}
