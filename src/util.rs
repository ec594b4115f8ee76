use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};

use http::header::RETRY_AFTER;
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::error::ApiClientError;

const MAX_LOGGED_BODY_LEN: usize = 2048;

const SENSITIVE_HEADERS: [&str; 5] =
    ["authorization", "api-key", "x-api-key", "token", "x-auth-token"];

pub(crate) fn read_unpoisoned<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn write_unpoisoned<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Joins a base URL and an endpoint path, collapsing duplicate slashes at the
/// seam. Absolute endpoints are returned untouched.
pub(crate) fn resolve_target_url(base_url: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_owned();
    }
    join_base_path(base_url, endpoint)
}

pub(crate) fn join_base_path(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let relative = path.trim_start_matches('/');
    match (base.is_empty(), relative.is_empty()) {
        (true, true) => String::new(),
        (true, false) => relative.to_owned(),
        (false, true) => base.to_owned(),
        (false, false) => format!("{base}/{relative}"),
    }
}

pub(crate) fn parse_header_name(name: &str) -> Result<HeaderName, ApiClientError> {
    name.parse()
        .map_err(|_| ApiClientError::validation(format!("Invalid header name: {name}")))
}

pub(crate) fn parse_header_value(name: &str, value: &str) -> Result<HeaderValue, ApiClientError> {
    value
        .parse()
        .map_err(|_| ApiClientError::validation(format!("Invalid header value for {name}")))
}

/// Copies headers into a plain map for log output, masking values of headers
/// that commonly carry credentials.
pub(crate) fn mask_sensitive_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut masked = BTreeMap::new();
    for (name, value) in headers {
        let text = if SENSITIVE_HEADERS.contains(&name.as_str()) {
            "***MASKED***".to_owned()
        } else {
            value.to_str().unwrap_or("<binary>").to_owned()
        };
        masked.insert(name.as_str().to_owned(), text);
    }
    masked
}

/// Parses a `Retry-After` header: the delta-seconds form is used verbatim,
/// the HTTP-date form is converted to a delta from `now`.
pub(crate) fn parse_retry_after(headers: &HeaderMap, now: SystemTime) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?;
    let raw_value = value.to_str().ok()?.trim();
    if let Ok(seconds) = raw_value.parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Some(Duration::from_secs_f64(seconds));
        }
        return None;
    }

    let date = httpdate::parse_http_date(raw_value).ok()?;
    match date.duration_since(now) {
        Ok(duration) => Some(duration),
        Err(_) => Some(Duration::ZERO),
    }
}

pub(crate) fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.chars().count() <= MAX_LOGGED_BODY_LEN {
        return text.into_owned();
    }

    let truncated: String = text.chars().take(MAX_LOGGED_BODY_LEN).collect();
    format!("{truncated}...(truncated)")
}
