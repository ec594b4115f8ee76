use http::{HeaderMap, Method};
use serde::Serialize;
use serde_json::Value;

use crate::client::ApiClient;
use crate::error::ApiClientError;
use crate::response::ApiResponse;
use crate::util::{parse_header_name, parse_header_value};

const ALLOWED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
];

/// An outbound API request. Immutable once constructed; validation happens
/// entirely at construction time, with no network or DNS activity.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    method: Method,
    endpoint: String,
    body: Option<Value>,
    headers: HeaderMap,
}

impl ApiRequest {
    /// Builds a request from a method name and endpoint.
    ///
    /// The method is case-normalized and must be one of GET, POST, PUT,
    /// DELETE, PATCH, HEAD, OPTIONS; the endpoint must be non-empty. Either
    /// violation is a [`ApiClientError::Validation`].
    pub fn new(method: &str, endpoint: impl Into<String>) -> Result<Self, ApiClientError> {
        let method = parse_method(method)?;
        Self::from_parts(method, endpoint.into(), HeaderMap::new(), None)
    }

    pub(crate) fn from_parts(
        method: Method,
        endpoint: String,
        headers: HeaderMap,
        body: Option<Value>,
    ) -> Result<Self, ApiClientError> {
        if endpoint.is_empty() {
            return Err(ApiClientError::validation("Endpoint cannot be empty"));
        }
        Ok(Self {
            method,
            endpoint,
            body,
            headers,
        })
    }

    /// Attaches a JSON body, consuming and returning the request.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds a header, validating name and value syntax.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ApiClientError> {
        let name = parse_header_name(name)?;
        let value = parse_header_value(name.as_str(), value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

fn parse_method(method: &str) -> Result<Method, ApiClientError> {
    let normalized = method.to_ascii_uppercase();
    ALLOWED_METHODS
        .into_iter()
        .find(|allowed| allowed.as_str() == normalized)
        .ok_or_else(|| ApiClientError::validation(format!("Invalid HTTP method: {method}")))
}

/// Fluent request construction attached to a client; `send` builds the
/// [`ApiRequest`] and delegates to [`ApiClient::execute`].
pub struct RequestBuilder<'a> {
    client: &'a ApiClient,
    method: Method,
    endpoint: String,
    headers: HeaderMap,
    body: Option<Value>,
}

impl<'a> RequestBuilder<'a> {
    pub(crate) fn new(client: &'a ApiClient, method: Method, endpoint: String) -> Self {
        Self {
            client,
            method,
            endpoint,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ApiClientError> {
        let name = parse_header_name(name)?;
        let value = parse_header_value(name.as_str(), value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Serializes `payload` as the JSON request body.
    pub fn json<T>(mut self, payload: &T) -> Result<Self, ApiClientError>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_value(payload).map_err(|source| {
            ApiClientError::validation(format!("Failed to serialize request json: {source}"))
        })?;
        self.body = Some(body);
        Ok(self)
    }

    pub fn send(self) -> Result<ApiResponse, ApiClientError> {
        let request =
            ApiRequest::from_parts(self.method, self.endpoint, self.headers, self.body)?;
        self.client.execute(&request)
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use serde_json::json;

    use crate::error::ApiClientError;

    use super::ApiRequest;

    #[test]
    fn method_is_case_normalized() {
        let request = ApiRequest::new("get", "/users").expect("lowercase method should parse");
        assert_eq!(request.method(), &Method::GET);

        let request = ApiRequest::new("PaTcH", "/users").expect("mixed case should parse");
        assert_eq!(request.method(), &Method::PATCH);
    }

    #[test]
    fn unknown_method_is_rejected_without_network_activity() {
        let error = ApiRequest::new("FETCH", "/users").expect_err("bad method should fail");
        assert!(matches!(error, ApiClientError::Validation { .. }));
        assert!(error.message().contains("Invalid HTTP method"));
    }

    #[test]
    fn surrounding_whitespace_does_not_make_a_method_valid() {
        assert!(ApiRequest::new(" GET", "/users").is_err());
    }

    #[test]
    fn empty_endpoint_is_rejected() {
        let error = ApiRequest::new("GET", "").expect_err("empty endpoint should fail");
        assert_eq!(error.message(), "Endpoint cannot be empty");
    }

    #[test]
    fn body_and_headers_round_trip() {
        let request = ApiRequest::new("POST", "/items")
            .expect("request")
            .with_body(json!({"name": "demo"}))
            .with_header("x-tenant", "acme")
            .expect("valid header");

        assert_eq!(request.body(), Some(&json!({"name": "demo"})));
        assert_eq!(
            request.headers().get("x-tenant").map(|value| value.as_bytes()),
            Some("acme".as_bytes())
        );
    }

    #[test]
    fn invalid_header_name_is_a_validation_error() {
        let error = ApiRequest::new("GET", "/users")
            .expect("request")
            .with_header("bad header\n", "value")
            .expect_err("header name with whitespace should fail");
        assert!(matches!(error, ApiClientError::Validation { .. }));
    }
}
