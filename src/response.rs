use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::REQUEST_ID_HEADER;
use crate::error::ApiClientError;

/// A terminal successful response.
///
/// `data` holds the parsed JSON body when there was one; `raw_text` holds the
/// body verbatim when it was non-empty but not valid JSON. The headers always
/// contain the resolved correlation id under `x-request-id`.
#[derive(Clone, Debug)]
pub struct ApiResponse {
    status_code: u16,
    data: Option<Value>,
    raw_text: Option<String>,
    headers: HeaderMap,
}

impl ApiResponse {
    pub(crate) fn new(
        status_code: u16,
        data: Option<Value>,
        raw_text: Option<String>,
        headers: HeaderMap,
    ) -> Self {
        Self {
            status_code,
            data,
            raw_text,
            headers,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn raw_text(&self) -> Option<&str> {
        self.raw_text.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// The correlation id echoed (or assigned) for this logical request.
    pub fn correlation_id(&self) -> Option<&str> {
        self.headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
    }

    /// Deserializes the JSON body into a typed value.
    pub fn json<T>(&self) -> Result<T, ApiClientError>
    where
        T: DeserializeOwned,
    {
        let Some(data) = &self.data else {
            return Err(ApiClientError::Api {
                message: "Response has no JSON body".to_owned(),
                transport_kind: None,
                status_code: Some(self.status_code),
                response_body: self.raw_text.clone(),
                correlation_id: self.correlation_id().map(ToOwned::to_owned),
            });
        };
        serde_json::from_value(data.clone()).map_err(|source| ApiClientError::Api {
            message: format!("Failed to decode response json: {source}"),
            transport_kind: None,
            status_code: Some(self.status_code),
            response_body: None,
            correlation_id: self.correlation_id().map(ToOwned::to_owned),
        })
    }
}

impl std::fmt::Display for ApiResponse {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.data, &self.raw_text) {
            (Some(data), _) => write!(
                formatter,
                "ApiResponse(status_code={}, data={data})",
                self.status_code
            ),
            (None, Some(text)) => write!(
                formatter,
                "ApiResponse(status_code={}, data=None, text='{text}')",
                self.status_code
            ),
            (None, None) => {
                write!(formatter, "ApiResponse(status_code={}, data=None)", self.status_code)
            }
        }
    }
}
