use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use serde::Serialize;

use crate::error::LLMError;

/// HTTP methods used by the providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Minimal HTTP request representation shared across providers.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Builds a POST request with a JSON request body.
    ///
    /// # Examples
    ///
    /// ```
    /// use llmanager::http::{HttpMethod, HttpRequest};
    ///
    /// let request = HttpRequest::post_json("https://example.com", br"{}".to_vec());
    /// assert_eq!(request.method, HttpMethod::Post);
    /// assert_eq!(request.headers.get("Content-Type"), Some(&"application/json".to_string()));
    /// ```
    pub fn post_json(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: HashMap::from([("Content-Type".to_string(), "application/json".to_string())]),
            body: Some(body),
            timeout: None,
        }
    }

    /// Builds a body-less GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Merges `headers` into the request, replacing existing names.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }
}

/// Minimal HTTP response representation.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Converts the body into a UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Transport`] when the body is not valid UTF-8.
    pub fn into_string(self) -> Result<String, LLMError> {
        String::from_utf8(self.body).map_err(|err| LLMError::transport(err.to_string()))
    }
}

/// HTTP response that carries a streaming body.
pub struct HttpStreamResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: HttpBodyStream,
}

/// Body stream returned by [`HttpTransport::send_stream`].
pub type HttpBodyStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, LLMError>> + Send>>;

/// Transport abstraction decoupling sessions from the concrete HTTP client.
///
/// # Examples
///
/// ```
/// # use async_trait::async_trait;
/// # use llmanager::http::{HttpTransport, HttpRequest, HttpResponse, HttpStreamResponse};
/// # use llmanager::error::LLMError;
/// # use futures_util::stream;
/// struct MemoryTransport;
///
/// #[async_trait]
/// impl HttpTransport for MemoryTransport {
///     async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError> {
///         Ok(HttpResponse { status: 200, headers: request.headers, body: b"ok".to_vec() })
///     }
///     async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, LLMError> {
///         Ok(HttpStreamResponse { status: 200, headers: request.headers, body: Box::pin(stream::empty()) })
///     }
/// }
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let response = MemoryTransport
///     .send(HttpRequest::get("https://example.com"))
///     .await
///     .unwrap();
/// assert_eq!(response.status, 200);
/// # });
/// ```
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends a request and resolves when the full response is available.
    ///
    /// # Errors
    ///
    /// Implementations map network failures to [`LLMError::Transport`].
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError>;

    /// Sends a request and returns the body as a chunk stream.
    ///
    /// # Errors
    ///
    /// Implementations map network failures to [`LLMError::Transport`].
    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, LLMError>;
}

/// Thread-safe handle to a transport implementation.
pub type DynHttpTransport = Arc<dyn HttpTransport>;

fn serialize_body<T: Serialize>(body: &T) -> Result<Vec<u8>, LLMError> {
    serde_json::to_vec(body).map_err(|err| LLMError::Validation {
        message: format!("failed to serialize request: {err}"),
    })
}

/// Serializes a body to JSON, attaches headers, and issues a POST request.
///
/// # Errors
///
/// Returns [`LLMError::Validation`] if serialization fails or forwards the error raised by
/// [`HttpTransport::send`].
pub async fn post_json_with_headers<T: Serialize>(
    transport: &dyn HttpTransport,
    url: impl Into<String>,
    headers: HashMap<String, String>,
    body: &T,
) -> Result<HttpResponse, LLMError> {
    let request = HttpRequest::post_json(url, serialize_body(body)?).with_headers(headers);
    transport.send(request).await
}

/// Issues a JSON POST request and returns the streaming response.
///
/// # Errors
///
/// Returns [`LLMError::Validation`] when serialization fails or propagates any error from
/// [`HttpTransport::send_stream`].
pub async fn post_json_stream_with_headers<T: Serialize>(
    transport: &dyn HttpTransport,
    url: impl Into<String>,
    headers: HashMap<String, String>,
    body: &T,
) -> Result<HttpStreamResponse, LLMError> {
    let request = HttpRequest::post_json(url, serialize_body(body)?).with_headers(headers);
    transport.send_stream(request).await
}

/// Issues a GET request with the given headers.
pub async fn get_with_headers(
    transport: &dyn HttpTransport,
    url: impl Into<String>,
    headers: HashMap<String, String>,
) -> Result<HttpResponse, LLMError> {
    transport
        .send(HttpRequest::get(url).with_headers(headers))
        .await
}

/// Drains a streaming body, used to build error messages for non-2xx streams.
pub(crate) async fn collect_body_text(
    mut body: HttpBodyStream,
    provider: &'static str,
) -> Result<String, LLMError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        bytes.extend_from_slice(&chunk?);
    }
    String::from_utf8(bytes).map_err(|err| LLMError::Provider {
        provider,
        message: format!("failed to decode stream error body: {err}"),
    })
}

/// Extracts the `Retry-After` header (in seconds) if present.
///
/// HTTP-date values are ignored; vendors use the numeric form.
pub(crate) fn retry_after_from_headers(headers: &HashMap<String, String>) -> Option<Duration> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("retry-after"))
        .and_then(|(_, value)| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

pub mod reqwest;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser;

    /// Transport that panics if `send` or `send_stream` are invoked.
    struct PanicTransport;

    #[async_trait]
    impl HttpTransport for PanicTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, LLMError> {
            panic!("send should not be called");
        }

        async fn send_stream(&self, _request: HttpRequest) -> Result<HttpStreamResponse, LLMError> {
            panic!("send_stream should not be called");
        }
    }

    struct NonSerializableBody;

    impl Serialize for NonSerializableBody {
        fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            Err(ser::Error::custom(
                "intentional serialization failure for test",
            ))
        }
    }

    #[tokio::test]
    async fn post_json_with_headers_returns_validation_on_serde_error() {
        let result = post_json_with_headers(
            &PanicTransport,
            "http://example.com",
            HashMap::new(),
            &NonSerializableBody,
        )
        .await;

        match result {
            Err(LLMError::Validation { message }) => {
                assert!(
                    message.contains("failed to serialize request"),
                    "unexpected validation message: {message}"
                );
            }
            Ok(_) => panic!("expected validation error for non serializable body"),
            Err(other) => panic!("unexpected error type: {other:?}"),
        }
    }

    #[test]
    fn with_headers_keeps_content_type() {
        let request = HttpRequest::post_json("http://example.com", Vec::new())
            .with_headers(HashMap::from([("x-api-key".into(), "k".into())]));
        assert_eq!(
            request.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(request.headers.get("x-api-key").map(String::as_str), Some("k"));
    }

    #[test]
    fn retry_after_is_case_insensitive() {
        let headers = HashMap::from([("Retry-After".to_string(), " 12 ".to_string())]);
        assert_eq!(
            retry_after_from_headers(&headers),
            Some(Duration::from_secs(12))
        );
        let headers = HashMap::from([("retry-after".to_string(), "soon".to_string())]);
        assert_eq!(retry_after_from_headers(&headers), None);
    }
}
