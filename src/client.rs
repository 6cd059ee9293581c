//! Backends that turn a prompt into a framed byte stream.

use std::pin::Pin;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::Config;
use crate::demo::CannedBackend;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, STREAM_BYTES,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// The raw body of a streaming reply.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Everything the backend needs to generate one reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The user's prompt.
    pub prompt: String,
    /// Model identifier.
    pub model: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Issues the single outbound request of a session.
#[async_trait::async_trait]
pub trait OutgoingRequest: Send + Sync {
    /// Sends `request` and returns the reply body once the response headers
    /// have arrived.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] for a non-success status and
    /// [`Error::Connection`] or [`Error::Timeout`] when the stream cannot be
    /// opened.
    async fn send(&self, request: &GenerationRequest) -> Result<ByteStream>;
}

#[async_trait::async_trait]
impl<T: OutgoingRequest + ?Sized> OutgoingRequest for Box<T> {
    async fn send(&self, request: &GenerationRequest) -> Result<ByteStream> {
        (**self).send(request).await
    }
}

/// Live backend reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    api_key: Option<String>,
    client: ReqwestClient,
    endpoint: Url,
    timeout: Duration,
}

impl HttpBackend {
    /// Create a backend that posts to `base_url` joined with `path`.
    pub fn new(base_url: &str, path: &str, api_key: Option<String>) -> Result<Self> {
        Self::with_timeout(base_url, path, api_key, DEFAULT_TIMEOUT)
    }

    /// Create a backend from a resolved configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_timeout(
            &config.base_url,
            &config.path,
            config.api_key.clone(),
            config.timeout,
        )
    }

    /// Create a backend whose connect and wait for response headers are each
    /// bounded by `timeout`. Reading the body is not.
    pub fn with_timeout(
        base_url: &str,
        path: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = endpoint(base_url, path)?;
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;
        Ok(Self {
            api_key: api_key.filter(|key| !key.is_empty()),
            client,
            endpoint,
            timeout,
        })
    }

    /// The URL requests are sent to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        if let Some(api_key) = &self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                Error::config(
                    format!("API key is not a valid header value: {e}"),
                    Some("api_key".to_string()),
                )
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn transport_error(response: &Response) -> Error {
        let status = response.status();
        let reason = status.canonical_reason().unwrap_or("Unknown Status");
        Error::transport(
            status.as_u16(),
            format!("API request failed: {reason} ({})", status.as_u16()),
        )
    }
}

#[async_trait::async_trait]
impl OutgoingRequest for HttpBackend {
    async fn send(&self, request: &GenerationRequest) -> Result<ByteStream> {
        CLIENT_REQUESTS.click();
        let started = Instant::now();
        let pending = self
            .client
            .post(self.endpoint.clone())
            .headers(self.headers()?)
            .json(request)
            .send();
        // Only the wait for response headers is bounded; the body streams
        // until it ends or the session is cancelled.
        let response = match tokio::time::timeout(self.timeout, pending).await {
            Ok(result) => result.map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(
                        format!("request timed out: {e}"),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(e.to_string(), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("request failed: {e}"), Some(Box::new(e)))
                }
            })?,
            Err(_) => {
                CLIENT_REQUEST_ERRORS.click();
                tracing::warn!(endpoint = %self.endpoint, "no response headers before timeout");
                return Err(Error::timeout(
                    "no response headers before timeout",
                    Some(self.timeout.as_secs_f64()),
                ));
            }
        };
        CLIENT_REQUEST_DURATION.add(started.elapsed().as_secs_f64());

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            tracing::warn!(
                status = response.status().as_u16(),
                endpoint = %self.endpoint,
                "backend rejected request"
            );
            return Err(Self::transport_error(&response));
        }

        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| {
                    STREAM_BYTES.count(bytes.len() as u64);
                    bytes
                })
                .map_err(|e| {
                    Error::streaming(format!("body read failed: {e}"), Some(Box::new(e)))
                })
        });
        Ok(Box::pin(stream))
    }
}

/// Picks the backend for the configured environment.
pub fn backend_for(config: &Config) -> Result<Box<dyn OutgoingRequest>> {
    if config.is_development() {
        tracing::info!("development environment, serving canned replies");
        return Ok(Box::new(CannedBackend::new()));
    }
    Ok(Box::new(HttpBackend::from_config(config)?))
}

/// Joins a base URL and a request path, keeping any path already on the base.
fn endpoint(base_url: &str, path: &str) -> Result<Url> {
    let base = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{base_url}/")
    };
    let base = Url::parse(&base)?;
    Ok(base.join(path.trim_start_matches('/'))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_path() {
        let url = endpoint("http://localhost:3000", "/chat").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/chat");
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let url = endpoint("https://example.com/api/v1", "chat").unwrap();
        assert_eq!(url.as_str(), "https://example.com/api/v1/chat");
    }

    #[test]
    fn endpoint_rejects_garbage() {
        let err = endpoint("not a url", "/chat").unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[test]
    fn empty_api_key_is_not_sent() {
        let backend = HttpBackend::new("http://localhost:3000", "/chat", Some(String::new()))
            .unwrap();
        let headers = backend.headers().unwrap();
        assert!(headers.get(header::AUTHORIZATION).is_none());
        assert_eq!(
            headers.get(header::ACCEPT).unwrap().to_str().unwrap(),
            "text/event-stream"
        );
    }

    #[test]
    fn api_key_sent_as_bearer() {
        let backend =
            HttpBackend::new("http://localhost:3000", "/chat", Some("sk-test".to_string()))
                .unwrap();
        let headers = backend.headers().unwrap();
        assert_eq!(
            headers.get(header::AUTHORIZATION).unwrap().to_str().unwrap(),
            "Bearer sk-test"
        );
    }

    #[test]
    fn backend_follows_environment() {
        use crate::config::Environment;

        let dev = Config::new()
            .with_base_url("not a url")
            .with_environment(Environment::Development);
        assert!(backend_for(&dev).is_ok());

        let prod = Config::new().with_base_url("not a url");
        assert!(backend_for(&prod).is_err());
    }

    #[test]
    fn request_body_shape() {
        let request = GenerationRequest {
            prompt: "hello".to_string(),
            model: "demo".to_string(),
            max_tokens: 256,
            temperature: 0.7,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["prompt"], "hello");
        assert_eq!(json["model"], "demo");
        assert_eq!(json["max_tokens"], 256);
    }
}
