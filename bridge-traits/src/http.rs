//! HTTP Client Abstraction
//!
//! Request/response plumbing plus streaming byte fetches used by the content
//! cache and the offline downloader.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let json = serde_json::to_vec(body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON serialization failed: {}", e))
        })?;
        self.body = Some(Bytes::from(json));
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// HTTP response
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Parse response body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON deserialization failed: {}", e))
        })
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid UTF-8: {}", e)))
    }

    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Retry policy used by implementations that retry idempotent requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub use_exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            use_exponential_backoff: true,
        }
    }
}

/// A response body exposed as an async reader.
///
/// `content_length` is the server-advertised size when known; progress
/// reporting treats `None` as an unknown total.
pub struct ByteStream {
    pub reader: Box<dyn core_async::io::AsyncRead + Send + Unpin>,
    pub content_length: Option<u64>,
}

impl ByteStream {
    pub fn new(
        reader: Box<dyn core_async::io::AsyncRead + Send + Unpin>,
        content_length: Option<u64>,
    ) -> Self {
        Self {
            reader,
            content_length,
        }
    }

    /// Wraps an in-memory buffer. Handy for fakes and tests.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes: Bytes = bytes.into();
        let len = bytes.len() as u64;
        Self::new(Box::new(std::io::Cursor::new(bytes)), Some(len))
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Async HTTP client trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::HttpClient;
/// use core_async::io::AsyncReadExt;
///
/// async fn fetch(client: &dyn HttpClient, url: &str) -> Result<Vec<u8>> {
///     let mut stream = client.fetch_bytes(url).await?;
///     let mut buf = Vec::new();
///     stream.reader.read_to_end(&mut buf).await?;
///     Ok(buf)
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request and buffer the whole response.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Open a streaming GET for `locator`.
    ///
    /// Non-2xx statuses surface as [`BridgeError::HttpStatus`] before any byte
    /// is handed out.
    async fn fetch_bytes(&self, locator: &str) -> Result<ByteStream>;

    /// GET `locator` and decode the body as JSON.
    async fn fetch_json(&self, locator: &str) -> Result<serde_json::Value> {
        let response = self.execute(HttpRequest::get(locator)).await?;
        if !response.is_success() {
            return Err(BridgeError::HttpStatus {
                status: response.status,
                locator: locator.to_string(),
            });
        }
        response.json()
    }
}
