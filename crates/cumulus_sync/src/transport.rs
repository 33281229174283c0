//! Transport abstraction for sync operations.
//!
//! The engine builds [`WireRequest`] values and hands them to a
//! [`Transport`]; it never opens sockets itself. Implementations wrap
//! whatever HTTP client the application uses (reqwest, ureq, a test
//! double). Timeouts and cancellation, if needed, belong to the
//! transport, not to this layer.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use thiserror::Error;

/// Network-level transport failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request never produced an HTTP response.
    #[error("network failure: {0}")]
    Network(String),
}

/// HTTP methods used by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// DELETE.
    Delete,
}

impl Method {
    /// Wire name of the method.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// One outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL, supplied by the surrounding wrapper.
    pub url: String,
    /// Request headers in insertion order.
    pub headers: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl WireRequest {
    /// Creates a body-less request.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Sets the JSON body (and the matching content type).
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self.headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        self
    }

    /// Returns the value of `name`, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// One incoming response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: String,
    /// Server-assigned version token (the ETag header), if any.
    pub etag: Option<String>,
}

impl WireResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<String>, etag: Option<&str>) -> Self {
        Self {
            status,
            body: body.into(),
            etag: etag.map(str::to_string),
        }
    }

    /// Returns true for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Completion callback for the non-blocking calling convention.
///
/// Invoked exactly once, on whatever thread the transport's I/O
/// completion uses.
pub type Completion = Box<dyn FnOnce(Result<WireResponse, TransportError>) + Send + 'static>;

/// A transport carries one request/response exchange.
///
/// Implementations must be shareable across callers; the engine issues
/// no concurrent requests of its own.
pub trait Transport: Send + Sync {
    /// Sends a request and blocks until the exchange completes.
    fn send(&self, request: &WireRequest) -> Result<WireResponse, TransportError>;

    /// Sends a request and invokes `completion` when the exchange
    /// completes.
    ///
    /// The default implementation drives [`Transport::send`] inline,
    /// which is correct for transports without their own I/O threads.
    fn send_async(&self, request: WireRequest, completion: Completion) {
        completion(self.send(&request));
    }
}

/// A scripted transport for tests.
///
/// Responses are replayed in FIFO order; every sent request is
/// recorded for inspection.
#[derive(Default)]
pub struct MockTransport {
    requests: Mutex<Vec<WireRequest>>,
    responses: Mutex<VecDeque<Result<WireResponse, TransportError>>>,
}

impl MockTransport {
    /// Creates an empty mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn push_response(&self, status: u16, body: &str, etag: Option<&str>) {
        self.responses
            .lock()
            .push_back(Ok(WireResponse::new(status, body, etag)));
    }

    /// Queues a network failure.
    pub fn push_error(&self, message: &str) {
        self.responses
            .lock()
            .push_back(Err(TransportError::Network(message.to_string())));
    }

    /// Returns all requests sent so far.
    pub fn requests(&self) -> Vec<WireRequest> {
        self.requests.lock().clone()
    }

    /// Returns the most recent request.
    pub fn last_request(&self) -> Option<WireRequest> {
        self.requests.lock().last().cloned()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &WireRequest) -> Result<WireResponse, TransportError> {
        self.requests.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("no mock response queued".into())))
    }
}
