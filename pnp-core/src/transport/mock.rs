//! Mock transport for testing

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{HttpRequest, HttpTransport, RawResponse};
use crate::error::Result;

type Handler = Box<dyn Fn(&HttpRequest) -> Result<RawResponse> + Send + Sync>;

/// Scripted in-process transport.
///
/// Every request is recorded and answered by the installed handler.
/// Concurrency is measured so tests can assert on request overlap.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<MockTransportInner>,
}

struct MockTransportInner {
    handler: Mutex<Handler>,
    requests: Mutex<Vec<HttpRequest>>,
    latency: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    /// Create a mock answered by `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<RawResponse> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(MockTransportInner {
                handler: Mutex::new(Box::new(handler)),
                requests: Mutex::new(Vec::new()),
                latency: Mutex::new(Duration::ZERO),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Replace the handler.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn(&HttpRequest) -> Result<RawResponse> + Send + Sync + 'static,
    {
        *self.inner.handler.lock() = Box::new(handler);
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.inner.latency.lock() = latency;
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.inner.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.inner.requests.lock().len()
    }

    /// Number of requests whose path equals `path`.
    pub fn count_path(&self, path: &str) -> usize {
        self.inner
            .requests
            .lock()
            .iter()
            .filter(|r| r.path() == path)
            .count()
    }

    /// Highest number of requests observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    /// Forget recorded requests.
    pub fn clear(&self) {
        self.inner.requests.lock().clear();
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> Result<RawResponse> {
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.inner.in_flight);

        self.inner.requests.lock().push(request.clone());

        let latency = *self.inner.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let handler = self.inner.handler.lock();
        (*handler)(&request)
    }
}

/// Decrements the in-flight count even when the request future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
