//! Purpose: Scripted in-memory transport for offline sessions and tests.
//! Exports: `ReplayTransport`, `RecordedRequest`.
//! Role: Stands in for `HttpTransport`; serves canned responses and records traffic.
//! Invariants: Responses for the same (method, path) are served in FIFO order.
//! Invariants: An unscripted request yields a 404 response, not a panic.
use super::transport::{Method, Request, Response, Transport};
use crate::core::error::Error;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RecordedRequest {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
pub struct ReplayTransport {
    script: Mutex<HashMap<(Method, String), VecDeque<Response>>>,
    log: Mutex<Vec<RecordedRequest>>,
}

impl ReplayTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `method` on `path` (path only, query ignored).
    pub fn expect(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        lock(&self.script)
            .entry((method, path.to_string()))
            .or_default()
            .push_back(Response::new(status, body));
        self
    }

    /// Queues a `{"results": [...]}` envelope with status 200.
    pub fn expect_results(&self, method: Method, path: &str, results: Vec<Value>) -> &Self {
        self.expect(method, path, 200, json!({ "results": results }))
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.log).clone()
    }

    /// Requests other than GET, in order.
    pub fn writes(&self) -> Vec<RecordedRequest> {
        lock(&self.log)
            .iter()
            .filter(|request| request.method != Method::Get)
            .cloned()
            .collect()
    }

    pub fn pending(&self) -> usize {
        lock(&self.script).values().map(VecDeque::len).sum()
    }
}

impl Transport for ReplayTransport {
    fn request(&self, request: &Request<'_>) -> Result<Response, Error> {
        let path = request.url.path().to_string();
        lock(&self.log).push(RecordedRequest {
            method: request.method,
            path: path.clone(),
            query: request
                .url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
            body: request.body.cloned(),
        });

        let scripted = lock(&self.script)
            .get_mut(&(request.method, path.clone()))
            .and_then(VecDeque::pop_front);
        Ok(scripted.unwrap_or_else(|| {
            tracing::debug!(method = request.method.as_str(), path = %path, "unscripted replay request");
            Response::new(404, json!({ "detail": "Not found." }))
        }))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}
