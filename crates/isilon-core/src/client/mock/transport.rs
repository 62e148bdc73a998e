//! In-memory transport for testing collectors without a cluster.
//!
//! Responses are keyed by the full request (path plus query string), so a
//! test can serve different pages for different resume tokens and assert
//! on the exact request sequence afterwards.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::client::{ApiRequest, ClientError, Transport};

#[derive(Debug, Clone)]
enum Route {
    Fixed(Result<Value, String>),
    /// Served in order; the last entry repeats once the script is exhausted.
    Script(Vec<Result<Value, String>>),
}

/// In-memory management API.
///
/// Clones share the request log and script cursors, so a test can keep a
/// handle after moving the transport into a `StatClient`. Unrouted requests
/// fail with HTTP 404.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    routes: HashMap<String, Route>,
    cursors: Arc<Mutex<HashMap<String, usize>>>,
    log: Arc<Mutex<Vec<ApiRequest>>>,
}

impl MockTransport {
    /// Creates a transport with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` for every request equal to `request`.
    pub fn add_response(&mut self, request: ApiRequest, body: Value) {
        self.routes
            .insert(request.to_string(), Route::Fixed(Ok(body)));
    }

    /// Serves a statistics engine answer for `key`; `records` is the `stats` array.
    pub fn add_stat(&mut self, key: &str, records: Value) {
        self.add_response(ApiRequest::stat(key), json!({ "stats": records }));
    }

    /// Makes every request equal to `request` fail with a transport error.
    pub fn add_failure(&mut self, request: ApiRequest, message: impl Into<String>) {
        self.routes
            .insert(request.to_string(), Route::Fixed(Err(message.into())));
    }

    /// Makes the statistics query for `key` fail with a transport error.
    pub fn fail_stat(&mut self, key: &str) {
        self.add_failure(ApiRequest::stat(key), format!("{key} unreachable"));
    }

    /// Serves `bodies` one per request, repeating the last one.
    pub fn add_script(&mut self, request: ApiRequest, bodies: Vec<Value>) {
        let script = bodies.into_iter().map(Ok).collect();
        self.routes
            .insert(request.to_string(), Route::Script(script));
    }

    /// Removes whatever is routed for `request`; later requests get a 404.
    pub fn remove(&mut self, request: &ApiRequest) {
        self.routes.remove(&request.to_string());
    }

    /// Every request served so far, in arrival order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Number of requests whose path equals `path`.
    pub fn request_count(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path() == path).count()
    }

    pub fn clear_requests(&self) {
        if let Ok(mut log) = self.log.lock() {
            log.clear();
        }
    }

    fn respond(&self, key: &str, route: &Route) -> Result<Value, String> {
        match route {
            Route::Fixed(result) => result.clone(),
            Route::Script(script) => {
                let mut cursors = self.cursors.lock().map_err(|e| e.to_string())?;
                let cursor = cursors.entry(key.to_string()).or_insert(0);
                let idx = (*cursor).min(script.len().saturating_sub(1));
                *cursor += 1;
                script
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| Err("empty script".to_string()))
            }
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, request: &ApiRequest) -> Result<Value, ClientError> {
        if let Ok(mut log) = self.log.lock() {
            log.push(request.clone());
        }
        let key = request.to_string();
        match self.routes.get(&key) {
            Some(route) => self.respond(&key, route).map_err(ClientError::Transport),
            None => Err(ClientError::Status {
                status: 404,
                path: request.path().to_string(),
                body: format!("no mock response for {key}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_and_missing_routes() {
        let mut mock = MockTransport::new();
        mock.add_response(ApiRequest::new("/a"), json!({"x": 1}));

        assert_eq!(mock.get(&ApiRequest::new("/a")).await.unwrap(), json!({"x": 1}));
        let err = mock.get(&ApiRequest::new("/b")).await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 404, .. }));
        assert_eq!(mock.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_script_repeats_last() {
        let mut mock = MockTransport::new();
        let req = ApiRequest::new("/s");
        mock.add_script(req.clone(), vec![json!(1), json!(2)]);

        let clone = mock.clone();
        assert_eq!(clone.get(&req).await.unwrap(), json!(1));
        assert_eq!(mock.get(&req).await.unwrap(), json!(2));
        assert_eq!(mock.get(&req).await.unwrap(), json!(2));
        assert_eq!(clone.request_count("/s"), 3);
    }

    #[tokio::test]
    async fn test_failure_route() {
        let mut mock = MockTransport::new();
        mock.fail_stat("node.load.1min");
        let err = mock.get(&ApiRequest::stat("node.load.1min")).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }
}
