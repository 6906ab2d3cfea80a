//! In-memory transport for tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ClampError, Result};
use crate::http::transport::{ApiRequest, ApiResponse, Transport};

type Handler = Box<dyn Fn(&ApiRequest) -> Result<ApiResponse> + Send + Sync>;

/// Transport that records every request and answers from a handler or a script
pub struct MockTransport {
    server: String,
    handler: Option<Handler>,
    script: Mutex<VecDeque<Result<ApiResponse>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    /// Answer every request with the given handler
    pub fn with_handler<F>(server: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<ApiResponse> + Send + Sync + 'static,
    {
        Self {
            server: server.into(),
            handler: Some(Box::new(handler)),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer requests in order from a fixed list
    pub fn scripted(server: impl Into<String>, responses: Vec<Result<ApiResponse>>) -> Self {
        Self {
            server: server.into(),
            handler: None,
            script: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with the same JSON document
    pub fn always_json(server: impl Into<String>, value: Value) -> Self {
        Self::with_handler(server, move |_| Ok(ApiResponse::ok_json(&value)))
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn server(&self) -> &str {
        &self.server
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.calls.lock().unwrap().push(request.clone());
        if let Some(handler) = &self.handler {
            return handler(&request);
        }
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(ClampError::InvalidResponse(format!(
                "no scripted response for {} {}",
                request.method, request.url
            )))
        })
    }
}
