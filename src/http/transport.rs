//! Transport abstraction shared by the SDC and CLAMP clients

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

use crate::error::Result;

/// HTTP verbs used by the management APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }

    /// Resending cannot change server state
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request to a remote service
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Human readable action, used in log lines
    pub action: String,
    pub url: String,
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, action: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method,
            action: action.into(),
            url: url.into(),
            body: None,
        }
    }

    pub fn get(action: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(Method::Get, action, url)
    }

    pub fn post(action: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(Method::Post, action, url)
    }

    pub fn put(action: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(Method::Put, action, url)
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A successful (2xx) response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok_json(value: &Value) -> Self {
        Self::new(200, value.to_string())
    }

    /// Parse the body as JSON; an empty body is `Value::Null`
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Sends requests to one remote service.
///
/// Implementations return `Err` for anything but a 2xx answer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Nickname of the remote server, used in log lines
    fn server(&self) -> &str;

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;

    async fn send_json(&self, request: ApiRequest) -> Result<Value> {
        let action = request.action.clone();
        let response = self.send(request).await?;
        response.json().map_err(|e| {
            log::error!("[{}][{}] Failed to decode JSON: {}", self.server(), action, e);
            e
        })
    }
}

/// Decode a JSON value into a typed record list, treating non-arrays as empty
pub fn json_list<T: DeserializeOwned>(value: Value) -> Result<Vec<T>> {
    match value {
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        Value::Null => Ok(Vec::new()),
        other => {
            log::warn!("Expected a JSON array, got: {}", other);
            Ok(Vec::new())
        }
    }
}
