//! CLAMP API client - url building on top of a shared transport

use std::sync::Arc;

use reqwest::Url;
use serde_json::Value;

use crate::error::{ClampError, Result};
use crate::http::{ApiRequest, ApiResponse, Transport};

/// Path of the v2 REST API under the CLAMP base url
const API_PATH: &str = "restservices/clds/v2";

/// Handle on the CLAMP API, cheap to clone
#[derive(Clone)]
pub struct ClampClient {
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl ClampClient {
    pub fn new(transport: Arc<dyn Transport>, clamp_url: &str) -> Self {
        Self {
            transport,
            base_url: format!("{}/{}", clamp_url.trim_end_matches('/'), API_PATH),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// URL of `segments` under the API base, each segment percent-encoded
    pub fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<String> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClampError::Config(format!("Invalid CLAMP url {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ClampError::Config(format!("CLAMP url {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url.into())
    }

    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.transport.send(request).await
    }

    pub async fn send_json(&self, request: ApiRequest) -> Result<Value> {
        self.transport.send_json(request).await
    }
}
