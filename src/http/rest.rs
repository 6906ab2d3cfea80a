//! reqwest-backed transport with retries, proxy and client certificate support

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use crate::config::{HttpConfig, ProxyConfig};
use crate::error::{ClampError, Result};
use crate::http::transport::{ApiRequest, ApiResponse, Method, Transport};
use crate::session::Session;

/// Upper bound for a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// HTTP transport for one remote server
pub struct RestClient {
    server: String,
    client: Client,
    retries: u32,
    backoff: Duration,
}

/// Builder collecting what a `RestClient` needs before the reqwest client is built
pub struct RestClientBuilder<'a> {
    server: String,
    http: &'a HttpConfig,
    proxy: Option<&'a ProxyConfig>,
    session: Option<&'a Session>,
    headers: Vec<(String, String)>,
}

impl<'a> RestClientBuilder<'a> {
    pub fn proxy(mut self, proxy: Option<&'a ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn session(mut self, session: Option<&'a Session>) -> Self {
        self.session = session;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> Result<RestClient> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClampError::Config(format!("Invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ClampError::Config(format!("Invalid header value for {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let mut builder = Client::builder()
            .timeout(self.http.timeout())
            .default_headers(headers)
            .danger_accept_invalid_certs(self.http.accept_invalid_certs);

        if let Some(proxy) = self.proxy {
            let url = proxy.url();
            log::info!("[{}] Routing through proxy {}", self.server, url);
            let proxy = reqwest::Proxy::all(&url)
                .map_err(|e| ClampError::Config(format!("Invalid proxy {}: {}", url, e)))?;
            builder = builder.proxy(proxy);
        } else {
            builder = builder.no_proxy();
        }

        if let Some(session) = self.session {
            builder = builder.identity(session.identity()?);
        }

        let client = builder
            .build()
            .map_err(|e| ClampError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(RestClient {
            server: self.server,
            client,
            retries: self.http.retries,
            backoff: self.http.backoff(),
        })
    }
}

impl RestClient {
    pub fn builder<'a>(server: impl Into<String>, http: &'a HttpConfig) -> RestClientBuilder<'a> {
        RestClientBuilder {
            server: server.into(),
            http,
            proxy: None,
            session: None,
            headers: Vec::new(),
        }
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        };

        let mut builder = self.client.request(method, &request.url);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                log::error!("[{}][{}] Failed to perform: {}", self.server, request.action, e);
                log::error!("[{}][{}] url used: {}", self.server, request.action, request.url);
                log::error!("[{}][{}] data sent: {:?}", self.server, request.action, request.body);
                return Err(ClampError::Network(e));
            }
        };

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            log::info!("[{}][{}] response code: {}", self.server, request.action, status.as_u16());
            log::debug!("[{}][{}] url used: {}", self.server, request.action, request.url);
            log::debug!("[{}][{}] data sent: {:?}", self.server, request.action, request.body);
            log::debug!("[{}][{}] response: {}", self.server, request.action, body);
            Ok(ApiResponse::new(status.as_u16(), body))
        } else {
            log::error!("[{}][{}] response code: {}", self.server, request.action, status.as_u16());
            log::error!("[{}][{}] url used: {}", self.server, request.action, request.url);
            log::error!("[{}][{}] data sent: {:?}", self.server, request.action, request.body);
            log::error!("[{}][{}] response: {}", self.server, request.action, body);
            Err(ClampError::Api {
                action: request.action.clone(),
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl Transport for RestClient {
    fn server(&self) -> &str {
        &self.server
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut attempt = 0;
        loop {
            match self.send_once(&request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable(request.method) && attempt < self.retries => {
                    let delay = backoff_delay(self.backoff, attempt);
                    log::warn!(
                        "[{}][{}] attempt {} failed ({}), retrying in {:?}",
                        self.server,
                        request.action,
                        attempt + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Exponential backoff: factor * 2^attempt, capped
pub fn backoff_delay(factor: Duration, attempt: u32) -> Duration {
    factor.saturating_mul(2u32.saturating_pow(attempt.min(16))).min(MAX_BACKOFF)
}
