//! Single-attempt HTTP GET against the Airly API.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};

use super::error::AirlyError;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("marge-airly/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }
}

/// Status line and body bytes, undecoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// One request, one attempt. Retrying is the scheduler's business.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, req: &ApiRequest) -> impl Future<Output = Result<RawResponse, AirlyError>> + Send;
}

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Build a client carrying the fixed Airly header set.
    pub fn new(api_key: &str, language: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key)?;
        key.set_sensitive(true);
        headers.insert("apikey", key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_str(language)?);

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, req: &ApiRequest) -> Result<RawResponse, AirlyError> {
        tracing::debug!(url = %req.url, query = ?req.query, "GET");

        let resp = self
            .client
            .get(&req.url)
            .query(&req.query)
            .send()
            .await
            .map_err(|e| AirlyError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| AirlyError::Transport(e.to_string()))?;

        tracing::debug!(url = %req.url, status, bytes = body.len(), "Airly response");
        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}
