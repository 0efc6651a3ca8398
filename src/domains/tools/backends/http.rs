//! HTTP backend: outbound client seam and the reqwest implementation.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

/// HTTP method of an HTTP-backed tool.
///
/// Only `POST` carries a body; every other method string maps to `GET`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    /// Parse a stored method string, case-insensitively.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(m) if m.trim().eq_ignore_ascii_case("post") => Self::Post,
            _ => Self::Get,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound HTTP capability used by HTTP-backed tools.
///
/// Implementations return the response body as text, or a transport error
/// message. They must not retry.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform a bodyless GET.
    async fn get(&self, url: &str) -> Result<String, String>;

    /// POST `body` as JSON.
    async fn post(&self, url: &str, body: String) -> Result<String, String>;
}

/// [`HttpClient`] backed by `reqwest`.
///
/// Non-2xx responses are reported as errors.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_body(response: reqwest::Response) -> Result<String, String> {
        let response = response.error_for_status().map_err(|e| e.to_string())?;
        response.text().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<String, String> {
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        Self::read_body(response).await
    }

    async fn post(&self, url: &str, body: String) -> Result<String, String> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Self::read_body(response).await
    }
}
