//! The single capability the providers need from HTTP: issue a GET, get back
//! a status and a body, or fail.

use std::{fmt::Debug, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::Config;

pub const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// DNS, connection, TLS, timeout or body read failure.
    #[error("{0}")]
    Request(String),

    /// The body was not valid JSON.
    #[error("{0}")]
    Decode(String),
}

impl TransportError {
    /// Text of the underlying failure, `"Unknown error"` when there is none.
    pub fn cause(&self) -> String {
        let text = self.to_string();
        if text.trim().is_empty() { UNKNOWN_ERROR.to_string() } else { text }
    }
}

/// Status and raw body of an upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The parse step. A malformed body is reported as [`TransportError::Decode`].
    pub fn json(&self) -> Result<Value, TransportError> {
        serde_json::from_str(&self.body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError>;
}

/// [`Transport`] backed by `reqwest`.
///
/// No timeout unless one is configured; a hung upstream hangs the lookup.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }

    pub fn with_timeout(timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder.build().context("Failed to build HTTP client")?;
        Ok(Self { http })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::with_timeout(config.request_timeout())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        // Errors must not echo the URL: it can carry an API key.
        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.without_url().to_string()))?;

        let status = res.status().as_u16();
        let body = res
            .text()
            .await
            .map_err(|e| TransportError::Request(e.without_url().to_string()))?;

        Ok(RawResponse { status, body })
    }
}
