use reqwest::blocking::Client;
use std::time::Duration;
use thiserror::Error;

/// One ingestion POST: serialized batch body plus routing and credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub endpoint: String,
    pub bearer_token: String,
    pub body: String,
}

/// Transport-level failure; every variant is treated identically by the
/// delivery pipeline (requeue, backoff, breaker accounting).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("ingest request failed: {0}")]
    Network(String),
    #[error("ingest request timed out")]
    Timeout,
    #[error("ingest endpoint returned status {status}")]
    RejectedStatus { status: u16 },
}

/// Narrow HTTP capability the pipeline depends on.
pub trait HttpTransport {
    fn post_json(&mut self, request: &TransportRequest) -> Result<(), TransportError>;
}

/// Blocking HTTP transport that forwards upload batches to the shuffle
/// endpoint with a bounded request timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds a transport whose requests are cancelled after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Network(format!("http client build failed: {err}")))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn post_json(&mut self, request: &TransportRequest) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&request.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .bearer_auth(&request.bearer_token)
            .body(request.body.clone())
            .send()
            .map_err(|err| {
                if err.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Network(err.to_string())
                }
            })?;
        if !response.status().is_success() {
            return Err(TransportError::RejectedStatus {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}
