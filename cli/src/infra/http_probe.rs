//! Infrastructure implementation of the `HealthProbe` port.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::HealthProbe;
use crate::domain::{ProbeResponse, TransientNetworkError};

/// Upper bound on one probe request. The HTTP client has no default, and a
/// half-open connection to a booting server would otherwise stall the poll.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP GET probe. The test server presents a self-signed certificate, so
/// certificate verification is off.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_timeout(PROBE_TIMEOUT)
    }

    /// Probe whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .connect_timeout(timeout.min(CONNECT_TIMEOUT))
            .build()
            .context("building health probe client")?;
        Ok(Self { client })
    }
}

impl HealthProbe for HttpProbe {
    async fn get(&self, url: &str) -> Result<ProbeResponse, TransientNetworkError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransientNetworkError(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransientNetworkError(e.to_string()))?;
        Ok(ProbeResponse { status, body })
    }
}
