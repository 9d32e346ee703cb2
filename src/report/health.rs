//! Health-check ping sent after a clean run.

use std::time::Duration;

use super::ReportError;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Response of the health-check endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
}

impl std::fmt::Display for HealthResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Health Check Response Code: {} Body: {}",
            self.status, self.body
        )
    }
}

/// Sends a GET to a monitoring URL when a run finishes cleanly.
#[derive(Debug, Clone)]
pub struct HealthReporter {
    url: String,
    client: reqwest::blocking::Client,
}

impl HealthReporter {
    /// Create a reporter for `url` with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Health`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self, ReportError> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Create a reporter with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Health`] if the HTTP client cannot be built.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, ReportError> {
        let url = url.into();
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ReportError::Health {
                url: url.clone(),
                source,
            })?;
        Ok(Self { url, client })
    }

    /// The monitored URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send the ping.
    ///
    /// A non-success status is returned as a response, not an error; the
    /// monitor decides what it means.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Health`] if the request cannot be completed.
    pub fn ping(&self) -> Result<HealthResponse, ReportError> {
        let to_error = |source| ReportError::Health {
            url: self.url.clone(),
            source,
        };

        log::debug!("Calling health check {}", self.url);
        let response = self.client.get(&self.url).send().map_err(to_error)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(to_error)?;

        Ok(HealthResponse { status, body })
    }
}
