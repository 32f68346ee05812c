pub mod rate_limit;
pub mod slack;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use rate_limit::RetryPolicy;

pub const DEFAULT_API_URL: &str = "https://slack.com/api";

/// Outcome of a failed remote call, before any retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiFailure {
    RateLimited,
    /// Carries the diagnostic payload of the response.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub token: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            token: token.into(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}
