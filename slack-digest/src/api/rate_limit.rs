use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use log::{debug, warn};

use crate::api::slack::SlackApi;
use crate::api::ApiFailure;
use crate::cancel::CancelToken;
use crate::error::DigestError;
use crate::models::slack::{ChannelInfo, HistoryPage, HistoryRequest, UserProfile};

/// Linear backoff: the n-th wait lasts `n * base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call, the first one included.
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        self.base_delay
            .saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX))
    }
}

/// The single path to the remote API. Rate-limited calls are retried
/// according to the policy; every other failure is returned at once.
pub struct RateLimitedClient<A> {
    api: A,
    policy: RetryPolicy,
    waits: AtomicUsize,
    cancel: CancelToken,
}

impl<A: SlackApi> RateLimitedClient<A> {
    pub fn new(api: A, policy: RetryPolicy) -> Self {
        Self {
            api,
            policy,
            waits: AtomicUsize::new(0),
            cancel: CancelToken::new(),
        }
    }

    /// Backoff waits end early with `Cancelled` once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Number of backoff waits taken so far, across all calls.
    pub fn backoff_waits(&self) -> usize {
        self.waits.load(Ordering::Relaxed)
    }

    pub async fn call<T, F, Fut>(&self, method: &str, mut operation: F) -> Result<T, DigestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiFailure>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(ApiFailure::RateLimited) if attempt < max_attempts => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!("{method} rate limited, retrying in {delay:?} (attempt {attempt}/{max_attempts})");
                    self.waits.fetch_add(1, Ordering::Relaxed);
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(DigestError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(ApiFailure::RateLimited) => {
                    return Err(DigestError::RateLimitExceeded {
                        method: method.to_string(),
                        attempts: attempt,
                    })
                }
                Err(ApiFailure::Failed(diagnostic)) => {
                    return Err(DigestError::Api {
                        method: method.to_string(),
                        diagnostic,
                    })
                }
            }
        }
    }

    /// All non-archived channels, following the listing cursor to the end.
    pub async fn list_channels(&self) -> Result<Vec<ChannelInfo>, DigestError> {
        let api = &self.api;
        let mut channels = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .call("conversations.list", || api.list_channels(cursor.as_deref()))
                .await?;
            channels.extend(page.channels);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!("listed {} channels", channels.len());
        Ok(channels)
    }

    pub async fn fetch_history(&self, request: &HistoryRequest) -> Result<HistoryPage, DigestError> {
        let api = &self.api;
        self.call("conversations.history", || api.fetch_history(request))
            .await
    }

    pub async fn fetch_permalink(&self, channel_id: &str, ts: &str) -> Result<String, DigestError> {
        let api = &self.api;
        self.call("chat.getPermalink", || api.fetch_permalink(channel_id, ts))
            .await
    }

    pub async fn fetch_user_profile(&self, user_id: &str) -> Result<UserProfile, DigestError> {
        let api = &self.api;
        self.call("users.info", || api.fetch_user_profile(user_id))
            .await
    }

    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        as_user: bool,
    ) -> Result<(), DigestError> {
        let api = &self.api;
        self.call("chat.postMessage", || api.post_message(channel, text, as_user))
            .await
    }
}
