use tokio_util::sync::CancellationToken;

use crate::error::DigestError;

/// Run-wide cancellation, checked between channels and history pages and
/// awaited during rate-limit backoff.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(CancellationToken);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Resolves once the run is cancelled.
    pub async fn cancelled(&self) {
        self.0.cancelled().await
    }

    pub fn check(&self) -> Result<(), DigestError> {
        if self.is_cancelled() {
            Err(DigestError::Cancelled)
        } else {
            Ok(())
        }
    }
}
