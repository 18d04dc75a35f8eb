use crate::error::{AnalysisError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared cancellation signal with an optional deadline.
///
/// Clones observe the same flag, so a token handed to workers sees a
/// `cancel()` issued by the caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.check().is_err()
    }

    pub fn check(&self) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(AnalysisError::Cancelled);
        }

        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(AnalysisError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_signal() {
        let token = CancellationToken::new();
        let worker_view = token.clone();
        assert!(worker_view.check().is_ok());

        token.cancel();
        assert!(matches!(worker_view.check(), Err(AnalysisError::Cancelled)));
    }

    #[test]
    fn expired_deadline_reports_deadline_exceeded() {
        let token = CancellationToken::new().with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(AnalysisError::DeadlineExceeded)));

        let generous = CancellationToken::new().with_timeout(Duration::from_secs(3600));
        assert!(!generous.is_cancelled());
    }
}
