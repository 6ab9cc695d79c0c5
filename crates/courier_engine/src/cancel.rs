use crate::CancelError;

/// Asks the backend to stop work. Best effort: the caller has already
/// released its local state and only logs the outcome.
#[async_trait::async_trait]
pub trait BackendCanceller: Send + Sync {
    /// Stops whatever the backend is running.
    async fn cancel_backend_job(&self) -> Result<String, CancelError>;

    /// Stops only the job for `request_id`. Backends that cannot target a
    /// single job fall back to [`BackendCanceller::cancel_backend_job`].
    async fn cancel_job(&self, request_id: &str) -> Result<String, CancelError> {
        let _ = request_id;
        self.cancel_backend_job().await
    }
}

/// Canceller used when no backend is attached.
#[derive(Debug, Clone, Default)]
pub struct UnavailableCanceller;

#[async_trait::async_trait]
impl BackendCanceller for UnavailableCanceller {
    async fn cancel_backend_job(&self) -> Result<String, CancelError> {
        Err(CancelError::Unavailable("no backend attached".to_string()))
    }
}
