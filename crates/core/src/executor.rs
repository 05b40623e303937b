use async_trait::async_trait;
use thiserror::Error;

use crate::domain::answer::Row;
use crate::domain::intent::Intent;
use crate::domain::store::StoreContext;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),
    #[error("data source did not respond within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("data source returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("data source response could not be decoded: {0}")]
    MalformedResponse(String),
}

/// Read-only boundary to the store's data; the only stage that awaits.
#[async_trait]
pub trait DataExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(
        &self,
        store: &StoreContext,
        query: &str,
        intent: &Intent,
    ) -> Result<Vec<Row>, ExecutorError>;
}
