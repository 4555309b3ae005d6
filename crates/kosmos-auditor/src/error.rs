use thiserror::Error;

use kosmos_law::LawError;
use kosmos_store::StoreError;

#[derive(Debug, Error)]
pub enum AuditorError {
    /// The auditor was shut down and cannot be restarted.
    #[error("auditor has been shut down")]
    Shutdown,

    #[error("law error: {0}")]
    Law(#[from] LawError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type AuditorResult<T> = Result<T, AuditorError>;
