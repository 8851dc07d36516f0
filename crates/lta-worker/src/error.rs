//! The per-entity error type threaded through `do_work_claim` (§7).

use lta_client::RestError;

#[derive(Debug, thiserror::Error)]
pub enum WorkError {
    /// Catalog produced zero files, a bundle exceeded `MAX_FILE_COUNT`, a
    /// record was missing an expected subfield, or a bundle filename was
    /// malformed.
    #[error("{0}")]
    Data(String),
    #[error(transparent)]
    Rest(#[from] RestError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
