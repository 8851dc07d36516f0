//! REST clients for the LTA DB and File Catalog, plus the bounded-retry
//! helper both of them are built on.

pub mod error;
pub mod file_catalog;
pub mod lta_db;
pub mod retry;

pub use error::RestError;
pub use file_catalog::FileCatalogClient;
pub use lta_db::LtaDbClient;
