//! The three specialized Long Term Archive workers, built on a shared
//! runtime, config loader, and structured logger.

pub mod config;
pub mod error;
pub mod locator;
pub mod logging;
pub mod packing;
pub mod picker;
pub mod runtime;
pub mod stager;

pub use locator::Locator;
pub use picker::Picker;
pub use runtime::{Worker, WorkerRuntime};
pub use stager::RucioStager;
