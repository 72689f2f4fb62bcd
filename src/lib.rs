pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod docstore;
pub mod error;
pub mod gates;
pub mod ingest;
pub mod model;
pub mod overlap;
pub mod pipeline;
pub mod ranking;
pub mod scoring;
pub mod similarity;
pub mod storage;
pub mod test_utils;

pub use error::{CmError, Result};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
