//! Structured logging setup for voxledger binaries.

pub mod logger;

pub use logger::{build_filter, init_logger};
