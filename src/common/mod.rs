//! Common utilities and definitions shared across modules
//!
//! Error taxonomy and per-run configuration used throughout the backend.

pub mod config;
pub mod error;

pub use config::{BuiltinsMapping, Config, FailurePolicy, OutputMode};
pub use error::{Error, FileFailure, Result};
