//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the video platform core:
//! - [`config`]: the validated `CoreConfig` and its builder
//! - [`logging`]: `tracing` subscriber setup and log hygiene helpers
//! - [`error`]: the runtime `Error` type

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
