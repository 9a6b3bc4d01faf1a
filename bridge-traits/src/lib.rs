//! # Host Bridge Traits
//!
//! Capability contracts the core needs from its host platform. Each trait is
//! implemented once per platform (desktop ships in `bridge-desktop`; mobile
//! hosts inject their own) and handed to the core as `Arc<dyn Trait>`.
//!
//! | Trait | Used by |
//! |-------|---------|
//! | [`HttpClient`](http::HttpClient) | content cache downloads, offline registration |
//! | [`FileSystemAccess`](storage::FileSystemAccess) | cache directory, offline storage, sweep |
//! | [`DatabaseAdapter`](database::DatabaseAdapter) | offline library persistence |
//! | [`LoggerSink`](logging::LoggerSink) | forwarding tracing events to host logs |
//!
//! All bridge calls return [`BridgeError`](error::BridgeError). The core fails
//! fast with a descriptive error when a required capability is missing rather
//! than silently degrading.

pub mod database;
pub mod error;
pub mod http;
pub mod logging;
pub mod storage;

pub use error::BridgeError;

pub use database::{DatabaseAdapter, DatabaseConfig, QueryRow, QueryValue, Statement};
pub use http::{ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use logging::{LogEntry, LogLevel, LoggerSink};
pub use storage::{DiskSpace, FileMetadata, FileSystemAccess};
