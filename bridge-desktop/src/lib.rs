//! # Desktop Bridge Implementations
//!
//! Default implementations of the bridge traits for desktop hosts
//! (macOS, Windows, Linux):
//! - [`ReqwestHttpClient`]: `HttpClient` over `reqwest` with retry and streaming
//! - [`TokioFileSystem`]: `FileSystemAccess` over `tokio::fs`, `fs2` and `filetime`
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
//! use std::sync::Arc;
//!
//! let http = Arc::new(ReqwestHttpClient::new());
//! let fs = Arc::new(TokioFileSystem::new());
//! ```

mod filesystem;
mod http;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
