//! Async abstraction layer for the Video Platform Core.
//!
//! Every core-* and bridge-* crate depends on this crate instead of reaching for
//! Tokio directly. The modules mirror the runtime's own layout so call sites read
//! naturally:
//!
//! - `task`: task spawning and execution
//! - `time`: sleep, timeout, instants and wall-clock helpers
//! - `sync`: mutexes, channels, cancellation tokens and the [`SingleFlight`](sync::SingleFlight) guard
//! - `fs` / `io`: async filesystem and I/O re-exports
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

// Re-export the async entry-point/test macros so downstream crates never need
// direct Tokio dependencies.
pub use core_async_macros::{main, test};

pub mod fs;
pub mod io;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
