//! Async I/O traits and utilities.
//!
//! Re-exports Tokio's I/O traits so bridge implementations and core crates agree
//! on a single reader/writer vocabulary.
//!
//! ```rust
//! use core_async::io::{AsyncRead, AsyncReadExt};
//!
//! async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> std::io::Result<Vec<u8>> {
//!     let mut buffer = Vec::new();
//!     reader.read_to_end(&mut buffer).await?;
//!     Ok(buffer)
//! }
//! ```

pub use tokio::io::{
    copy, AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt,
    AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadBuf,
};
